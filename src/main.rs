//! New Relic Exporter
//!
//! Exposes New Relic APM application statistics and deployments for
//! Prometheus.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      New Relic Exporter                          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐    ┌──────────────┐    ┌──────────────┐       │
//! │  │    Scrape    │───▶│  Collector   │───▶│  NerdGraph   │       │
//! │  │    Server    │    │  (pipeline)  │    │    Client    │       │
//! │  └──────────────┘    └──────────────┘    └──────────────┘       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use newrelic_exporter::adapters::{NerdGraphClient, NerdGraphConfig, DEFAULT_ENDPOINT};
use newrelic_exporter::error::{Error, Result};
use newrelic_exporter::metrics::{Collector, CollectorConfig, DeploymentConfig, DeploymentSource};
use newrelic_exporter::query::MAX_GUIDS_PER_QUERY;
use newrelic_exporter::server::{self, DEFAULT_LISTEN_ADDR};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Where deployments are read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DeploymentSourceArg {
    /// Deployments of each APM entity, queried in GUID batches
    Entity,
    /// NRQL over Deployment events (requires --account-id)
    Nrql,
}

/// New Relic Exporter - APM statistics and deployments for Prometheus
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// New Relic user API key
    #[arg(long, short = 'a', env = "NEWRELIC_API_KEY", hide_env_values = true)]
    api_key: String,

    /// New Relic account ID (required for the nrql deployment source)
    #[arg(long, short = 'n', env = "NEWRELIC_ACCOUNT_ID")]
    account_id: Option<u64>,

    /// Deployment source
    #[arg(long, env = "DEPLOYMENT_SOURCE", value_enum, default_value = "entity")]
    deployment_source: DeploymentSourceArg,

    /// NerdGraph endpoint URL
    #[arg(long, env = "NEWRELIC_GRAPHQL_URL", default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Scrape server bind address
    #[arg(long, env = "LISTEN_ADDR", default_value = DEFAULT_LISTEN_ADDR)]
    listen_addr: String,

    /// Deployment lookback window in seconds
    #[arg(long, env = "DEPLOYMENT_WINDOW_SECONDS", default_value = "3600")]
    deployment_window_seconds: u64,

    /// NerdGraph request timeout in seconds
    #[arg(long, env = "QUERY_TIMEOUT_SECONDS", default_value = "30")]
    query_timeout_seconds: u64,

    /// Entity GUIDs per deployment query
    #[arg(long, env = "DEPLOYMENT_BATCH_SIZE", default_value_t = MAX_GUIDS_PER_QUERY)]
    deployment_batch_size: usize,

    /// Deployment queries in flight at once
    #[arg(long, env = "DEPLOYMENT_CONCURRENCY", default_value = "1")]
    deployment_concurrency: usize,

    /// Maximum entity search pages per scrape
    #[arg(long, env = "MAX_ENTITY_PAGES", default_value = "50")]
    max_entity_pages: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

impl Args {
    fn deployment_source(&self) -> Result<DeploymentSource> {
        match (self.deployment_source, self.account_id) {
            (DeploymentSourceArg::Entity, _) => Ok(DeploymentSource::EntitySearch),
            (DeploymentSourceArg::Nrql, Some(account_id)) => {
                Ok(DeploymentSource::Nrql { account_id })
            }
            (DeploymentSourceArg::Nrql, None) => Err(Error::Config(
                "--account-id is required for the nrql deployment source".into(),
            )),
        }
    }

    fn nerdgraph_config(&self) -> NerdGraphConfig {
        NerdGraphConfig {
            endpoint: self.endpoint.clone(),
            api_key: self.api_key.clone(),
            query_timeout: Duration::from_secs(self.query_timeout_seconds),
        }
    }

    fn collector_config(&self) -> Result<CollectorConfig> {
        Ok(CollectorConfig {
            deployment_window: Duration::from_secs(self.deployment_window_seconds),
            max_entity_pages: self.max_entity_pages,
            deployments: DeploymentConfig {
                source: self.deployment_source()?,
                batch_size: self.deployment_batch_size,
                concurrency: self.deployment_concurrency,
            },
        })
    }
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args);

    info!("Starting New Relic Exporter");
    info!("  NerdGraph endpoint: {}", args.endpoint);
    info!("  Deployment source: {:?}", args.deployment_source);
    info!(
        "  Deployment window: {} seconds",
        args.deployment_window_seconds
    );
    info!("  Query timeout: {} seconds", args.query_timeout_seconds);

    let client = NerdGraphClient::new(args.nerdgraph_config())?;
    let collector = Collector::new(Arc::new(client), args.collector_config()?)?;

    server::run_metrics_server(&args.listen_addr, Arc::new(collector)).await
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    for directive in ["hyper=warn", "reqwest=info", "rustls=warn"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}
