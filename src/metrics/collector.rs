//! Collector
//!
//! Runs one collection pass per scrape:
//!
//! ```text
//! fetch entities ──▶ statistic series ──▶ entity directory
//!                                              │
//!                      deployment series ◀── fetch deployments (batched)
//! ```
//!
//! An upstream error ends the pass. Series produced before the failure are
//! kept, so a failing deployment fetch still exports the statistics.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{error, info, instrument};

use super::deployments::{map_deployments, DeploymentConfig};
use super::entities::{fetch_entities, DEFAULT_MAX_ENTITY_PAGES};
use super::statistics::map_entities;
use crate::domain::{DeploymentWindow, EntityDirectory, GaugeSeries, GraphQlExecutor};
use crate::error::{Error, Result};

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the collector
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// How far back deployments are exported
    pub deployment_window: Duration,

    /// Upper bound on entity search pages per pass
    pub max_entity_pages: usize,

    /// Deployment fetch settings
    pub deployments: DeploymentConfig,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            deployment_window: Duration::from_secs(3600),
            max_entity_pages: DEFAULT_MAX_ENTITY_PAGES,
            deployments: DeploymentConfig::default(),
        }
    }
}

impl CollectorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.deployment_window.is_zero() {
            return Err(Error::Config("deployment window must be positive".into()));
        }
        if self.max_entity_pages == 0 {
            return Err(Error::Config("max entity pages must be at least 1".into()));
        }
        self.deployments.validate()
    }
}

// =============================================================================
// Collector
// =============================================================================

/// Collects New Relic APM metrics on demand.
///
/// Holds no state between passes; concurrent passes are independent.
pub struct Collector {
    executor: Arc<dyn GraphQlExecutor>,
    config: CollectorConfig,
}

impl std::fmt::Debug for Collector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collector")
            .field("config", &self.config)
            .finish()
    }
}

impl Collector {
    /// Create a collector over `executor`.
    pub fn new(executor: Arc<dyn GraphQlExecutor>, config: CollectorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { executor, config })
    }

    /// Run one pass and return every series it produced.
    ///
    /// Upstream failures are logged; the series produced before the failure
    /// are still returned.
    pub async fn collect(&self) -> Vec<GaugeSeries> {
        let started = Instant::now();
        let mut series = Vec::new();

        match self.collect_into(Utc::now(), &mut series).await {
            Ok(()) => info!(
                "Collected {} series in {:?}",
                series.len(),
                started.elapsed()
            ),
            Err(e) => error!(
                "Collection aborted after {} series: {}",
                series.len(),
                e
            ),
        }

        series
    }

    /// Run one pass as of `now`, pushing series into `out` as they complete.
    ///
    /// Returns the error that aborted the pass, if any. Whatever was pushed
    /// before the error stays in `out`.
    #[instrument(skip(self, out))]
    pub async fn collect_into(&self, now: DateTime<Utc>, out: &mut Vec<GaugeSeries>) -> Result<()> {
        let entities = fetch_entities(self.executor.as_ref(), self.config.max_entity_pages).await?;
        info!("Fetched {} APM entities", entities.len());

        out.extend(map_entities(&entities));

        let directory = EntityDirectory::from_entities(&entities);
        let window = DeploymentWindow::ending_at(now, self.config.deployment_window);
        let deployments = map_deployments(
            self.executor.clone(),
            &self.config.deployments,
            &directory,
            &window,
        )
        .await?;
        out.push(deployments);

        Ok(())
    }
}
