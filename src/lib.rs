//! New Relic Exporter
//!
//! A Prometheus exporter that bridges New Relic APM into scrape-based
//! monitoring. Every scrape queries NerdGraph for application statistics and
//! recent deployments and turns them into gauges. Nothing is cached between
//! scrapes.
//!
//! # Architecture
//!
//! ```text
//! Scrape ──▶ Collector ──▶ Entity search ──▶ Statistic gauges
//!                              │
//!                              └──▶ Deployment batches ──▶ Deployment gauge
//! ```
//!
//! # Exported Metrics
//!
//! - `newrelic_application_apdex_score{appname}`
//! - `newrelic_application_error_rate{appname}`
//! - `newrelic_application_response_time{appname}` (milliseconds)
//! - `newrelic_application_throughput{appname}`
//! - `newrelic_application_deployment{appname, version}` (value 1, stamped with the deployment time)
//!
//! # Modules
//!
//! - [`adapters`] - NerdGraph HTTP client implementing the domain port
//! - [`domain`] - Entities, deployment events, gauge series and ports
//! - [`error`] - Error types
//! - [`metrics`] - Collection pipeline and exposition
//! - [`query`] - GraphQL query builder
//! - [`server`] - Scrape HTTP server

pub mod adapters;
pub mod domain;
pub mod error;
pub mod metrics;
pub mod query;
pub mod server;

// Re-export commonly used types
pub use adapters::{NerdGraphClient, NerdGraphConfig};
pub use domain::{GaugeSeries, GraphQlExecutor};
pub use error::{Error, Result};
pub use metrics::{Collector, CollectorConfig, DeploymentConfig, DeploymentSource};
