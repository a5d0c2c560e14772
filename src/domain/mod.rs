//! Domain Layer
//!
//! # Architecture
//!
//! The domain layer is organized into:
//!
//! - **Model** (`model.rs`) - Entities, deployment events and gauge series
//! - **Ports** (`ports.rs`) - Trait abstraction over the NerdGraph transport
//!
//! # Usage
//!
//! ```ignore
//! use newrelic_exporter::domain::{GraphQlExecutor, GraphQlQuery};
//!
//! async fn fetch<E: GraphQlExecutor>(executor: &E, query: &GraphQlQuery) -> Result<()> {
//!     let data = executor.execute(query).await?;
//!     // ...
//! }
//! ```

pub mod model;
pub mod ports;

pub use model::{
    ApmSummary, ApplicationEntity, DeploymentEvent, DeploymentWindow, EntityDirectory,
    EntityGuid, GaugeSeries, Sample, APP_LABELS, DEPLOYMENT_LABELS,
};
pub use ports::{GraphQlExecutor, GraphQlQuery};
