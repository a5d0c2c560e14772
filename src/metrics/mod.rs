//! Metrics module
//!
//! The collection pipeline: entity fetch, statistic mapping, deployment
//! batching and the exposition boundary.

pub mod collector;
pub mod deployments;
pub mod entities;
pub mod exposition;
pub mod statistics;

mod proptest;
pub(crate) mod testing;

pub use collector::{Collector, CollectorConfig};
pub use deployments::{DeploymentConfig, DeploymentSource};

use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

/// Decode the `data` payload of a NerdGraph response into `T`.
fn decode_data<T: DeserializeOwned>(data: serde_json::Value) -> Result<T> {
    serde_json::from_value(data).map_err(|e| Error::UpstreamResponseParse(e.to_string()))
}
