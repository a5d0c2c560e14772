//! Deployment Batcher & Mapper
//!
//! Fetches the deployments of every entity seen in the current pass and
//! exports them as presence markers on `newrelic_application_deployment`.
//!
//! # Batching
//!
//! `actor.entities` accepts at most [`MAX_GUIDS_PER_QUERY`] GUIDs, so the
//! entity directory is split into consecutive batches in upstream order. The
//! batch partition is a transport detail: every event is resolved through the
//! same directory, whichever batch returned it.
//!
//! # Timestamps
//!
//! NerdGraph reports deployment times in epoch milliseconds. They are turned
//! into instants exactly once, by [`event_instant`]; the exposition layer
//! renders instants in whatever unit the wire format needs.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};

use super::decode_data;
use crate::domain::{
    DeploymentEvent, DeploymentWindow, EntityDirectory, EntityGuid, GaugeSeries, GraphQlExecutor,
    DEPLOYMENT_LABELS,
};
use crate::error::{Error, Result};
use crate::query::{self, MAX_GUIDS_PER_QUERY};

/// Exported metric name
pub const DEPLOYMENT_METRIC: &str = "newrelic_application_deployment";

/// Exported help text
pub const DEPLOYMENT_HELP: &str = "New Relic application deployment";

// =============================================================================
// Configuration
// =============================================================================

/// Where deployment events are read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeploymentSource {
    /// `deployments` of each APM entity, queried in GUID batches
    #[default]
    EntitySearch,
    /// NRQL over the `Deployment` event type of one account
    Nrql { account_id: u64 },
}

/// Configuration for the deployment fetch
#[derive(Debug, Clone)]
pub struct DeploymentConfig {
    pub source: DeploymentSource,

    /// GUIDs per deployment query, at most [`MAX_GUIDS_PER_QUERY`]
    pub batch_size: usize,

    /// Batch queries allowed in flight at once
    pub concurrency: usize,
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            source: DeploymentSource::EntitySearch,
            batch_size: MAX_GUIDS_PER_QUERY,
            concurrency: 1,
        }
    }
}

impl DeploymentConfig {
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 || self.batch_size > MAX_GUIDS_PER_QUERY {
            return Err(Error::Config(format!(
                "deployment batch size must be between 1 and {}, got {}",
                MAX_GUIDS_PER_QUERY, self.batch_size
            )));
        }
        if self.concurrency == 0 {
            return Err(Error::Config("deployment concurrency must be at least 1".into()));
        }
        Ok(())
    }
}

// =============================================================================
// NerdGraph Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct EntityDeploymentsData {
    actor: EntityDeploymentsActor,
}

#[derive(Debug, Deserialize)]
struct EntityDeploymentsActor {
    #[serde(default)]
    entities: Vec<Option<EntityDeployments>>,
}

#[derive(Debug, Deserialize)]
struct EntityDeployments {
    guid: EntityGuid,
    #[serde(default)]
    deployments: Option<Vec<RawDeployment>>,
}

#[derive(Debug, Deserialize)]
struct RawDeployment {
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    timestamp: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct NrqlDeploymentsData {
    actor: NrqlActor,
}

#[derive(Debug, Deserialize)]
struct NrqlActor {
    account: NrqlAccount,
}

#[derive(Debug, Deserialize)]
struct NrqlAccount {
    nrql: NrqlResult,
}

/// NRQL rows are untyped attribute maps; each row is read on its own.
#[derive(Debug, Deserialize)]
struct NrqlResult {
    #[serde(default)]
    results: Vec<Map<String, Value>>,
}

// =============================================================================
// Mapping
// =============================================================================

/// Events left out of the deployment series.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DroppedEvents {
    /// GUID not returned by the entity search
    pub unknown_entity: usize,
    /// Timestamp outside the representable range
    pub invalid_timestamp: usize,
}

/// Build the deployment series for the entities in `directory`.
///
/// The series is only built once every query succeeded; any upstream error
/// is returned and nothing is produced.
#[instrument(skip_all, fields(entities = directory.len()))]
pub async fn map_deployments(
    executor: Arc<dyn GraphQlExecutor>,
    config: &DeploymentConfig,
    directory: &EntityDirectory,
    window: &DeploymentWindow,
) -> Result<GaugeSeries> {
    let events = match config.source {
        DeploymentSource::EntitySearch => {
            fetch_batched(executor, directory, *window, config.batch_size, config.concurrency)
                .await?
        }
        DeploymentSource::Nrql { account_id } => {
            fetch_nrql(executor.as_ref(), account_id, window).await?
        }
    };

    let (series, dropped) = build_series(directory, &events);
    if dropped.unknown_entity > 0 {
        warn!(
            "Dropped {} deployment events for entities not returned by the entity search",
            dropped.unknown_entity
        );
    }
    if dropped.invalid_timestamp > 0 {
        warn!(
            "Dropped {} deployment events with out-of-range timestamps",
            dropped.invalid_timestamp
        );
    }
    debug!("Exporting {} deployment samples", series.samples.len());
    Ok(series)
}

/// Split `guids` into consecutive batches of at most `batch_size`.
pub fn partition(guids: &[EntityGuid], batch_size: usize) -> Vec<&[EntityGuid]> {
    guids.chunks(batch_size.clamp(1, MAX_GUIDS_PER_QUERY)).collect()
}

/// Convert an upstream deployment time to an instant.
///
/// This is the only place the millisecond unit of NerdGraph timestamps is
/// interpreted. Returns `None` for times chrono cannot represent.
pub fn event_instant(timestamp_ms: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(timestamp_ms)
}

/// One sample per resolvable event, in event order.
pub fn build_series(
    directory: &EntityDirectory,
    events: &[DeploymentEvent],
) -> (GaugeSeries, DroppedEvents) {
    let mut series = GaugeSeries::new(DEPLOYMENT_METRIC, DEPLOYMENT_HELP, DEPLOYMENT_LABELS);
    let mut dropped = DroppedEvents::default();

    for event in events {
        let Some(name) = directory.name_of(&event.entity_guid) else {
            dropped.unknown_entity += 1;
            continue;
        };
        let Some(at) = event_instant(event.timestamp_ms) else {
            dropped.invalid_timestamp += 1;
            continue;
        };
        series.add_sample_at(vec![name.to_string(), event.version.clone()], 1.0, at);
    }

    (series, dropped)
}

async fn fetch_batched(
    executor: Arc<dyn GraphQlExecutor>,
    directory: &EntityDirectory,
    window: DeploymentWindow,
    batch_size: usize,
    concurrency: usize,
) -> Result<Vec<DeploymentEvent>> {
    let batches: Vec<Vec<EntityGuid>> = partition(directory.guids(), batch_size)
        .into_iter()
        .map(<[EntityGuid]>::to_vec)
        .collect();
    debug!(
        "Fetching deployments for {} entities in {} batches",
        directory.len(),
        batches.len()
    );

    // Each batch future owns its inputs so the pass stays `Send`.
    // `buffered` yields in batch order regardless of completion order.
    let per_batch: Vec<Vec<DeploymentEvent>> = stream::iter(batches.into_iter().enumerate())
        .map(move |(index, guids)| {
            let executor = executor.clone();
            async move { fetch_batch(executor.as_ref(), index, &guids, &window).await }
        })
        .buffered(concurrency.max(1))
        .try_collect()
        .await?;

    Ok(per_batch.into_iter().flatten().collect())
}

async fn fetch_batch(
    executor: &dyn GraphQlExecutor,
    index: usize,
    guids: &[EntityGuid],
    window: &DeploymentWindow,
) -> Result<Vec<DeploymentEvent>> {
    let query = query::entity_deployments(guids, window)?;
    let data = executor.execute(&query).await.map_err(|e| {
        debug!("Deployment batch {} failed: {}", index, e);
        e
    })?;
    let data: EntityDeploymentsData = decode_data(data)?;

    let events: Vec<DeploymentEvent> = data
        .actor
        .entities
        .into_iter()
        .flatten()
        .flat_map(|entity| {
            let guid = entity.guid;
            entity
                .deployments
                .unwrap_or_default()
                .into_iter()
                .filter_map(move |d| {
                    Some(DeploymentEvent::new(guid.clone(), d.version?, d.timestamp?))
                })
        })
        .collect();

    debug!("Deployment batch {} returned {} events", index, events.len());
    Ok(events)
}

async fn fetch_nrql(
    executor: &dyn GraphQlExecutor,
    account_id: u64,
    window: &DeploymentWindow,
) -> Result<Vec<DeploymentEvent>> {
    let query = query::nrql_deployments(account_id, window);
    let data: NrqlDeploymentsData = decode_data(executor.execute(&query).await?)?;

    let rows = data.actor.account.nrql.results;
    let events: Vec<DeploymentEvent> = rows.iter().filter_map(nrql_event).collect();

    if events.len() < rows.len() {
        debug!(
            "Skipped {} NRQL deployment rows with missing or mistyped fields",
            rows.len() - events.len()
        );
    }
    Ok(events)
}

/// Read one NRQL row. Versions may arrive as numbers and timestamps as floats.
fn nrql_event(row: &Map<String, Value>) -> Option<DeploymentEvent> {
    let guid = row.get("entity.guid")?.as_str()?;
    let version = match row.get("version")? {
        Value::String(version) => version.clone(),
        Value::Number(version) => version.to_string(),
        _ => return None,
    };
    let timestamp = nrql_millis(row.get("timestamp")?)?;
    Some(DeploymentEvent::new(guid, version, timestamp))
}

fn nrql_millis(value: &Value) -> Option<i64> {
    let Value::Number(n) = value else {
        return None;
    };
    n.as_i64().or_else(|| {
        n.as_f64()
            .filter(|ms| ms.is_finite() && ms.abs() < i64::MAX as f64)
            .map(|ms| ms as i64)
    })
}
