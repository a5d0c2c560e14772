//! Domain Model
//!
//! Transient values reconstructed on every collection pass: the application
//! entities returned by NerdGraph, their deployment events, and the gauge
//! series handed to the scrape server.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;

// =============================================================================
// Entities
// =============================================================================

/// Opaque, backend-assigned entity identifier (value object).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(transparent)]
pub struct EntityGuid(pub String);

impl EntityGuid {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EntityGuid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EntityGuid {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for EntityGuid {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Named numeric statistics reported for an application.
///
/// Statistics reported as `null` are treated as absent, never as zero.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "HashMap<String, Option<f64>>")]
pub struct ApmSummary(HashMap<String, f64>);

impl ApmSummary {
    pub fn get(&self, statistic: &str) -> Option<f64> {
        self.0.get(statistic).copied()
    }
}

impl From<HashMap<String, Option<f64>>> for ApmSummary {
    fn from(raw: HashMap<String, Option<f64>>) -> Self {
        Self(
            raw.into_iter()
                .filter_map(|(name, value)| value.map(|v| (name, v)))
                .collect(),
        )
    }
}

impl<const N: usize> From<[(&str, f64); N]> for ApmSummary {
    fn from(values: [(&str, f64); N]) -> Self {
        Self(
            values
                .into_iter()
                .map(|(name, v)| (name.to_string(), v))
                .collect(),
        )
    }
}

/// An APM application as returned by the entity search.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ApplicationEntity {
    pub guid: EntityGuid,
    pub name: String,
    #[serde(rename = "apmSummary", default)]
    pub summary: Option<ApmSummary>,
}

impl ApplicationEntity {
    pub fn new(guid: impl Into<EntityGuid>, name: impl Into<String>) -> Self {
        Self {
            guid: guid.into(),
            name: name.into(),
            summary: None,
        }
    }

    pub fn with_summary(mut self, summary: impl Into<ApmSummary>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// Value of a statistic, if the entity reports it.
    pub fn statistic(&self, name: &str) -> Option<f64> {
        self.summary.as_ref().and_then(|s| s.get(name))
    }
}

/// GUID to application name lookup, built once per pass from the entity list.
///
/// Keeps the upstream order of GUIDs so deployment batches are deterministic.
#[derive(Debug, Clone, Default)]
pub struct EntityDirectory {
    order: Vec<EntityGuid>,
    names: HashMap<EntityGuid, String>,
}

impl EntityDirectory {
    pub fn from_entities(entities: &[ApplicationEntity]) -> Self {
        let mut directory = Self::default();
        for entity in entities {
            if directory.names.contains_key(&entity.guid) {
                continue;
            }
            directory.order.push(entity.guid.clone());
            directory
                .names
                .insert(entity.guid.clone(), entity.name.clone());
        }
        directory
    }

    pub fn name_of(&self, guid: &EntityGuid) -> Option<&str> {
        self.names.get(guid).map(String::as_str)
    }

    /// GUIDs in upstream order.
    pub fn guids(&self) -> &[EntityGuid] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

// =============================================================================
// Deployments
// =============================================================================

/// A deployment recorded upstream for one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentEvent {
    pub entity_guid: EntityGuid,
    pub version: String,
    /// Occurrence time in milliseconds since the Unix epoch.
    pub timestamp_ms: i64,
}

impl DeploymentEvent {
    pub fn new(entity_guid: impl Into<EntityGuid>, version: impl Into<String>, timestamp_ms: i64) -> Self {
        Self {
            entity_guid: entity_guid.into(),
            version: version.into(),
            timestamp_ms,
        }
    }
}

/// Time range used to select deployments, in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeploymentWindow {
    /// Inclusive lower bound.
    pub start_ms: i64,
    pub end_ms: i64,
}

impl DeploymentWindow {
    /// Window of `lookback` ending at `now`.
    pub fn ending_at(now: DateTime<Utc>, lookback: std::time::Duration) -> Self {
        let end_ms = now.timestamp_millis();
        let lookback_ms = i64::try_from(lookback.as_millis()).unwrap_or(i64::MAX);
        Self {
            start_ms: end_ms.saturating_sub(lookback_ms),
            end_ms,
        }
    }
}

// =============================================================================
// Gauge Series
// =============================================================================

/// Label schema for per-application series.
pub const APP_LABELS: &[&str] = &["appname"];

/// Label schema for the deployment series.
pub const DEPLOYMENT_LABELS: &[&str] = &["appname", "version"];

/// One gauge sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub label_values: Vec<String>,
    pub value: f64,
    /// Explicit sample time; `None` means "now" at exposition.
    pub timestamp: Option<DateTime<Utc>>,
}

/// A named gauge with a fixed label schema.
#[derive(Debug, Clone, PartialEq)]
pub struct GaugeSeries {
    pub name: String,
    pub help: String,
    pub label_names: &'static [&'static str],
    pub samples: Vec<Sample>,
}

impl GaugeSeries {
    pub fn new(
        name: impl Into<String>,
        help: impl Into<String>,
        label_names: &'static [&'static str],
    ) -> Self {
        Self {
            name: name.into(),
            help: help.into(),
            label_names,
            samples: Vec::new(),
        }
    }

    /// Add a sample stamped at exposition time.
    pub fn add_sample(&mut self, label_values: Vec<String>, value: f64) {
        self.push(label_values, value, None);
    }

    /// Add a sample with an explicit timestamp.
    pub fn add_sample_at(&mut self, label_values: Vec<String>, value: f64, at: DateTime<Utc>) {
        self.push(label_values, value, Some(at));
    }

    fn push(&mut self, label_values: Vec<String>, value: f64, timestamp: Option<DateTime<Utc>>) {
        debug_assert_eq!(
            label_values.len(),
            self.label_names.len(),
            "label values do not match schema of {}",
            self.name
        );
        self.samples.push(Sample {
            label_values,
            value,
            timestamp,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Sample value for the given label values, if present.
    pub fn value_for(&self, label_values: &[&str]) -> Option<f64> {
        self.samples
            .iter()
            .find(|s| s.label_values.iter().map(String::as_str).eq(label_values.iter().copied()))
            .map(|s| s.value)
    }
}
