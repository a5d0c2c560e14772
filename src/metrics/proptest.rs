//! Property-Based Tests for the Collection Pipeline
//!
//! # Test Properties
//!
//! 1. **Batch Count**: N entities produce exactly `ceil(N / batch)` queries
//! 2. **Partition Independence**: the deployment samples do not depend on the batch size
//! 3. **Presence**: every present statistic yields exactly one sample, absent ones none

#![cfg(test)]

use std::collections::HashMap;
use std::sync::Arc;

use proptest::prelude::*;

use super::deployments::{map_deployments, DeploymentConfig};
use super::statistics::{map_entities, STATISTICS};
use super::testing::{guids_in, FnExecutor};
use crate::domain::{ApmSummary, ApplicationEntity, DeploymentWindow, EntityDirectory, GaugeSeries};
use crate::query::MAX_GUIDS_PER_QUERY;

// =============================================================================
// Property Strategies
// =============================================================================

/// Strategy for an entity count, spanning several batches.
fn entity_count_strategy() -> impl Strategy<Value = usize> {
    0usize..=80
}

/// Strategy for a valid batch size.
fn batch_size_strategy() -> impl Strategy<Value = usize> {
    1usize..=MAX_GUIDS_PER_QUERY
}

/// Strategy for a summary holding an arbitrary subset of the statistics.
fn summary_strategy() -> impl Strategy<Value = Option<HashMap<String, Option<f64>>>> {
    let fields = STATISTICS.len();
    prop::option::of(prop::collection::vec(prop::option::of(0.0f64..1000.0), fields)).prop_map(
        |values| {
            values.map(|values| {
                STATISTICS
                    .iter()
                    .zip(values)
                    .map(|(definition, value)| (definition.statistic.to_string(), value))
                    .collect()
            })
        },
    )
}

fn window() -> DeploymentWindow {
    DeploymentWindow {
        start_ms: 1_699_996_400_000,
        end_ms: 1_700_000_000_000,
    }
}

fn directory(count: usize) -> EntityDirectory {
    let entities: Vec<_> = (0..count)
        .map(|i| ApplicationEntity::new(format!("g{i}"), format!("svc-{i}")))
        .collect();
    EntityDirectory::from_entities(&entities)
}

/// Every entity reports one deployment, plus one for an unknown GUID per batch.
fn deployments_for(query: &str) -> serde_json::Value {
    let mut entities: Vec<_> = guids_in(query)
        .into_iter()
        .map(|g| {
            let n: i64 = g.trim_start_matches('g').parse().unwrap();
            serde_json::json!({"guid": g, "deployments": [
                {"version": format!("v{}", n % 3), "timestamp": 1_700_000_000_000i64 - n * 1000}
            ]})
        })
        .collect();
    entities.push(serde_json::json!({"guid": "ghost", "deployments": [
        {"version": "v0", "timestamp": 1_700_000_000_000i64}
    ]}));
    serde_json::json!({"actor": {"entities": entities}})
}

fn sample_keys(series: &GaugeSeries) -> Vec<(Vec<String>, i64)> {
    let mut keys: Vec<_> = series
        .samples
        .iter()
        .map(|s| (s.label_values.clone(), s.timestamp.unwrap().timestamp_millis()))
        .collect();
    keys.sort();
    keys
}

fn run_deployments(count: usize, batch_size: usize) -> (GaugeSeries, usize) {
    let executor = Arc::new(FnExecutor::new(|query| Ok(deployments_for(query))));
    let config = DeploymentConfig {
        batch_size,
        ..Default::default()
    };
    let series = tokio_test::block_on(map_deployments(
        executor.clone(),
        &config,
        &directory(count),
        &window(),
    ))
    .unwrap();
    (series, executor.queries().len())
}

// =============================================================================
// Batching Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: N entities need exactly ceil(N / batch) deployment queries.
    #[test]
    fn prop_batch_count(count in entity_count_strategy(), batch_size in batch_size_strategy()) {
        let (series, queries) = run_deployments(count, batch_size);

        prop_assert_eq!(queries, count.div_ceil(batch_size));
        prop_assert_eq!(series.samples.len(), count);
    }

    /// Property: the resolved samples are the same for every batch size.
    #[test]
    fn prop_partition_independent(
        count in entity_count_strategy(),
        batch_size in batch_size_strategy(),
    ) {
        let (reference, _) = run_deployments(count, MAX_GUIDS_PER_QUERY);
        let (series, _) = run_deployments(count, batch_size);

        prop_assert_eq!(sample_keys(&series), sample_keys(&reference));
    }
}

// =============================================================================
// Statistic Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: one sample per present statistic, converted; none for absent ones.
    #[test]
    fn prop_statistic_presence(summaries in prop::collection::vec(summary_strategy(), 0..20)) {
        let entities: Vec<ApplicationEntity> = summaries
            .iter()
            .enumerate()
            .map(|(i, summary)| ApplicationEntity {
                summary: summary.clone().map(ApmSummary::from),
                ..ApplicationEntity::new(format!("g{i}"), format!("svc-{i}"))
            })
            .collect();

        let series = map_entities(&entities);
        prop_assert_eq!(series.len(), STATISTICS.len());

        for (definition, series) in STATISTICS.iter().zip(&series) {
            prop_assert_eq!(series.name.as_str(), definition.metric);

            let mut expected = 0;
            for entity in &entities {
                let name = entity.name.as_str();
                match entity.statistic(definition.statistic) {
                    Some(raw) => {
                        expected += 1;
                        prop_assert_eq!(series.value_for(&[name]), Some((definition.convert)(raw)));
                    }
                    None => {
                        prop_assert_eq!(series.value_for(&[name]), None);
                    }
                }
            }
            prop_assert_eq!(series.samples.len(), expected);
        }
    }
}
