//! Entity Metrics Mapper
//!
//! Turns the application entities of one pass into one gauge series per
//! tracked APM statistic.

use crate::domain::{ApplicationEntity, GaugeSeries, APP_LABELS};

// =============================================================================
// Statistic Definitions
// =============================================================================

/// How one upstream statistic is exported.
#[derive(Debug, Clone, Copy)]
pub struct StatisticDefinition {
    /// Field name inside `apmSummary`
    pub statistic: &'static str,
    /// Exported metric name
    pub metric: &'static str,
    /// Exported help text
    pub help: &'static str,
    /// Unit conversion applied to the raw upstream value
    pub convert: fn(f64) -> f64,
}

impl StatisticDefinition {
    const fn new(statistic: &'static str, metric: &'static str, help: &'static str) -> Self {
        Self {
            statistic,
            metric,
            help,
            convert: identity,
        }
    }

    const fn with_conversion(self, convert: fn(f64) -> f64) -> Self {
        Self { convert, ..self }
    }

    /// Empty series for this statistic.
    pub fn series(&self) -> GaugeSeries {
        GaugeSeries::new(self.metric, self.help, APP_LABELS)
    }
}

fn identity(value: f64) -> f64 {
    value
}

/// NerdGraph reports the web response time average in seconds.
pub fn seconds_to_milliseconds(value: f64) -> f64 {
    value * 1000.0
}

/// Tracked statistics, in export order.
pub const STATISTICS: &[StatisticDefinition] = &[
    StatisticDefinition::new(
        "apdexScore",
        "newrelic_application_apdex_score",
        "New Relic application apdex score",
    ),
    StatisticDefinition::new(
        "errorRate",
        "newrelic_application_error_rate",
        "New Relic application error rate",
    ),
    StatisticDefinition::new(
        "webResponseTimeAverage",
        "newrelic_application_response_time",
        "New Relic application web response time average in milliseconds",
    )
    .with_conversion(seconds_to_milliseconds),
    StatisticDefinition::new(
        "webThroughput",
        "newrelic_application_throughput",
        "New Relic application web throughput",
    ),
];

// =============================================================================
// Mapping
// =============================================================================

/// One series per tracked statistic, in [`STATISTICS`] order.
///
/// Entities are visited in upstream order. An entity contributes a sample to
/// a series only when its summary holds that statistic; series nobody reports
/// are still returned, empty.
pub fn map_entities(entities: &[ApplicationEntity]) -> Vec<GaugeSeries> {
    STATISTICS
        .iter()
        .map(|definition| map_statistic(definition, entities))
        .collect()
}

fn map_statistic(definition: &StatisticDefinition, entities: &[ApplicationEntity]) -> GaugeSeries {
    let mut series = definition.series();
    for entity in entities {
        if let Some(raw) = entity.statistic(definition.statistic) {
            series.add_sample(vec![entity.name.clone()], (definition.convert)(raw));
        }
    }
    series
}
