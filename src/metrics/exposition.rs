//! Exposition Boundary
//!
//! Converts gauge series into `prometheus` protobuf families and renders
//! them in the text exposition format.

use chrono::{DateTime, Utc};
use prometheus::proto::{Gauge, LabelPair, Metric, MetricFamily, MetricType};
use prometheus::{Encoder, TextEncoder};

use crate::domain::GaugeSeries;
use crate::error::{Error, Result};

/// Timestamp field value for an explicit sample time.
///
/// The `prometheus` protobuf model and the text format both carry
/// milliseconds, so no further scaling happens downstream.
pub fn exposition_timestamp_ms(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

/// Convert one series into a gauge family.
pub fn to_metric_family(series: &GaugeSeries) -> MetricFamily {
    let metrics: Vec<Metric> = series
        .samples
        .iter()
        .map(|sample| {
            let labels: Vec<LabelPair> = series
                .label_names
                .iter()
                .zip(&sample.label_values)
                .map(|(name, value)| {
                    let mut pair = LabelPair::default();
                    pair.set_name(name.to_string());
                    pair.set_value(value.clone());
                    pair
                })
                .collect();

            let mut gauge = Gauge::default();
            gauge.set_value(sample.value);

            let mut metric = Metric::default();
            metric.set_label(labels.into());
            metric.set_gauge(gauge);
            if let Some(at) = sample.timestamp {
                metric.set_timestamp_ms(exposition_timestamp_ms(at));
            }
            metric
        })
        .collect();

    let mut family = MetricFamily::default();
    family.set_name(series.name.clone());
    family.set_help(series.help.clone());
    family.set_field_type(MetricType::GAUGE);
    family.set_metric(metrics.into());
    family
}

/// Render series in the Prometheus text format.
///
/// Returns the content type and the body. Series without samples are left
/// out: the text format has no representation for an empty family.
pub fn render(series: &[GaugeSeries]) -> Result<(String, Vec<u8>)> {
    let families: Vec<MetricFamily> = series
        .iter()
        .filter(|s| !s.is_empty())
        .map(to_metric_family)
        .collect();

    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&families, &mut buffer)
        .map_err(|e| Error::Internal(format!("Failed to encode metrics: {}", e)))?;

    Ok((encoder.format_type().to_string(), buffer))
}
