//! Metrics helper structs for convenient metric recording

use std::time::Duration;

use prometheus::{Encoder, TextEncoder};

use super::{
    EXPORTS_TOTAL, RENDERS_TOTAL, RENDER_LATENCY, TEMPLATE_CONFLICTS_TOTAL,
    TEMPLATE_OPERATIONS_TOTAL, UPLOADS_TOTAL, UPLOAD_BYTES_TOTAL,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for recording template lifecycle metrics
pub struct TemplateMetrics;

impl TemplateMetrics {
    pub fn record_created() {
        TEMPLATE_OPERATIONS_TOTAL.with_label_values(&["create"]).inc();
    }

    pub fn record_updated() {
        TEMPLATE_OPERATIONS_TOTAL.with_label_values(&["update"]).inc();
    }

    pub fn record_deleted() {
        TEMPLATE_OPERATIONS_TOTAL.with_label_values(&["delete"]).inc();
    }

    pub fn record_duplicated() {
        TEMPLATE_OPERATIONS_TOTAL.with_label_values(&["duplicate"]).inc();
    }

    /// Record a save rejected by optimistic concurrency
    pub fn record_conflict() {
        TEMPLATE_CONFLICTS_TOTAL.inc();
    }
}

/// Helper struct for recording render metrics
pub struct RenderMetrics;

impl RenderMetrics {
    pub fn record_success(elapsed: Duration) {
        RENDERS_TOTAL.with_label_values(&["success"]).inc();
        RENDER_LATENCY.observe(elapsed.as_secs_f64());
    }

    pub fn record_failure() {
        RENDERS_TOTAL.with_label_values(&["failure"]).inc();
    }
}

/// Helper struct for recording upload metrics
pub struct UploadMetrics;

impl UploadMetrics {
    pub fn record_accepted(bytes: u64) {
        UPLOADS_TOTAL.with_label_values(&["accepted"]).inc();
        UPLOAD_BYTES_TOTAL.inc_by(bytes);
    }

    pub fn record_rejected() {
        UPLOADS_TOTAL.with_label_values(&["rejected"]).inc();
    }
}

/// Helper struct for recording export metrics
pub struct ExportMetrics;

impl ExportMetrics {
    pub fn record(format: &str) {
        EXPORTS_TOTAL.with_label_values(&[format]).inc();
    }
}
