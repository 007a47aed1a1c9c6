//! Prometheus metrics for the template builder service.
//!
//! This module provides metrics for monitoring the service:
//! - Template lifecycle counters (created, updated, deleted, duplicated)
//! - Optimistic concurrency conflicts
//! - Render outcomes and latency
//! - Image uploads and exports

mod helpers;

pub use helpers::{encode_metrics, ExportMetrics, RenderMetrics, TemplateMetrics, UploadMetrics};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge_vec,
    Histogram, IntCounter, IntCounterVec, IntGaugeVec,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "mailtpl";

lazy_static! {
    // ============================================================================
    // Template Metrics
    // ============================================================================

    /// Template lifecycle operations by kind
    pub static ref TEMPLATE_OPERATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_template_operations_total", METRIC_PREFIX),
        "Total template operations",
        &["operation"]
    ).unwrap();

    /// Stored templates per type, refreshed on scrape
    pub static ref TEMPLATES_STORED: IntGaugeVec = register_int_gauge_vec!(
        format!("{}_templates_stored", METRIC_PREFIX),
        "Number of stored templates per type",
        &["type"]
    ).unwrap();

    /// Saves rejected because the stored revision moved on
    pub static ref TEMPLATE_CONFLICTS_TOTAL: IntCounter = register_int_counter!(
        format!("{}_template_conflicts_total", METRIC_PREFIX),
        "Total template saves rejected with a revision conflict"
    ).unwrap();

    // ============================================================================
    // Render Metrics
    // ============================================================================

    /// Renders by outcome
    pub static ref RENDERS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_renders_total", METRIC_PREFIX),
        "Total template renders",
        &["outcome"]
    ).unwrap();

    /// Render latency
    pub static ref RENDER_LATENCY: Histogram = register_histogram!(
        format!("{}_render_latency_seconds", METRIC_PREFIX),
        "Template render latency in seconds",
        vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5]
    ).unwrap();

    // ============================================================================
    // Upload & Export Metrics
    // ============================================================================

    /// Image uploads by outcome
    pub static ref UPLOADS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_uploads_total", METRIC_PREFIX),
        "Total image uploads",
        &["outcome"]
    ).unwrap();

    /// Bytes of accepted uploads
    pub static ref UPLOAD_BYTES_TOTAL: IntCounter = register_int_counter!(
        format!("{}_upload_bytes_total", METRIC_PREFIX),
        "Total bytes of accepted image uploads"
    ).unwrap();

    /// Export downloads by format
    pub static ref EXPORTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_exports_total", METRIC_PREFIX),
        "Total template exports",
        &["format"]
    ).unwrap();
}
