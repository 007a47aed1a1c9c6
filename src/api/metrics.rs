//! Prometheus metrics endpoint.

use axum::{extract::State, http::StatusCode, response::IntoResponse};

use crate::metrics;
use crate::server::AppState;

/// GET /metrics - Prometheus metrics endpoint
pub async fn prometheus_metrics(State(state): State<AppState>) -> impl IntoResponse {
    update_metrics_from_state(&state).await;

    match metrics::encode_metrics() {
        Ok(output) => (
            StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            output,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode Prometheus metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(axum::http::header::CONTENT_TYPE, "text/plain")],
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}

/// Refresh stored-template gauges from the repository
async fn update_metrics_from_state(state: &AppState) {
    match state.repository.stats().await {
        Ok(stats) => {
            for (template_type, count) in &stats.by_type {
                metrics::TEMPLATES_STORED
                    .with_label_values(&[template_type.as_str()])
                    .set(*count as i64);
            }
        }
        Err(e) => tracing::warn!(error = %e, "Skipping template gauges, stats unavailable"),
    }
}
