use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::limit::RequestBodyLimitLayer;

use crate::server::{csrf_guard, AppState};

use super::health::health;
use super::metrics::prometheus_metrics;
use super::template::{
    create_template, delete_template, duplicate_template, export_template, get_template,
    list_components, list_templates, preview_template, preview_template_with_variables,
    template_stats, template_variables, update_template,
};
use super::upload::upload_image;

/// Room for multipart boundaries and headers around the image itself
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn api_routes(state: &AppState) -> Router<AppState> {
    let upload_limit = state.image_store.max_size_bytes() + MULTIPART_OVERHEAD_BYTES;

    let templates = Router::new()
        .route(
            "/api/mail-templates",
            get(list_templates).post(create_template),
        )
        .route("/api/mail-templates/stats", get(template_stats))
        .route("/api/mail-templates/components", get(list_components))
        .route(
            "/api/mail-templates/upload-image",
            post(upload_image)
                .layer::<_, std::convert::Infallible>(DefaultBodyLimit::disable())
                .layer::<_, std::convert::Infallible>(RequestBodyLimitLayer::new(upload_limit)),
        )
        .route(
            "/api/mail-templates/{id}",
            get(get_template).put(update_template).delete(delete_template),
        )
        .route(
            "/api/mail-templates/{id}/preview",
            get(preview_template).post(preview_template_with_variables),
        )
        .route("/api/mail-templates/{id}/variables", get(template_variables))
        .route("/api/mail-templates/{id}/export", get(export_template))
        .route("/api/mail-templates/{id}/duplicate", post(duplicate_template))
        .layer(middleware::from_fn_with_state(state.clone(), csrf_guard));

    Router::new()
        // Health & Metrics
        .route("/health", get(health))
        .route("/metrics", get(prometheus_metrics))
        // Template endpoints
        .merge(templates)
}
