//! API layer - HTTP endpoint handlers.

mod health;
mod metrics;
mod routes;
mod template;
mod upload;

// Re-export all handlers for use in server/app.rs
pub use health::health;
pub use metrics::prometheus_metrics;
pub use routes::api_routes;
pub use template::{
    create_template, delete_template, duplicate_template, export_template, get_template,
    list_components, list_templates, preview_template, preview_template_with_variables,
    template_stats, template_variables, update_template, ExportQuery, ListQuery, PreviewRequest,
};
pub use upload::upload_image;
