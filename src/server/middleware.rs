use axum::{
    body::Body,
    extract::State,
    http::{Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};

use super::AppState;
use crate::store::client::CSRF_HEADER;
use crate::template::{TemplateErrorInfo, TemplateErrorResponse};

/// CSRF token check for mutating requests.
///
/// Validates the `X-CSRF-TOKEN` header against `server.csrf_token`. Safe
/// methods pass through, and so does everything when no token is configured.
pub async fn csrf_guard(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let Some(expected) = &state.settings.server.csrf_token else {
        return next.run(req).await;
    };

    if matches!(*req.method(), Method::GET | Method::HEAD | Method::OPTIONS) {
        return next.run(req).await;
    }

    let provided = req
        .headers()
        .get(CSRF_HEADER)
        .and_then(|v| v.to_str().ok());

    match provided {
        Some(token) if token == expected => next.run(req).await,
        other => {
            tracing::warn!(
                method = %req.method(),
                path = %req.uri().path(),
                header_present = other.is_some(),
                "CSRF token rejected"
            );
            let body = TemplateErrorResponse {
                error: TemplateErrorInfo {
                    code: "CSRF_REJECTED".to_string(),
                    message: "Missing or invalid CSRF token".to_string(),
                    details: None,
                },
            };
            (StatusCode::FORBIDDEN, Json(body)).into_response()
        }
    }
}
