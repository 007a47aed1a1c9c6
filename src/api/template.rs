//! Template endpoints under `/api/mail-templates`.

use std::time::Instant;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::metrics::{ExportMetrics, RenderMetrics, TemplateMetrics};
use crate::server::AppState;
use crate::store::update_rejection;
use crate::template::{
    extract, render, substitute_template, CreatedTemplateResponse, ListFilter, NewTemplate,
    PaletteCategory, RenderOutput, SortSpec, Template, TemplateError, TemplateListResponse,
    TemplateStats, TemplateType, VariablesResponse,
};

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(rename = "type")]
    pub template_type: Option<String>,
    pub search: Option<String>,
    /// `field[:asc|desc]`
    pub sort: Option<String>,
}

impl ListQuery {
    fn into_parts(self) -> Result<(ListFilter, SortSpec)> {
        let template_type = match self.template_type.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(
                TemplateType::parse(raw)
                    .ok_or_else(|| AppError::Validation(format!("Unknown template type '{}'", raw)))?,
            ),
        };

        let sort = match self.sort.as_deref().map(str::trim) {
            None | Some("") => SortSpec::default(),
            Some(raw) => SortSpec::parse(raw)
                .ok_or_else(|| AppError::Validation(format!("Invalid sort '{}'", raw)))?,
        };

        Ok((
            ListFilter {
                template_type,
                search: self.search,
            },
            sort,
        ))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PreviewRequest {
    #[serde(default)]
    pub variables: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExportQuery {
    pub format: Option<String>,
}

/// Path ids that are not UUIDs cannot name a stored template
fn parse_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|_| {
        AppError::Template(TemplateError::NotFound(format!("template {}", raw)))
    })
}

/// Render with timing and outcome metrics
fn render_measured(state: &AppState, template: &Template) -> Result<RenderOutput> {
    let started = Instant::now();
    match render(template, &state.registry) {
        Ok(output) => {
            RenderMetrics::record_success(started.elapsed());
            Ok(output)
        }
        Err(e) => {
            RenderMetrics::record_failure();
            Err(e.into())
        }
    }
}

/// File name for downloads: the template name reduced to `[a-z0-9-]`
fn download_name(name: &str, extension: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_matches('-');
    let slug = if slug.is_empty() { "template" } else { slug };
    format!("{}.{}", slug, extension)
}

/// GET /api/mail-templates - List templates
#[tracing::instrument(name = "http.list_templates", skip(state))]
pub async fn list_templates(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<TemplateListResponse>> {
    let (filter, sort) = query.into_parts()?;
    let templates = state.repository.list(&filter, sort).await?;
    let total = templates.len();

    Ok(Json(TemplateListResponse { templates, total }))
}

/// POST /api/mail-templates - Create a template
#[tracing::instrument(
    name = "http.create_template",
    skip(state, request),
    fields(template_type = %request.template_type)
)]
pub async fn create_template(
    State(state): State<AppState>,
    Json(request): Json<NewTemplate>,
) -> Result<(StatusCode, Json<CreatedTemplateResponse>)> {
    state.registry.check_tree(&request.component_tree)?;
    let template = state.repository.create(request).await?;

    TemplateMetrics::record_created();
    tracing::info!(template_id = %template.id, name = %template.name, "Template created");

    Ok((
        StatusCode::CREATED,
        Json(CreatedTemplateResponse {
            id: template.id,
            template,
        }),
    ))
}

/// GET /api/mail-templates/stats - Template counts per type
#[tracing::instrument(name = "http.template_stats", skip(state))]
pub async fn template_stats(State(state): State<AppState>) -> Result<Json<TemplateStats>> {
    Ok(Json(state.repository.stats().await?))
}

/// GET /api/mail-templates/components - Builder palette
#[tracing::instrument(name = "http.list_components", skip(state))]
pub async fn list_components(State(state): State<AppState>) -> Response {
    let palette: Vec<PaletteCategory<'_>> = state.registry.palette();
    Json(palette).into_response()
}

/// GET /api/mail-templates/{id} - Get a template
#[tracing::instrument(name = "http.get_template", skip(state))]
pub async fn get_template(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Template>> {
    let id = parse_id(&id)?;
    Ok(Json(state.repository.read(id).await?))
}

/// PUT /api/mail-templates/{id} - Save a full template
///
/// The body's `updatedAt` must equal the stored revision, otherwise 409.
#[tracing::instrument(name = "http.update_template", skip(state, template))]
pub async fn update_template(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(template): Json<Template>,
) -> Result<Json<Template>> {
    let id = parse_id(&id)?;
    // A missing template or stale revision is reported ahead of a bad tree
    let result = match state.registry.check_tree(&template.component_tree) {
        Ok(()) => state.repository.update(id, template).await,
        Err(invalid) => Err(match state.repository.read(id).await {
            Ok(stored) => {
                update_rejection(id, template.updated_at, Some(stored.updated_at), invalid)
            }
            Err(TemplateError::NotFound(_)) => {
                update_rejection(id, template.updated_at, None, invalid)
            }
            Err(e) => e,
        }),
    };

    match result {
        Ok(saved) => {
            TemplateMetrics::record_updated();
            tracing::info!(template_id = %id, updated_at = %saved.updated_at, "Template updated");
            Ok(Json(saved))
        }
        Err(e @ TemplateError::Conflict { .. }) => {
            TemplateMetrics::record_conflict();
            tracing::warn!(template_id = %id, "Template save rejected, stale revision");
            Err(e.into())
        }
        Err(e) => Err(e.into()),
    }
}

/// DELETE /api/mail-templates/{id} - Delete a template
#[tracing::instrument(name = "http.delete_template", skip(state))]
pub async fn delete_template(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let id = parse_id(&id)?;
    state.repository.delete(id).await?;

    TemplateMetrics::record_deleted();
    tracing::info!(template_id = %id, "Template deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/mail-templates/{id}/duplicate - Copy a template
#[tracing::instrument(name = "http.duplicate_template", skip(state))]
pub async fn duplicate_template(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<CreatedTemplateResponse>)> {
    let id = parse_id(&id)?;
    let copy = state.repository.duplicate(id).await?;

    TemplateMetrics::record_duplicated();
    tracing::info!(source_id = %id, template_id = %copy.id, "Template duplicated");

    Ok((
        StatusCode::CREATED,
        Json(CreatedTemplateResponse {
            id: copy.id,
            template: copy,
        }),
    ))
}

/// GET /api/mail-templates/{id}/preview - Render HTML and CSS
#[tracing::instrument(name = "http.preview_template", skip(state))]
pub async fn preview_template(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RenderOutput>> {
    let template = state.repository.read(parse_id(&id)?).await?;
    Ok(Json(render_measured(&state, &template)?))
}

/// POST /api/mail-templates/{id}/preview - Render with sample variable values
#[tracing::instrument(name = "http.preview_template_merged", skip(state, request))]
pub async fn preview_template_with_variables(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<PreviewRequest>,
) -> Result<Json<RenderOutput>> {
    let template = state.repository.read(parse_id(&id)?).await?;
    let merged = substitute_template(&template, &request.variables);
    Ok(Json(render_measured(&state, &merged)?))
}

/// GET /api/mail-templates/{id}/variables - Merge variables in use
#[tracing::instrument(name = "http.template_variables", skip(state))]
pub async fn template_variables(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<VariablesResponse>> {
    let template = state.repository.read(parse_id(&id)?).await?;
    Ok(Json(VariablesResponse {
        variables: extract(&template),
    }))
}

/// GET /api/mail-templates/{id}/export?format=html|json - Download
#[tracing::instrument(name = "http.export_template", skip(state))]
pub async fn export_template(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ExportQuery>,
) -> Result<Response> {
    let template = state.repository.read(parse_id(&id)?).await?;

    let (content_type, extension, body) = match query.format.as_deref().unwrap_or("html") {
        "html" => {
            let output = render_measured(&state, &template)?;
            let title = template.subject.as_deref().unwrap_or(&template.name);
            ("text/html; charset=utf-8", "html", output.into_document(title))
        }
        "json" => {
            let body = serde_json::to_string_pretty(&template)
                .map_err(|e| AppError::Internal(e.to_string()))?;
            ("application/json", "json", body)
        }
        other => {
            return Err(AppError::Validation(format!(
                "Unsupported export format '{}', expected html or json",
                other
            )))
        }
    };

    ExportMetrics::record(extension);
    let disposition = format!(
        "attachment; filename=\"{}\"",
        download_name(&template.name, extension)
    );

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}
