//! Remote template repository speaking the `/api/mail-templates` HTTP API.
//!
//! Lets an editor session run against a remote builder service with the
//! same `TemplateRepository` interface as the local backends.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::template::{
    CreatedTemplateResponse, ListFilter, NewTemplate, SortSpec, Template, TemplateError,
    TemplateErrorResponse, TemplateListResponse, TemplateResult, TemplateStats, TemplateSummary,
};

use super::backend::TemplateRepository;

/// Header carrying the anti-forgery token on every request
pub const CSRF_HEADER: &str = "x-csrf-token";

const API_PREFIX: &str = "/api/mail-templates";

/// Connection settings for [`HttpTemplateRepository`]
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Service origin, e.g. `http://localhost:3000`
    pub base_url: String,
    pub csrf_token: Option<String>,
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            csrf_token: None,
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_csrf_token(mut self, token: impl Into<String>) -> Self {
        self.csrf_token = Some(token.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Template repository backed by a remote builder service.
pub struct HttpTemplateRepository {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTemplateRepository {
    pub fn new(config: ClientConfig) -> TemplateResult<Self> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &config.csrf_token {
            let value = HeaderValue::from_str(token)
                .map_err(|e| TemplateError::Transport(format!("Invalid CSRF token: {}", e)))?;
            headers.insert(CSRF_HEADER, value);
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(transport_error)?;

        Ok(Self {
            client,
            base_url: format!("{}{}", config.base_url.trim_end_matches('/'), API_PREFIX),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn expect_json<T: DeserializeOwned>(response: Response, id: Option<Uuid>) -> TemplateResult<T> {
        let response = Self::check(response, id).await?;
        response.json().await.map_err(transport_error)
    }

    async fn check(response: Response, id: Option<Uuid>) -> TemplateResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let err = error_from_response(status, &body, id);
        tracing::debug!(status = %status, error = %err, "Remote template request failed");
        Err(err)
    }
}

fn transport_error(e: reqwest::Error) -> TemplateError {
    tracing::warn!(error = %e, "Template service unreachable");
    TemplateError::Transport(e.to_string())
}

/// Map an error response from the service back onto `TemplateError`
fn error_from_response(status: StatusCode, body: &str, id: Option<Uuid>) -> TemplateError {
    let envelope = serde_json::from_str::<TemplateErrorResponse>(body).ok();
    let (code, message) = match &envelope {
        Some(env) => (env.error.code.as_str(), env.error.message.clone()),
        None => ("", format!("HTTP {}", status)),
    };

    match status {
        StatusCode::NOT_FOUND => TemplateError::NotFound(message),
        StatusCode::CONFLICT => {
            let current = envelope
                .as_ref()
                .and_then(|env| env.error.details.as_ref())
                .and_then(|details| details.get("updatedAt"))
                .and_then(|v| serde_json::from_value::<DateTime<Utc>>(v.clone()).ok());
            TemplateError::Conflict {
                id: id.unwrap_or_default(),
                current,
            }
        }
        _ => match code {
            "INVALID_POSITION" => TemplateError::InvalidPosition(message),
            "UNKNOWN_COMPONENT_TYPE" => TemplateError::UnknownComponentType(message),
            "INVALID_TEMPLATE" => TemplateError::InvalidTemplate(message),
            _ if status.is_client_error() => TemplateError::InvalidTemplate(message),
            _ => TemplateError::Storage(message),
        },
    }
}

#[async_trait]
impl TemplateRepository for HttpTemplateRepository {
    fn backend_name(&self) -> &'static str {
        "http"
    }

    async fn create(&self, template: NewTemplate) -> TemplateResult<Template> {
        let response = self
            .client
            .post(self.url(""))
            .json(&template)
            .send()
            .await
            .map_err(transport_error)?;

        let created: CreatedTemplateResponse = Self::expect_json(response, None).await?;
        Ok(created.template)
    }

    async fn read(&self, id: Uuid) -> TemplateResult<Template> {
        let response = self
            .client
            .get(self.url(&format!("/{}", id)))
            .send()
            .await
            .map_err(transport_error)?;

        Self::expect_json(response, Some(id)).await
    }

    async fn update(&self, id: Uuid, template: Template) -> TemplateResult<Template> {
        let response = self
            .client
            .put(self.url(&format!("/{}", id)))
            .json(&template)
            .send()
            .await
            .map_err(transport_error)?;

        Self::expect_json(response, Some(id)).await
    }

    async fn delete(&self, id: Uuid) -> TemplateResult<()> {
        let response = self
            .client
            .delete(self.url(&format!("/{}", id)))
            .send()
            .await
            .map_err(transport_error)?;

        Self::check(response, Some(id)).await.map(|_| ())
    }

    async fn duplicate(&self, id: Uuid) -> TemplateResult<Template> {
        let response = self
            .client
            .post(self.url(&format!("/{}/duplicate", id)))
            .send()
            .await
            .map_err(transport_error)?;

        let created: CreatedTemplateResponse = Self::expect_json(response, Some(id)).await?;
        Ok(created.template)
    }

    async fn list(
        &self,
        filter: &ListFilter,
        sort: SortSpec,
    ) -> TemplateResult<Vec<TemplateSummary>> {
        let mut query: Vec<(&str, String)> = vec![("sort", sort.as_query())];
        if let Some(t) = filter.template_type {
            query.push(("type", t.as_str().to_string()));
        }
        if let Some(search) = &filter.search {
            query.push(("search", search.clone()));
        }

        let response = self
            .client
            .get(self.url(""))
            .query(&query)
            .send()
            .await
            .map_err(transport_error)?;

        let list: TemplateListResponse = Self::expect_json(response, None).await?;
        Ok(list.templates)
    }

    async fn stats(&self) -> TemplateResult<TemplateStats> {
        let response = self
            .client
            .get(self.url("/stats"))
            .send()
            .await
            .map_err(transport_error)?;

        Self::expect_json(response, None).await
    }
}
