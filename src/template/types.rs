//! Template types and error definitions

use std::collections::BTreeMap;

use chrono::{DateTime, SubsecRound, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::node::{Node, NodeId};

/// Template-specific error type
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid position: {0}")]
    InvalidPosition(String),

    #[error("Move rejected, node {node} cannot be placed under its own subtree ({target})")]
    CycleRejected { node: NodeId, target: NodeId },

    #[error("Unknown component type: {0}")]
    UnknownComponentType(String),

    #[error("Template {id} was modified concurrently, reload before saving")]
    Conflict {
        id: Uuid,
        /// Revision currently stored, when known
        current: Option<DateTime<Utc>>,
    },

    #[error("Invalid template: {0}")]
    InvalidTemplate(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

impl TemplateError {
    pub fn template_not_found(id: Uuid) -> Self {
        TemplateError::NotFound(format!("template {}", id))
    }

    pub fn node_not_found(id: NodeId) -> Self {
        TemplateError::NotFound(format!("node {}", id))
    }

    /// Stable machine-readable code used in API error envelopes
    pub fn code(&self) -> &'static str {
        match self {
            TemplateError::NotFound(_) => "TEMPLATE_NOT_FOUND",
            TemplateError::InvalidPosition(_) => "INVALID_POSITION",
            TemplateError::CycleRejected { .. } => "CYCLE_REJECTED",
            TemplateError::UnknownComponentType(_) => "UNKNOWN_COMPONENT_TYPE",
            TemplateError::Conflict { .. } => "CONFLICT",
            TemplateError::InvalidTemplate(_) => "INVALID_TEMPLATE",
            TemplateError::Storage(_) => "STORAGE_ERROR",
            TemplateError::Transport(_) => "TRANSPORT_ERROR",
        }
    }
}

/// Result type for template operations
pub type TemplateResult<T> = Result<T, TemplateError>;

/// Template category shown on the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateType {
    #[default]
    Blank,
    Welcome,
    Newsletter,
    Promotion,
    Notification,
}

impl TemplateType {
    pub const ALL: [TemplateType; 5] = [
        TemplateType::Blank,
        TemplateType::Welcome,
        TemplateType::Newsletter,
        TemplateType::Promotion,
        TemplateType::Notification,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateType::Blank => "blank",
            TemplateType::Welcome => "welcome",
            TemplateType::Newsletter => "newsletter",
            TemplateType::Promotion => "promotion",
            TemplateType::Notification => "notification",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }
}

impl std::fmt::Display for TemplateType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current time at storage precision (microseconds).
///
/// PostgreSQL keeps microseconds, so every timestamp handed out is truncated
/// to make values read back compare equal to values written.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Next revision timestamp, strictly after `previous`.
pub fn next_revision(previous: DateTime<Utc>) -> DateTime<Utc> {
    let candidate = now();
    if candidate > previous {
        candidate
    } else {
        previous + TimeDelta::microseconds(1)
    }
}

/// Component type of every template root
pub const ROOT_COMPONENT: &str = "body";

/// Maximum template name length
const MAX_NAME_LEN: usize = 255;

/// An email template: metadata plus a component tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: Uuid,

    pub name: String,

    #[serde(rename = "type", default)]
    pub template_type: TemplateType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Email subject line, may contain {{variables}}
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    pub component_tree: Node,

    pub created_at: DateTime<Utc>,

    /// Revision marker for optimistic concurrency
    pub updated_at: DateTime<Utc>,
}

impl Template {
    /// Validate metadata and tree invariants
    pub fn validate(&self) -> TemplateResult<()> {
        let name_len = self.name.trim().chars().count();
        if name_len == 0 || name_len > MAX_NAME_LEN {
            return Err(TemplateError::InvalidTemplate(format!(
                "Name must be 1-{} characters",
                MAX_NAME_LEN
            )));
        }

        if self.component_tree.component_type != ROOT_COMPONENT {
            return Err(TemplateError::InvalidTemplate(format!(
                "Root node must be of type '{}', got '{}'",
                ROOT_COMPONENT, self.component_tree.component_type
            )));
        }

        let mut seen = std::collections::HashSet::new();
        let mut duplicate = None;
        let mut roots = 0usize;
        self.component_tree.walk(&mut |node| {
            if !seen.insert(node.id) && duplicate.is_none() {
                duplicate = Some(node.id);
            }
            if node.component_type == ROOT_COMPONENT {
                roots += 1;
            }
        });
        if let Some(id) = duplicate {
            return Err(TemplateError::InvalidTemplate(format!(
                "Duplicate node id {}",
                id
            )));
        }
        if roots > 1 {
            return Err(TemplateError::InvalidTemplate(format!(
                "'{}' may only appear as the root node",
                ROOT_COMPONENT
            )));
        }

        Ok(())
    }

    /// Summary row used by list endpoints
    pub fn summary(&self) -> TemplateSummary {
        TemplateSummary {
            id: self.id,
            name: self.name.clone(),
            template_type: self.template_type,
            description: self.description.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Empty component tree for a new template
pub fn blank_tree() -> Node {
    Node::new(ROOT_COMPONENT)
}

/// Fields supplied when creating a template; the store assigns id and timestamps
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTemplate {
    pub name: String,

    #[serde(rename = "type", default)]
    pub template_type: TemplateType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    /// Starting tree (defaults to a blank `body` root)
    #[serde(default = "blank_tree")]
    pub component_tree: Node,
}

impl NewTemplate {
    /// New blank template with the given name and type
    pub fn blank(name: impl Into<String>, template_type: TemplateType) -> Self {
        Self {
            name: name.into(),
            template_type,
            description: None,
            subject: None,
            component_tree: blank_tree(),
        }
    }

    /// Materialize into a template with a fresh id and timestamps
    pub fn into_template(self) -> Template {
        let now = now();
        Template {
            id: Uuid::new_v4(),
            name: self.name,
            template_type: self.template_type,
            description: self.description,
            subject: self.subject,
            component_tree: self.component_tree,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Template row in list responses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateSummary {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub template_type: TemplateType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// List filter
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub template_type: Option<TemplateType>,
    /// Case-insensitive substring over name and description
    pub search: Option<String>,
}

impl ListFilter {
    pub fn matches(&self, summary: &TemplateSummary) -> bool {
        if let Some(t) = self.template_type {
            if summary.template_type != t {
                return false;
            }
        }

        match self.search.as_deref().map(str::trim) {
            Some(needle) if !needle.is_empty() => {
                let needle = needle.to_lowercase();
                summary.name.to_lowercase().contains(&needle)
                    || summary
                        .description
                        .as_deref()
                        .is_some_and(|d| d.to_lowercase().contains(&needle))
            }
            _ => true,
        }
    }
}

/// Sortable list field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    Name,
    CreatedAt,
    #[default]
    UpdatedAt,
    Type,
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

/// List ordering; defaults to most recently updated first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SortSpec {
    pub field: SortField,
    pub direction: SortDirection,
}

impl SortSpec {
    /// Parse `field[:direction]`, e.g. `name`, `updated_at:desc`, `createdAt:asc`
    pub fn parse(s: &str) -> Option<Self> {
        let (field, direction) = match s.split_once(':') {
            Some((f, d)) => (f, Some(d)),
            None => (s, None),
        };

        let field = match field.trim() {
            "name" => SortField::Name,
            "created_at" | "createdAt" => SortField::CreatedAt,
            "updated_at" | "updatedAt" => SortField::UpdatedAt,
            "type" => SortField::Type,
            _ => return None,
        };

        let direction = match direction.map(str::trim) {
            None => match field {
                SortField::Name | SortField::Type => SortDirection::Asc,
                _ => SortDirection::Desc,
            },
            Some("asc") => SortDirection::Asc,
            Some("desc") => SortDirection::Desc,
            Some(_) => return None,
        };

        Some(Self { field, direction })
    }

    /// Query-string form accepted by [`SortSpec::parse`]
    pub fn as_query(&self) -> String {
        let field = match self.field {
            SortField::Name => "name",
            SortField::CreatedAt => "created_at",
            SortField::UpdatedAt => "updated_at",
            SortField::Type => "type",
        };
        let direction = match self.direction {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        };
        format!("{}:{}", field, direction)
    }

    /// Sort summaries in place. Ties break on id for a stable order.
    pub fn apply(&self, summaries: &mut [TemplateSummary]) {
        summaries.sort_by(|a, b| {
            let ord = match self.field {
                SortField::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
                SortField::CreatedAt => a.created_at.cmp(&b.created_at),
                SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
                SortField::Type => a.template_type.cmp(&b.template_type),
            }
            .then_with(|| a.id.cmp(&b.id));

            match self.direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            }
        });
    }
}

/// Dashboard statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateStats {
    pub total: usize,
    /// Count per template type; every type is present, zero included
    pub by_type: BTreeMap<TemplateType, usize>,
}

impl TemplateStats {
    pub fn from_types(types: impl IntoIterator<Item = TemplateType>) -> Self {
        let mut by_type: BTreeMap<TemplateType, usize> =
            TemplateType::ALL.into_iter().map(|t| (t, 0)).collect();
        let mut total = 0;
        for t in types {
            *by_type.entry(t).or_default() += 1;
            total += 1;
        }
        Self { total, by_type }
    }
}

/// HTML and CSS produced by the renderer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderOutput {
    pub html: String,
    pub css: String,
}

impl RenderOutput {
    /// Standalone HTML document with the CSS inlined, used for export
    pub fn into_document(self, title: &str) -> String {
        format!(
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
             <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
             <title>{}</title>\n<style>\n{}</style>\n</head>\n<body>\n{}</body>\n</html>\n",
            super::render::escape_html(title),
            self.css,
            self.html
        )
    }
}

/// Response body of the list endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateListResponse {
    pub templates: Vec<TemplateSummary>,
    pub total: usize,
}

/// Response body of create and duplicate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedTemplateResponse {
    pub id: Uuid,
    pub template: Template,
}

/// Response body of the variables endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariablesResponse {
    pub variables: Vec<String>,
}

/// Error envelope shared by every API error
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateErrorResponse {
    pub error: TemplateErrorInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateErrorInfo {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&TemplateError> for TemplateErrorResponse {
    fn from(err: &TemplateError) -> Self {
        let details = match err {
            TemplateError::Conflict {
                current: Some(current),
                ..
            } => Some(serde_json::json!({ "updatedAt": current })),
            _ => None,
        };

        TemplateErrorResponse {
            error: TemplateErrorInfo {
                code: err.code().to_string(),
                message: err.to_string(),
                details,
            },
        }
    }
}
