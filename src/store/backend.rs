//! Backend trait for template persistence.
//!
//! This module defines the abstraction layer for template storage, allowing
//! different implementations (memory, PostgreSQL, remote HTTP API) to be used
//! interchangeably by the API layer and by editor sessions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::template::{
    next_revision, now, ListFilter, NewTemplate, SortSpec, Template, TemplateError,
    TemplateResult, TemplateStats, TemplateSummary,
};

/// Suffix appended to the name of a duplicated template
pub const COPY_SUFFIX: &str = " (Copy)";

/// Template persistence gateway.
///
/// Saves are whole-template replacements guarded by optimistic concurrency:
/// `update` succeeds only when the caller's `updated_at` matches the stored
/// revision, and always moves `updated_at` strictly forward.
#[async_trait]
pub trait TemplateRepository: Send + Sync {
    /// Short backend name for logs and health output
    fn backend_name(&self) -> &'static str;

    /// Store a new template, assigning its id and timestamps
    async fn create(&self, template: NewTemplate) -> TemplateResult<Template>;

    /// Fetch a template
    async fn read(&self, id: Uuid) -> TemplateResult<Template>;

    /// Replace a template. `template.updated_at` is the revision the caller
    /// loaded; a different stored revision yields `Conflict`.
    async fn update(&self, id: Uuid, template: Template) -> TemplateResult<Template>;

    /// Delete a template
    async fn delete(&self, id: Uuid) -> TemplateResult<()>;

    /// Deep-copy a stored template under a new id with fresh timestamps
    async fn duplicate(&self, id: Uuid) -> TemplateResult<Template>;

    /// Filtered, sorted template summaries
    async fn list(&self, filter: &ListFilter, sort: SortSpec)
        -> TemplateResult<Vec<TemplateSummary>>;

    /// Count of templates per type
    async fn stats(&self) -> TemplateResult<TemplateStats>;
}

/// Build the replacement for `stored` from an incoming save.
///
/// Checks the caller's revision, keeps identity and creation time from the
/// stored copy and stamps a new revision.
pub(crate) fn prepare_update(stored: &Template, incoming: Template) -> TemplateResult<Template> {
    if incoming.updated_at != stored.updated_at {
        return Err(TemplateError::Conflict {
            id: stored.id,
            current: Some(stored.updated_at),
        });
    }

    let updated = Template {
        id: stored.id,
        created_at: stored.created_at,
        updated_at: next_revision(stored.updated_at),
        ..incoming
    };
    updated.validate()?;
    Ok(updated)
}

/// Error for a save whose body failed checks, given the stored revision.
///
/// A missing template and a stale revision outrank a bad body, so every
/// backend reports the same kind as `prepare_update` would.
pub fn update_rejection(
    id: Uuid,
    expected: DateTime<Utc>,
    current: Option<DateTime<Utc>>,
    invalid: TemplateError,
) -> TemplateError {
    match current {
        None => TemplateError::template_not_found(id),
        Some(current) if current != expected => TemplateError::Conflict {
            id,
            current: Some(current),
        },
        Some(_) => invalid,
    }
}

/// Deep copy of `source` as a new template
pub(crate) fn duplicate_of(source: &Template) -> Template {
    let now = now();
    Template {
        id: Uuid::new_v4(),
        name: format!("{}{}", source.name, COPY_SUFFIX),
        component_tree: source.component_tree.clone(),
        created_at: now,
        updated_at: now,
        ..source.clone()
    }
}
