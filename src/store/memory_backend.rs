//! In-memory template storage backend.

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use crate::template::{
    ListFilter, NewTemplate, SortSpec, Template, TemplateError, TemplateResult, TemplateStats,
    TemplateSummary,
};

use super::backend::{duplicate_of, prepare_update, TemplateRepository};

/// In-memory template storage.
///
/// Updates compare and replace while holding the entry's shard lock, so two
/// concurrent saves of the same revision cannot both succeed.
pub struct MemoryTemplateRepository {
    templates: DashMap<Uuid, Template>,
}

impl Default for MemoryTemplateRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTemplateRepository {
    /// Create an empty repository
    pub fn new() -> Self {
        Self {
            templates: DashMap::new(),
        }
    }

    /// Number of stored templates
    pub fn count(&self) -> usize {
        self.templates.len()
    }
}

#[async_trait]
impl TemplateRepository for MemoryTemplateRepository {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn create(&self, template: NewTemplate) -> TemplateResult<Template> {
        let template = template.into_template();
        template.validate()?;

        self.templates.insert(template.id, template.clone());
        tracing::debug!(template_id = %template.id, "Template created");
        Ok(template)
    }

    async fn read(&self, id: Uuid) -> TemplateResult<Template> {
        self.templates
            .get(&id)
            .map(|t| t.clone())
            .ok_or_else(|| TemplateError::template_not_found(id))
    }

    async fn update(&self, id: Uuid, template: Template) -> TemplateResult<Template> {
        let mut entry = self
            .templates
            .get_mut(&id)
            .ok_or_else(|| TemplateError::template_not_found(id))?;

        let updated = prepare_update(&entry, template)?;
        *entry = updated.clone();
        Ok(updated)
    }

    async fn delete(&self, id: Uuid) -> TemplateResult<()> {
        self.templates
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| TemplateError::template_not_found(id))
    }

    async fn duplicate(&self, id: Uuid) -> TemplateResult<Template> {
        let copy = {
            let source = self
                .templates
                .get(&id)
                .ok_or_else(|| TemplateError::template_not_found(id))?;
            duplicate_of(&source)
        };

        self.templates.insert(copy.id, copy.clone());
        Ok(copy)
    }

    async fn list(
        &self,
        filter: &ListFilter,
        sort: SortSpec,
    ) -> TemplateResult<Vec<TemplateSummary>> {
        let mut summaries: Vec<TemplateSummary> = self
            .templates
            .iter()
            .map(|entry| entry.value().summary())
            .filter(|summary| filter.matches(summary))
            .collect();
        sort.apply(&mut summaries);
        Ok(summaries)
    }

    async fn stats(&self) -> TemplateResult<TemplateStats> {
        Ok(TemplateStats::from_types(
            self.templates.iter().map(|entry| entry.value().template_type),
        ))
    }
}
