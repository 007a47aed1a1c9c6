//! Editing session over a single template.
//!
//! A session holds the loaded template, the selected node and a dirty flag.
//! Edits happen in memory through the document model and reach storage only
//! on an explicit `save`.

use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::store::TemplateRepository;
use crate::template::{
    render, ComponentRegistry, EditOperation, EditOutcome, Node, NodeId, RenderOutput, Template,
    TemplateError,
};

#[derive(Debug, Error)]
pub enum EditorError {
    #[error("No template loaded")]
    NoDocumentLoaded,

    #[error(transparent)]
    Template(#[from] TemplateError),
}

pub type EditorResult<T> = Result<T, EditorError>;

/// Single-owner editing session
pub struct EditorSession {
    repository: Arc<dyn TemplateRepository>,
    registry: Arc<ComponentRegistry>,
    template: Option<Template>,
    selection: Option<NodeId>,
    dirty: bool,
}

impl EditorSession {
    pub fn new(repository: Arc<dyn TemplateRepository>, registry: Arc<ComponentRegistry>) -> Self {
        Self {
            repository,
            registry,
            template: None,
            selection: None,
            dirty: false,
        }
    }

    /// Load a template, replacing whatever was open
    pub async fn load(&mut self, id: Uuid) -> EditorResult<&Template> {
        let template = self.repository.read(id).await?;
        tracing::debug!(template_id = %id, "Template loaded into editor");

        self.selection = None;
        self.dirty = false;
        Ok(self.template.insert(template))
    }

    /// Select a node. An unknown id leaves nothing selected.
    pub fn select(&mut self, node_id: NodeId) -> EditorResult<&Node> {
        let template = self.template.as_ref().ok_or(EditorError::NoDocumentLoaded)?;

        match template.component_tree.find(node_id) {
            Some(node) => {
                self.selection = Some(node_id);
                Ok(node)
            }
            None => {
                self.selection = None;
                Err(TemplateError::node_not_found(node_id).into())
            }
        }
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    /// Apply an edit to the in-memory template. A failed edit changes nothing.
    pub fn apply_edit(&mut self, operation: EditOperation) -> EditorResult<EditOutcome> {
        let template = self.template.as_mut().ok_or(EditorError::NoDocumentLoaded)?;
        let outcome = template.apply(&self.registry, operation)?;

        self.dirty = true;
        if let Some(selected) = self.selection {
            if !template.contains_node(selected) {
                self.selection = None;
            }
        }
        Ok(outcome)
    }

    /// Persist the template. On failure the session stays dirty and the
    /// error is returned as-is.
    pub async fn save(&mut self) -> EditorResult<&Template> {
        let template = self.template.as_ref().ok_or(EditorError::NoDocumentLoaded)?;
        let id = template.id;

        let saved = match self.repository.update(id, template.clone()).await {
            Ok(saved) => saved,
            Err(e) => {
                tracing::warn!(template_id = %id, error = %e, "Template save failed");
                return Err(e.into());
            }
        };

        tracing::info!(template_id = %id, updated_at = %saved.updated_at, "Template saved");
        self.dirty = false;
        Ok(self.template.insert(saved))
    }

    /// Drop unsaved edits by reloading the stored template
    pub async fn discard_changes(&mut self) -> EditorResult<&Template> {
        let id = self.template.as_ref().ok_or(EditorError::NoDocumentLoaded)?.id;
        let stored = self.repository.read(id).await?;

        self.dirty = false;
        if let Some(selected) = self.selection {
            if !stored.contains_node(selected) {
                self.selection = None;
            }
        }
        Ok(self.template.insert(stored))
    }

    /// Render the in-memory template
    pub fn preview(&self) -> EditorResult<RenderOutput> {
        let template = self.template.as_ref().ok_or(EditorError::NoDocumentLoaded)?;
        Ok(render(template, &self.registry)?)
    }

    pub fn template(&self) -> Option<&Template> {
        self.template.as_ref()
    }

    pub fn selection(&self) -> Option<NodeId> {
        self.selection
    }

    /// The selected node, if any
    pub fn selected_node(&self) -> Option<&Node> {
        let id = self.selection?;
        self.template.as_ref()?.component_tree.find(id)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryTemplateRepository;
    use crate::template::{NewTemplate, PropertyValue, TemplateType};

    async fn session_with_template() -> (EditorSession, Arc<MemoryTemplateRepository>, Uuid) {
        let repo = Arc::new(MemoryTemplateRepository::new());
        let created = repo
            .create(NewTemplate::blank("Editor", TemplateType::Blank))
            .await
            .unwrap();
        let session = EditorSession::new(repo.clone(), Arc::new(ComponentRegistry::builtin()));
        (session, repo, created.id)
    }

    fn insert_text(session: &mut EditorSession) -> NodeId {
        let root = session.template().unwrap().component_tree.id;
        match session
            .apply_edit(EditOperation::InsertNode {
                parent_id: root,
                index: 0,
                component_type: "text".to_string(),
            })
            .unwrap()
        {
            EditOutcome::Inserted(id) => id,
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_operations_require_loaded_document() {
        let (mut session, _, _) = session_with_template().await;

        assert!(matches!(
            session.select(NodeId::new()),
            Err(EditorError::NoDocumentLoaded)
        ));
        assert!(matches!(session.preview(), Err(EditorError::NoDocumentLoaded)));
        assert!(matches!(session.save().await, Err(EditorError::NoDocumentLoaded)));
        assert!(matches!(
            session.discard_changes().await,
            Err(EditorError::NoDocumentLoaded)
        ));
    }

    #[tokio::test]
    async fn test_load_resets_state() {
        let (mut session, _, id) = session_with_template().await;
        session.load(id).await.unwrap();
        let text = insert_text(&mut session);
        session.select(text).unwrap();
        assert!(session.is_dirty());

        session.load(id).await.unwrap();
        assert!(!session.is_dirty());
        assert_eq!(session.selection(), None);
    }

    #[tokio::test]
    async fn test_load_missing_template() {
        let (mut session, _, _) = session_with_template().await;
        let result = session.load(Uuid::new_v4()).await;
        assert!(matches!(
            result,
            Err(EditorError::Template(TemplateError::NotFound(_)))
        ));
        assert!(session.template().is_none());
    }

    #[tokio::test]
    async fn test_select_unknown_clears_selection() {
        let (mut session, _, id) = session_with_template().await;
        session.load(id).await.unwrap();
        let text = insert_text(&mut session);
        session.select(text).unwrap();

        let result = session.select(NodeId::new());
        assert!(matches!(
            result,
            Err(EditorError::Template(TemplateError::NotFound(_)))
        ));
        assert_eq!(session.selection(), None);
    }

    #[tokio::test]
    async fn test_failed_edit_changes_nothing() {
        let (mut session, _, id) = session_with_template().await;
        session.load(id).await.unwrap();
        let before = session.template().unwrap().clone();

        let result = session.apply_edit(EditOperation::InsertNode {
            parent_id: before.component_tree.id,
            index: 5,
            component_type: "text".to_string(),
        });
        assert!(matches!(
            result,
            Err(EditorError::Template(TemplateError::InvalidPosition(_)))
        ));
        assert_eq!(session.template().unwrap(), &before);
        assert!(!session.is_dirty());
    }

    #[tokio::test]
    async fn test_removing_selected_node_clears_selection() {
        let (mut session, _, id) = session_with_template().await;
        session.load(id).await.unwrap();
        let text = insert_text(&mut session);
        session.select(text).unwrap();

        session
            .apply_edit(EditOperation::RemoveNode { node_id: text })
            .unwrap();
        assert_eq!(session.selection(), None);
        assert!(session.selected_node().is_none());
    }

    #[tokio::test]
    async fn test_save_clears_dirty_and_advances_revision() {
        let (mut session, repo, id) = session_with_template().await;
        let loaded_at = session.load(id).await.unwrap().updated_at;
        let text = insert_text(&mut session);
        session
            .apply_edit(EditOperation::UpdateProperties {
                node_id: text,
                patch: [("content".to_string(), PropertyValue::from("Hi"))].into(),
            })
            .unwrap();

        let saved_at = session.save().await.unwrap().updated_at;
        assert!(saved_at > loaded_at);
        assert!(!session.is_dirty());

        let stored = repo.read(id).await.unwrap();
        assert_eq!(
            stored.component_tree.find(text).unwrap().property_str("content"),
            Some("Hi")
        );
    }

    #[tokio::test]
    async fn test_save_conflict_keeps_dirty() {
        let (mut session, repo, id) = session_with_template().await;
        session.load(id).await.unwrap();
        insert_text(&mut session);

        // Another writer saves first
        let other = repo.read(id).await.unwrap();
        repo.update(id, other).await.unwrap();

        let result = session.save().await;
        assert!(matches!(
            result,
            Err(EditorError::Template(TemplateError::Conflict { .. }))
        ));
        assert!(session.is_dirty());
        assert_eq!(session.template().unwrap().component_tree.children.len(), 1);
    }

    #[tokio::test]
    async fn test_discard_changes() {
        let (mut session, _, id) = session_with_template().await;
        session.load(id).await.unwrap();
        let text = insert_text(&mut session);
        session.select(text).unwrap();

        let restored = session.discard_changes().await.unwrap();
        assert!(restored.component_tree.children.is_empty());
        assert!(!session.is_dirty());
        assert_eq!(session.selection(), None);
    }

    #[tokio::test]
    async fn test_preview_renders_unsaved_edits() {
        let (mut session, _, id) = session_with_template().await;
        session.load(id).await.unwrap();
        let text = insert_text(&mut session);
        session
            .apply_edit(EditOperation::UpdateProperties {
                node_id: text,
                patch: [("content".to_string(), PropertyValue::from("Hello {{name}}"))].into(),
            })
            .unwrap();

        let output = session.preview().unwrap();
        assert!(output.html.contains("Hello {{name}}"));
        assert!(output.css.contains(&format!("#mt-{}", text)));
    }
}
