//! Tree mutation operations on a template's component tree.
//!
//! Every operation validates fully before touching the tree, so a failed
//! operation leaves the template exactly as it was.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::node::{Node, NodeId, Properties, PropertyValue};
use super::registry::ComponentRegistry;
use super::types::{Template, TemplateError, TemplateResult, ROOT_COMPONENT};

/// A single editor action against the component tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum EditOperation {
    #[serde(rename_all = "camelCase")]
    InsertNode {
        parent_id: NodeId,
        index: usize,
        component_type: String,
    },
    #[serde(rename_all = "camelCase")]
    MoveNode {
        node_id: NodeId,
        new_parent_id: NodeId,
        new_index: usize,
    },
    #[serde(rename_all = "camelCase")]
    UpdateProperties { node_id: NodeId, patch: Properties },
    #[serde(rename_all = "camelCase")]
    RemoveNode { node_id: NodeId },
}

/// What a successful edit produced
#[derive(Debug, Clone, PartialEq)]
pub enum EditOutcome {
    Inserted(NodeId),
    Moved,
    Updated,
    Removed(Node),
}

impl Template {
    /// Apply an editor operation
    pub fn apply(
        &mut self,
        registry: &ComponentRegistry,
        operation: EditOperation,
    ) -> TemplateResult<EditOutcome> {
        match operation {
            EditOperation::InsertNode {
                parent_id,
                index,
                component_type,
            } => self
                .insert_node(registry, parent_id, index, &component_type)
                .map(EditOutcome::Inserted),
            EditOperation::MoveNode {
                node_id,
                new_parent_id,
                new_index,
            } => self
                .move_node(registry, node_id, new_parent_id, new_index)
                .map(|()| EditOutcome::Moved),
            EditOperation::UpdateProperties { node_id, patch } => self
                .update_properties(registry, node_id, patch)
                .map(|()| EditOutcome::Updated),
            EditOperation::RemoveNode { node_id } => {
                self.remove_node(node_id).map(EditOutcome::Removed)
            }
        }
    }

    /// Insert a new node of `component_type` at `index` under `parent_id`.
    /// The node starts with the descriptor's default properties.
    pub fn insert_node(
        &mut self,
        registry: &ComponentRegistry,
        parent_id: NodeId,
        index: usize,
        component_type: &str,
    ) -> TemplateResult<NodeId> {
        let parent = self
            .component_tree
            .find(parent_id)
            .ok_or_else(|| TemplateError::node_not_found(parent_id))?;

        let descriptor = registry.describe(component_type)?;
        if descriptor.component_type == ROOT_COMPONENT {
            return Err(TemplateError::InvalidPosition(format!(
                "'{}' can only be the template root",
                ROOT_COMPONENT
            )));
        }
        if let Some(home) = &descriptor.slot_of {
            return Err(TemplateError::InvalidPosition(format!(
                "'{}' nodes only live in a '{}' slot",
                component_type, home
            )));
        }
        ensure_container(registry, parent)?;
        ensure_index(index, parent.children.len())?;

        let mut node = Node::new(component_type);
        node.properties = descriptor.default_properties.clone();
        let id = node.id;

        if let Some(parent) = self.component_tree.find_mut(parent_id) {
            parent.children.insert(index, node);
        }
        Ok(id)
    }

    /// Move `node_id` (with its subtree) to `new_index` under `new_parent_id`.
    ///
    /// When moving within the same parent, `new_index` addresses the child
    /// list with the node already detached.
    pub fn move_node(
        &mut self,
        registry: &ComponentRegistry,
        node_id: NodeId,
        new_parent_id: NodeId,
        new_index: usize,
    ) -> TemplateResult<()> {
        let root = &self.component_tree;
        if node_id == root.id {
            return Err(TemplateError::InvalidPosition(
                "the root node cannot be moved".to_string(),
            ));
        }

        let path = root
            .ancestors_of(node_id)
            .ok_or_else(|| TemplateError::node_not_found(node_id))?;
        if let Some(node) = root.find(node_id) {
            if let Some(home) = &registry.describe(&node.component_type)?.slot_of {
                return Err(TemplateError::InvalidPosition(format!(
                    "'{}' nodes only live in a '{}' slot",
                    node.component_type, home
                )));
            }
        }
        let new_parent = root
            .find(new_parent_id)
            .ok_or_else(|| TemplateError::node_not_found(new_parent_id))?;

        // Ancestor walk: the new parent must not be the node or inside its subtree
        if new_parent_id == node_id
            || root
                .ancestors_of(new_parent_id)
                .is_some_and(|ancestors| ancestors.contains(&node_id))
        {
            return Err(TemplateError::CycleRejected {
                node: node_id,
                target: new_parent_id,
            });
        }

        ensure_container(registry, new_parent)?;

        let old_parent_id = *path
            .last()
            .ok_or_else(|| TemplateError::node_not_found(node_id))?;
        let old_index = root
            .find(old_parent_id)
            .and_then(|parent| parent.child_index(node_id))
            .ok_or_else(|| {
                TemplateError::InvalidPosition(
                    "slot nodes are managed through their owner's properties".to_string(),
                )
            })?;

        let max_index = if old_parent_id == new_parent_id {
            new_parent.children.len() - 1
        } else {
            new_parent.children.len()
        };
        ensure_index(new_index, max_index)?;

        let Some(node) = self
            .component_tree
            .find_mut(old_parent_id)
            .map(|parent| parent.children.remove(old_index))
        else {
            return Err(TemplateError::node_not_found(old_parent_id));
        };

        match self.component_tree.find_mut(new_parent_id) {
            Some(parent) => {
                parent.children.insert(new_index, node);
                Ok(())
            }
            None => {
                // Unreachable after the checks above; restore the detached node
                if let Some(parent) = self.component_tree.find_mut(old_parent_id) {
                    parent.children.insert(old_index, node);
                }
                Err(TemplateError::node_not_found(new_parent_id))
            }
        }
    }

    /// Merge `patch` into a node's properties. `null` values delete keys.
    ///
    /// Slot values are checked like inserted nodes: every component type must
    /// be registered and allowed in the owner's slot, and no id may collide
    /// with a node outside the replaced slots.
    pub fn update_properties(
        &mut self,
        registry: &ComponentRegistry,
        node_id: NodeId,
        patch: Properties,
    ) -> TemplateResult<()> {
        let node = self
            .component_tree
            .find(node_id)
            .ok_or_else(|| TemplateError::node_not_found(node_id))?;
        self.check_slot_patch(registry, node, &patch)?;

        if let Some(node) = self.component_tree.find_mut(node_id) {
            for (key, value) in patch {
                match value {
                    PropertyValue::Null => {
                        node.properties.remove(&key);
                    }
                    value => {
                        node.properties.insert(key, value);
                    }
                }
            }
        }
        Ok(())
    }

    fn check_slot_patch(
        &self,
        registry: &ComponentRegistry,
        node: &Node,
        patch: &Properties,
    ) -> TemplateResult<()> {
        let slot_nodes: Vec<&Node> = patch
            .values()
            .filter_map(PropertyValue::as_nodes)
            .flatten()
            .collect();
        if slot_nodes.is_empty() {
            return Ok(());
        }
        for slot in &slot_nodes {
            registry.check_placement(slot, Some(&node.component_type))?;
        }

        // Ids that disappear with the slots being overwritten or deleted
        let mut replaced = HashSet::new();
        for key in patch.keys() {
            if let Some(nodes) = node.properties.get(key).and_then(PropertyValue::as_nodes) {
                for slot in nodes {
                    slot.walk(&mut |n| {
                        replaced.insert(n.id);
                    });
                }
            }
        }

        let mut taken = HashSet::new();
        self.component_tree.walk(&mut |n| {
            if !replaced.contains(&n.id) {
                taken.insert(n.id);
            }
        });

        let mut failure = None;
        for slot in slot_nodes {
            slot.walk(&mut |n| {
                if failure.is_some() {
                    return;
                }
                if !taken.insert(n.id) {
                    failure = Some(TemplateError::InvalidTemplate(format!(
                        "Duplicate node id {}",
                        n.id
                    )));
                }
            });
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Remove a node and its subtree, returning it
    pub fn remove_node(&mut self, node_id: NodeId) -> TemplateResult<Node> {
        if node_id == self.component_tree.id {
            return Err(TemplateError::InvalidPosition(
                "the root node cannot be removed".to_string(),
            ));
        }

        let path = self
            .component_tree
            .ancestors_of(node_id)
            .ok_or_else(|| TemplateError::node_not_found(node_id))?;
        let parent_id = *path
            .last()
            .ok_or_else(|| TemplateError::node_not_found(node_id))?;

        let parent = self
            .component_tree
            .find_mut(parent_id)
            .ok_or_else(|| TemplateError::node_not_found(parent_id))?;
        let index = parent.child_index(node_id).ok_or_else(|| {
            TemplateError::InvalidPosition(
                "slot nodes are managed through their owner's properties".to_string(),
            )
        })?;

        Ok(parent.children.remove(index))
    }

    /// Whether a node id resolves in this template
    pub fn contains_node(&self, node_id: NodeId) -> bool {
        self.component_tree.find(node_id).is_some()
    }
}

fn ensure_container(registry: &ComponentRegistry, parent: &Node) -> TemplateResult<()> {
    let descriptor = registry.describe(&parent.component_type)?;
    if descriptor.container {
        Ok(())
    } else {
        Err(TemplateError::InvalidPosition(format!(
            "'{}' nodes cannot hold children",
            parent.component_type
        )))
    }
}

fn ensure_index(index: usize, child_count: usize) -> TemplateResult<()> {
    if index > child_count {
        Err(TemplateError::InvalidPosition(format!(
            "index {} is outside 0..={}",
            index, child_count
        )))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{NewTemplate, TemplateType};

    fn setup() -> (ComponentRegistry, Template) {
        (
            ComponentRegistry::builtin(),
            NewTemplate::blank("Doc", TemplateType::Blank).into_template(),
        )
    }

    #[test]
    fn test_insert_applies_defaults() {
        let (registry, mut template) = setup();
        let root = template.component_tree.id;

        let id = template.insert_node(&registry, root, 0, "button").unwrap();
        let node = template.component_tree.find(id).unwrap();
        assert_eq!(node.component_type, "button");
        assert_eq!(node.property_str("label"), Some("Click here"));
        assert_eq!(template.component_tree.children.len(), 1);
    }

    #[test]
    fn test_insert_position_range() {
        let (registry, mut template) = setup();
        let root = template.component_tree.id;

        let first = template.insert_node(&registry, root, 0, "text").unwrap();
        let last = template.insert_node(&registry, root, 1, "image").unwrap();
        let front = template.insert_node(&registry, root, 0, "divider").unwrap();
        let ids: Vec<_> = template.component_tree.children.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![front, first, last]);

        let before = template.clone();
        assert!(matches!(
            template.insert_node(&registry, root, 4, "text"),
            Err(TemplateError::InvalidPosition(_))
        ));
        assert_eq!(template, before);
    }

    #[test]
    fn test_insert_errors_leave_tree_unchanged() {
        let (registry, mut template) = setup();
        let root = template.component_tree.id;
        let text = template.insert_node(&registry, root, 0, "text").unwrap();
        let before = template.clone();

        assert!(matches!(
            template.insert_node(&registry, NodeId::new(), 0, "text"),
            Err(TemplateError::NotFound(_))
        ));
        assert!(matches!(
            template.insert_node(&registry, root, 0, "carousel"),
            Err(TemplateError::UnknownComponentType(_))
        ));
        assert!(matches!(
            template.insert_node(&registry, text, 0, "image"),
            Err(TemplateError::InvalidPosition(_))
        ));
        assert!(matches!(
            template.insert_node(&registry, root, 0, ROOT_COMPONENT),
            Err(TemplateError::InvalidPosition(_))
        ));
        assert_eq!(template, before);
    }

    #[test]
    fn test_move_between_parents() {
        let (registry, mut template) = setup();
        let root = template.component_tree.id;
        let section = template.insert_node(&registry, root, 0, "section").unwrap();
        let text = template.insert_node(&registry, root, 1, "text").unwrap();

        template.move_node(&registry, text, section, 0).unwrap();

        assert_eq!(template.component_tree.children.len(), 1);
        let section_node = template.component_tree.find(section).unwrap();
        assert_eq!(section_node.children[0].id, text);
    }

    #[test]
    fn test_move_within_same_parent() {
        let (registry, mut template) = setup();
        let root = template.component_tree.id;
        let a = template.insert_node(&registry, root, 0, "text").unwrap();
        let b = template.insert_node(&registry, root, 1, "text").unwrap();
        let c = template.insert_node(&registry, root, 2, "text").unwrap();

        template.move_node(&registry, a, root, 2).unwrap();
        let ids: Vec<_> = template.component_tree.children.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![b, c, a]);

        let before = template.clone();
        assert!(matches!(
            template.move_node(&registry, a, root, 3),
            Err(TemplateError::InvalidPosition(_))
        ));
        assert_eq!(template, before);
    }

    #[test]
    fn test_move_into_descendant_rejected() {
        let (registry, mut template) = setup();
        let root = template.component_tree.id;
        let outer = template.insert_node(&registry, root, 0, "section").unwrap();
        let inner = template.insert_node(&registry, outer, 0, "section").unwrap();
        let before = template.clone();

        assert!(matches!(
            template.move_node(&registry, outer, inner, 0),
            Err(TemplateError::CycleRejected { .. })
        ));
        assert!(matches!(
            template.move_node(&registry, outer, outer, 0),
            Err(TemplateError::CycleRejected { .. })
        ));
        assert_eq!(template, before);
    }

    #[test]
    fn test_move_unknown_ids_and_root() {
        let (registry, mut template) = setup();
        let root = template.component_tree.id;
        let text = template.insert_node(&registry, root, 0, "text").unwrap();
        let before = template.clone();

        assert!(matches!(
            template.move_node(&registry, NodeId::new(), root, 0),
            Err(TemplateError::NotFound(_))
        ));
        assert!(matches!(
            template.move_node(&registry, text, NodeId::new(), 0),
            Err(TemplateError::NotFound(_))
        ));
        assert!(matches!(
            template.move_node(&registry, root, root, 0),
            Err(TemplateError::InvalidPosition(_))
        ));
        assert_eq!(template, before);
    }

    #[test]
    fn test_update_properties_merges_and_deletes() {
        let (registry, mut template) = setup();
        let root = template.component_tree.id;
        let text = template.insert_node(&registry, root, 0, "text").unwrap();

        let mut patch = Properties::new();
        patch.insert("content".to_string(), "Hi".into());
        patch.insert("fontSize".to_string(), PropertyValue::Null);
        template.update_properties(&registry, text, patch).unwrap();

        let node = template.component_tree.find(text).unwrap();
        assert_eq!(node.property_str("content"), Some("Hi"));
        assert!(!node.properties.contains_key("fontSize"));

        let before = template.clone();
        assert!(matches!(
            template.update_properties(&registry, NodeId::new(), Properties::new()),
            Err(TemplateError::NotFound(_))
        ));
        assert_eq!(template, before);
    }

    #[test]
    fn test_update_properties_validates_slots() {
        let (registry, mut template) = setup();
        let root = template.component_tree.id;
        let columns = template.insert_node(&registry, root, 0, "columns").unwrap();
        let before = template.clone();

        let mut patch = Properties::new();
        patch.insert("columns".to_string(), vec![Node::new("carousel")].into());
        assert!(matches!(
            template.update_properties(&registry, columns, patch),
            Err(TemplateError::UnknownComponentType(_))
        ));

        let mut clash = Node::new("column");
        clash.id = root;
        let mut patch = Properties::new();
        patch.insert("columns".to_string(), vec![clash].into());
        assert!(matches!(
            template.update_properties(&registry, columns, patch),
            Err(TemplateError::InvalidTemplate(_))
        ));
        assert_eq!(template, before);

        let column = Node::new("column");
        let mut patch = Properties::new();
        patch.insert("columns".to_string(), vec![column.clone()].into());
        template
            .update_properties(&registry, columns, patch.clone())
            .unwrap();
        // Re-applying the same slot replaces it rather than colliding with itself
        template.update_properties(&registry, columns, patch).unwrap();
        assert!(template.contains_node(column.id));
        assert!(template.validate().is_ok());
    }

    #[test]
    fn test_insert_into_slot_column_and_slot_guards() {
        let (registry, mut template) = setup();
        let root = template.component_tree.id;
        let columns = template.insert_node(&registry, root, 0, "columns").unwrap();
        let column = Node::new("column");
        let mut patch = Properties::new();
        patch.insert("columns".to_string(), vec![column.clone()].into());
        template.update_properties(&registry, columns, patch).unwrap();

        let cell = template.insert_node(&registry, column.id, 0, "text").unwrap();
        assert!(template.contains_node(cell));

        let before = template.clone();
        assert!(matches!(
            template.remove_node(column.id),
            Err(TemplateError::InvalidPosition(_))
        ));
        assert!(matches!(
            template.move_node(&registry, column.id, root, 0),
            Err(TemplateError::InvalidPosition(_))
        ));
        assert_eq!(template, before);
    }

    #[test]
    fn test_columns_hold_cells_only_in_their_slot() {
        let (registry, mut template) = setup();
        let root = template.component_tree.id;
        let section = template.insert_node(&registry, root, 0, "section").unwrap();
        let columns = template.insert_node(&registry, root, 1, "columns").unwrap();
        let before = template.clone();

        // Content directly in the row
        assert!(matches!(
            template.insert_node(&registry, columns, 0, "text"),
            Err(TemplateError::InvalidPosition(_))
        ));
        // Cells outside a row
        assert!(matches!(
            template.insert_node(&registry, root, 0, "column"),
            Err(TemplateError::InvalidPosition(_))
        ));
        assert!(matches!(
            template.insert_node(&registry, section, 0, "column"),
            Err(TemplateError::InvalidPosition(_))
        ));
        assert!(matches!(
            template.move_node(&registry, section, columns, 0),
            Err(TemplateError::InvalidPosition(_))
        ));
        // Row slot with something other than cells, or cells in a foreign slot
        let mut patch = Properties::new();
        patch.insert("columns".to_string(), vec![Node::new("text")].into());
        assert!(matches!(
            template.update_properties(&registry, columns, patch),
            Err(TemplateError::InvalidPosition(_))
        ));
        let mut patch = Properties::new();
        patch.insert("cells".to_string(), vec![Node::new("column")].into());
        assert!(matches!(
            template.update_properties(&registry, section, patch),
            Err(TemplateError::InvalidPosition(_))
        ));
        assert_eq!(template, before);

        let output = crate::template::render(&template, &registry).unwrap();
        assert!(!output.html.contains("<tr>\n<p"));
    }

    #[test]
    fn test_slot_patch_cannot_add_second_body() {
        let (registry, mut template) = setup();
        let root = template.component_tree.id;
        let text = template.insert_node(&registry, root, 0, "text").unwrap();
        let before = template.clone();

        let mut patch = Properties::new();
        patch.insert("x".to_string(), vec![Node::new(ROOT_COMPONENT)].into());
        assert!(matches!(
            template.update_properties(&registry, text, patch),
            Err(TemplateError::InvalidPosition(_))
        ));

        let nested = Node::new("section").with_child(Node::new(ROOT_COMPONENT));
        let mut patch = Properties::new();
        patch.insert("x".to_string(), vec![nested].into());
        assert!(matches!(
            template.update_properties(&registry, text, patch),
            Err(TemplateError::InvalidPosition(_))
        ));
        assert_eq!(template, before);

        let mut bodies = 0;
        template.component_tree.walk(&mut |n| {
            if n.component_type == ROOT_COMPONENT {
                bodies += 1;
            }
        });
        assert_eq!(bodies, 1);
    }

    #[test]
    fn test_remove_node() {
        let (registry, mut template) = setup();
        let root = template.component_tree.id;
        let section = template.insert_node(&registry, root, 0, "section").unwrap();
        let text = template.insert_node(&registry, section, 0, "text").unwrap();

        let removed = template.remove_node(section).unwrap();
        assert_eq!(removed.id, section);
        assert!(!template.contains_node(text));
        assert!(template.component_tree.children.is_empty());

        assert!(matches!(
            template.remove_node(section),
            Err(TemplateError::NotFound(_))
        ));
        assert!(matches!(
            template.remove_node(root),
            Err(TemplateError::InvalidPosition(_))
        ));
    }

    #[test]
    fn test_edit_operation_wire_format() {
        let parent = NodeId::new();
        let json = serde_json::json!({
            "op": "insertNode",
            "parentId": parent,
            "index": 0,
            "componentType": "text"
        });
        let op: EditOperation = serde_json::from_value(json).unwrap();
        assert_eq!(
            op,
            EditOperation::InsertNode {
                parent_id: parent,
                index: 0,
                component_type: "text".to_string()
            }
        );
    }
}
