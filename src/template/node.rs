//! Component tree nodes

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a node in a template's component tree.
/// Ids are scoped to their template and survive serialization unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(Uuid);

impl NodeId {
    /// Create a new random NodeId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// Parse a NodeId from its string form
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for NodeId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// A property value: a primitive, or a slot holding a list of nodes.
///
/// Untagged so the wire format stays plain JSON (`"text"`, `12`, `true`,
/// `null`, `[ {node}, ... ]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    Nodes(Vec<Node>),
}

impl PropertyValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_nodes(&self) -> Option<&[Node]> {
        match self {
            PropertyValue::Nodes(nodes) => Some(nodes),
            _ => None,
        }
    }

    pub fn as_nodes_mut(&mut self) -> Option<&mut Vec<Node>> {
        match self {
            PropertyValue::Nodes(nodes) => Some(nodes),
            _ => None,
        }
    }

    /// Scalar rendering used for CSS values and attributes.
    /// Slots and nulls have no scalar form.
    pub fn to_scalar_string(&self) -> Option<String> {
        match self {
            PropertyValue::String(s) => Some(s.clone()),
            PropertyValue::Number(n) => Some(n.to_string()),
            PropertyValue::Bool(b) => Some(b.to_string()),
            PropertyValue::Null | PropertyValue::Nodes(_) => None,
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::String(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        PropertyValue::String(s)
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        PropertyValue::Bool(b)
    }
}

impl From<i64> for PropertyValue {
    fn from(n: i64) -> Self {
        PropertyValue::Number(n.into())
    }
}

impl From<i32> for PropertyValue {
    fn from(n: i32) -> Self {
        PropertyValue::Number(n.into())
    }
}

impl From<Vec<Node>> for PropertyValue {
    fn from(nodes: Vec<Node>) -> Self {
        PropertyValue::Nodes(nodes)
    }
}

/// Node properties, iterated in key order so rendering is deterministic.
pub type Properties = BTreeMap<String, PropertyValue>;

/// One element of the component tree (section, text block, image, button...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: NodeId,

    /// Key into the component registry
    pub component_type: String,

    #[serde(default)]
    pub properties: Properties,

    #[serde(default)]
    pub children: Vec<Node>,
}

impl Node {
    /// Create an empty node of the given component type
    pub fn new(component_type: impl Into<String>) -> Self {
        Self {
            id: NodeId::new(),
            component_type: component_type.into(),
            properties: Properties::new(),
            children: Vec::new(),
        }
    }

    /// Builder-style property setter
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Builder-style child append
    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    /// String property lookup
    pub fn property_str(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(PropertyValue::as_str)
    }

    /// Nodes held in slot properties, in key order
    pub fn slot_nodes(&self) -> impl Iterator<Item = &Node> {
        self.properties
            .values()
            .filter_map(PropertyValue::as_nodes)
            .flatten()
    }

    /// Pre-order visit of this node, its slot nodes and its children.
    ///
    /// Slot nodes are visited before `children` for the same parent, matching
    /// the order in which the renderer emits them.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Node)) {
        visit(self);
        for slot in self.slot_nodes() {
            slot.walk(visit);
        }
        for child in &self.children {
            child.walk(visit);
        }
    }

    /// Find a node anywhere in this subtree, slots included
    pub fn find(&self, id: NodeId) -> Option<&Node> {
        if self.id == id {
            return Some(self);
        }
        self.slot_nodes()
            .chain(self.children.iter())
            .find_map(|node| node.find(id))
    }

    /// Mutable variant of [`Node::find`]
    pub fn find_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        if self.id == id {
            return Some(self);
        }
        let Node {
            properties,
            children,
            ..
        } = self;
        properties
            .values_mut()
            .filter_map(PropertyValue::as_nodes_mut)
            .flatten()
            .chain(children.iter_mut())
            .find_map(|node| node.find_mut(id))
    }

    /// Ids of the ancestors of `id`, from this node downwards (excluding `id`).
    /// Returns `None` when `id` is not in this subtree.
    pub fn ancestors_of(&self, id: NodeId) -> Option<Vec<NodeId>> {
        if self.id == id {
            return Some(Vec::new());
        }
        self.slot_nodes()
            .chain(self.children.iter())
            .find_map(|node| node.ancestors_of(id))
            .map(|mut path| {
                path.insert(0, self.id);
                path
            })
    }

    /// Index of a direct child (slot nodes are not children)
    pub fn child_index(&self, id: NodeId) -> Option<usize> {
        self.children.iter().position(|child| child.id == id)
    }

    /// Number of nodes in this subtree, slots included
    pub fn count(&self) -> usize {
        let mut count = 0;
        self.walk(&mut |_| count += 1);
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_node_id_display_and_parse() {
        let id = NodeId::new();
        assert_eq!(NodeId::parse(&id.to_string()), Some(id));
        assert_eq!(NodeId::parse("not-a-uuid"), None);
    }

    #[test]
    fn test_property_value_wire_format() {
        let node = Node::new("text")
            .with_property("content", "Hi")
            .with_property("bold", true)
            .with_property("size", 14);

        let value = serde_json::to_value(&node).unwrap();
        assert_eq!(value["componentType"], "text");
        assert_eq!(value["properties"]["content"], "Hi");
        assert_eq!(value["properties"]["bold"], true);
        assert_eq!(value["properties"]["size"], 14);

        let back: Node = serde_json::from_value(value).unwrap();
        assert_eq!(back, node);
    }

    #[test]
    fn test_slot_nodes_deserialize() {
        let id = NodeId::new();
        let value = json!({
            "id": NodeId::new(),
            "componentType": "columns",
            "properties": {
                "columns": [
                    { "id": id, "componentType": "column" }
                ]
            }
        });

        let node: Node = serde_json::from_value(value).unwrap();
        let slots: Vec<_> = node.slot_nodes().collect();
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].id, id);
        assert!(slots[0].children.is_empty());
    }

    #[test]
    fn test_walk_is_pre_order() {
        let a = Node::new("text");
        let b = Node::new("image");
        let section = Node::new("section").with_child(a.clone());
        let root = Node::new("body").with_child(section.clone()).with_child(b.clone());

        let mut seen = Vec::new();
        root.walk(&mut |n| seen.push(n.id));
        assert_eq!(seen, vec![root.id, section.id, a.id, b.id]);
        assert_eq!(root.count(), 4);
    }

    #[test]
    fn test_ancestors_of() {
        let leaf = Node::new("text");
        let section = Node::new("section").with_child(leaf.clone());
        let root = Node::new("body").with_child(section.clone());

        assert_eq!(root.ancestors_of(leaf.id), Some(vec![root.id, section.id]));
        assert_eq!(root.ancestors_of(root.id), Some(vec![]));
        assert_eq!(root.ancestors_of(NodeId::new()), None);
    }

    #[test]
    fn test_find_reaches_slot_nodes() {
        let cell_text = Node::new("text");
        let column = Node::new("column").with_child(cell_text.clone());
        let columns = Node::new("columns").with_property("columns", vec![column.clone()]);
        let mut root = Node::new("body").with_child(columns.clone());

        assert_eq!(root.find(cell_text.id).map(|n| n.id), Some(cell_text.id));
        assert_eq!(
            root.ancestors_of(cell_text.id),
            Some(vec![root.id, columns.id, column.id])
        );
        assert_eq!(root.find(columns.id).unwrap().child_index(column.id), None);

        root.find_mut(cell_text.id)
            .unwrap()
            .properties
            .insert("content".to_string(), "Cell".into());
        assert_eq!(root.find(cell_text.id).unwrap().property_str("content"), Some("Cell"));
    }
}
