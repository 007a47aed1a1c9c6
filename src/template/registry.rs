//! Component registry feeding the builder palette.
//!
//! The registry is built once at startup and shared read-only behind an `Arc`.

use std::collections::HashMap;

use serde::Serialize;

use super::node::{Node, Properties, PropertyValue};
use super::types::{TemplateError, TemplateResult, ROOT_COMPONENT};

/// Static metadata for a placeable component type
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentDescriptor {
    #[serde(rename = "type")]
    pub component_type: String,
    pub category: String,
    pub icon: String,
    pub label: String,
    /// Shown in the palette and movable on the canvas
    pub draggable: bool,
    /// Accepts child nodes
    pub container: bool,
    /// Owner type whose slot is the only place nodes of this type may live
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot_of: Option<String>,
    /// Properties a freshly inserted node starts with
    pub default_properties: Properties,
}

impl ComponentDescriptor {
    pub fn new(component_type: &str, category: &str, icon: &str, label: &str) -> Self {
        Self {
            component_type: component_type.to_string(),
            category: category.to_string(),
            icon: icon.to_string(),
            label: label.to_string(),
            draggable: true,
            container: false,
            slot_of: None,
            default_properties: Properties::new(),
        }
    }

    pub fn container(mut self) -> Self {
        self.container = true;
        self
    }

    pub fn fixed(mut self) -> Self {
        self.draggable = false;
        self
    }

    pub fn slot_of(mut self, owner: &str) -> Self {
        self.slot_of = Some(owner.to_string());
        self
    }

    pub fn with_default(mut self, key: &str, value: impl Into<PropertyValue>) -> Self {
        self.default_properties.insert(key.to_string(), value.into());
        self
    }
}

/// Palette group
#[derive(Debug, Clone, Serialize)]
pub struct PaletteCategory<'a> {
    pub category: &'a str,
    pub components: Vec<&'a ComponentDescriptor>,
}

/// Read-only registry of component descriptors, in registration order
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    descriptors: Vec<ComponentDescriptor>,
    index: HashMap<String, usize>,
}

impl ComponentRegistry {
    /// Build a registry from descriptors. Later duplicates replace earlier ones
    /// in place, keeping the first registration position.
    pub fn new(descriptors: impl IntoIterator<Item = ComponentDescriptor>) -> Self {
        let mut registry = Self::default();
        for descriptor in descriptors {
            match registry.index.get(&descriptor.component_type) {
                Some(&pos) => registry.descriptors[pos] = descriptor,
                None => {
                    registry
                        .index
                        .insert(descriptor.component_type.clone(), registry.descriptors.len());
                    registry.descriptors.push(descriptor);
                }
            }
        }
        registry
    }

    /// The built-in email components
    pub fn builtin() -> Self {
        Self::new([
            ComponentDescriptor::new(ROOT_COMPONENT, "layout", "file", "Email body")
                .fixed()
                .container()
                .with_default("backgroundColor", "#f4f4f4")
                .with_default("width", 600),
            ComponentDescriptor::new("section", "layout", "square", "Section")
                .container()
                .with_default("padding", "20px")
                .with_default("backgroundColor", "#ffffff"),
            // Cells live in the `columns` slot, never in `children`
            ComponentDescriptor::new("columns", "layout", "columns", "Columns")
                .with_default("gap", "10px"),
            ComponentDescriptor::new("column", "layout", "column", "Column")
                .fixed()
                .slot_of("columns")
                .container()
                .with_default("width", "50%"),
            ComponentDescriptor::new("divider", "layout", "minus", "Divider")
                .with_default("color", "#dddddd")
                .with_default("thickness", "1px"),
            ComponentDescriptor::new("spacer", "layout", "arrows-v", "Spacer")
                .with_default("height", "20px"),
            ComponentDescriptor::new("heading", "content", "heading", "Heading")
                .with_default("content", "Heading")
                .with_default("level", 1),
            ComponentDescriptor::new("text", "content", "font", "Text")
                .with_default("content", "Write your text here")
                .with_default("fontSize", "14px"),
            ComponentDescriptor::new("image", "content", "image", "Image")
                .with_default("src", "")
                .with_default("alt", "")
                .with_default("width", "100%"),
            ComponentDescriptor::new("button", "content", "hand-pointer", "Button")
                .with_default("label", "Click here")
                .with_default("href", "#")
                .with_default("backgroundColor", "#007bff")
                .with_default("color", "#ffffff"),
            ComponentDescriptor::new("html", "content", "code", "Custom HTML").with_default("content", ""),
            ComponentDescriptor::new("social", "social", "share-alt", "Social links")
                .with_default("facebook", "")
                .with_default("twitter", "")
                .with_default("instagram", ""),
            ComponentDescriptor::new("footer", "social", "align-center", "Footer")
                .with_default("content", "You are receiving this email because you subscribed.")
                .with_default("unsubscribeUrl", "{{unsubscribe_url}}"),
        ])
    }

    /// Look up a descriptor
    pub fn describe(&self, component_type: &str) -> TemplateResult<&ComponentDescriptor> {
        self.index
            .get(component_type)
            .map(|&pos| &self.descriptors[pos])
            .ok_or_else(|| TemplateError::UnknownComponentType(component_type.to_string()))
    }

    pub fn contains(&self, component_type: &str) -> bool {
        self.index.contains_key(component_type)
    }

    /// Fail with `UnknownComponentType` on the first unregistered node type
    /// in `tree`, slots included
    pub fn check_tree(&self, tree: &Node) -> TemplateResult<()> {
        let mut unknown = None;
        tree.walk(&mut |node| {
            if unknown.is_none() && !self.contains(&node.component_type) {
                unknown = Some(node.component_type.clone());
            }
        });
        if let Some(component_type) = unknown {
            return Err(TemplateError::UnknownComponentType(component_type));
        }
        self.check_contents(tree)
    }

    /// Component type that fills the slots of `owner`, if it has one
    pub fn slot_item_type(&self, owner: &str) -> Option<&str> {
        self.descriptors
            .iter()
            .find(|d| d.slot_of.as_deref() == Some(owner))
            .map(|d| d.component_type.as_str())
    }

    /// Check that `node` and its subtree may sit below the root: as a child
    /// when `slot_owner` is `None`, otherwise in a slot of a `slot_owner` node.
    pub fn check_placement(&self, node: &Node, slot_owner: Option<&str>) -> TemplateResult<()> {
        let descriptor = self.describe(&node.component_type)?;
        if descriptor.component_type == ROOT_COMPONENT {
            return Err(TemplateError::InvalidPosition(format!(
                "'{}' can only be the template root",
                ROOT_COMPONENT
            )));
        }

        if let Some(home) = descriptor.slot_of.as_deref() {
            if slot_owner != Some(home) {
                return Err(TemplateError::InvalidPosition(format!(
                    "'{}' nodes only live in a '{}' slot",
                    node.component_type, home
                )));
            }
        }
        if let Some(owner) = slot_owner {
            match self.slot_item_type(owner) {
                Some(item) if item != node.component_type => {
                    return Err(TemplateError::InvalidPosition(format!(
                        "'{}' slots only hold '{}' nodes",
                        owner, item
                    )));
                }
                _ => {}
            }
        }

        self.check_contents(node)
    }

    fn check_contents(&self, node: &Node) -> TemplateResult<()> {
        let descriptor = self.describe(&node.component_type)?;
        if !node.children.is_empty() && !descriptor.container {
            return Err(TemplateError::InvalidPosition(format!(
                "'{}' nodes cannot hold children",
                node.component_type
            )));
        }

        for slot in node.slot_nodes() {
            self.check_placement(slot, Some(&node.component_type))?;
        }
        for child in &node.children {
            self.check_placement(child, None)?;
        }
        Ok(())
    }

    /// Descriptors grouped by category. Categories appear in the order their
    /// first component was registered; components keep registration order.
    pub fn list_by_category(&self) -> Vec<PaletteCategory<'_>> {
        let mut groups: Vec<PaletteCategory<'_>> = Vec::new();
        for descriptor in &self.descriptors {
            match groups
                .iter_mut()
                .find(|g| g.category == descriptor.category)
            {
                Some(group) => group.components.push(descriptor),
                None => groups.push(PaletteCategory {
                    category: &descriptor.category,
                    components: vec![descriptor],
                }),
            }
        }
        groups
    }

    /// Palette listing: only draggable components
    pub fn palette(&self) -> Vec<PaletteCategory<'_>> {
        self.list_by_category()
            .into_iter()
            .filter_map(|mut group| {
                group.components.retain(|d| d.draggable);
                (!group.components.is_empty()).then_some(group)
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_known_and_unknown() {
        let registry = ComponentRegistry::builtin();

        let text = registry.describe("text").unwrap();
        assert_eq!(text.category, "content");
        assert!(text.draggable);
        assert!(!text.container);
        assert_eq!(text.default_properties["content"].as_str(), Some("Write your text here"));

        assert!(matches!(
            registry.describe("carousel"),
            Err(TemplateError::UnknownComponentType(t)) if t == "carousel"
        ));
    }

    #[test]
    fn test_list_by_category_preserves_registration_order() {
        let registry = ComponentRegistry::new([
            ComponentDescriptor::new("b", "second", "i", "B"),
            ComponentDescriptor::new("a", "first", "i", "A"),
            ComponentDescriptor::new("c", "second", "i", "C"),
        ]);

        let groups = registry.list_by_category();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].category, "second");
        let types: Vec<_> = groups[0]
            .components
            .iter()
            .map(|d| d.component_type.as_str())
            .collect();
        assert_eq!(types, vec!["b", "c"]);
        assert_eq!(groups[1].category, "first");
    }

    #[test]
    fn test_duplicate_registration_keeps_position() {
        let registry = ComponentRegistry::new([
            ComponentDescriptor::new("a", "x", "old", "A"),
            ComponentDescriptor::new("b", "x", "i", "B"),
            ComponentDescriptor::new("a", "x", "new", "A"),
        ]);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.describe("a").unwrap().icon, "new");
        assert_eq!(registry.list_by_category()[0].components[0].component_type, "a");
    }

    #[test]
    fn test_palette_hides_root() {
        let registry = ComponentRegistry::builtin();
        assert!(registry.describe(ROOT_COMPONENT).is_ok());

        let palette = registry.palette();
        assert!(palette
            .iter()
            .flat_map(|g| g.components.iter())
            .all(|d| d.component_type != ROOT_COMPONENT));
        assert_eq!(palette[0].category, "layout");
    }

    #[test]
    fn test_check_tree() {
        let registry = ComponentRegistry::builtin();
        let column = Node::new("column").with_child(Node::new("carousel"));
        let tree = Node::new("body")
            .with_child(Node::new("text"))
            .with_child(Node::new("columns").with_property("columns", vec![column]));

        assert!(matches!(
            registry.check_tree(&tree),
            Err(TemplateError::UnknownComponentType(t)) if t == "carousel"
        ));
        assert!(registry
            .check_tree(&Node::new("body").with_child(Node::new("button")))
            .is_ok());
    }

    #[test]
    fn test_check_tree_placement() {
        let registry = ComponentRegistry::builtin();
        let cell = Node::new("column").with_child(Node::new("text"));
        let valid = Node::new("body")
            .with_child(Node::new("columns").with_property("columns", vec![cell.clone()]));
        assert!(registry.check_tree(&valid).is_ok());

        let bad_trees = [
            // Content straight inside the table row
            Node::new("body").with_child(Node::new("columns").with_child(Node::new("text"))),
            // Cell outside its row
            Node::new("body").with_child(cell.clone()),
            Node::new("body").with_child(Node::new("section").with_child(cell.clone())),
            // Row slot holding something other than cells
            Node::new("body").with_child(
                Node::new("columns").with_property("columns", vec![Node::new("text")]),
            ),
            // Cell in another component's slot
            Node::new("body")
                .with_child(Node::new("text").with_property("extra", vec![cell.clone()])),
            // Second email body
            Node::new("body").with_child(Node::new("section").with_child(Node::new("body"))),
            Node::new("body")
                .with_child(Node::new("text").with_property("extra", vec![Node::new("body")])),
        ];
        for tree in &bad_trees {
            assert!(
                matches!(registry.check_tree(tree), Err(TemplateError::InvalidPosition(_))),
                "accepted {tree:?}"
            );
        }
    }

    #[test]
    fn test_slot_item_type() {
        let registry = ComponentRegistry::builtin();
        assert_eq!(registry.slot_item_type("columns"), Some("column"));
        assert_eq!(registry.slot_item_type("section"), None);
        assert!(!registry.describe("columns").unwrap().container);
        assert!(registry
            .palette()
            .iter()
            .flat_map(|g| g.components.iter())
            .all(|d| d.component_type != "column"));
    }
}
