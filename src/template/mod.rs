//! Email template document model.
//!
//! This module provides:
//! - The template and component tree types (`Template`, `Node`, `PropertyValue`)
//! - The component registry that backs the builder palette
//! - Tree mutations with all-or-nothing semantics (insert, move, update, remove)
//! - A pure HTML/CSS renderer for preview and export
//! - Merge variable extraction and sample substitution ({{variable}})
//!
//! # Example
//!
//! ```ignore
//! let registry = ComponentRegistry::builtin();
//! let mut template = NewTemplate::blank("Order shipped", TemplateType::Notification).into_template();
//!
//! let root = template.component_tree.id;
//! let text = template.insert_node(&registry, root, 0, "text")?;
//! template.update_properties(&registry, text, [("content".into(), "Order {{order_id}} shipped".into())].into())?;
//!
//! let output = render(&template, &registry)?;
//! assert_eq!(extract(&template), vec!["order_id"]);
//! ```

mod document;
mod node;
mod registry;
mod render;
mod types;
mod variables;

pub use document::{EditOperation, EditOutcome};
pub use node::{Node, NodeId, Properties, PropertyValue};
pub use registry::{ComponentDescriptor, ComponentRegistry, PaletteCategory};
pub use render::{escape_html, render};
pub use types::{
    blank_tree, next_revision, now, CreatedTemplateResponse, ListFilter, NewTemplate,
    RenderOutput, SortDirection, SortField, SortSpec, Template, TemplateError,
    TemplateErrorInfo, TemplateErrorResponse, TemplateListResponse, TemplateResult,
    TemplateStats, TemplateSummary, TemplateType, VariablesResponse, ROOT_COMPONENT,
};
pub use variables::{extract, extract_from_str, substitute, substitute_template};
