//! Merge variable discovery and sample substitution.
//!
//! Placeholders look like `{{identifier}}`; anything that does not match the
//! pattern is ordinary text and is ignored.

use std::collections::HashSet;

use lazy_static::lazy_static;
use regex::{Captures, Regex};

use super::node::PropertyValue;
use super::types::Template;

lazy_static! {
    static ref PLACEHOLDER: Regex =
        Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_.\-]*)\s*\}\}").expect("placeholder pattern");
}

/// Variable names used by a template, de-duplicated in first-seen order.
///
/// The subject is scanned first, then every string property of every node in
/// pre-order (slots before children). Never fails.
pub fn extract(template: &Template) -> Vec<String> {
    let mut found = VariableSet::default();

    if let Some(subject) = &template.subject {
        found.scan(subject);
    }
    template.component_tree.walk(&mut |node| {
        for value in node.properties.values() {
            if let PropertyValue::String(s) = value {
                found.scan(s);
            }
        }
    });

    found.names
}

/// Variable names found in a single string, in order of appearance
pub fn extract_from_str(text: &str) -> Vec<String> {
    let mut found = VariableSet::default();
    found.scan(text);
    found.names
}

#[derive(Default)]
struct VariableSet {
    names: Vec<String>,
    seen: HashSet<String>,
}

impl VariableSet {
    fn scan(&mut self, text: &str) {
        for caps in PLACEHOLDER.captures_iter(text) {
            let name = &caps[1];
            if !self.seen.contains(name) {
                self.seen.insert(name.to_string());
                self.names.push(name.to_string());
            }
        }
    }
}

/// Replace `{{name}}` placeholders whose name has a value in `variables`.
/// Unknown placeholders are left in place.
pub fn substitute(
    text: &str,
    variables: &serde_json::Map<String, serde_json::Value>,
) -> String {
    PLACEHOLDER
        .replace_all(text, |caps: &Captures<'_>| match variables.get(&caps[1]) {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(serde_json::Value::Number(n)) => n.to_string(),
            Some(serde_json::Value::Bool(b)) => b.to_string(),
            Some(serde_json::Value::Null) => String::new(),
            // For arrays and objects, use JSON representation
            Some(value) => value.to_string(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Copy of `template` with every string property and the subject substituted
pub fn substitute_template(
    template: &Template,
    variables: &serde_json::Map<String, serde_json::Value>,
) -> Template {
    fn visit(
        node: &mut super::node::Node,
        variables: &serde_json::Map<String, serde_json::Value>,
    ) {
        for value in node.properties.values_mut() {
            match value {
                PropertyValue::String(s) => *s = substitute(s, variables),
                PropertyValue::Nodes(nodes) => {
                    for slot in nodes {
                        visit(slot, variables);
                    }
                }
                _ => {}
            }
        }
        for child in &mut node.children {
            visit(child, variables);
        }
    }

    let mut merged = template.clone();
    merged.subject = merged.subject.map(|s| substitute(&s, variables));
    visit(&mut merged.component_tree, variables);
    merged
}
