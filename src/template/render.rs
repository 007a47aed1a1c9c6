//! HTML/CSS rendering of a component tree.
//!
//! Rendering is a pure function of the template and the registry: output is
//! built in local buffers and only returned once the whole tree rendered, so
//! an unknown component type yields an error and no partial email.

use std::fmt::Write as _;

use super::node::{Node, PropertyValue};
use super::registry::ComponentRegistry;
use super::types::{RenderOutput, Template, TemplateResult};

/// Stylesheet emitted ahead of the per-node rules
const BASE_CSS: &str = "\
body { margin: 0; padding: 0; }
.mt-body { width: 100%; }
.mt-container { margin: 0 auto; border-collapse: collapse; }
.mt-section, .mt-columns { border-collapse: collapse; }
.mt-column { vertical-align: top; }
.mt-text, .mt-heading { margin: 0; }
.mt-image { display: block; border: 0; max-width: 100%; }
.mt-button { display: inline-block; text-decoration: none; padding: 10px 20px; border-radius: 4px; }
.mt-divider { border: 0; border-top-style: solid; }
.mt-footer { font-size: 12px; color: #888888; text-align: center; }
";

/// Properties that map onto CSS declarations, with their CSS names
const STYLE_PROPERTIES: &[(&str, &str)] = &[
    ("align", "text-align"),
    ("backgroundColor", "background-color"),
    ("borderRadius", "border-radius"),
    ("color", "color"),
    ("fontFamily", "font-family"),
    ("fontSize", "font-size"),
    ("fontWeight", "font-weight"),
    ("height", "height"),
    ("lineHeight", "line-height"),
    ("margin", "margin"),
    ("padding", "padding"),
    ("textAlign", "text-align"),
];

/// Render a template to HTML and CSS
pub fn render(template: &Template, registry: &ComponentRegistry) -> TemplateResult<RenderOutput> {
    let mut renderer = Renderer {
        registry,
        html: String::new(),
        css: String::from(BASE_CSS),
    };
    renderer.node(&template.component_tree)?;

    Ok(RenderOutput {
        html: renderer.html,
        css: renderer.css,
    })
}

struct Renderer<'a> {
    registry: &'a ComponentRegistry,
    html: String,
    css: String,
}

impl Renderer<'_> {
    /// Pre-order: a node's opening markup and CSS rule, then its slot nodes,
    /// then its children, then its closing markup.
    fn node(&mut self, node: &Node) -> TemplateResult<()> {
        self.registry.describe(&node.component_type)?;

        self.rule(node);
        let (open, close) = fragments(node);
        self.html.push_str(&open);

        for slot in node.slot_nodes() {
            self.node(slot)?;
        }
        for child in &node.children {
            self.node(child)?;
        }

        self.html.push_str(&close);
        Ok(())
    }

    fn rule(&mut self, node: &Node) {
        let declarations: Vec<String> = node
            .properties
            .iter()
            .filter_map(|(key, value)| {
                let css_name = STYLE_PROPERTIES
                    .iter()
                    .find(|(prop, _)| *prop == key.as_str())
                    .map(|(_, css)| *css)?;
                let value = value.to_scalar_string()?;
                let value = css_value(&value)?;
                Some(format!("{}: {};", css_name, value))
            })
            .collect();

        if !declarations.is_empty() {
            let _ = writeln!(
                self.css,
                "#mt-{} {{ {} }}",
                node.id,
                declarations.join(" ")
            );
        }
    }
}

/// Opening and closing markup for a node
fn fragments(node: &Node) -> (String, String) {
    let id = format!("mt-{}", node.id);
    let text = |key: &str| escape_html(node.property_str(key).unwrap_or_default());
    let attr = |key: &str| {
        node.properties
            .get(key)
            .and_then(PropertyValue::to_scalar_string)
            .map(|v| escape_html(&v))
            .unwrap_or_default()
    };
    let url = |key: &str| {
        node.properties
            .get(key)
            .and_then(PropertyValue::to_scalar_string)
            .filter(|v| is_safe_url(v))
            .map(|v| escape_html(&v))
            .unwrap_or_default()
    };

    match node.component_type.as_str() {
        "body" => (
            format!(
                "<div class=\"mt-body\" id=\"{}\">\n<table role=\"presentation\" class=\"mt-container\" \
                 align=\"center\" width=\"{}\" cellpadding=\"0\" cellspacing=\"0\" border=\"0\">\n<tr><td>\n",
                id,
                non_empty(attr("width"), "600")
            ),
            "</td></tr>\n</table>\n</div>\n".to_string(),
        ),
        "section" => (
            format!(
                "<table role=\"presentation\" class=\"mt-section\" id=\"{}\" width=\"100%\" \
                 cellpadding=\"0\" cellspacing=\"0\" border=\"0\"><tr><td>\n",
                id
            ),
            "</td></tr></table>\n".to_string(),
        ),
        "columns" => (
            format!(
                "<table role=\"presentation\" class=\"mt-columns\" id=\"{}\" width=\"100%\" \
                 cellpadding=\"0\" cellspacing=\"0\" border=\"0\"><tr>\n",
                id
            ),
            "</tr></table>\n".to_string(),
        ),
        "column" => (
            format!(
                "<td class=\"mt-column\" id=\"{}\" valign=\"top\" width=\"{}\">\n",
                id,
                non_empty(attr("width"), "50%")
            ),
            "</td>\n".to_string(),
        ),
        "divider" => (
            format!(
                "<hr class=\"mt-divider\" id=\"{}\" style=\"border-top-color: {}; border-top-width: {};\">\n",
                id,
                non_empty(attr("color"), "#dddddd"),
                non_empty(attr("thickness"), "1px")
            ),
            String::new(),
        ),
        "spacer" => (
            format!("<div class=\"mt-spacer\" id=\"{}\">&nbsp;</div>\n", id),
            String::new(),
        ),
        "heading" => {
            let level = node
                .properties
                .get("level")
                .and_then(|v| match v {
                    PropertyValue::Number(n) => n.as_u64(),
                    PropertyValue::String(s) => s.parse().ok(),
                    _ => None,
                })
                .unwrap_or(1)
                .clamp(1, 6);
            (
                format!(
                    "<h{} class=\"mt-heading\" id=\"{}\">{}</h{}>\n",
                    level,
                    id,
                    text("content"),
                    level
                ),
                String::new(),
            )
        }
        "text" => (
            format!(
                "<p class=\"mt-text\" id=\"{}\">{}</p>\n",
                id,
                text("content").replace('\n', "<br>\n")
            ),
            String::new(),
        ),
        "image" => {
            let img = format!(
                "<img class=\"mt-image\" id=\"{}\" src=\"{}\" alt=\"{}\" width=\"{}\">",
                id,
                url("src"),
                attr("alt"),
                non_empty(attr("width"), "100%")
            );
            let href = url("href");
            let markup = if href.is_empty() {
                format!("{}\n", img)
            } else {
                format!("<a href=\"{}\">{}</a>\n", href, img)
            };
            (markup, String::new())
        }
        "button" => (
            format!(
                "<a class=\"mt-button\" id=\"{}\" href=\"{}\">{}</a>\n",
                id,
                non_empty(url("href"), "#"),
                text("label")
            ),
            String::new(),
        ),
        "html" => {
            let mut raw = node.property_str("content").unwrap_or_default().to_string();
            if !raw.is_empty() && !raw.ends_with('\n') {
                raw.push('\n');
            }
            (raw, String::new())
        }
        "social" => {
            let links: Vec<String> = [
                ("facebook", "Facebook"),
                ("twitter", "Twitter"),
                ("instagram", "Instagram"),
                ("linkedin", "LinkedIn"),
            ]
            .iter()
            .filter_map(|(key, label)| {
                let href = url(*key);
                (!href.is_empty()).then(|| format!("<a href=\"{}\">{}</a>", href, label))
            })
            .collect();
            (
                format!(
                    "<p class=\"mt-social\" id=\"{}\">{}</p>\n",
                    id,
                    links.join(" | ")
                ),
                String::new(),
            )
        }
        "footer" => {
            let unsubscribe = url("unsubscribeUrl");
            let mut markup = format!(
                "<div class=\"mt-footer\" id=\"{}\">\n<p>{}</p>\n",
                id,
                text("content")
            );
            if !unsubscribe.is_empty() {
                let _ = writeln!(markup, "<p><a href=\"{}\">Unsubscribe</a></p>", unsubscribe);
            }
            (markup, "</div>\n".to_string())
        }
        // Registered component without dedicated markup
        other => (
            format!(
                "<div class=\"mt-{}\" id=\"{}\">\n",
                escape_html(other),
                id
            ),
            "</div>\n".to_string(),
        ),
    }
}

fn non_empty(value: String, fallback: &str) -> String {
    if value.is_empty() {
        fallback.to_string()
    } else {
        value
    }
}

/// Links and image sources may be relative, `{{var}}` placeholders, or use
/// the http, https or mailto schemes
fn is_safe_url(value: &str) -> bool {
    // Browsers ignore whitespace and control characters inside a scheme
    let cleaned: String = value
        .chars()
        .filter(|c| !c.is_ascii_whitespace() && !c.is_control())
        .collect();
    match cleaned.find([':', '/', '?', '#']) {
        Some(i) if cleaned[i..].starts_with(':') => {
            let scheme = cleaned[..i].to_ascii_lowercase();
            matches!(scheme.as_str(), "http" | "https" | "mailto")
        }
        _ => true,
    }
}

/// Reject values that could break out of a declaration block
fn css_value(value: &str) -> Option<&str> {
    let value = value.trim();
    if value.is_empty() || value.contains(['{', '}', ';', '<', '>']) {
        None
    } else {
        Some(value)
    }
}

/// Escape text for HTML content and double-quoted attributes
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
