//! HTML serialization of live subtrees, with consistent escaping
use crate::errors::ReconcilerError;
use crate::live::{LiveDom, LiveId, LiveKind, LiveNode};
use phf::{phf_map, phf_set};
use serde_json::Value;
use std::collections::BTreeMap;

// Raw properties that surface as attributes in markup
static REFLECTED_PROPERTIES: phf::Map<&'static str, &'static str> = phf_map! {
    "className" => "class",
    "htmlFor" => "for",
    "id" => "id",
    "title" => "title",
    "value" => "value",
    "checked" => "checked",
    "disabled" => "disabled",
    "selected" => "selected",
    "placeholder" => "placeholder",
    "href" => "href",
    "src" => "src",
    "alt" => "alt",
    "type" => "type",
    "name" => "name",
    "tabIndex" => "tabindex",
};

static VOID_ELEMENTS: phf::Set<&'static str> = phf_set! {
    "area", "base", "br", "col", "embed", "hr", "img", "input",
    "link", "meta", "source", "track", "wbr",
};

/// Consistent HTML attribute escaping
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

fn text_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// `None` means the attribute is omitted, `Some("")` renders it bare.
fn reflected_value(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::Bool(true) => Some(String::new()),
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

/// Attributes in sorted order. Explicit attributes win over reflected
/// properties of the same name.
fn collect_attributes(node: &LiveNode) -> BTreeMap<String, String> {
    let mut attrs = BTreeMap::new();
    for (key, value) in &node.props {
        if let Some(name) = REFLECTED_PROPERTIES.get(key.as_str()) {
            if let Some(rendered) = reflected_value(value) {
                attrs.insert(name.to_string(), rendered);
            }
        }
    }
    for (key, ns) in &node.attrs_ns {
        attrs.insert(key.clone(), ns.value.clone());
    }
    for (key, value) in &node.attrs {
        attrs.insert(key.clone(), value.clone());
    }
    if !node.styles.is_empty() {
        let inline: Vec<String> = node.styles.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
        attrs.insert("style".to_string(), inline.join("; "));
    }
    attrs
}

/// Serialize the live subtree rooted at `id`.
pub fn to_html(dom: &LiveDom, id: LiveId) -> Result<String, ReconcilerError> {
    let mut out = String::new();
    write_node(dom, id, &mut out)?;
    Ok(out)
}

fn write_node(dom: &LiveDom, id: LiveId, out: &mut String) -> Result<(), ReconcilerError> {
    let node = dom.node(id)?;
    match &node.kind {
        LiveKind::Text(text) => out.push_str(&text_escape(text)),
        LiveKind::Element { tag, .. } => {
            out.push('<');
            out.push_str(tag);
            for (key, value) in collect_attributes(node) {
                if value.is_empty() {
                    out.push_str(&format!(" {}", html_escape(&key)));
                } else {
                    out.push_str(&format!(r#" {}="{}""#, html_escape(&key), html_escape(&value)));
                }
            }
            out.push('>');

            if VOID_ELEMENTS.contains(tag.as_str()) && node.children().is_empty() {
                return Ok(());
            }
            for &child in node.children() {
                write_node(dom, child, out)?;
            }
            out.push_str(&format!("</{}>", tag));
        }
    }
    Ok(())
}
