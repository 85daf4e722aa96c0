//! Fact tables: the non-child properties of an element, grouped by category.
use crate::events::{Decoder, Handler};
use indexmap::IndexMap;
use phf::phf_set;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Raw properties that can drift from the snapshot through user input, so the
/// differ always re-sends them.
static LIVE_PROPERTIES: phf::Set<&'static str> = phf_set! {
    "value",
    "checked",
};

/// Lowercased; property names are matched case-insensitively.
static UNSAFE_PROPERTIES: phf::Set<&'static str> = phf_set! {
    "innerhtml",
    "outerhtml",
    "formaction",
};

/// One unorganized fact, as produced by view code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum Fact {
    Event { name: String, handler: Handler },
    Style { key: String, value: String },
    Property { key: String, value: Value },
    Attribute { key: String, value: String },
    AttributeNs { namespace: String, key: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NsValue {
    pub namespace: String,
    pub value: String,
}

/// Organized facts for one node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Facts {
    pub events: IndexMap<String, Handler>,
    pub styles: IndexMap<String, String>,
    pub props: IndexMap<String, Value>,
    pub attrs: IndexMap<String, String>,
    pub attrs_ns: IndexMap<String, NsValue>,
}

fn add_class(classes: Option<&mut String>, new_class: &str) -> Option<String> {
    match classes {
        Some(existing) => {
            existing.push(' ');
            existing.push_str(new_class);
            None
        }
        None => Some(new_class.to_string()),
    }
}

impl Facts {
    /// Build the table from an unordered fact list. Later duplicates win,
    /// except the `class` attribute and `className` property, which are
    /// space-joined in input order.
    pub fn organize(facts: impl IntoIterator<Item = Fact>) -> Facts {
        let mut table = Facts::default();
        for fact in facts {
            match fact {
                Fact::Event { name, handler } => {
                    table.events.insert(name, handler);
                }
                Fact::Style { key, value } => {
                    table.styles.insert(key, value);
                }
                Fact::Property { key, value } => {
                    if key == "className" {
                        if let Value::String(class) = &value {
                            let merged = match table.props.get_mut(&key) {
                                Some(Value::String(existing)) => add_class(Some(existing), class),
                                _ => add_class(None, class),
                            };
                            if let Some(fresh) = merged {
                                table.props.insert(key, Value::String(fresh));
                            }
                            continue;
                        }
                    }
                    table.props.insert(key, value);
                }
                Fact::Attribute { key, value } => {
                    if key == "class" {
                        if let Some(fresh) = add_class(table.attrs.get_mut(&key), &value) {
                            table.attrs.insert(key, fresh);
                        }
                        continue;
                    }
                    table.attrs.insert(key, value);
                }
                Fact::AttributeNs { namespace, key, value } => {
                    table.attrs_ns.insert(key, NsValue { namespace, value });
                }
            }
        }
        table
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
            && self.styles.is_empty()
            && self.props.is_empty()
            && self.attrs.is_empty()
            && self.attrs_ns.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NsChange {
    pub namespace: String,
    pub value: Option<String>,
}

/// Changes between two fact tables. `None` marks a removal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FactsDiff {
    pub events: IndexMap<String, Option<Handler>>,
    pub styles: IndexMap<String, Option<String>>,
    pub props: IndexMap<String, Value>,
    pub attrs: IndexMap<String, Option<String>>,
    pub attrs_ns: IndexMap<String, NsChange>,
}

impl FactsDiff {
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
            && self.styles.is_empty()
            && self.props.is_empty()
            && self.attrs.is_empty()
            && self.attrs_ns.is_empty()
    }

    /// Number of individual fact changes.
    pub fn len(&self) -> usize {
        self.events.len() + self.styles.len() + self.props.len() + self.attrs.len() + self.attrs_ns.len()
    }
}

/// A fresh render applies every fact as an addition.
impl From<&Facts> for FactsDiff {
    fn from(facts: &Facts) -> Self {
        FactsDiff {
            events: facts.events.iter().map(|(k, h)| (k.clone(), Some(h.clone()))).collect(),
            styles: facts.styles.iter().map(|(k, v)| (k.clone(), Some(v.clone()))).collect(),
            props: facts.props.clone(),
            attrs: facts.attrs.iter().map(|(k, v)| (k.clone(), Some(v.clone()))).collect(),
            attrs_ns: facts
                .attrs_ns
                .iter()
                .map(|(k, ns)| (k.clone(), NsChange { namespace: ns.namespace.clone(), value: Some(ns.value.clone()) }))
                .collect(),
        }
    }
}

fn diff_category<V: PartialEq + Clone, D>(
    old: &IndexMap<String, V>,
    new: &IndexMap<String, V>,
    out: &mut IndexMap<String, D>,
    removed: impl Fn(&V) -> D,
    changed: impl Fn(&V) -> D,
    always_resend: impl Fn(&str) -> bool,
) {
    for (key, old_value) in old {
        match new.get(key) {
            None => {
                out.insert(key.clone(), removed(old_value));
            }
            Some(new_value) => {
                if old_value != new_value || always_resend(key) {
                    out.insert(key.clone(), changed(new_value));
                }
            }
        }
    }
    for (key, new_value) in new {
        if !old.contains_key(key) {
            out.insert(key.clone(), changed(new_value));
        }
    }
}

/// Compare two fact tables. Handlers are equal when they have the same kind
/// and structurally equal decoders; `Handler`'s `PartialEq` is exactly that.
pub fn diff_facts(old: &Facts, new: &Facts) -> Option<FactsDiff> {
    let mut diff = FactsDiff::default();
    diff_category(&old.events, &new.events, &mut diff.events, |_| None, |h| Some(h.clone()), |_| false);
    diff_category(&old.styles, &new.styles, &mut diff.styles, |_| None, |v| Some(v.clone()), |_| false);
    diff_category(
        &old.props,
        &new.props,
        &mut diff.props,
        |old_value| match old_value {
            Value::String(_) => Value::String(String::new()),
            _ => Value::Null,
        },
        Value::clone,
        |key| LIVE_PROPERTIES.contains(key),
    );
    diff_category(&old.attrs, &new.attrs, &mut diff.attrs, |_| None, |v| Some(v.clone()), |_| false);
    diff_category(
        &old.attrs_ns,
        &new.attrs_ns,
        &mut diff.attrs_ns,
        |ns| NsChange { namespace: ns.namespace.clone(), value: None },
        |ns| NsChange { namespace: ns.namespace.clone(), value: Some(ns.value.clone()) },
        |_| false,
    );
    if diff.is_empty() { None } else { Some(diff) }
}

/// Hosts treat attribute names case-insensitively, so `ONCLICK` counts too.
fn no_on_or_form_action(key: &str) -> String {
    let lower = key.to_ascii_lowercase();
    if lower.starts_with("on") || lower == "formaction" {
        format!("data-{key}")
    } else {
        key.to_string()
    }
}

fn no_script_uri(value: &str) -> String {
    let probe: String = value.chars().filter(|c| !c.is_whitespace()).collect::<String>().to_ascii_lowercase();
    if probe.starts_with("javascript:") || probe.starts_with("data:text/html") {
        String::new()
    } else {
        value.to_string()
    }
}

// ===== Sanitizing constructors =====

pub fn on(name: impl Into<String>, handler: Handler) -> Fact {
    Fact::Event { name: name.into(), handler }
}

/// Shorthand for a `Normal` handler that always produces `message`.
pub fn on_message(name: impl Into<String>, message: Value) -> Fact {
    on(name, Handler::Normal(Decoder::Succeed(message)))
}

pub fn style(key: impl Into<String>, value: impl Into<String>) -> Fact {
    Fact::Style { key: key.into(), value: value.into() }
}

/// String values are screened like attribute values, since reflected
/// properties (`href`, `src`) reach the host as attributes.
pub fn property(key: &str, value: Value) -> Fact {
    let key = if UNSAFE_PROPERTIES.contains(key.to_ascii_lowercase().as_str()) {
        format!("data-{key}")
    } else {
        key.to_string()
    };
    let value = match value {
        Value::String(s) => Value::String(no_script_uri(&s)),
        other => other,
    };
    Fact::Property { key, value }
}

pub fn attribute(key: &str, value: &str) -> Fact {
    Fact::Attribute { key: no_on_or_form_action(key), value: no_script_uri(value) }
}

pub fn attribute_ns(namespace: &str, key: &str, value: &str) -> Fact {
    Fact::AttributeNs { namespace: namespace.to_string(), key: no_on_or_form_action(key), value: no_script_uri(value) }
}

pub fn class(name: &str) -> Fact {
    attribute("class", name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn class_attributes_concatenate() {
        let facts = Facts::organize(vec![class("b"), attribute("id", "x"), class("a")]);
        assert_eq!(facts.attrs.get("class").map(String::as_str), Some("b a"));
        assert_eq!(facts.attrs.get("id").map(String::as_str), Some("x"));
    }

    #[test]
    fn class_name_properties_concatenate() {
        let facts = Facts::organize(vec![property("className", json!("b")), property("className", json!("a"))]);
        assert_eq!(facts.props.get("className"), Some(&json!("b a")));
    }

    #[test]
    fn later_duplicates_overwrite() {
        let facts = Facts::organize(vec![style("color", "red"), style("color", "blue"), attribute("id", "1"), attribute("id", "2")]);
        assert_eq!(facts.styles.get("color").map(String::as_str), Some("blue"));
        assert_eq!(facts.attrs.get("id").map(String::as_str), Some("2"));
    }

    #[test]
    fn diff_reports_added_changed_removed() {
        let old = Facts::organize(vec![style("color", "red"), attribute("title", "t"), property("hidden", json!(true))]);
        let new = Facts::organize(vec![style("color", "blue"), attribute("lang", "en")]);
        let diff = diff_facts(&old, &new).unwrap();
        assert_eq!(diff.styles.get("color"), Some(&Some("blue".to_string())));
        assert_eq!(diff.attrs.get("title"), Some(&None));
        assert_eq!(diff.attrs.get("lang"), Some(&Some("en".to_string())));
        assert_eq!(diff.props.get("hidden"), Some(&Value::Null));
        assert_eq!(diff.len(), 4);
    }

    #[test]
    fn removed_string_property_becomes_empty() {
        let old = Facts::organize(vec![property("title", json!("x"))]);
        let diff = diff_facts(&old, &Facts::default()).unwrap();
        assert_eq!(diff.props.get("title"), Some(&json!("")));
    }

    #[test]
    fn equal_handlers_produce_no_diff() {
        let old = Facts::organize(vec![on_message("click", json!("go"))]);
        let new = Facts::organize(vec![on_message("click", json!("go"))]);
        assert!(diff_facts(&old, &new).is_none());
    }

    #[test]
    fn value_property_is_always_resent() {
        let old = Facts::organize(vec![property("value", json!("typed"))]);
        let new = Facts::organize(vec![property("value", json!("typed"))]);
        let diff = diff_facts(&old, &new).unwrap();
        assert_eq!(diff.props.get("value"), Some(&json!("typed")));
    }

    #[test]
    fn constructors_strip_script_vectors() {
        assert_eq!(attribute("onclick", "alert(1)"), Fact::Attribute { key: "data-onclick".into(), value: "alert(1)".into() });
        assert_eq!(attribute("href", " JavaScript:alert(1)"), Fact::Attribute { key: "href".into(), value: String::new() });
        assert_eq!(property("innerHTML", json!("<b>")), Fact::Property { key: "data-innerHTML".into(), value: json!("<b>") });
    }

    #[test]
    fn sanitizing_ignores_key_case() {
        assert_eq!(attribute("ONCLICK", "steal()"), Fact::Attribute { key: "data-ONCLICK".into(), value: "steal()".into() });
        assert_eq!(attribute("OnMouseOver", "x()"), Fact::Attribute { key: "data-OnMouseOver".into(), value: "x()".into() });
        assert_eq!(attribute("FormAction", "/go"), Fact::Attribute { key: "data-FormAction".into(), value: "/go".into() });
        assert_eq!(attribute("HREF", "javascript:alert(1)"), Fact::Attribute { key: "HREF".into(), value: String::new() });
        assert_eq!(
            attribute_ns("http://www.w3.org/1999/xlink", "xlink:HREF", "JAVASCRIPT:alert(1)"),
            Fact::AttributeNs { namespace: "http://www.w3.org/1999/xlink".into(), key: "xlink:HREF".into(), value: String::new() }
        );
        assert_eq!(property("OUTERHTML", json!("<i>")), Fact::Property { key: "data-OUTERHTML".into(), value: json!("<i>") });
    }

    #[test]
    fn script_uris_are_blanked_in_every_value() {
        assert_eq!(property("href", json!("javascript:alert(2)")), Fact::Property { key: "href".into(), value: json!("") });
        assert_eq!(attribute("data-link", "data:text/html,<script>"), Fact::Attribute { key: "data-link".into(), value: String::new() });
        assert_eq!(property("title", json!("plain")), Fact::Property { key: "title".into(), value: json!("plain") });
        assert_eq!(property("tabIndex", json!(2)), Fact::Property { key: "tabIndex".into(), value: json!(2) });
    }
}
