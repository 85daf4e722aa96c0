//! JSON bridges for hosts that drive the engine over a wire.
use crate::errors::ReconcilerError;
use crate::facts::Fact;
use crate::live::Mutation;
use serde_json::Value;

/// Parse a JSON array of facts, e.g.
/// `[{"category": "style", "key": "color", "value": "red"}]`.
///
/// Facts go through the same sanitizing constructors as view code, so a host
/// cannot smuggle an `onclick` attribute or a `javascript:` URI past them.
pub fn facts_from_json(value: &Value) -> Result<Vec<Fact>, ReconcilerError> {
    let raw: Vec<Fact> = serde_json::from_value(value.clone())?;
    Ok(raw.into_iter().map(sanitize).collect())
}

fn sanitize(fact: Fact) -> Fact {
    match fact {
        Fact::Property { key, value } => crate::facts::property(&key, value),
        Fact::Attribute { key, value } => crate::facts::attribute(&key, &value),
        Fact::AttributeNs { namespace, key, value } => crate::facts::attribute_ns(&namespace, &key, &value),
        other => other,
    }
}

/// Serialize a mutation journal for replay on the host side.
pub fn mutations_to_json(mutations: &[Mutation]) -> Result<String, ReconcilerError> {
    Ok(serde_json::to_string(mutations)?)
}
