//! Payload assembler
//!
//! Translates a resolved value map into the sparse JSON body for one API
//! endpoint. The single rule that makes partial updates work on the wire:
//!
//! | explicitly set | value is zero | action |
//! |---|---|---|
//! | no | – | omit the field |
//! | yes | no | emit the value |
//! | yes | yes | emit the value and list the field in `forceSendFields` |
//!
//! `forceSendFields` carries Go-style exported names (`summaryOverride` →
//! `SummaryOverride`), matching the upstream contract. Substructures follow
//! the same rule recursively and are allocated only when at least one of
//! their leaves is explicitly set or non-zero; each nesting level carries its
//! own force list.

use serde_json::{Map, Value};

use crate::bind::ValueMap;
use crate::error::{Error, Result};
use crate::flags::FlagValue;

/// A sparse request body under construction
#[derive(Debug, Default)]
pub struct Payload {
    body: Map<String, Value>,
    force: Vec<String>,
}

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies the omit / emit / emit-with-force rule for one leaf field
    ///
    /// `field` is the wire name; `flag` is the bound flag identifier.
    pub fn set(&mut self, field: &str, values: &ValueMap, flag: &str) {
        let Some(resolved) = values.get(flag) else { return };
        let zero = resolved.value.is_zero();
        if !resolved.explicit && zero {
            return;
        }
        self.body
            .insert(field.to_string(), flag_value_to_json(&resolved.value));
        if resolved.explicit && zero {
            self.force.push(force_name(field));
        }
    }

    /// Emits a field unconditionally with an already-built JSON value
    ///
    /// Used for fields the assembler derives (base64 file contents, composite
    /// sub-objects) rather than binds directly.
    pub fn set_value(&mut self, field: &str, value: Value) {
        self.body.insert(field.to_string(), value);
    }

    /// Emits a completed substructure if it is non-empty
    pub fn set_object(&mut self, field: &str, sub: Payload) {
        if !sub.is_empty() {
            self.body.insert(field.to_string(), sub.into_value());
        }
    }

    /// Emits a list of completed substructures if any survived assembly
    pub fn set_object_list(&mut self, field: &str, subs: Vec<Payload>) {
        let rendered: Vec<Value> = subs
            .into_iter()
            .filter(|s| !s.is_empty())
            .map(Payload::into_value)
            .collect();
        if !rendered.is_empty() {
            self.body.insert(field.to_string(), Value::Array(rendered));
        }
    }

    /// Adds a force-send entry for a field emitted via `set_value`
    pub fn force_field(&mut self, field: &str) {
        self.force.push(force_name(field));
    }

    /// True when nothing was emitted and no clear was requested
    pub fn is_empty(&self) -> bool {
        self.body.is_empty() && self.force.is_empty()
    }

    /// Finalizes the payload, injecting `forceSendFields` when non-empty
    pub fn into_value(self) -> Value {
        let mut body = self.body;
        if !self.force.is_empty() {
            body.insert(
                "forceSendFields".to_string(),
                Value::Array(self.force.into_iter().map(Value::String).collect()),
            );
        }
        Value::Object(body)
    }
}

/// Go-style exported name used inside `forceSendFields`
fn force_name(field: &str) -> String {
    let mut chars = field.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

fn flag_value_to_json(value: &FlagValue) -> Value {
    match value {
        FlagValue::Str(s) => Value::String(s.clone()),
        FlagValue::Bool(b) => Value::Bool(*b),
        FlagValue::Int(n) => Value::Number((*n).into()),
        FlagValue::Int64(n) => Value::Number((*n).into()),
        FlagValue::StrList(v) => {
            Value::Array(v.iter().cloned().map(Value::String).collect())
        }
    }
}

/// Validates an enumeration-valued field against its allowed set
///
/// Cross-field and enum checks belong to assembly, not binding: the binder
/// only knows kinds, the assembler knows the endpoint contract.
pub fn check_enum(field: &str, value: &str, allowed: &[&str]) -> Result<()> {
    if allowed.contains(&value) {
        return Ok(());
    }
    Err(Error::InvalidInvocation(format!(
        "field {} must be one of {:?}, got {:?}",
        field, allowed, value
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn force_name_capitalizes_first_letter_only() {
        assert_eq!(force_name("summaryOverride"), "SummaryOverride");
        assert_eq!(force_name("x"), "X");
        assert_eq!(force_name(""), "");
    }
}
