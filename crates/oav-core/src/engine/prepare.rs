//! The in-place pass that runs before validation: type coercion and the
//! pruning of undeclared properties.

use serde_json::{Map, Value};

use super::coerce;
use super::record::{escape_pointer, pointer_tokens};
use crate::canonical::{AdditionalPolicy, CanonicalSchema, TypedSchema};
use crate::config::{EngineOptions, RemoveAdditional};

/// Whether [`prepare`] can change anything under these options.
pub(crate) fn is_needed(options: &EngineOptions) -> bool {
    options.coerce_types.enabled() || options.remove_additional != RemoveAdditional::Off
}

/// Coerce and prune `value` in place, following `schema`.
///
/// In a union the first member whose shape fits after coercion wins; the
/// other members never touch the instance.
pub(crate) fn prepare(schema: &CanonicalSchema, value: &mut Value, options: &EngineOptions) {
    match schema {
        CanonicalSchema::Any | CanonicalSchema::Not(_) => {}
        CanonicalSchema::Typed(typed) => prepare_typed(typed, value, options),
        CanonicalSchema::AllOf(members) => {
            for member in members {
                prepare(member, value, options);
            }
        }
        CanonicalSchema::AnyOf(members) | CanonicalSchema::OneOf(members) => {
            for member in members {
                let mut candidate = value.clone();
                prepare(member, &mut candidate, options);
                if fits(member, &candidate) {
                    *value = candidate;
                    return;
                }
            }
        }
        CanonicalSchema::Discriminated(d) => {
            let tag = value
                .get(&d.property_name)
                .and_then(Value::as_str)
                .map(str::to_string);
            if let Some(branch) = tag.and_then(|tag| d.branches.get(&tag)) {
                prepare(branch, value, options);
            }
        }
    }
}

/// A shallow check: does the value have a type the node accepts?
fn fits(schema: &CanonicalSchema, value: &Value) -> bool {
    match schema {
        CanonicalSchema::Typed(typed) => {
            typed.types.is_empty() || coerce::matches_any(value, &typed.types)
        }
        CanonicalSchema::AllOf(members) => members.iter().all(|m| fits(m, value)),
        CanonicalSchema::Discriminated(_) => value.is_object(),
        CanonicalSchema::Any
        | CanonicalSchema::AnyOf(_)
        | CanonicalSchema::OneOf(_)
        | CanonicalSchema::Not(_) => true,
    }
}

fn prepare_typed(typed: &TypedSchema, value: &mut Value, options: &EngineOptions) {
    if !typed.types.is_empty() && !coerce::matches_any(value, &typed.types) {
        if let Some(coerced) = coerce::coerce(value, &typed.types, options.coerce_types) {
            *value = coerced;
        }
    }

    match value {
        Value::Array(items) => {
            if let Some(ref schema) = typed.items {
                for item in items {
                    prepare(schema, item, options);
                }
            }
        }
        Value::Object(map) => {
            prune(typed, map, options.remove_additional);
            for (name, schema) in &typed.properties {
                if let Some(prop) = map.get_mut(name) {
                    prepare(schema, prop, options);
                }
            }
            if let AdditionalPolicy::Schema(ref schema) = typed.additional {
                for (name, prop) in map.iter_mut() {
                    if !typed.properties.contains_key(name) {
                        prepare(schema, prop, options);
                    }
                }
            }
        }
        _ => {}
    }
}

/// Drop undeclared properties the mode always removes. Properties that
/// fail an `additionalProperties` schema are removed after validation.
fn prune(typed: &TypedSchema, map: &mut Map<String, Value>, mode: RemoveAdditional) {
    let remove = match (&typed.additional, mode) {
        (_, RemoveAdditional::Off) => false,
        (AdditionalPolicy::Allowed, RemoveAdditional::All) => !typed.properties.is_empty(),
        (AdditionalPolicy::Allowed, _) => false,
        (AdditionalPolicy::Forbidden, _) => true,
        (AdditionalPolicy::Schema(_), RemoveAdditional::All) => true,
        (AdditionalPolicy::Schema(_), _) => false,
    };
    if remove {
        map.retain(|name, _| typed.properties.contains_key(name));
    }
}

/// For an error raised inside an `additionalProperties` schema, the
/// pointer of the object holding the offending property and its name.
pub(crate) fn failing_property(schema_pointer: &str, instance_pointer: &str) -> Option<(String, String)> {
    let tokens: Vec<String> = pointer_tokens(schema_pointer).collect();
    let mut depth = 0;
    let mut found = None;
    let mut i = 0;
    while i < tokens.len() {
        match tokens[i].as_str() {
            "properties" => {
                depth += 1;
                i += 2;
            }
            "items" => {
                depth += 1;
                i += 1;
            }
            "additionalProperties" => {
                if i + 1 < tokens.len() {
                    found = Some(depth);
                }
                depth += 1;
                i += 1;
            }
            "allOf" | "anyOf" | "oneOf" => i += 2,
            _ => i += 1,
        }
    }

    let depth = found?;
    let instance: Vec<String> = pointer_tokens(instance_pointer).collect();
    let key = instance.get(depth)?.clone();
    let parent: String = instance[..depth]
        .iter()
        .map(|token| format!("/{}", escape_pointer(token)))
        .collect();
    Some((parent, key))
}
