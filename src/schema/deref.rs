//! In-place resolution of internal schema references.
//!
//! Inlines `#/definitions/...` references so the walker can descend through
//! them, keeping the original `$ref` string beside the inlined keywords so
//! the nearest enclosing definition remains recoverable. URL references and
//! reference cycles are left as bare `$ref` nodes, which the walker treats
//! as opaque.

use serde_json::{Map, Value};

const DEFINITIONS_PREFIX: &str = "#/definitions/";

/// Resolve every internal reference in `schema` in place.
pub fn dereference(schema: &mut Value) {
    let definitions = match schema.get("definitions") {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    };
    let mut active = Vec::new();
    resolve(schema, &definitions, &mut active);
}

/// The definition name an inlined node was resolved from, if any.
pub fn definition_name(node: &Value) -> Option<&str> {
    node.get("$ref")
        .and_then(Value::as_str)
        .and_then(|target| target.strip_prefix(DEFINITIONS_PREFIX))
        // A bare `$ref` is an unresolved reference, not an inlined definition.
        .filter(|_| node.as_object().map_or(false, |map| map.len() > 1))
}

fn resolve(node: &mut Value, definitions: &Map<String, Value>, active: &mut Vec<String>) {
    match node {
        Value::Object(map) => {
            let target = map
                .get("$ref")
                .and_then(Value::as_str)
                .and_then(|t| t.strip_prefix(DEFINITIONS_PREFIX))
                .map(str::to_owned);

            if let Some(name) = target {
                if active.iter().any(|seen| *seen == name) {
                    // Cycle: leave the bare reference for the walker to skip.
                    return;
                }
                let definition = match definitions.get(&name) {
                    Some(Value::Object(def)) => def.clone(),
                    // Unknown or non-object target, including URL references.
                    _ => return,
                };
                // Keys declared beside the reference override the definition.
                let original = std::mem::take(map);
                let mut inlined = Map::with_capacity(original.len() + definition.len());
                inlined.insert(
                    "$ref".to_string(),
                    Value::String(format!("{}{}", DEFINITIONS_PREFIX, name)),
                );
                for (key, value) in original {
                    if key != "$ref" {
                        inlined.insert(key, value);
                    }
                }
                for (key, value) in definition {
                    inlined.entry(key).or_insert(value);
                }
                *map = inlined;

                active.push(name);
                for (key, value) in map.iter_mut() {
                    if key != "$ref" {
                        resolve(value, definitions, active);
                    }
                }
                active.pop();
            } else {
                for value in map.values_mut() {
                    resolve(value, definitions, active);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                resolve(item, definitions, active);
            }
        }
        _ => {}
    }
}
