//! Schema-field traversal.
//!
//! Enumerates every data-bearing path in a release schema together with the
//! metadata the merger, schema reports, and mapping sheets consume. Traversal
//! is lazy and deterministic: fields come out in the insertion order of each
//! `properties` object, parents before children.

use crate::schema::deref::definition_name;
use serde_json::Value;
use std::collections::HashSet;

/// One data-bearing location in a release schema.
#[derive(Debug, Clone)]
pub struct Field<'a> {
    /// Pointer into the schema, e.g. `["properties","tender","properties","id"]`.
    pub pointer: Vec<String>,
    /// Path in data, e.g. `["tender","id"]`. Array nesting adds no segment.
    pub path: Vec<String>,
    /// Nearest enclosing definition, e.g. `["definitions","Organization"]`;
    /// empty for fields declared directly on the root schema.
    pub definition_pointer: Vec<String>,
    /// Whether the key is listed in the enclosing `required` array.
    pub required: bool,
    /// The `deprecated` block, inherited from the parent when the parent is
    /// deprecated and the field does not override it.
    pub deprecated: Option<&'a Value>,
    /// Whether a language-suffix pattern property shadows this field.
    pub multilingual: bool,
    /// The subschema at this location.
    pub schema: &'a Value,
}

struct Level<'a> {
    entries: serde_json::map::Iter<'a>,
    path: Vec<String>,
    pointer: Vec<String>,
    definition_pointer: Vec<String>,
    deprecated: Option<&'a Value>,
    required: HashSet<&'a str>,
    multilingual: HashSet<String>,
}

impl<'a> Level<'a> {
    /// A nesting level for an object subschema, or `None` when the node has
    /// no `properties` to descend into (including unresolved references,
    /// which stay opaque).
    fn from_node(
        node: &'a Value,
        path: Vec<String>,
        pointer: Vec<String>,
        inherited_definition: Vec<String>,
        inherited_deprecated: Option<&'a Value>,
    ) -> Option<Level<'a>> {
        let object = node.as_object()?;
        let properties = object.get("properties")?.as_object()?;

        let required = object
            .get("required")
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        let multilingual = object
            .get("patternProperties")
            .and_then(Value::as_object)
            .map(|patterns| patterns.keys().filter_map(|p| language_base(p)).collect())
            .unwrap_or_default();

        let definition_pointer = match definition_name(node) {
            Some(name) => vec!["definitions".to_string(), name.to_string()],
            None => inherited_definition,
        };

        Some(Level {
            entries: properties.iter(),
            path,
            pointer,
            definition_pointer,
            deprecated: inherited_deprecated,
            required,
            multilingual,
        })
    }
}

/// Lazy iterator over the fields of a dereferenced release schema.
pub struct FieldWalker<'a> {
    stack: Vec<Level<'a>>,
    pending: Vec<Level<'a>>,
}

impl<'a> FieldWalker<'a> {
    /// Walk the fields reachable from the schema root.
    pub fn new(schema: &'a Value) -> FieldWalker<'a> {
        let mut stack = Vec::new();
        if let Some(root) = Level::from_node(schema, Vec::new(), Vec::new(), Vec::new(), None) {
            stack.push(root);
        }
        FieldWalker {
            stack,
            pending: Vec::new(),
        }
    }

    /// Walk the root fields, then each entry under `definitions` as its own
    /// root. Definition fields carry paths relative to their definition.
    pub fn with_definitions(schema: &'a Value) -> FieldWalker<'a> {
        let mut walker = FieldWalker::new(schema);
        if let Some(definitions) = schema.get("definitions").and_then(Value::as_object) {
            let mut pending: Vec<Level<'a>> = definitions
                .iter()
                .filter_map(|(name, definition)| {
                    let pointer = vec!["definitions".to_string(), name.clone()];
                    Level::from_node(definition, Vec::new(), pointer.clone(), pointer, None)
                })
                .collect();
            // Popped back-to-front once the root stack drains.
            pending.reverse();
            walker.pending = pending;
        }
        walker
    }
}

impl<'a> Iterator for FieldWalker<'a> {
    type Item = Field<'a>;

    fn next(&mut self) -> Option<Field<'a>> {
        loop {
            let Some(level) = self.stack.last_mut() else {
                match self.pending.pop() {
                    Some(next_root) => {
                        self.stack.push(next_root);
                        continue;
                    }
                    None => return None,
                }
            };

            let Some((name, subschema)) = level.entries.next() else {
                self.stack.pop();
                continue;
            };

            let mut pointer = level.pointer.clone();
            pointer.push("properties".to_string());
            pointer.push(name.clone());

            let mut path = level.path.clone();
            path.push(name.clone());

            let deprecated = subschema.get("deprecated").or(level.deprecated);
            let field = Field {
                pointer: pointer.clone(),
                path: path.clone(),
                definition_pointer: level.definition_pointer.clone(),
                required: level.required.contains(name.as_str()),
                deprecated,
                multilingual: level.multilingual.contains(name.as_str()),
                schema: subschema,
            };
            let parent_definition = level.definition_pointer.clone();

            let child = if subschema.get("properties").is_some() {
                Level::from_node(subschema, path, pointer, parent_definition, deprecated)
            } else if let Some(items) = subschema.get("items") {
                let mut items_pointer = pointer;
                items_pointer.push("items".to_string());
                // Fields below `items` inherit the array item's definition.
                Level::from_node(items, path, items_pointer, parent_definition, deprecated)
            } else {
                None
            };
            if let Some(child) = child {
                self.stack.push(child);
            }

            return Some(field);
        }
    }
}

/// Recognise the multilingual language-suffix pattern `^<base>_(...)$` and
/// extract the base property name.
fn language_base(pattern: &str) -> Option<String> {
    let inner = pattern.strip_prefix('^')?.strip_suffix('$')?;
    let (base, suffix) = inner.split_once("_(")?;
    if base.is_empty() || !base.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    if !suffix.ends_with(')') {
        return None;
    }
    Some(base.to_string())
}
