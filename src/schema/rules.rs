//! Per-merge strategy map derived from a schema walk.
//!
//! Built once per merge and indexed by the field path (object keys only,
//! array identities stripped) for O(1) lookup during flattening.

use crate::schema::walker::FieldWalker;
use serde_json::Value;
use std::collections::HashSet;

/// Merge strategies annotated on schema fields.
///
/// Honours the current annotations (`omitWhenMerged`, `wholeListMerge`,
/// `versionId`) and the older `mergeStrategy` spellings (`ocdsOmit`,
/// `ocdsVersion`). Arrays whose `items` cannot hold objects are whole-list
/// by rule.
#[derive(Debug, Clone, Default)]
pub struct MergeRules {
    omit: HashSet<String>,
    whole_list: HashSet<String>,
    versioned_id: HashSet<String>,
}

impl MergeRules {
    /// No annotations: every field overwrites, every object array id-merges.
    pub fn empty() -> MergeRules {
        MergeRules::default()
    }

    /// Derive the strategy map from a dereferenced release schema.
    pub fn from_schema(schema: &Value) -> MergeRules {
        let mut rules = MergeRules::default();
        for field in FieldWalker::new(schema) {
            let key = field.path.join("/");
            let subschema = field.schema;

            if flag(subschema, "omitWhenMerged") || merge_strategy(subschema, "ocdsOmit") {
                rules.omit.insert(key.clone());
            }
            if flag(subschema, "wholeListMerge")
                || merge_strategy(subschema, "ocdsVersion")
                || non_object_array(subschema)
            {
                rules.whole_list.insert(key.clone());
            }
            if flag(subschema, "versionId") {
                rules.versioned_id.insert(key);
            }
        }
        rules
    }

    /// Whether the field, or any enclosing field, is dropped from compiled
    /// output. Omission on an object covers its whole subtree.
    pub fn is_omitted(&self, field_names: &[&str]) -> bool {
        if self.omit.is_empty() {
            return false;
        }
        let mut key = String::new();
        for (i, name) in field_names.iter().enumerate() {
            if i > 0 {
                key.push('/');
            }
            key.push_str(name);
            if self.omit.contains(&key) {
                return true;
            }
        }
        false
    }

    /// Whether the array at this field is treated as an opaque atomic value.
    pub fn is_whole_list(&self, field_names: &[&str]) -> bool {
        !self.whole_list.is_empty() && self.whole_list.contains(&field_names.join("/"))
    }

    /// Whether an array-entry `id` at this field is versioned like an
    /// ordinary value instead of staying scalar.
    pub fn is_versioned_id(&self, field_names: &[&str]) -> bool {
        !self.versioned_id.is_empty() && self.versioned_id.contains(&field_names.join("/"))
    }
}

fn flag(subschema: &Value, annotation: &str) -> bool {
    subschema.get(annotation).and_then(Value::as_bool) == Some(true)
}

fn merge_strategy(subschema: &Value, strategy: &str) -> bool {
    subschema.get("mergeStrategy").and_then(Value::as_str) == Some(strategy)
}

/// True for array fields whose `items` type excludes objects; those arrays
/// cannot be id-merged and are replaced whole.
fn non_object_array(subschema: &Value) -> bool {
    if !type_includes(subschema, "array") {
        return false;
    }
    let Some(items) = subschema.get("items") else {
        return false;
    };
    if items.get("properties").is_some() {
        return false;
    }
    match items.get("type") {
        Some(_) => !type_includes(items, "object"),
        None => false,
    }
}

fn type_includes(subschema: &Value, wanted: &str) -> bool {
    match subschema.get("type") {
        Some(Value::String(t)) => t == wanted,
        Some(Value::Array(types)) => types.iter().any(|t| t.as_str() == Some(wanted)),
        _ => false,
    }
}
