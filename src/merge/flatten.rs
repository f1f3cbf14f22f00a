//! Release flattening: identity-keyed path-to-leaf maps.
//!
//! Flattening turns one release into a mapping from structural path to leaf
//! value so that later merges by identity become equality of keys. The
//! inverse rebuilds a nested release from an insertion-ordered accumulator,
//! with array entries emitted in first-appearance order.

use crate::error::MergeWarning;
use crate::merge::path::{IdValue, Path, Segment};
use crate::schema::rules::MergeRules;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::collections::HashSet;

/// A flattened release: structural path to leaf value, in traversal order.
pub type Flattened = IndexMap<Path, Value>;

/// Flatten one release into its structural-path representation.
///
/// Arrays annotated `wholeListMerge`, and arrays containing any non-object
/// entry, are recorded whole. Empty objects and arrays are stored as empty
/// leaves to preserve presence. Duplicate `id`s within one array are
/// reported as warnings; the later entry's fields win.
pub fn flatten(release: &Value, rules: &MergeRules, warnings: &mut Vec<MergeWarning>) -> Flattened {
    let mut out = Flattened::new();
    let release_id = release
        .get("id")
        .map(render_scalar)
        .unwrap_or_default();
    if let Value::Object(map) = release {
        let mut path = Path::new();
        for (key, value) in map {
            path.push(Segment::key(key));
            walk_value(value, &mut path, rules, &mut out, warnings, &release_id);
            path.pop();
        }
    }
    out
}

fn walk_value(
    value: &Value,
    path: &mut Path,
    rules: &MergeRules,
    out: &mut Flattened,
    warnings: &mut Vec<MergeWarning>,
    release_id: &str,
) {
    match value {
        Value::Object(map) if map.is_empty() => {
            out.insert(path.clone(), Value::Object(Map::new()));
        }
        Value::Object(map) => {
            for (key, child) in map {
                path.push(Segment::key(key));
                walk_value(child, path, rules, out, warnings, release_id);
                path.pop();
            }
        }
        Value::Array(entries) => {
            walk_array(entries, path, rules, out, warnings, release_id);
        }
        leaf => {
            out.insert(path.clone(), leaf.clone());
        }
    }
}

fn walk_array(
    entries: &[Value],
    path: &mut Path,
    rules: &MergeRules,
    out: &mut Flattened,
    warnings: &mut Vec<MergeWarning>,
    release_id: &str,
) {
    if entries.is_empty() {
        out.insert(path.clone(), Value::Array(Vec::new()));
        return;
    }

    let field_names = path.field_names();
    if rules.is_whole_list(&field_names) || entries.iter().any(|entry| !entry.is_object()) {
        out.insert(path.clone(), Value::Array(entries.to_vec()));
        return;
    }

    let mut seen: HashSet<IdValue> = HashSet::new();
    for (position, entry) in entries.iter().enumerate() {
        let identity = entry.get("id").and_then(IdValue::from_value);
        match identity {
            Some(id) => {
                if !seen.insert(id.clone()) {
                    let warning = MergeWarning::DuplicateId {
                        path: path.to_string(),
                        release_id: release_id.to_string(),
                        id: id.to_string(),
                    };
                    tracing::warn!(target: "ocdsmeld::merge", "{}", warning);
                    warnings.push(warning);
                }
                path.push(Segment::Id(id));
            }
            None => path.push(Segment::Index(position)),
        }
        walk_value(entry, path, rules, out, warnings, release_id);
        path.pop();
    }
}

fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Intermediate tree used while unflattening.
enum Node {
    Leaf(Value),
    Object(IndexMap<String, Node>),
    Array(IndexMap<Segment, Node>),
}

/// Rebuild a nested release from an accumulated flattening.
///
/// Array entries whose identity carries an `id` get the `id` emitted as a
/// field; positional entries get none. Entry order is first appearance.
pub fn unflatten(entries: Flattened) -> Value {
    let mut root = Node::Object(IndexMap::new());
    for (path, value) in entries {
        insert(&mut root, path.segments(), value);
    }
    render(root, None)
}

fn insert(node: &mut Node, segments: &[Segment], value: Value) {
    let Some((head, rest)) = segments.split_first() else {
        *node = Node::Leaf(value);
        return;
    };

    // A previously recorded empty container (or null) upgrades to a subtree;
    // the accumulator has already rejected genuine type collisions.
    let wanted_object = matches!(head, Segment::Key(_));
    let needs_reset = match (&*node, wanted_object) {
        (Node::Leaf(_), _) => true,
        (Node::Object(_), false) => true,
        (Node::Array(_), true) => true,
        _ => false,
    };
    if needs_reset {
        *node = if wanted_object {
            Node::Object(IndexMap::new())
        } else {
            Node::Array(IndexMap::new())
        };
    }

    match (node, head) {
        (Node::Object(children), Segment::Key(key)) => {
            let child = children
                .entry(key.clone())
                .or_insert_with(|| placeholder(rest));
            insert(child, rest, value);
        }
        (Node::Array(children), identity) => {
            let child = children
                .entry(identity.clone())
                .or_insert_with(|| placeholder(rest));
            insert(child, rest, value);
        }
        // Unreachable: the reset above aligned the node kind with the segment.
        _ => {}
    }
}

fn placeholder(rest: &[Segment]) -> Node {
    match rest.first() {
        None => Node::Leaf(Value::Null),
        Some(Segment::Key(_)) => Node::Object(IndexMap::new()),
        Some(_) => Node::Array(IndexMap::new()),
    }
}

fn render(node: Node, identity: Option<&Segment>) -> Value {
    match node {
        Node::Leaf(value) => value,
        Node::Object(children) => {
            let mut map = Map::with_capacity(children.len() + 1);
            if let Some(Segment::Id(id)) = identity {
                // The identity doubles as the entry's `id` field.
                map.insert("id".to_string(), id.to_value());
            }
            for (key, child) in children {
                // Re-inserting `id` keeps its leading position.
                map.insert(key, render(child, None));
            }
            Value::Object(map)
        }
        Node::Array(children) => Value::Array(
            children
                .into_iter()
                .map(|(segment, child)| render(child, Some(&segment)))
                .collect(),
        ),
    }
}
