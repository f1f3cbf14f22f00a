//! Structural paths: addressing any leaf in a release independent of array order.
//!
//! A structural path alternates object keys and array identity keys. Identity
//! keys are a distinct segment kind so that two releases whose arrays hold the
//! same members in different orders still flatten to the same keys.

use serde_json::Value;
use std::borrow::Borrow;
use std::fmt;

/// Identity carried by an id-keyed array entry.
///
/// Disclosure data uses both string and integer ids; both compare and hash by
/// value so `{"id": "x"}` flattens to the same key regardless of position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IdValue {
    String(String),
    Integer(i64),
}

impl IdValue {
    /// Read an identity from a JSON `id` value. Non-scalar and fractional ids
    /// do not qualify as identities.
    pub fn from_value(value: &Value) -> Option<IdValue> {
        match value {
            Value::String(s) => Some(IdValue::String(s.clone())),
            Value::Number(n) => n.as_i64().map(IdValue::Integer),
            _ => None,
        }
    }

    /// The JSON value to emit as the entry's `id` field when unflattening.
    pub fn to_value(&self) -> Value {
        match self {
            IdValue::String(s) => Value::String(s.clone()),
            IdValue::Integer(n) => Value::Number((*n).into()),
        }
    }
}

impl fmt::Display for IdValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdValue::String(s) => write!(f, "{}", s),
            IdValue::Integer(n) => write!(f, "{}", n),
        }
    }
}

/// One step in a structural path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Segment {
    /// Object key.
    Key(String),
    /// Identity key of an array entry that carries an `id`.
    Id(IdValue),
    /// Positional identity for array entries without an `id`.
    Index(usize),
}

impl Segment {
    pub fn key<S: Into<String>>(name: S) -> Segment {
        Segment::Key(name.into())
    }

    /// True for array identity keys (either form).
    pub fn is_identity(&self) -> bool {
        !matches!(self, Segment::Key(_))
    }
}

/// A structural path: a sequence of alternating object keys and array
/// identity keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path(Vec<Segment>);

impl Path {
    pub fn new() -> Path {
        Path(Vec::new())
    }

    pub fn from_segments(segments: Vec<Segment>) -> Path {
        Path(segments)
    }

    /// Path with a single object key, e.g. the top-level `ocid`.
    pub fn root_key(name: &str) -> Path {
        Path(vec![Segment::key(name)])
    }

    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    pub fn push(&mut self, segment: Segment) {
        self.0.push(segment);
    }

    pub fn pop(&mut self) -> Option<Segment> {
        self.0.pop()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> Option<&Segment> {
        self.0.last()
    }

    pub fn starts_with(&self, prefix: &[Segment]) -> bool {
        self.0.starts_with(prefix)
    }

    /// Object keys only, identity keys skipped. This is the field path used
    /// for merge-rule lookups, e.g. `parties[(1)].name` -> `["parties","name"]`.
    pub fn field_names(&self) -> Vec<&str> {
        self.0
            .iter()
            .filter_map(|segment| match segment {
                Segment::Key(k) => Some(k.as_str()),
                _ => None,
            })
            .collect()
    }

    /// True when the path addresses the `id` field of an id-keyed array entry.
    /// Such ids are the entry's identity and stay scalar in versioned output.
    pub fn is_entry_id(&self) -> bool {
        let n = self.0.len();
        if n < 2 {
            return false;
        }
        matches!(&self.0[n - 1], Segment::Key(k) if k == "id")
            && self.0[n - 2].is_identity()
    }
}

impl Borrow<[Segment]> for Path {
    fn borrow(&self) -> &[Segment] {
        &self.0
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                Segment::Key(k) => {
                    if i > 0 {
                        write!(f, ".")?;
                    }
                    write!(f, "{}", k)?;
                }
                Segment::Id(id) => write!(f, "[{}]", id)?,
                Segment::Index(n) => write!(f, "[{}]", n)?,
            }
        }
        Ok(())
    }
}
