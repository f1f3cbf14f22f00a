//! Format detection without full parsing.
//!
//! Classifies a document by inspecting its first item only, so detection
//! works on a prefix of a stream and does not depend on the rest being
//! well-formed.

use crate::error::StreamError;
use crate::stream::{decode, parse_root, RootSegment};
use serde_json::{Deserializer, Value};
use std::fmt;

/// The closed set of disclosure shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Release,
    Record,
    ReleasePackage,
    RecordPackage,
    CompiledRelease,
    VersionedRelease,
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ItemKind::Release => "release",
            ItemKind::Record => "record",
            ItemKind::ReleasePackage => "release package",
            ItemKind::RecordPackage => "record package",
            ItemKind::CompiledRelease => "compiled release",
            ItemKind::VersionedRelease => "versioned release",
        };
        write!(f, "{}", name)
    }
}

/// What a byte stream holds and how its items are framed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detection {
    pub kind: ItemKind,
    /// More than one top-level value follows the first.
    pub is_concatenated: bool,
    /// The top-level value is a JSON array of items.
    pub is_array: bool,
}

/// Detect the format of a document from its bytes, inspecting only the
/// first item. `root_path` selects where the items live inside each value.
pub fn detect_format(bytes: &[u8], root_path: Option<&str>) -> Result<Detection, StreamError> {
    let text = decode(bytes, None)?;
    let body = text.trim_start();
    if body.is_empty() {
        return Err(StreamError::Empty);
    }

    let is_array = body.starts_with('[');
    let (first, is_concatenated) = if is_array {
        let inner = &body[1..];
        if inner.trim_start().starts_with(']') {
            return Err(StreamError::Empty);
        }
        (first_value(inner)?.0, false)
    } else {
        let (value, offset) = first_value(body)?;
        let rest = body[offset..].trim_start();
        (value, !rest.is_empty())
    };

    let root = parse_root(root_path);
    let item = select_root(&first, &root)?;

    Ok(Detection {
        kind: classify(item, 0)?,
        is_concatenated,
        is_array,
    })
}

/// Classify one already-parsed item.
pub fn classify(value: &Value, index: usize) -> Result<ItemKind, StreamError> {
    let Some(object) = value.as_object() else {
        return Err(StreamError::UnrecognizedShape { index });
    };
    if object.contains_key("records") {
        Ok(ItemKind::RecordPackage)
    } else if object.contains_key("ocid") && object.contains_key("releases") {
        Ok(ItemKind::Record)
    } else if object.contains_key("releases") {
        Ok(ItemKind::ReleasePackage)
    } else if let Some(tag) = object.get("tag").and_then(Value::as_array) {
        if tag.iter().any(|entry| entry.as_str() == Some("compiled")) {
            Ok(ItemKind::CompiledRelease)
        } else {
            Ok(ItemKind::Release)
        }
    } else if object.contains_key("ocid") {
        // Versioned releases keep only the ocid scalar at the top level.
        Ok(ItemKind::VersionedRelease)
    } else {
        Err(StreamError::UnrecognizedShape { index })
    }
}

fn first_value(text: &str) -> Result<(Value, usize), StreamError> {
    let mut stream = Deserializer::from_str(text).into_iter::<Value>();
    match stream.next() {
        Some(Ok(value)) => {
            let offset = stream.byte_offset();
            Ok((value, offset))
        }
        Some(Err(source)) => Err(StreamError::Json { index: 0, source }),
        None => Err(StreamError::Empty),
    }
}

fn select_root<'a>(value: &'a Value, root: &[RootSegment]) -> Result<&'a Value, StreamError> {
    let mut current = value;
    for segment in root {
        current = match segment {
            RootSegment::Key(key) => current.get(key).ok_or_else(|| {
                StreamError::RootPathMissing {
                    segment: key.clone(),
                    index: 0,
                }
            })?,
            RootSegment::Item => current
                .as_array()
                .and_then(|entries| entries.first())
                .ok_or_else(|| StreamError::RootPathMissing {
                    segment: "item".to_string(),
                    index: 0,
                })?,
        };
    }
    Ok(current)
}
