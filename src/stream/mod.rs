//! Input stream driver.
//!
//! Reads a possibly-concatenated or array-wrapped JSON input and yields the
//! items inside. A user-supplied root path (`"records.item"` form, where
//! `item` iterates an array) selects where the items live within each
//! top-level value. Concatenated values stream incrementally; an
//! array-wrapped value is parsed and its entries drained in order.

pub mod detect;

pub use detect::{classify, detect_format, Detection, ItemKind};

use crate::error::StreamError;
use serde_json::{de::IoRead, Deserializer, StreamDeserializer, Value};
use std::collections::VecDeque;
use std::io::BufRead;

const BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

/// One step of a root path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RootSegment {
    /// Descend into an object key.
    Key(String),
    /// Iterate the entries of an array.
    Item,
}

/// Parse a dotted root path, e.g. `records.item`.
pub fn parse_root(root_path: Option<&str>) -> Vec<RootSegment> {
    root_path
        .map(|path| {
            path.split('.')
                .filter(|segment| !segment.is_empty())
                .map(|segment| {
                    if segment == "item" {
                        RootSegment::Item
                    } else {
                        RootSegment::Key(segment.to_string())
                    }
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Decode input bytes per the caller's encoding hint.
///
/// UTF-8 is the only accepted encoding (with or without a byte-order mark);
/// any other hint is rejected up front rather than mis-decoded.
pub fn decode<'a>(bytes: &'a [u8], encoding: Option<&str>) -> Result<&'a str, StreamError> {
    if let Some(hint) = encoding {
        let normalized = hint.to_ascii_lowercase().replace('_', "-");
        if !matches!(normalized.as_str(), "utf-8" | "utf8" | "utf-8-sig") {
            return Err(StreamError::UnsupportedEncoding(hint.to_string()));
        }
    }
    let body = bytes.strip_prefix(&BOM).unwrap_or(bytes);
    std::str::from_utf8(body).map_err(|_| StreamError::Encoding)
}

/// Iterator over the items of a JSON input stream.
///
/// Top-level arrays are unwrapped into their entries; every other top-level
/// value is one item. The root path, when present, is applied to each value
/// (or array entry) to reach the items inside.
pub struct ItemStream<R: BufRead> {
    values: StreamDeserializer<'static, IoRead<R>, Value>,
    root: Vec<RootSegment>,
    queue: VecDeque<Value>,
    index: usize,
    finished: bool,
}

impl<R: BufRead> ItemStream<R> {
    pub fn new(mut reader: R, root_path: Option<&str>) -> Result<ItemStream<R>, StreamError> {
        let buffered = reader.fill_buf()?;
        if buffered.starts_with(&BOM) {
            reader.consume(BOM.len());
        }
        Ok(ItemStream {
            values: Deserializer::from_reader(reader).into_iter(),
            root: parse_root(root_path),
            queue: VecDeque::new(),
            index: 0,
            finished: false,
        })
    }

    fn enqueue(&mut self, value: Value) -> Result<(), StreamError> {
        match value {
            Value::Array(entries) => {
                for entry in entries {
                    self.extract(entry)?;
                }
            }
            other => self.extract(other)?,
        }
        Ok(())
    }

    fn extract(&mut self, value: Value) -> Result<(), StreamError> {
        let mut pending = vec![(value, 0usize)];
        while let Some((value, depth)) = pending.pop() {
            let Some(segment) = self.root.get(depth) else {
                self.queue.push_back(value);
                continue;
            };
            match segment {
                RootSegment::Key(key) => {
                    let child = match value {
                        Value::Object(mut map) => map.remove(key.as_str()),
                        _ => None,
                    };
                    match child {
                        Some(child) => pending.push((child, depth + 1)),
                        None => {
                            return Err(StreamError::RootPathMissing {
                                segment: key.clone(),
                                index: self.index,
                            })
                        }
                    }
                }
                RootSegment::Item => match value {
                    Value::Array(entries) => {
                        // Reversed so the queue drains in input order.
                        for entry in entries.into_iter().rev() {
                            pending.push((entry, depth + 1));
                        }
                    }
                    _ => {
                        return Err(StreamError::RootPathMissing {
                            segment: "item".to_string(),
                            index: self.index,
                        })
                    }
                },
            }
        }
        Ok(())
    }
}

impl<R: BufRead> Iterator for ItemStream<R> {
    type Item = Result<Value, StreamError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.queue.pop_front() {
                self.index += 1;
                return Some(Ok(item));
            }
            if self.finished {
                return None;
            }
            match self.values.next() {
                Some(Ok(value)) => {
                    if let Err(err) = self.enqueue(value) {
                        self.finished = true;
                        return Some(Err(err));
                    }
                }
                Some(Err(source)) => {
                    self.finished = true;
                    return Some(Err(StreamError::Json {
                        index: self.index,
                        source,
                    }));
                }
                None => {
                    self.finished = true;
                    return None;
                }
            }
        }
    }
}
