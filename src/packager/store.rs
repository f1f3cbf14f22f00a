//! Grouping stores: ocid-keyed collection of releases.
//!
//! The packager appends `(ocid, source uri, release)` rows as it consumes
//! the input stream and later iterates them back grouped by ocid, in
//! ascending ocid order. Two implementations: an in-memory map for ordinary
//! inputs, and an ephemeral sled tree for streams that do not fit in memory.
//! Neither leaks into the merger's interface.

use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One grouped release with the uri of the package it arrived in, if any.
#[derive(Debug, Clone)]
pub struct Row {
    pub uri: Option<String>,
    pub release: Value,
}

/// All rows for one ocid.
#[derive(Debug, Clone)]
pub struct Group {
    pub ocid: String,
    pub rows: Vec<Row>,
}

/// Abstraction over the grouping backends.
pub trait GroupStore {
    type Groups: Iterator<Item = Result<Group, StoreError>>;

    fn append(&mut self, ocid: &str, uri: Option<&str>, release: &Value) -> Result<(), StoreError>;

    /// Consume the store and iterate its groups in ascending ocid order.
    fn into_groups(self) -> Result<Self::Groups, StoreError>;
}

/// In-memory grouping store.
#[derive(Debug, Default)]
pub struct MemoryGroupStore {
    groups: BTreeMap<String, Vec<Row>>,
}

impl MemoryGroupStore {
    pub fn new() -> MemoryGroupStore {
        MemoryGroupStore::default()
    }
}

impl GroupStore for MemoryGroupStore {
    type Groups = MemoryGroups;

    fn append(&mut self, ocid: &str, uri: Option<&str>, release: &Value) -> Result<(), StoreError> {
        self.groups.entry(ocid.to_string()).or_default().push(Row {
            uri: uri.map(str::to_owned),
            release: release.clone(),
        });
        Ok(())
    }

    fn into_groups(self) -> Result<MemoryGroups, StoreError> {
        Ok(MemoryGroups(self.groups.into_iter()))
    }
}

pub struct MemoryGroups(std::collections::btree_map::IntoIter<String, Vec<Row>>);

impl Iterator for MemoryGroups {
    type Item = Result<Group, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        let (ocid, rows) = self.0.next()?;
        Some(Ok(Group { ocid, rows }))
    }
}

/// Row encoding for the on-disk store.
#[derive(Serialize, Deserialize)]
struct StoredRow {
    uri: Option<String>,
    release: String,
}

/// Grouping store backed by an ephemeral sled tree.
///
/// Rows are keyed by `ocid ++ 0x00 ++ big-endian sequence`, so sled's own
/// key order yields groups in ascending ocid order with input order
/// preserved inside each group; no separate index pass is needed. The tree
/// is opened temporary with background flushing disabled: it is scratch
/// space, deleted when the handle drops on every exit path, including an
/// abandoned output iterator.
pub struct SledGroupStore {
    db: sled::Db,
    sequence: u64,
}

impl SledGroupStore {
    pub fn new() -> Result<SledGroupStore, StoreError> {
        let db = sled::Config::new()
            .temporary(true)
            .flush_every_ms(None)
            .open()?;
        Ok(SledGroupStore { db, sequence: 0 })
    }
}

impl GroupStore for SledGroupStore {
    type Groups = SledGroups;

    fn append(&mut self, ocid: &str, uri: Option<&str>, release: &Value) -> Result<(), StoreError> {
        let mut key = Vec::with_capacity(ocid.len() + 9);
        key.extend_from_slice(ocid.as_bytes());
        key.push(0);
        key.extend_from_slice(&self.sequence.to_be_bytes());
        self.sequence += 1;

        let row = StoredRow {
            uri: uri.map(str::to_owned),
            release: serde_json::to_string(release)?,
        };
        self.db.insert(key, bincode::serialize(&row)?)?;
        Ok(())
    }

    fn into_groups(self) -> Result<SledGroups, StoreError> {
        let iter = self.db.iter();
        Ok(SledGroups {
            iter,
            pending: None,
            _db: self.db,
        })
    }
}

pub struct SledGroups {
    iter: sled::Iter,
    pending: Option<Group>,
    // Keeps the temporary tree alive until iteration stops; dropping it
    // removes the scratch directory.
    _db: sled::Db,
}

impl Iterator for SledGroups {
    type Item = Result<Group, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (key, value) = match self.iter.next() {
                Some(Ok(entry)) => entry,
                Some(Err(err)) => return Some(Err(err.into())),
                None => return self.pending.take().map(Ok),
            };

            let ocid_len = key.len().saturating_sub(9);
            let ocid = String::from_utf8_lossy(&key[..ocid_len]).into_owned();
            let row = match decode_row(&value) {
                Ok(row) => row,
                Err(err) => return Some(Err(err)),
            };

            match self.pending.take() {
                Some(mut group) if group.ocid == ocid => {
                    group.rows.push(row);
                    self.pending = Some(group);
                }
                Some(finished) => {
                    self.pending = Some(Group {
                        ocid,
                        rows: vec![row],
                    });
                    return Some(Ok(finished));
                }
                None => {
                    self.pending = Some(Group {
                        ocid,
                        rows: vec![row],
                    });
                }
            }
        }
    }
}

fn decode_row(bytes: &[u8]) -> Result<Row, StoreError> {
    let stored: StoredRow = bincode::deserialize(bytes)?;
    Ok(Row {
        uri: stored.uri,
        release: serde_json::from_str(&stored.release)?,
    })
}
