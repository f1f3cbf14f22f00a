//! Compiled and versioned merge products.
//!
//! The merger collapses the releases of one process into a latest-value-wins
//! compiled release and a history-preserving versioned release. Both walk
//! the same flattening; they differ in how a leaf update lands in the
//! accumulator.

use crate::error::{MergeError, MergeWarning};
use crate::merge::flatten::{flatten, unflatten, Flattened};
use crate::merge::path::{Path, Segment};
use crate::schema::rules::MergeRules;
use indexmap::IndexMap;
use serde_json::{json, Map, Value};
use std::collections::HashMap;

/// A merge product together with the warnings gathered while producing it.
#[derive(Debug, Clone)]
pub struct Merged {
    pub value: Value,
    pub warnings: Vec<MergeWarning>,
}

/// Merges the releases of one process.
pub struct Merger {
    rules: MergeRules,
    lenient: bool,
}

impl Merger {
    pub fn new(rules: MergeRules) -> Merger {
        Merger {
            rules,
            lenient: false,
        }
    }

    /// Demote per-group type collisions to warnings, the later release
    /// winning, instead of failing the group.
    pub fn with_lenient(mut self, lenient: bool) -> Merger {
        self.lenient = lenient;
        self
    }

    pub fn rules(&self) -> &MergeRules {
        &self.rules
    }

    /// Produce the compiled release: the latest-value-wins projection.
    ///
    /// Releases are ordered by `date` (stable, so equal dates keep input
    /// order). Fields annotated `omitWhenMerged` are dropped, and the
    /// release-level `id`, `date` and `tag` are re-derived: the compiled
    /// release is tagged `compiled`, dated from the latest input, and
    /// identified as `{ocid}-{date}`.
    pub fn compiled(&self, releases: &[Value]) -> Result<Merged, MergeError> {
        let mut warnings = Vec::new();
        let ordered = sort_by_date(releases, &mut warnings);
        if ordered.is_empty() {
            return Ok(Merged {
                value: Value::Object(Map::new()),
                warnings,
            });
        }

        let ocid = ordered
            .iter()
            .find_map(|release| release.get("ocid").and_then(Value::as_str))
            .ok_or(MergeError::MissingOcid { index: 0 })?
            .to_string();

        let mut acc = Accumulator::new(self.lenient);
        for release in &ordered {
            let release_label = label(release);
            for (path, value) in flatten(release, &self.rules, &mut warnings) {
                if is_release_identity(&path) {
                    continue;
                }
                if self.rules.is_omitted(&path.field_names()) {
                    continue;
                }
                acc.put_leaf(path, value, &release_label, &mut warnings)?;
            }
        }

        let date = ordered
            .last()
            .and_then(|release| release.get("date").and_then(Value::as_str))
            .unwrap_or("")
            .to_string();
        acc.put_leaf(Path::root_key("tag"), json!(["compiled"]), "", &mut warnings)?;
        acc.put_leaf(
            Path::root_key("id"),
            Value::String(format!("{}-{}", ocid, date)),
            "",
            &mut warnings,
        )?;
        acc.put_leaf(Path::root_key("date"), Value::String(date), "", &mut warnings)?;

        Ok(Merged {
            value: unflatten(acc.into_entries()),
            warnings,
        })
    }

    /// Produce the versioned release: per-field history with consecutive
    /// duplicates suppressed.
    ///
    /// `ocid` stays scalar, as do array-entry `id`s (they carry the array
    /// identity) unless the schema marks them `versionId`. Fields annotated
    /// `omitWhenMerged` are retained; history is preserved.
    pub fn versioned(&self, releases: &[Value]) -> Result<Merged, MergeError> {
        let mut warnings = Vec::new();
        let ordered = sort_by_date(releases, &mut warnings);
        if ordered.is_empty() {
            return Ok(Merged {
                value: Value::Object(Map::new()),
                warnings,
            });
        }

        let mut acc = Accumulator::new(self.lenient);
        for release in &ordered {
            let release_label = label(release);
            let release_id = release.get("id").cloned().unwrap_or(Value::Null);
            let release_date = release.get("date").cloned().unwrap_or(Value::Null);
            let release_tag = release.get("tag").cloned().unwrap_or(Value::Null);

            for (path, value) in flatten(release, &self.rules, &mut warnings) {
                if is_root_key(&path, "ocid") {
                    acc.put_leaf(path, value, &release_label, &mut warnings)?;
                    continue;
                }
                if path.is_entry_id() && !self.rules.is_versioned_id(&path.field_names()) {
                    acc.put_leaf(path, value, &release_label, &mut warnings)?;
                    continue;
                }
                let record = json!({
                    "releaseID": release_id.clone(),
                    "releaseDate": release_date.clone(),
                    "releaseTag": release_tag.clone(),
                    "value": value,
                });
                acc.append_history(path, record, &release_label, &mut warnings)?;
            }
        }

        Ok(Merged {
            value: unflatten(acc.into_entries()),
            warnings,
        })
    }
}

/// Top-level `id`, `date` and `tag` are per-release identifiers; the
/// compiled form re-derives them.
fn is_release_identity(path: &Path) -> bool {
    path.len() == 1
        && matches!(
            path.last(),
            Some(Segment::Key(key)) if key == "id" || key == "date" || key == "tag"
        )
}

fn is_root_key(path: &Path, name: &str) -> bool {
    path.len() == 1 && matches!(path.last(), Some(Segment::Key(key)) if key == name)
}

fn label(release: &Value) -> String {
    match release.get("id") {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

fn date_of(release: &Value) -> &str {
    release.get("date").and_then(Value::as_str).unwrap_or("")
}

/// Order releases by date, ascending and stable. Lexicographic comparison is
/// correct for Z-normalised RFC 3339 timestamps; releases without a usable
/// date sort first and are reported.
fn sort_by_date<'a>(releases: &'a [Value], warnings: &mut Vec<MergeWarning>) -> Vec<&'a Value> {
    let mut ordered: Vec<&Value> = releases.iter().collect();
    for release in &ordered {
        if !has_usable_date(release) {
            let warning = MergeWarning::UndatedRelease {
                release_id: label(release),
            };
            tracing::warn!(target: "ocdsmeld::merge", "{}", warning);
            warnings.push(warning);
        }
    }
    ordered.sort_by(|a, b| date_of(a).cmp(date_of(b)));
    ordered
}

fn has_usable_date(release: &Value) -> bool {
    match release.get("date").and_then(Value::as_str) {
        Some(date) => {
            chrono::DateTime::parse_from_rfc3339(date).is_ok()
                || chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d").is_ok()
        }
        None => false,
    }
}

enum Slot {
    Leaf(Value),
    History(Vec<Value>),
}

/// Insertion-ordered accumulator with leaf/subtree collision tracking.
struct Accumulator {
    entries: IndexMap<Path, Slot>,
    /// Count of entries strictly below each path; a positive count means the
    /// path is currently a subtree.
    below: HashMap<Path, usize>,
    lenient: bool,
}

impl Accumulator {
    fn new(lenient: bool) -> Accumulator {
        Accumulator {
            entries: IndexMap::new(),
            below: HashMap::new(),
            lenient,
        }
    }

    fn put_leaf(
        &mut self,
        path: Path,
        value: Value,
        release_id: &str,
        warnings: &mut Vec<MergeWarning>,
    ) -> Result<(), MergeError> {
        if !self.clear_conflicts(&path, &value, release_id, warnings)? {
            return Ok(());
        }
        if !self.entries.contains_key(&path) {
            self.bump_counts(&path);
        }
        self.entries.insert(path, Slot::Leaf(value));
        Ok(())
    }

    fn append_history(
        &mut self,
        path: Path,
        record: Value,
        release_id: &str,
        warnings: &mut Vec<MergeWarning>,
    ) -> Result<(), MergeError> {
        let incoming = record.get("value").cloned().unwrap_or(Value::Null);
        if !self.clear_conflicts(&path, &incoming, release_id, warnings)? {
            return Ok(());
        }
        if !self.entries.contains_key(&path) {
            self.bump_counts(&path);
        }
        let slot = self
            .entries
            .entry(path)
            .or_insert_with(|| Slot::History(Vec::new()));
        match slot {
            Slot::History(records) => {
                let unchanged =
                    records.last().and_then(|last| last.get("value")) == record.get("value");
                if !unchanged {
                    records.push(record);
                }
            }
            // An identity leaf is already scalar at this path; keep it.
            Slot::Leaf(_) => {}
        }
        Ok(())
    }

    /// Resolve collisions between the incoming entry and the current state.
    /// Returns `false` when the insert should be skipped entirely.
    fn clear_conflicts(
        &mut self,
        path: &Path,
        incoming: &Value,
        release_id: &str,
        warnings: &mut Vec<MergeWarning>,
    ) -> Result<bool, MergeError> {
        // A leaf recorded at an ancestor path means a value turned into a
        // container. Empty containers and nulls upgrade silently.
        for depth in 1..path.len() {
            let prefix = &path.segments()[..depth];
            let existing = match self.entries.get(prefix) {
                Some(slot) => slot,
                None => continue,
            };
            let upgradable = match existing {
                Slot::Leaf(value) => value.is_null() || is_empty_container(value),
                // A history of nothing but empty containers gives way too.
                Slot::History(records) => records.iter().all(|record| {
                    record
                        .get("value")
                        .map_or(true, |value| value.is_null() || is_empty_container(value))
                }),
            };
            if !upgradable {
                let prefix_path = Path::from_segments(prefix.to_vec());
                if !self.lenient {
                    return Err(MergeError::InconsistentType {
                        path: prefix_path.to_string(),
                        release_id: release_id.to_string(),
                        existing: slot_kind(existing),
                        incoming: "a nested field",
                    });
                }
                let warning = MergeWarning::TypeOverridden {
                    path: prefix_path.to_string(),
                    release_id: release_id.to_string(),
                };
                tracing::warn!(target: "ocdsmeld::merge", "{}", warning);
                warnings.push(warning);
            }
            self.remove_entry(prefix);
        }

        // Entries below this path mean a container is being replaced by a
        // leaf. An empty container adds nothing; a null is an explicit clear.
        if self.below.get(path.segments()).copied().unwrap_or(0) > 0 {
            if is_empty_container(incoming) {
                return Ok(false);
            }
            if !incoming.is_null() {
                if !self.lenient {
                    return Err(MergeError::InconsistentType {
                        path: path.to_string(),
                        release_id: release_id.to_string(),
                        existing: "an object or array",
                        incoming: json_kind(incoming),
                    });
                }
                let warning = MergeWarning::TypeOverridden {
                    path: path.to_string(),
                    release_id: release_id.to_string(),
                };
                tracing::warn!(target: "ocdsmeld::merge", "{}", warning);
                warnings.push(warning);
            }
            self.remove_subtree(path);
        }

        Ok(true)
    }

    fn bump_counts(&mut self, path: &Path) {
        for depth in 1..path.len() {
            let prefix = Path::from_segments(path.segments()[..depth].to_vec());
            *self.below.entry(prefix).or_insert(0) += 1;
        }
    }

    fn remove_entry(&mut self, key: &[Segment]) {
        if self.entries.shift_remove(key).is_some() {
            for depth in 1..key.len() {
                if let Some(count) = self.below.get_mut(&key[..depth]) {
                    *count = count.saturating_sub(1);
                }
            }
        }
    }

    fn remove_subtree(&mut self, path: &Path) {
        let doomed: Vec<Path> = self
            .entries
            .keys()
            .filter(|key| key.len() > path.len() && key.starts_with(path.segments()))
            .cloned()
            .collect();
        for key in doomed {
            self.remove_entry(key.segments());
        }
    }

    fn into_entries(self) -> Flattened {
        self.entries
            .into_iter()
            .map(|(path, slot)| {
                let value = match slot {
                    Slot::Leaf(value) => value,
                    Slot::History(records) => Value::Array(records),
                };
                (path, value)
            })
            .collect()
    }
}

fn is_empty_container(value: &Value) -> bool {
    match value {
        Value::Object(map) => map.is_empty(),
        Value::Array(entries) => entries.is_empty(),
        _ => false,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "a null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn slot_kind(slot: &Slot) -> &'static str {
    match slot {
        Slot::Leaf(value) => json_kind(value),
        Slot::History(_) => "an array",
    }
}
