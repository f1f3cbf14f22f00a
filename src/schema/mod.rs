//! Release-schema acquisition and interpretation.
//!
//! The merger is driven by the published JSON Schemas for the disclosure
//! format plus the custom merge annotations they carry (`omitWhenMerged`,
//! `wholeListMerge`, `versionId`, `deprecated`). This module resolves a
//! schema for a minor version, dereferences its internal references, walks
//! its fields, and derives the per-path merge strategy map.

pub mod deref;
pub mod rules;
pub mod walker;

pub use rules::MergeRules;
pub use walker::{Field, FieldWalker};

use crate::error::SchemaError;
use serde_json::Value;

/// Current minor version of the disclosure schema.
pub const CURRENT_VERSION: &str = "1.1";

/// Oldest minor version with an upgrade path to the current one.
pub const OLDEST_VERSION: &str = "1.0";

const SCHEMA_1_0: &str = include_str!("../../schemas/release-schema-1.0.json");
const SCHEMA_1_1: &str = include_str!("../../schemas/release-schema-1.1.json");

/// Source of release schemas keyed by minor version.
///
/// Implementations resolve a minor-version prefix (`"1.1"`) to the latest
/// tagged schema for that version. The default store serves the schemas
/// bundled with this crate; tests and callers with bespoke resolution inject
/// their own implementation.
pub trait SchemaStore {
    /// The latest tagged release schema for the minor version, with internal
    /// references resolved so it is ready for walking.
    fn release_schema(&self, minor_version: &str) -> Result<Value, SchemaError>;

    /// The tag the schema resolves from, e.g. `1__1__5`.
    fn tag(&self, minor_version: &str) -> Result<&str, SchemaError>;
}

/// Builds an extension-applied release schema.
///
/// External collaborator: the core never fetches or parses extension
/// archives. When an input package declares `extensions` and the caller
/// supplied a profile, the merger asks it for a patched schema.
pub trait ExtensionProfile {
    /// A release schema for `minor_version` with the listed extension
    /// metadata locators applied.
    fn patched_schema(
        &self,
        minor_version: &str,
        extensions: &[Value],
    ) -> Result<Value, SchemaError>;
}

/// Schema store backed by the schemas bundled with this crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmbeddedSchemaStore;

impl SchemaStore for EmbeddedSchemaStore {
    fn release_schema(&self, minor_version: &str) -> Result<Value, SchemaError> {
        let raw = match minor_version {
            OLDEST_VERSION => SCHEMA_1_0,
            CURRENT_VERSION => SCHEMA_1_1,
            other => return Err(SchemaError::UnknownSchemaVersion(other.to_string())),
        };
        let mut schema: Value = serde_json::from_str(raw)?;
        if !schema.is_object() {
            return Err(SchemaError::NotAnObject);
        }
        deref::dereference(&mut schema);
        Ok(schema)
    }

    fn tag(&self, minor_version: &str) -> Result<&str, SchemaError> {
        match minor_version {
            OLDEST_VERSION => Ok("1__0__3"),
            CURRENT_VERSION => Ok("1__1__5"),
            other => Err(SchemaError::UnknownSchemaVersion(other.to_string())),
        }
    }
}

/// Normalise a declared version string to its minor prefix, e.g. `1.1.4`
/// becomes `1.1`.
pub fn minor_version(version: &str) -> &str {
    match version.match_indices('.').nth(1) {
        Some((i, _)) => &version[..i],
        None => version,
    }
}
