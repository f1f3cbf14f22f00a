//! Error types for the disclosure merging toolkit.

use thiserror::Error;

/// Schema lookup and preparation errors
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("no release schema is registered for version {0}")]
    UnknownSchemaVersion(String),

    #[error("extension profile failed for version {version}: {reason}")]
    ExtensionProfile { version: String, reason: String },

    #[error("release schema is not a JSON object")]
    NotAnObject,

    #[error("failed to parse release schema: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors raised while merging one release group
#[derive(Debug, Error)]
pub enum MergeError {
    #[error("release at stream index {index} has no ocid")]
    MissingOcid { index: usize },

    #[error("cannot determine the schema version of item {index}; pass force_version to override")]
    UnknownVersion { index: usize },

    #[error(
        "item {index} declares version {found} but the stream started at {expected}; \
         pass ignore_version to proceed"
    )]
    InconsistentVersion {
        index: usize,
        expected: String,
        found: String,
    },

    #[error(
        "type collision at {path} while applying release {release_id}: \
         {existing} cannot be updated by {incoming}"
    )]
    InconsistentType {
        path: String,
        release_id: String,
        existing: &'static str,
        incoming: &'static str,
    },

    #[error("release at stream index {index} is not a JSON object")]
    NotAnObject { index: usize },

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Grouping store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("grouping store I/O error: {0}")]
    Sled(#[from] sled::Error),

    #[error("failed to encode or decode a grouping row: {0}")]
    Codec(#[from] bincode::Error),

    #[error("failed to deserialize a stored release: {0}")]
    Json(#[from] serde_json::Error),
}

/// Input stream parsing and classification errors
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("input is not valid JSON at item {index}: {source}")]
    Json {
        index: usize,
        source: serde_json::Error,
    },

    #[error("input bytes are not valid UTF-8; re-encode the stream as UTF-8")]
    Encoding,

    #[error("unsupported encoding {0:?}; only UTF-8 input is accepted")]
    UnsupportedEncoding(String),

    #[error("item {index} is not one of the recognised disclosure shapes")]
    UnrecognizedShape { index: usize },

    #[error("root path segment {segment:?} is missing from item {index}")]
    RootPathMissing { segment: String, index: usize },

    #[error("input contains no items")]
    Empty,

    #[error("input stream I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Version upgrade errors
#[derive(Debug, Error)]
pub enum UpgradeError {
    #[error("downgrading from {from} to {to} is not supported")]
    Downgrade { from: String, to: String },

    #[error("no upgrade path from {from} to {to}")]
    UnsupportedPath { from: String, to: String },
}

/// Crate-level error aggregating every failure domain
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Merge(#[from] MergeError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error(transparent)]
    Upgrade(#[from] UpgradeError),
}

impl From<SchemaError> for Error {
    fn from(err: SchemaError) -> Self {
        Error::Merge(MergeError::Schema(err))
    }
}

/// Recoverable conditions reported alongside results rather than failing them.
///
/// Warnings are collected by the merger and the packager and also emitted as
/// `tracing::warn!` events. Callers that demote group-level errors via
/// `convert_exceptions_to_warnings` receive the demoted error here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeWarning {
    #[error("array at {path} in release {release_id} has two entries with id {id}")]
    DuplicateId {
        path: String,
        release_id: String,
        id: String,
    },

    #[error("package at stream index {index} has no {container} field; item skipped")]
    MissingContainer {
        container: &'static str,
        index: usize,
    },

    #[error("type collision at {path} resolved in favour of release {release_id}")]
    TypeOverridden { path: String, release_id: String },

    #[error("release {release_id} has no usable date and sorts before all dated releases")]
    UndatedRelease { release_id: String },

    #[error("{0}")]
    Demoted(String),
}
