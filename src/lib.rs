//! ocdsmeld: Deterministic Merging for Open Contracting Disclosures
//!
//! A toolkit for working with structured procurement-disclosure documents:
//! merging the releases of a procurement process into compiled and
//! versioned forms, packaging them across large streams, combining and
//! splitting packages, upgrading between schema versions, and detecting
//! document formats.

pub mod api;
pub mod combine;
pub mod error;
pub mod logging;
pub mod merge;
pub mod packager;
pub mod schema;
pub mod stream;
pub mod upgrade;

pub use api::{
    combine_record_packages, combine_release_packages, detect_format, merge, package_records,
    package_releases, split_package, upgrade, MergeOptions, MergeOutput,
};
pub use error::{
    Error, MergeError, MergeWarning, SchemaError, StoreError, StreamError, UpgradeError,
};
pub use merge::{Merged, Merger};
pub use packager::{GroupStore, MemoryGroupStore, OutputOptions, Packager, SledGroupStore};
pub use schema::{EmbeddedSchemaStore, ExtensionProfile, MergeRules, SchemaStore};
pub use stream::{Detection, ItemKind, ItemStream};
