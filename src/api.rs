//! Public operations of the toolkit.
//!
//! Thin facade over the modules: package combining and splitting, bulk
//! merging, version upgrading, and format detection. Library users who need
//! finer control (injectable grouping stores, streaming output handling)
//! use [`crate::packager::Packager`] directly.

use crate::combine;
use crate::error::{Error, MergeWarning, StreamError, UpgradeError};
use crate::merge::merger::Merged;
use crate::packager::{GroupStore, OutputOptions, Packager, SledGroupStore};
use crate::schema::{ExtensionProfile, SchemaStore};
use crate::stream::Detection;
use serde_json::{Map, Value};

/// Options for [`merge`].
#[derive(Default, Clone, Copy)]
pub struct MergeOptions<'a> {
    /// Explicit release schema; overrides version-based resolution.
    pub schema: Option<&'a Value>,
    /// Injectable schema resolution; defaults to the bundled schemas.
    pub schema_store: Option<&'a dyn SchemaStore>,
    /// Collaborator applying declared extensions to the schema.
    pub extension_profile: Option<&'a dyn ExtensionProfile>,
    /// Emit versioned releases (or include them in the record package).
    pub return_versioned: bool,
    /// Emit one record package instead of a stream of merged releases.
    pub return_package: bool,
    /// Record `{url, date, tag}` references instead of embedded releases.
    pub use_linked_releases: bool,
    /// Group through the on-disk store instead of memory.
    pub streaming: bool,
    /// Fix the version instead of deriving it from the stream.
    pub force_version: Option<&'a str>,
    /// Tolerate inputs that mix minor versions.
    pub ignore_version: bool,
    /// Demote group-tainting errors to warnings and keep going.
    pub convert_exceptions_to_warnings: bool,
}

/// Output of [`merge`]: one record package, or a stream of merged releases
/// in ascending ocid order.
pub enum MergeOutput {
    Package {
        package: Value,
        warnings: Vec<MergeWarning>,
    },
    Releases(Box<dyn Iterator<Item = Result<Merged, Error>>>),
}

/// Merge a stream of release packages and bare releases.
pub fn merge<I>(items: I, options: &MergeOptions<'_>) -> Result<MergeOutput, Error>
where
    I: IntoIterator<Item = Value>,
{
    if options.streaming {
        run(Packager::new(SledGroupStore::new()?), items, options)
    } else {
        run(Packager::in_memory(), items, options)
    }
}

fn run<S, I>(
    mut packager: Packager<S>,
    items: I,
    options: &MergeOptions<'_>,
) -> Result<MergeOutput, Error>
where
    S: GroupStore,
    S::Groups: 'static,
    I: IntoIterator<Item = Value>,
{
    if let Some(version) = options.force_version {
        packager = packager.with_force_version(version);
    }
    packager = packager
        .with_ignore_version(options.ignore_version)
        .with_lenient(options.convert_exceptions_to_warnings);

    for item in items {
        packager.add(&item)?;
    }

    let output = OutputOptions {
        schema: options.schema,
        schema_store: options.schema_store,
        extension_profile: options.extension_profile,
        return_versioned: options.return_versioned,
        use_linked_releases: options.use_linked_releases,
    };

    if options.return_package {
        let (package, warnings) = packager.into_record_package(&output)?;
        Ok(MergeOutput::Package { package, warnings })
    } else if options.return_versioned {
        Ok(MergeOutput::Releases(Box::new(
            packager.versioned_releases(&output)?,
        )))
    } else {
        Ok(MergeOutput::Releases(Box::new(
            packager.compiled_releases(&output)?,
        )))
    }
}

/// Combine record packages into one, accumulating source uris.
pub fn combine_record_packages(
    packages: &[Value],
    metadata_overrides: &Map<String, Value>,
) -> (Value, Vec<MergeWarning>) {
    combine::combine_record_packages(packages.iter(), metadata_overrides)
}

/// Combine release packages into one.
pub fn combine_release_packages(
    packages: &[Value],
    metadata_overrides: &Map<String, Value>,
) -> (Value, Vec<MergeWarning>) {
    combine::combine_release_packages(packages.iter(), metadata_overrides)
}

/// Wrap bare records in a fresh record package.
pub fn package_records(records: Vec<Value>, metadata: &Map<String, Value>) -> Value {
    combine::package_records(records, metadata)
}

/// Wrap bare releases in a fresh release package.
pub fn package_releases(releases: Vec<Value>, metadata: &Map<String, Value>) -> Value {
    combine::package_releases(releases, metadata)
}

/// Split a package into chunks of `chunk_size` items.
pub fn split_package(package: &Value, chunk_size: usize) -> (Vec<Value>, Vec<MergeWarning>) {
    combine::split_package(package, chunk_size)
}

/// Upgrade a package, record or release between minor versions.
pub fn upgrade(mut data: Value, from: &str, to: &str) -> Result<Value, UpgradeError> {
    crate::upgrade::upgrade(&mut data, from, to)?;
    Ok(data)
}

/// Classify a document from its bytes, inspecting only the first item.
pub fn detect_format(bytes: &[u8], root_path: Option<&str>) -> Result<Detection, StreamError> {
    crate::stream::detect_format(bytes, root_path)
}
