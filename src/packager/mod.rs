//! Stream packaging: group releases by process identifier across a stream
//! and emit record-package, compiled, or versioned output.
//!
//! The packager consumes a heterogeneous stream of release packages and bare
//! releases without assuming the releases fit in memory; grouping is
//! delegated to a [`GroupStore`]. On output it asks the [`Merger`] for the
//! merged forms of each group, in ascending ocid order.

pub mod store;

pub use store::{Group, GroupStore, MemoryGroupStore, Row, SledGroupStore};

use crate::error::{Error, MergeError, MergeWarning, StoreError, StreamError};
use crate::merge::merger::{Merged, Merger};
use crate::schema::rules::MergeRules;
use crate::schema::{
    minor_version, EmbeddedSchemaStore, ExtensionProfile, SchemaStore, CURRENT_VERSION,
    OLDEST_VERSION,
};
use crate::upgrade;
use serde_json::{Map, Value};

static EMBEDDED_STORE: EmbeddedSchemaStore = EmbeddedSchemaStore;

/// Package metadata keys carried forward from the first package that sets
/// them.
const METADATA_KEYS: [&str; 4] = ["publisher", "publishedDate", "license", "publicationPolicy"];

/// Output configuration shared by the packager's output modes.
#[derive(Default, Clone, Copy)]
pub struct OutputOptions<'a> {
    /// Explicit release schema; overrides version-based resolution.
    pub schema: Option<&'a Value>,
    /// Injectable schema resolution; defaults to the schemas bundled with
    /// the crate.
    pub schema_store: Option<&'a dyn SchemaStore>,
    /// Collaborator applying declared extensions to the schema.
    pub extension_profile: Option<&'a dyn ExtensionProfile>,
    /// Also produce the versioned release for each group.
    pub return_versioned: bool,
    /// Record releases as `{url, date, tag}` references when their source
    /// package had a uri, instead of embedding them.
    pub use_linked_releases: bool,
}

/// Groups releases by ocid and emits merged output.
pub struct Packager<S: GroupStore> {
    store: S,
    items: usize,
    version: Option<String>,
    version_pending_since: Option<usize>,
    force_version: Option<String>,
    ignore_version: bool,
    lenient: bool,
    auto_upgrade: bool,
    metadata: Map<String, Value>,
    extensions: Vec<Value>,
    package_uris: Vec<String>,
    warnings: Vec<MergeWarning>,
}

impl Packager<MemoryGroupStore> {
    /// Packager over the in-memory grouping store.
    pub fn in_memory() -> Packager<MemoryGroupStore> {
        Packager::new(MemoryGroupStore::new())
    }
}

impl Packager<SledGroupStore> {
    /// Packager over the on-disk grouping store, for streams that exceed
    /// memory. The scratch space is ephemeral.
    pub fn spilling_to_disk() -> Result<Packager<SledGroupStore>, StoreError> {
        Ok(Packager::new(SledGroupStore::new()?))
    }
}

impl<S: GroupStore> Packager<S> {
    pub fn new(store: S) -> Packager<S> {
        Packager {
            store,
            items: 0,
            version: None,
            version_pending_since: None,
            force_version: None,
            ignore_version: false,
            lenient: false,
            auto_upgrade: false,
            metadata: Map::new(),
            extensions: Vec::new(),
            package_uris: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Fix the running version instead of deriving it from the stream.
    /// Declared versions that disagree are reported but not fatal.
    pub fn with_force_version(mut self, version: &str) -> Packager<S> {
        self.version = Some(minor_version(version).to_string());
        self.force_version = Some(version.to_string());
        self
    }

    /// Tolerate inputs that mix minor versions.
    pub fn with_ignore_version(mut self, ignore: bool) -> Packager<S> {
        self.ignore_version = ignore;
        self
    }

    /// Demote group-tainting errors (missing ocid, type collisions) to
    /// warnings and keep going.
    pub fn with_lenient(mut self, lenient: bool) -> Packager<S> {
        self.lenient = lenient;
        self
    }

    /// Upgrade older-version inputs to the current version on entry.
    pub fn with_auto_upgrade(mut self, upgrade: bool) -> Packager<S> {
        self.auto_upgrade = upgrade;
        self
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn extensions(&self) -> &[Value] {
        &self.extensions
    }

    /// Warnings gathered while adding items.
    pub fn warnings(&self) -> &[MergeWarning] {
        &self.warnings
    }

    /// Classify one stream item and add its releases to the grouping store.
    pub fn add(&mut self, item: &Value) -> Result<(), Error> {
        let index = self.items;
        self.items += 1;

        let object = match item.as_object() {
            Some(object) => object,
            None => return Err(MergeError::NotAnObject { index }.into()),
        };

        // Records and record packages carry merge output, not merge input.
        if object.contains_key("records")
            || (object.contains_key("ocid") && object.contains_key("releases"))
        {
            Err(StreamError::UnrecognizedShape { index }.into())
        } else if object.contains_key("releases") {
            self.add_release_package(item, index)
        } else {
            self.add_release(item, index, None)
        }
    }

    fn add_release_package(&mut self, package: &Value, index: usize) -> Result<(), Error> {
        let declared = package
            .get("version")
            .and_then(Value::as_str)
            // Packages predating the version field are first-minor-version.
            .unwrap_or(OLDEST_VERSION);
        let mut minor = minor_version(declared).to_string();

        let upgraded;
        let package = if self.auto_upgrade && minor == OLDEST_VERSION {
            let mut owned = package.clone();
            upgrade::upgrade(&mut owned, &minor, CURRENT_VERSION)?;
            minor = CURRENT_VERSION.to_string();
            upgraded = owned;
            &upgraded
        } else {
            package
        };
        self.check_version(&minor, index)?;

        for key in METADATA_KEYS {
            if !self.metadata.contains_key(key) {
                if let Some(value) = package.get(key) {
                    if !value.is_null() {
                        self.metadata.insert(key.to_string(), value.clone());
                    }
                }
            }
        }
        if let Some(extensions) = package.get("extensions").and_then(Value::as_array) {
            for extension in extensions {
                if !self.extensions.contains(extension) {
                    self.extensions.push(extension.clone());
                }
            }
        }

        let uri = package
            .get("uri")
            .and_then(Value::as_str)
            .filter(|uri| !uri.is_empty());
        if let Some(uri) = uri {
            if !self.package_uris.iter().any(|seen| seen == uri) {
                self.package_uris.push(uri.to_string());
            }
        }

        let releases = match package.get("releases").and_then(Value::as_array) {
            Some(releases) => releases,
            None => {
                let warning = MergeWarning::MissingContainer {
                    container: "releases",
                    index,
                };
                tracing::warn!(target: "ocdsmeld::packager", "{}", warning);
                self.warnings.push(warning);
                return Ok(());
            }
        };
        for release in releases {
            self.add_release(release, index, uri)?;
        }
        Ok(())
    }

    fn add_release(&mut self, release: &Value, index: usize, uri: Option<&str>) -> Result<(), Error> {
        if self.version.is_none() && self.version_pending_since.is_none() {
            self.version_pending_since = Some(index);
        }

        let upgraded;
        let release = if self.auto_upgrade && self.version.as_deref() == Some(OLDEST_VERSION) {
            let mut owned = release.clone();
            upgrade::upgrade(&mut owned, OLDEST_VERSION, CURRENT_VERSION)?;
            self.version = Some(CURRENT_VERSION.to_string());
            upgraded = owned;
            &upgraded
        } else {
            release
        };

        let ocid = release.get("ocid").and_then(Value::as_str);
        let Some(ocid) = ocid else {
            let error = MergeError::MissingOcid { index };
            if self.lenient {
                let warning = MergeWarning::Demoted(error.to_string());
                tracing::warn!(target: "ocdsmeld::packager", "{}", warning);
                self.warnings.push(warning);
                return Ok(());
            }
            return Err(error.into());
        };

        self.store.append(ocid, uri, release).map_err(Error::from)
    }

    fn check_version(&mut self, minor: &str, index: usize) -> Result<(), MergeError> {
        match &self.version {
            Some(expected) if expected != minor => {
                if self.force_version.is_some() || self.ignore_version {
                    tracing::warn!(
                        target: "ocdsmeld::packager",
                        expected = %expected, found = %minor, index,
                        "version mismatch ignored"
                    );
                    Ok(())
                } else {
                    Err(MergeError::InconsistentVersion {
                        index,
                        expected: expected.clone(),
                        found: minor.to_string(),
                    })
                }
            }
            Some(_) => Ok(()),
            None => {
                self.version = Some(minor.to_string());
                Ok(())
            }
        }
    }

    fn resolve_rules(&self, options: &OutputOptions<'_>) -> Result<MergeRules, Error> {
        if let Some(schema) = options.schema {
            return Ok(MergeRules::from_schema(schema));
        }
        let version = self.version.clone().ok_or(MergeError::UnknownVersion {
            index: self.version_pending_since.unwrap_or(0),
        })?;
        let schema = match options.extension_profile {
            Some(profile) if !self.extensions.is_empty() => {
                profile.patched_schema(&version, &self.extensions)?
            }
            _ => {
                let store = options.schema_store.unwrap_or(&EMBEDDED_STORE);
                store.release_schema(&version)?
            }
        };
        Ok(MergeRules::from_schema(&schema))
    }

    /// Close every group and assemble a record package.
    pub fn into_record_package(
        self,
        options: &OutputOptions<'_>,
    ) -> Result<(Value, Vec<MergeWarning>), Error> {
        let rules = self.resolve_rules(options)?;
        let merger = Merger::new(rules).with_lenient(self.lenient);
        let lenient = self.lenient;
        let mut warnings = self.warnings;

        let mut records = Vec::new();
        for group in self.store.into_groups()? {
            let group = group?;
            let mut record = Map::new();
            record.insert("ocid".to_string(), Value::String(group.ocid.clone()));

            let releases: Vec<Value> = group
                .rows
                .iter()
                .map(|row| match &row.uri {
                    Some(uri) if options.use_linked_releases => linked_release(uri, &row.release),
                    _ => row.release.clone(),
                })
                .collect();
            record.insert("releases".to_string(), Value::Array(releases));

            let inputs: Vec<Value> = group.rows.into_iter().map(|row| row.release).collect();
            match merger.compiled(&inputs) {
                Ok(merged) => {
                    warnings.extend(merged.warnings);
                    record.insert("compiledRelease".to_string(), merged.value);
                }
                Err(err) if lenient => {
                    let warning = MergeWarning::Demoted(err.to_string());
                    tracing::warn!(target: "ocdsmeld::packager", "{}", warning);
                    warnings.push(warning);
                }
                Err(err) => return Err(err.into()),
            }
            if options.return_versioned {
                match merger.versioned(&inputs) {
                    Ok(merged) => {
                        warnings.extend(merged.warnings);
                        record.insert("versionedRelease".to_string(), merged.value);
                    }
                    Err(err) if lenient => {
                        let warning = MergeWarning::Demoted(err.to_string());
                        tracing::warn!(target: "ocdsmeld::packager", "{}", warning);
                        warnings.push(warning);
                    }
                    Err(err) => return Err(err.into()),
                }
            }
            records.push(Value::Object(record));
        }

        let mut package = Map::new();
        for key in METADATA_KEYS {
            if let Some(value) = self.metadata.get(key) {
                package.insert(key.to_string(), value.clone());
            }
        }
        if let Some(version) = &self.version {
            package.insert("version".to_string(), Value::String(version.clone()));
        }
        if !self.extensions.is_empty() {
            package.insert(
                "extensions".to_string(),
                Value::Array(self.extensions.clone()),
            );
        }
        if !self.package_uris.is_empty() {
            package.insert(
                "packages".to_string(),
                Value::Array(
                    self.package_uris
                        .iter()
                        .map(|uri| Value::String(uri.clone()))
                        .collect(),
                ),
            );
        }
        package.insert("records".to_string(), Value::Array(records));

        Ok((Value::Object(package), warnings))
    }

    /// Close every group and stream its compiled releases, ascending by
    /// ocid.
    pub fn compiled_releases(
        self,
        options: &OutputOptions<'_>,
    ) -> Result<MergedReleases<S::Groups>, Error> {
        self.merged_releases(options, false)
    }

    /// Close every group and stream its versioned releases, ascending by
    /// ocid.
    pub fn versioned_releases(
        self,
        options: &OutputOptions<'_>,
    ) -> Result<MergedReleases<S::Groups>, Error> {
        self.merged_releases(options, true)
    }

    fn merged_releases(
        self,
        options: &OutputOptions<'_>,
        versioned: bool,
    ) -> Result<MergedReleases<S::Groups>, Error> {
        let rules = self.resolve_rules(options)?;
        let merger = Merger::new(rules).with_lenient(self.lenient);
        Ok(MergedReleases {
            groups: self.store.into_groups()?,
            merger,
            versioned,
            lenient: self.lenient,
        })
    }
}

/// Iterator over per-group merge products. Owns the grouping store's group
/// iterator, so abandoning it releases the store's resources.
pub struct MergedReleases<G> {
    groups: G,
    merger: Merger,
    versioned: bool,
    lenient: bool,
}

impl<G> Iterator for MergedReleases<G>
where
    G: Iterator<Item = Result<Group, StoreError>>,
{
    type Item = Result<Merged, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let group = match self.groups.next()? {
                Ok(group) => group,
                Err(err) => return Some(Err(err.into())),
            };
            let ocid = group.ocid;
            let inputs: Vec<Value> = group.rows.into_iter().map(|row| row.release).collect();
            let result = if self.versioned {
                self.merger.versioned(&inputs)
            } else {
                self.merger.compiled(&inputs)
            };
            match result {
                Ok(merged) => return Some(Ok(merged)),
                Err(err) if self.lenient => {
                    tracing::warn!(
                        target: "ocdsmeld::packager",
                        ocid = %ocid, error = %err,
                        "group skipped"
                    );
                }
                Err(err) => return Some(Err(err.into())),
            }
        }
    }
}

fn linked_release(uri: &str, release: &Value) -> Value {
    let id = match release.get("id") {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    };
    let mut linked = Map::new();
    linked.insert("url".to_string(), Value::String(format!("{}#{}", uri, id)));
    linked.insert(
        "date".to_string(),
        release.get("date").cloned().unwrap_or(Value::Null),
    );
    linked.insert(
        "tag".to_string(),
        release.get("tag").cloned().unwrap_or(Value::Null),
    );
    Value::Object(linked)
}
