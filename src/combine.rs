//! Package combining and splitting.
//!
//! Combining folds a stream of same-kind packages into one package,
//! carrying forward the first non-null metadata values and deduplicating
//! `extensions` in insertion order. Splitting is the inverse: fixed-size
//! chunks of the container with shared metadata copied onto each.

use crate::error::MergeWarning;
use crate::schema::CURRENT_VERSION;
use serde_json::{Map, Value};

/// Metadata keys carried forward from the first package that sets them,
/// in output order.
const CARRIED_METADATA: [&str; 5] = [
    "publisher",
    "publishedDate",
    "license",
    "publicationPolicy",
    "version",
];

/// Combine release packages into a single release package.
pub fn combine_release_packages<'a, I>(
    packages: I,
    overrides: &Map<String, Value>,
) -> (Value, Vec<MergeWarning>)
where
    I: IntoIterator<Item = &'a Value>,
{
    combine(packages, overrides, "releases", false)
}

/// Combine record packages into a single record package, accumulating the
/// source package uris into `packages`.
pub fn combine_record_packages<'a, I>(
    packages: I,
    overrides: &Map<String, Value>,
) -> (Value, Vec<MergeWarning>)
where
    I: IntoIterator<Item = &'a Value>,
{
    combine(packages, overrides, "records", true)
}

/// Wrap bare releases in a fresh release package.
pub fn package_releases(releases: Vec<Value>, metadata: &Map<String, Value>) -> Value {
    package_items(releases, metadata, "releases")
}

/// Wrap bare records in a fresh record package.
pub fn package_records(records: Vec<Value>, metadata: &Map<String, Value>) -> Value {
    package_items(records, metadata, "records")
}

fn combine<'a, I>(
    packages: I,
    overrides: &Map<String, Value>,
    container: &'static str,
    collect_sources: bool,
) -> (Value, Vec<MergeWarning>)
where
    I: IntoIterator<Item = &'a Value>,
{
    let mut metadata = Map::new();
    let mut extensions: Vec<Value> = Vec::new();
    let mut sources: Vec<String> = Vec::new();
    let mut items: Vec<Value> = Vec::new();
    let mut warnings = Vec::new();

    for (index, package) in packages.into_iter().enumerate() {
        for key in CARRIED_METADATA {
            if !metadata.contains_key(key) {
                if let Some(value) = package.get(key) {
                    if !value.is_null() {
                        metadata.insert(key.to_string(), value.clone());
                    }
                }
            }
        }
        if let Some(declared) = package.get("extensions").and_then(Value::as_array) {
            for extension in declared {
                if !extensions.contains(extension) {
                    extensions.push(extension.clone());
                }
            }
        }
        if collect_sources {
            if let Some(uri) = package.get("uri").and_then(Value::as_str) {
                if !uri.is_empty() && !sources.iter().any(|seen| seen == uri) {
                    sources.push(uri.to_string());
                }
            }
        }
        match package.get(container).and_then(Value::as_array) {
            Some(entries) => items.extend(entries.iter().cloned()),
            None => {
                let warning = MergeWarning::MissingContainer { container, index };
                tracing::warn!(target: "ocdsmeld::combine", "{}", warning);
                warnings.push(warning);
            }
        }
    }

    let mut package = Map::new();
    if let Some(uri) = overrides.get("uri") {
        package.insert("uri".to_string(), uri.clone());
    }
    for key in CARRIED_METADATA {
        if let Some(value) = overrides.get(key).or_else(|| metadata.get(key)) {
            package.insert(key.to_string(), value.clone());
        }
    }
    if let Some(declared) = overrides.get("extensions") {
        package.insert("extensions".to_string(), declared.clone());
    } else if !extensions.is_empty() {
        package.insert("extensions".to_string(), Value::Array(extensions));
    }
    if collect_sources && !sources.is_empty() {
        package.insert(
            "packages".to_string(),
            Value::Array(sources.into_iter().map(Value::String).collect()),
        );
    }
    package.insert(container.to_string(), Value::Array(items));

    (Value::Object(package), warnings)
}

fn package_items(items: Vec<Value>, metadata: &Map<String, Value>, container: &str) -> Value {
    let mut package = Map::new();
    if let Some(uri) = metadata.get("uri") {
        package.insert("uri".to_string(), uri.clone());
    }
    for key in CARRIED_METADATA {
        if let Some(value) = metadata.get(key) {
            package.insert(key.to_string(), value.clone());
        }
    }
    if !package.contains_key("version") {
        package.insert(
            "version".to_string(),
            Value::String(CURRENT_VERSION.to_string()),
        );
    }
    if let Some(extensions) = metadata.get("extensions") {
        package.insert("extensions".to_string(), extensions.clone());
    }
    package.insert(container.to_string(), Value::Array(items));
    Value::Object(package)
}

/// Partition a package's container into chunks of `chunk_size`, copying the
/// shared metadata onto each chunk. For record packages the source
/// `packages` array is dropped: attribution cannot be reconstructed per
/// chunk.
pub fn split_package(package: &Value, chunk_size: usize) -> (Vec<Value>, Vec<MergeWarning>) {
    let chunk_size = chunk_size.max(1);
    let container = if package.get("records").is_some() {
        "records"
    } else {
        "releases"
    };

    let Some(items) = package.get(container).and_then(Value::as_array) else {
        let warning = MergeWarning::MissingContainer {
            container,
            index: 0,
        };
        tracing::warn!(target: "ocdsmeld::combine", "{}", warning);
        return (Vec::new(), vec![warning]);
    };

    let mut shared = Map::new();
    if let Some(map) = package.as_object() {
        for (key, value) in map {
            if key != container && key != "packages" {
                shared.insert(key.clone(), value.clone());
            }
        }
    }

    let chunks = items
        .chunks(chunk_size)
        .map(|chunk| {
            let mut part = shared.clone();
            part.insert(container.to_string(), Value::Array(chunk.to_vec()));
            Value::Object(part)
        })
        .collect();
    (chunks, Vec::new())
}
