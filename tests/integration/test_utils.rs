//! Shared builders for integration tests

use serde_json::{json, Value};

/// A minimal valid release with extra fields merged in.
pub fn release(ocid: &str, id: &str, date: &str, extra: Value) -> Value {
    let mut release = json!({
        "ocid": ocid,
        "id": id,
        "date": date,
        "tag": ["tender"],
        "initiationType": "tender"
    });
    if let (Value::Object(target), Value::Object(fields)) = (&mut release, extra) {
        for (key, value) in fields {
            target.insert(key, value);
        }
    }
    release
}

/// A release package with one release and standard metadata.
pub fn release_package(uri: &str, version: &str, releases: Vec<Value>) -> Value {
    json!({
        "uri": uri,
        "publisher": {"name": "Works Agency"},
        "publishedDate": "2020-02-01T00:00:00Z",
        "license": "https://creativecommons.org/licenses/by/4.0/",
        "version": version,
        "releases": releases
    })
}
