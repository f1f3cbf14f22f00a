//! Stream driving and format detection over raw bytes

use super::test_utils::{release, release_package};
use ocdsmeld::packager::{OutputOptions, Packager};
use ocdsmeld::stream::{detect_format, ItemKind, ItemStream};
use serde_json::json;

#[test]
fn concatenated_packages_flow_through_the_packager() {
    let first = release_package(
        "http://x/1.json",
        "1.1",
        vec![release(
            "ocds-213czf-X",
            "r1",
            "2020-01-01T00:00:00Z",
            json!({"tender": {"title": "a"}}),
        )],
    );
    let second = release_package(
        "http://x/2.json",
        "1.1",
        vec![release(
            "ocds-213czf-X",
            "r2",
            "2020-01-02T00:00:00Z",
            json!({"tender": {"title": "b"}}),
        )],
    );
    let bytes = format!("{}\n{}", first, second).into_bytes();

    let detection = detect_format(&bytes, None).unwrap();
    assert_eq!(detection.kind, ItemKind::ReleasePackage);
    assert!(detection.is_concatenated);

    let mut packager = Packager::in_memory();
    for item in ItemStream::new(bytes.as_slice(), None).unwrap() {
        packager.add(&item.unwrap()).unwrap();
    }
    let (package, _) = packager
        .into_record_package(&OutputOptions::default())
        .unwrap();
    assert_eq!(
        package["records"][0]["compiledRelease"]["tender"]["title"],
        "b"
    );
}

#[test]
fn array_wrapped_packages_are_unwrapped() {
    let packages = json!([
        release_package(
            "http://x/1.json",
            "1.1",
            vec![release("ocds-a", "r1", "2020-01-01T00:00:00Z", json!({}))]
        ),
        release_package(
            "http://x/2.json",
            "1.1",
            vec![release("ocds-b", "r2", "2020-01-01T00:00:00Z", json!({}))]
        )
    ]);
    let bytes = packages.to_string().into_bytes();

    let detection = detect_format(&bytes, None).unwrap();
    assert_eq!(detection.kind, ItemKind::ReleasePackage);
    assert!(detection.is_array);

    let items: Vec<_> = ItemStream::new(bytes.as_slice(), None)
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    assert_eq!(items.len(), 2);
}

#[test]
fn root_path_reaches_embedded_records() {
    let body = json!({
        "results": [
            {"ocid": "ocds-a", "releases": [], "compiledRelease": {"ocid": "ocds-a"}},
            {"ocid": "ocds-b", "releases": []}
        ]
    });
    let bytes = body.to_string().into_bytes();

    let detection = detect_format(&bytes, Some("results.item")).unwrap();
    assert_eq!(detection.kind, ItemKind::Record);

    let items: Vec<_> = ItemStream::new(bytes.as_slice(), Some("results.item"))
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[1]["ocid"], "ocds-b");
}

#[test]
fn packages_stream_from_disk_without_rebuffering() {
    use std::io::{BufReader, Write};

    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("packages.json");
    let mut file = std::fs::File::create(&path).unwrap();
    for i in 0..5 {
        let package = release_package(
            &format!("http://x/{}.json", i),
            "1.1",
            vec![release(
                &format!("ocds-{}", i),
                &format!("r{}", i),
                "2020-01-01T00:00:00Z",
                json!({}),
            )],
        );
        writeln!(file, "{}", package).unwrap();
    }
    drop(file);

    let reader = BufReader::new(std::fs::File::open(&path).unwrap());
    let mut packager = Packager::in_memory();
    for item in ItemStream::new(reader, None).unwrap() {
        packager.add(&item.unwrap()).unwrap();
    }
    let (package, _) = packager
        .into_record_package(&OutputOptions::default())
        .unwrap();
    assert_eq!(package["records"].as_array().map(Vec::len), Some(5));
}

#[test]
fn detection_distinguishes_merged_forms() {
    let compiled = json!({"ocid": "x", "tag": ["compiled"], "id": "x-2020"});
    assert_eq!(
        detect_format(compiled.to_string().as_bytes(), None).unwrap().kind,
        ItemKind::CompiledRelease
    );

    let versioned = json!({"ocid": "x", "initiationType": [
        {"releaseID": "r1", "releaseDate": "2020-01-01T00:00:00Z",
         "releaseTag": ["tender"], "value": "tender"}
    ]});
    assert_eq!(
        detect_format(versioned.to_string().as_bytes(), None).unwrap().kind,
        ItemKind::VersionedRelease
    );
}
