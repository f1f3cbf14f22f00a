//! Packager output modes and grouping-store behaviour

use super::test_utils::{release, release_package};
use ocdsmeld::packager::{OutputOptions, Packager};
use serde_json::{json, Value};

#[test]
fn linked_releases_point_back_at_their_package() {
    let mut packager = Packager::in_memory();
    packager
        .add(&release_package(
            "http://x",
            "1.1",
            vec![release(
                "ocds-213czf-X",
                "r1",
                "2020-01-01T00:00:00Z",
                json!({"tender": {"title": "a"}}),
            )],
        ))
        .unwrap();

    let options = OutputOptions {
        use_linked_releases: true,
        ..OutputOptions::default()
    };
    let (package, _) = packager.into_record_package(&options).unwrap();
    let record = &package["records"][0];

    assert_eq!(record["releases"][0]["url"], "http://x#r1");
    assert_eq!(record["releases"][0]["date"], "2020-01-01T00:00:00Z");
    assert_eq!(record["releases"][0]["tag"], json!(["tender"]));
    // The compiled release still derives from the full release.
    assert_eq!(record["compiledRelease"]["tender"]["title"], "a");
}

#[test]
fn embedded_releases_are_the_default() {
    let mut packager = Packager::in_memory();
    packager
        .add(&release_package(
            "http://x",
            "1.1",
            vec![release("ocds-213czf-X", "r1", "2020-01-01T00:00:00Z", json!({}))],
        ))
        .unwrap();
    let (package, _) = packager
        .into_record_package(&OutputOptions::default())
        .unwrap();
    assert_eq!(package["records"][0]["releases"][0]["id"], "r1");
}

#[test]
fn compiled_output_is_strictly_ascending_by_ocid() {
    let ocids = ["zeta", "alpha", "mid", "alpha-2", "beta"];
    let mut packager = Packager::in_memory();
    for (i, ocid) in ocids.iter().enumerate() {
        packager
            .add(&release_package(
                &format!("http://x/{}.json", i),
                "1.1",
                vec![release(ocid, &format!("r{}", i), "2020-01-01T00:00:00Z", json!({}))],
            ))
            .unwrap();
    }
    let emitted: Vec<String> = packager
        .compiled_releases(&OutputOptions::default())
        .unwrap()
        .map(|merged| {
            merged.unwrap().value["ocid"].as_str().unwrap().to_string()
        })
        .collect();

    let mut sorted = emitted.clone();
    sorted.sort();
    assert_eq!(emitted, sorted);
    assert_eq!(emitted.len(), ocids.len());
}

#[test]
fn memory_and_disk_stores_produce_identical_output() {
    let items: Vec<Value> = (0..20)
        .map(|i| {
            release_package(
                &format!("http://x/{}.json", i),
                "1.1",
                vec![release(
                    &format!("ocds-{}", i % 7),
                    &format!("r{}", i),
                    &format!("2020-01-{:02}T00:00:00Z", (i % 28) + 1),
                    json!({"tender": {"title": format!("t{}", i)}}),
                )],
            )
        })
        .collect();

    let mut in_memory = Packager::in_memory();
    let mut on_disk = Packager::spilling_to_disk().unwrap();
    for item in &items {
        in_memory.add(item).unwrap();
        on_disk.add(item).unwrap();
    }

    let options = OutputOptions {
        return_versioned: true,
        ..OutputOptions::default()
    };
    let (package_a, _) = in_memory.into_record_package(&options).unwrap();
    let (package_b, _) = on_disk.into_record_package(&options).unwrap();

    assert_eq!(
        serde_json::to_string(&package_a).unwrap(),
        serde_json::to_string(&package_b).unwrap()
    );
}

#[test]
fn abandoning_the_output_iterator_releases_the_disk_store() {
    let mut packager = Packager::spilling_to_disk().unwrap();
    for i in 0..10 {
        packager
            .add(&release_package(
                "http://x/1.json",
                "1.1",
                vec![release(&format!("ocds-{}", i), "r1", "2020-01-01T00:00:00Z", json!({}))],
            ))
            .unwrap();
    }
    let mut stream = packager.compiled_releases(&OutputOptions::default()).unwrap();
    // Take one group, then drop the iterator mid-way.
    assert!(stream.next().unwrap().is_ok());
    drop(stream);
}

#[test]
fn versioned_stream_preserves_per_field_history() {
    let mut packager = Packager::in_memory();
    for (id, date, status) in [
        ("r1", "2020-01-01T00:00:00Z", "planning"),
        ("r2", "2020-01-02T00:00:00Z", "active"),
    ] {
        packager
            .add(&release_package(
                "http://x/1.json",
                "1.1",
                vec![release(
                    "ocds-213czf-X",
                    id,
                    date,
                    json!({"tender": {"status": status}}),
                )],
            ))
            .unwrap();
    }
    let versioned: Vec<Value> = packager
        .versioned_releases(&OutputOptions::default())
        .unwrap()
        .map(|merged| merged.unwrap().value)
        .collect();
    assert_eq!(versioned.len(), 1);
    let history = versioned[0]["tender"]["status"].as_array().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0]["value"], "planning");
    assert_eq!(history[1]["value"], "active");
}
