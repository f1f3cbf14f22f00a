//! Package combining and splitting round trips

use super::test_utils::{release, release_package};
use ocdsmeld::{combine_release_packages, split_package};
use serde_json::{json, Map, Value};

fn numbered_packages(count: usize) -> Vec<Value> {
    (0..count)
        .map(|i| {
            let mut package = release_package(
                &format!("http://x/{}.json", i),
                "1.1",
                vec![release(
                    &format!("ocds-{}", i),
                    &format!("r{}", i),
                    "2020-01-01T00:00:00Z",
                    json!({}),
                )],
            );
            package["extensions"] = json!([
                format!("http://ext/{}", i % 2),
                "http://ext/shared"
            ]);
            package
        })
        .collect()
}

#[test]
fn extensions_deduplicate_in_insertion_order() {
    let packages = numbered_packages(4);
    let (combined, warnings) = combine_release_packages(&packages, &Map::new());
    assert!(warnings.is_empty());
    assert_eq!(
        combined["extensions"],
        json!(["http://ext/0", "http://ext/shared", "http://ext/1"])
    );
}

#[test]
fn combined_releases_preserve_input_order() {
    let packages = numbered_packages(3);
    let (combined, _) = combine_release_packages(&packages, &Map::new());
    let ids: Vec<&str> = combined["releases"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, ["r0", "r1", "r2"]);
}

#[test]
fn split_then_combine_restores_the_container() {
    let packages = numbered_packages(1);
    let (combined, _) = combine_release_packages(&packages, &Map::new());

    let mut wide = combined.clone();
    wide["releases"] = Value::Array(
        (0..7)
            .map(|i| {
                release(
                    &format!("ocds-{}", i),
                    &format!("r{}", i),
                    "2020-01-01T00:00:00Z",
                    json!({}),
                )
            })
            .collect(),
    );

    let (chunks, _) = split_package(&wide, 3);
    assert_eq!(chunks.len(), 3);
    assert_eq!(
        chunks.iter().map(|c| c["releases"].as_array().unwrap().len()).sum::<usize>(),
        7
    );

    let (recombined, _) = combine_release_packages(&chunks, &Map::new());
    assert_eq!(recombined["releases"], wide["releases"]);
    assert_eq!(recombined["publisher"], wide["publisher"]);
}
