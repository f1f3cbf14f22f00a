//! Version upgrade scenarios, including commutation with merging

use super::test_utils::{release, release_package};
use ocdsmeld::{merge, upgrade, MergeOptions, MergeOutput};
use serde_json::{json, Value};

fn old_release(id: &str, date: &str) -> Value {
    release(
        "ocds-213czf-X",
        id,
        date,
        json!({
            "buyer": {"name": "B", "identifier": {"id": 1, "scheme": "S"}},
            "tender": {
                "tenderers": [{"name": "B", "identifier": {"id": 1, "scheme": "S"}}]
            }
        }),
    )
}

#[test]
fn buyer_and_tenderer_upgrade_into_shared_party() {
    let upgraded = upgrade(old_release("r1", "2020-01-01T00:00:00Z"), "1.0", "1.1").unwrap();

    assert_eq!(upgraded["buyer"], json!({"id": "S-1", "name": "B"}));
    let parties = upgraded["parties"].as_array().unwrap();
    assert_eq!(parties.len(), 1);
    assert_eq!(parties[0]["id"], "S-1");
    assert_eq!(parties[0]["name"], "B");
    assert_eq!(parties[0]["roles"], json!(["buyer", "tenderer"]));
    assert_eq!(parties[0]["identifier"], json!({"id": 1, "scheme": "S"}));
}

#[test]
fn upgrading_commutes_with_merging_for_simple_fields() {
    let releases = vec![
        release(
            "ocds-213czf-X",
            "r1",
            "2020-01-01T00:00:00Z",
            json!({
                "buyer": {"name": "B", "identifier": {"id": 1, "scheme": "S"}},
                "tender": {"title": "a"}
            }),
        ),
        release(
            "ocds-213czf-X",
            "r2",
            "2020-01-02T00:00:00Z",
            json!({
                "buyer": {"name": "B", "identifier": {"id": 1, "scheme": "S"}},
                "tender": {"title": "b"}
            }),
        ),
    ];

    // Upgrade each release, then merge at the current version.
    let upgraded_items: Vec<Value> = releases
        .iter()
        .map(|r| upgrade(r.clone(), "1.0", "1.1").unwrap())
        .collect();
    let options = MergeOptions {
        force_version: Some("1.1"),
        ..MergeOptions::default()
    };
    let upgrade_then_merge = first_compiled(merge(upgraded_items, &options).unwrap());

    // Merge at the old version, then upgrade the compiled release.
    let options = MergeOptions {
        force_version: Some("1.0"),
        ..MergeOptions::default()
    };
    let merged_old = first_compiled(merge(releases, &options).unwrap());
    let merge_then_upgrade = upgrade(merged_old, "1.0", "1.1").unwrap();

    assert_eq!(
        upgrade_then_merge["tender"]["title"],
        merge_then_upgrade["tender"]["title"]
    );
    assert_eq!(upgrade_then_merge["buyer"], merge_then_upgrade["buyer"]);
    assert_eq!(upgrade_then_merge["parties"], merge_then_upgrade["parties"]);
}

#[test]
fn packager_auto_upgrade_lifts_old_packages() {
    use ocdsmeld::packager::{OutputOptions, Packager};

    let mut packager = Packager::in_memory().with_auto_upgrade(true);
    packager
        .add(&release_package(
            "http://x/1.json",
            "1.0",
            vec![old_release("r1", "2020-01-01T00:00:00Z")],
        ))
        .unwrap();
    assert_eq!(packager.version(), Some("1.1"));

    let (package, _) = packager
        .into_record_package(&OutputOptions::default())
        .unwrap();
    assert_eq!(package["version"], "1.1");
    let compiled = &package["records"][0]["compiledRelease"];
    assert_eq!(compiled["buyer"], json!({"id": "S-1", "name": "B"}));
    assert_eq!(compiled["parties"][0]["roles"], json!(["buyer", "tenderer"]));
}

fn first_compiled(output: MergeOutput) -> Value {
    match output {
        MergeOutput::Releases(releases) => {
            let mut values: Vec<Value> = releases.map(|r| r.unwrap().value).collect();
            assert_eq!(values.len(), 1);
            values.remove(0)
        }
        MergeOutput::Package { .. } => panic!("expected a release stream"),
    }
}
