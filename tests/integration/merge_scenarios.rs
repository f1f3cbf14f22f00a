//! End-to-end merge scenarios over release packages

use super::test_utils::{release, release_package};
use ocdsmeld::error::{Error, MergeError};
use ocdsmeld::{merge, MergeOptions, MergeOutput, Merged};
use serde_json::{json, Value};

fn compiled_of(items: Vec<Value>, options: &MergeOptions<'_>) -> Vec<Merged> {
    match merge(items, options).unwrap() {
        MergeOutput::Releases(releases) => releases.map(Result::unwrap).collect(),
        MergeOutput::Package { .. } => panic!("expected a release stream"),
    }
}

fn three_title_packages() -> Vec<Value> {
    [("r1", "2020-01-01T00:00:00Z", "a"), ("r2", "2020-01-02T00:00:00Z", "b"), ("r3", "2020-01-03T00:00:00Z", "c")]
        .into_iter()
        .map(|(id, date, title)| {
            release_package(
                &format!("http://example.org/{}.json", id),
                "1.1",
                vec![release("ocds-213czf-X", id, date, json!({"tender": {"title": title}}))],
            )
        })
        .collect()
}

#[test]
fn single_process_three_releases_compile_to_the_latest_state() {
    let compiled = compiled_of(three_title_packages(), &MergeOptions::default());
    assert_eq!(compiled.len(), 1);
    assert_eq!(compiled[0].value["tender"]["title"], "c");
    assert_eq!(compiled[0].value["tag"], json!(["compiled"]));
    assert_eq!(compiled[0].value["date"], "2020-01-03T00:00:00Z");
}

#[test]
fn single_process_three_releases_version_in_order() {
    let options = MergeOptions {
        return_versioned: true,
        ..MergeOptions::default()
    };
    let versioned = compiled_of(three_title_packages(), &options);
    assert_eq!(versioned.len(), 1);
    let history = versioned[0].value["tender"]["title"].as_array().unwrap();
    let values: Vec<&str> = history.iter().map(|h| h["value"].as_str().unwrap()).collect();
    assert_eq!(values, ["a", "b", "c"]);
    let ids: Vec<&str> = history
        .iter()
        .map(|h| h["releaseID"].as_str().unwrap())
        .collect();
    assert_eq!(ids, ["r1", "r2", "r3"]);
}

#[test]
fn id_keyed_array_entries_merge_by_identity() {
    let items = vec![
        release_package(
            "http://example.org/1.json",
            "1.1",
            vec![release(
                "ocds-213czf-X",
                "r1",
                "2020-01-01T00:00:00Z",
                json!({"parties": [{"id": "1", "name": "A"}]}),
            )],
        ),
        release_package(
            "http://example.org/2.json",
            "1.1",
            vec![release(
                "ocds-213czf-X",
                "r2",
                "2020-01-02T00:00:00Z",
                json!({"parties": [{"id": "1", "name": "A'"}, {"id": "2", "name": "B"}]}),
            )],
        ),
    ];
    let compiled = compiled_of(items, &MergeOptions::default());
    assert_eq!(
        compiled[0].value["parties"],
        json!([{"id": "1", "name": "A'"}, {"id": "2", "name": "B"}])
    );
}

#[test]
fn submission_method_replaces_whole_under_the_bundled_schema() {
    // No explicit schema: resolution goes through the declared version.
    let items = vec![
        release_package(
            "http://example.org/1.json",
            "1.1",
            vec![release(
                "ocds-213czf-X",
                "r1",
                "2020-01-01T00:00:00Z",
                json!({"tender": {"submissionMethod": ["electronicSubmission", "inPerson"]}}),
            )],
        ),
        release_package(
            "http://example.org/2.json",
            "1.1",
            vec![release(
                "ocds-213czf-X",
                "r2",
                "2020-01-02T00:00:00Z",
                json!({"tender": {"submissionMethod": ["written"]}}),
            )],
        ),
    ];
    let compiled = compiled_of(items, &MergeOptions::default());
    assert_eq!(
        compiled[0].value["tender"]["submissionMethod"],
        json!(["written"])
    );
}

#[test]
fn tenderer_references_replace_whole_under_the_bundled_schema() {
    let items = vec![
        release_package(
            "http://example.org/1.json",
            "1.1",
            vec![release(
                "ocds-213czf-X",
                "r1",
                "2020-01-01T00:00:00Z",
                json!({"tender": {"tenderers": [{"id": "1", "name": "A"}]}}),
            )],
        ),
        release_package(
            "http://example.org/2.json",
            "1.1",
            vec![release(
                "ocds-213czf-X",
                "r2",
                "2020-01-02T00:00:00Z",
                json!({"tender": {"tenderers": [{"id": "2", "name": "B"}]}}),
            )],
        ),
    ];
    let compiled = compiled_of(items, &MergeOptions::default());
    assert_eq!(
        compiled[0].value["tender"]["tenderers"],
        json!([{"id": "2", "name": "B"}])
    );
}

#[test]
fn mixed_versions_fail_unless_ignored() {
    let items = || {
        vec![
            release_package(
                "http://example.org/1.json",
                "1.0",
                vec![release("ocds-213czf-X", "r1", "2020-01-01T00:00:00Z", json!({}))],
            ),
            release_package(
                "http://example.org/2.json",
                "1.1",
                vec![release("ocds-213czf-X", "r2", "2020-01-02T00:00:00Z", json!({}))],
            ),
        ]
    };

    let err = merge(items(), &MergeOptions::default()).unwrap_err();
    assert!(matches!(
        err,
        Error::Merge(MergeError::InconsistentVersion { index: 1, .. })
    ));

    let options = MergeOptions {
        ignore_version: true,
        ..MergeOptions::default()
    };
    let compiled = compiled_of(items(), &options);
    assert_eq!(compiled.len(), 1);
}

#[test]
fn forced_version_overrides_detection_for_bare_releases() {
    let items = vec![release(
        "ocds-213czf-X",
        "r1",
        "2020-01-01T00:00:00Z",
        json!({"tender": {"title": "a"}}),
    )];

    let err = merge(items.clone(), &MergeOptions::default()).unwrap_err();
    assert!(matches!(
        err,
        Error::Merge(MergeError::UnknownVersion { index: 0 })
    ));

    let options = MergeOptions {
        force_version: Some("1.1"),
        ..MergeOptions::default()
    };
    let compiled = compiled_of(items, &options);
    assert_eq!(compiled[0].value["tender"]["title"], "a");
}

#[test]
fn lenient_merge_demotes_type_collisions() {
    let items = vec![
        release_package(
            "http://example.org/1.json",
            "1.1",
            vec![release(
                "ocds-213czf-X",
                "r1",
                "2020-01-01T00:00:00Z",
                json!({"planning": {"rationale": "initial"}}),
            )],
        ),
        release_package(
            "http://example.org/2.json",
            "1.1",
            vec![release(
                "ocds-213czf-X",
                "r2",
                "2020-01-02T00:00:00Z",
                json!({"planning": {"rationale": {"text": "structured"}}}),
            )],
        ),
    ];

    let strict = merge(items.clone(), &MergeOptions::default());
    match strict.unwrap() {
        MergeOutput::Releases(mut releases) => {
            assert!(releases.next().unwrap().is_err());
        }
        MergeOutput::Package { .. } => panic!("expected a release stream"),
    }

    let options = MergeOptions {
        convert_exceptions_to_warnings: true,
        ..MergeOptions::default()
    };
    let compiled = compiled_of(items, &options);
    assert_eq!(
        compiled[0].value["planning"]["rationale"]["text"],
        "structured"
    );
    assert!(!compiled[0].warnings.is_empty());
}
