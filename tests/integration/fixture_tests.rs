//! Integration tests for JSON fixtures feeding diff sessions

use crate::common::assertions::assert_diff_types;
use crate::common::{sample_data, TestFixture};
use histdiff::commands::open_diff_table;
use histdiff::fixture::Fixture;
use histdiff::output::JsonFormatter;
use histdiff::value::Value;
use histdiff::{DiffTable, DiffTableOptions, DiffType, HistDiffError, WORKING_LABEL};
use serde_json::json;

#[test]
fn test_fixture_history_with_working_set() {
    let fixture = TestFixture::new().unwrap();
    let path = fixture.create_json("repo.json", &sample_data::people_history()).unwrap();
    let repo = Fixture::load(&path).unwrap();

    let options = DiffTableOptions {
        working: repo.working(),
        ..DiffTableOptions::default()
    };
    let diff = DiffTable::open(repo.store(), "people", repo.head().clone(), options).unwrap();

    let c1 = repo.commit_id("c1").unwrap().to_string();
    let c2 = repo.commit_id("c2").unwrap().to_string();
    let init = repo.commit_id("init").unwrap().to_string();
    let labels: Vec<(String, String)> = diff
        .collect_partitions()
        .unwrap()
        .iter()
        .map(|p| (p.newer_label.clone(), p.older_label.clone()))
        .collect();
    assert_eq!(
        labels,
        vec![
            (WORKING_LABEL.to_string(), c2.clone()),
            (c2.clone(), c1.clone()),
            (c1.clone(), init),
        ]
    );

    let rows = diff.rows().unwrap();
    assert_diff_types(
        &rows,
        &[DiffType::Removed, DiffType::Modified, DiffType::Added, DiffType::Added],
    );
    assert_eq!(rows[0].get("from_name"), Some(&Value::String("bob".into())));
    assert_eq!(rows[0].get("from_commit"), Some(&Value::String(c2)));
    assert_eq!(rows[1].get("to_name"), Some(&Value::String("alicia".into())));
    assert_eq!(rows[3].get("to_commit"), Some(&Value::String(c1)));
}

#[test]
fn test_open_with_explicit_range() {
    let fixture = TestFixture::new().unwrap();
    let path = fixture.create_json("repo.json", &sample_data::people_history()).unwrap();

    // an explicit newest commit leaves the working set out
    let diff = open_diff_table(&path, "people", Some("c1"), Some("main"), None).unwrap();
    let rows = diff.rows().unwrap();
    assert_diff_types(&rows, &[DiffType::Modified, DiffType::Added]);
    assert!(rows
        .iter()
        .all(|r| r.get("to_commit") != Some(&Value::String(WORKING_LABEL.into()))));
}

#[test]
fn test_partition_rows_stream_as_json_lines() {
    let fixture = TestFixture::new().unwrap();
    let path = fixture.create_json("repo.json", &sample_data::people_history()).unwrap();
    let diff = open_diff_table(&path, "people", None, None, None).unwrap();

    let mut partitions = diff.partitions().unwrap();
    let mut lines = Vec::new();
    while let Some(partition) = partitions.next().unwrap() {
        let mut iter = diff.partition_rows(&partition).unwrap();
        while let Some(row) = iter.next().unwrap() {
            lines.push(JsonFormatter::format_diff_row(&row).unwrap());
        }
        iter.close().unwrap();
    }

    assert_eq!(lines.len(), diff.rows().unwrap().len());
    assert!(lines.iter().all(|line| !line.contains('\n')));
    let first: serde_json::Value = serde_json::from_str(&lines[0]).unwrap();
    assert_eq!(first["diff_type"], json!("removed"));
    assert_eq!(first["from_name"], json!("bob"));
    assert_eq!(first["to_name"], serde_json::Value::Null);
}

#[test]
fn test_evolving_schema_fixture() {
    let fixture = TestFixture::new().unwrap();
    let path = fixture
        .create_json("repo.json", &sample_data::evolving_schema_history())
        .unwrap();

    let diff = open_diff_table(&path, "People", None, None, None).unwrap();
    let columns: Vec<&str> = diff.diff_schema().column_names().collect();
    assert_eq!(
        columns,
        vec![
            "to_id", "to_name", "to_age", "to_commit", "to_commit_date",
            "from_id", "from_name", "from_age", "from_commit", "from_commit_date",
            "diff_type",
        ]
    );

    let rows = diff.rows().unwrap();
    assert_diff_types(&rows, &[DiffType::Modified, DiffType::Removed]);
    assert_eq!(rows[0].get("to_age"), Some(&Value::Int(30)));
    assert_eq!(rows[1].get("from_name"), Some(&Value::String("bob".into())));
}

#[test]
fn test_fixture_rejects_unknown_parent() {
    let fixture = TestFixture::new().unwrap();
    let path = fixture
        .create_json(
            "repo.json",
            &json!({ "commits": [ { "id": "c2", "parents": ["c1"] } ] }),
        )
        .unwrap();

    assert!(matches!(Fixture::load(&path), Err(HistDiffError::InvalidInput { .. })));
}

#[test]
fn test_fixture_rejects_bad_cell() {
    let fixture = TestFixture::new().unwrap();
    let path = fixture
        .create_json(
            "repo.json",
            &json!({ "commits": [ { "id": "c1", "tables": { "people": {
                "columns": [ { "name": "id", "tag": 100, "kind": "int", "key": true } ],
                "rows": [["one"]] } } } ] }),
        )
        .unwrap();

    match Fixture::load(&path) {
        Err(HistDiffError::InvalidInput { message }) => assert!(message.contains("'id'")),
        Err(other) => panic!("expected invalid input, got {:?}", other),
        Ok(_) => panic!("expected invalid input"),
    }
}

#[test]
fn test_missing_fixture_file() {
    let fixture = TestFixture::new().unwrap();
    let err = Fixture::load(&fixture.root().join("absent.json")).err().unwrap();
    assert!(err.to_string().contains("failed to read fixture"));
}
