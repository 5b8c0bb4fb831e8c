//! Row classification, joining and lifecycle of diff sessions

use crate::common::assertions::assert_diff_types;
use crate::common::{people, people_with_age, RepoBuilder};
use histdiff::store::RootValue;
use histdiff::value::Value;
use histdiff::{CancelToken, DiffTableOptions, DiffType, EngineConfig, HistDiffError};
use std::sync::Arc;

fn s(v: &str) -> Value {
    Value::String(v.to_string())
}

#[test]
fn test_modified_and_added_rows() {
    let mut repo = RepoBuilder::new();
    let c1 = repo.commit(&[], vec![people(&[(1, "a")])]);
    let c2 = repo.commit(&[c1], vec![people(&[(1, "b"), (2, "c")])]);

    let options = DiffTableOptions {
        from: Some(c1),
        ..DiffTableOptions::default()
    };
    let table = repo.open("people", c2, options).unwrap();
    let rows = table.rows().unwrap();

    assert_diff_types(&rows, &[DiffType::Modified, DiffType::Added]);
    assert_eq!(rows[0].get("from_name"), Some(&s("a")));
    assert_eq!(rows[0].get("to_name"), Some(&s("b")));
    assert_eq!(rows[0].get("to_id"), Some(&Value::Int(1)));
    assert_eq!(rows[1].get("to_name"), Some(&s("c")));
    assert_eq!(rows[1].get("from_id"), Some(&Value::Null));
    assert_eq!(rows[1].get("to_commit"), Some(&s(&c2.to_string())));
    assert_eq!(rows[0].get("from_commit"), Some(&s(&c1.to_string())));
}

#[test]
fn test_removed_row_has_null_newer_side() {
    let mut repo = RepoBuilder::new();
    let c1 = repo.commit(&[], vec![people(&[(1, "a"), (2, "b")])]);
    let c2 = repo.commit(&[c1], vec![people(&[(2, "b")])]);

    let options = DiffTableOptions {
        from: Some(c1),
        ..DiffTableOptions::default()
    };
    let rows = repo.open("people", c2, options).unwrap().rows().unwrap();

    assert_diff_types(&rows, &[DiffType::Removed]);
    assert_eq!(rows[0].get("from_id"), Some(&Value::Int(1)));
    assert_eq!(rows[0].get("from_name"), Some(&s("a")));
    assert_eq!(rows[0].get("to_id"), Some(&Value::Null));
    assert_eq!(rows[0].get("to_name"), Some(&Value::Null));
    assert_eq!(rows[0].get("to_commit"), Some(&Value::Null));
    assert_eq!(rows[0].get("diff_type"), Some(&s("removed")));
}

#[test]
fn test_identical_snapshots_produce_no_rows() {
    let mut repo = RepoBuilder::new();
    let c1 = repo.commit(&[], vec![people(&[(1, "a")])]);
    let c2 = repo.commit(&[c1], vec![people(&[(1, "a")])]);

    let options = DiffTableOptions {
        from: Some(c1),
        ..DiffTableOptions::default()
    };
    let table = repo.open("people", c2, options).unwrap();
    assert!(table.collect_partitions().unwrap().is_empty());
    assert!(table.rows().unwrap().is_empty());
}

#[test]
fn test_older_rows_report_null_for_new_columns() {
    let mut repo = RepoBuilder::new();
    let c1 = repo.commit(&[], vec![people(&[(1, "a"), (2, "b")])]);
    let c2 = repo.commit(&[c1], vec![people_with_age(&[(1, "a", 30)])]);

    let options = DiffTableOptions {
        from: Some(c1),
        ..DiffTableOptions::default()
    };
    let table = repo.open("people", c2, options).unwrap();
    let names: Vec<&str> = table
        .target_schema()
        .columns()
        .iter()
        .map(|c| c.name.as_str())
        .collect();
    assert_eq!(names, vec!["id", "name", "age"]);

    let rows = table.rows().unwrap();
    assert_diff_types(&rows, &[DiffType::Modified, DiffType::Removed]);
    assert_eq!(rows[0].get("to_age"), Some(&Value::Int(30)));
    assert_eq!(rows[0].get("from_age"), Some(&Value::Null));
    assert_eq!(rows[1].get("from_name"), Some(&s("b")));
    assert_eq!(rows[1].get("from_age"), Some(&Value::Null));
}

#[test]
fn test_working_set_is_newest_partition() {
    let mut repo = RepoBuilder::new();
    let c1 = repo.commit(&[], vec![people(&[(1, "a")])]);
    let working = Arc::new(RootValue::new([people(&[(1, "a"), (9, "z")])]));

    let options = DiffTableOptions {
        working: Some(working),
        from: Some(c1),
        ..DiffTableOptions::default()
    };
    let rows = repo.open("people", c1, options).unwrap().rows().unwrap();

    assert_diff_types(&rows, &[DiffType::Added]);
    assert_eq!(rows[0].get("to_commit"), Some(&s("WORKING")));
    assert_eq!(rows[0].get("to_commit_date"), Some(&Value::Null));
    assert_eq!(rows[0].get("to_id"), Some(&Value::Int(9)));
}

#[test]
fn test_close_before_exhaustion_releases_worker() {
    let mut repo = RepoBuilder::new();
    let c0 = repo.commit(&[], vec![]);
    let names: Vec<String> = (0..5000).map(|i| format!("n{}", i)).collect();
    let rows: Vec<(i64, &str)> = names.iter().enumerate().map(|(i, n)| (i as i64, n.as_str())).collect();
    let c1 = repo.commit(&[c0], vec![people(&rows)]);

    let options = DiffTableOptions {
        config: EngineConfig {
            channel_capacity: 4,
            poll_interval_ms: 1,
        },
        ..DiffTableOptions::default()
    };
    let table = repo.open("people", c1, options).unwrap();
    let partitions = table.collect_partitions().unwrap();
    let mut iter = table.partition_rows(partitions.get(0).unwrap()).unwrap();

    assert_eq!(iter.next_batch(3).unwrap().len(), 3);
    iter.close().unwrap();
    assert!(iter.is_closed());
    assert!(matches!(iter.next(), Err(HistDiffError::IteratorClosed)));
}

#[test]
fn test_cancelled_session_stops_iteration() {
    let mut repo = RepoBuilder::new();
    let c0 = repo.commit(&[], vec![]);
    let names: Vec<String> = (0..2000).map(|i| format!("n{}", i)).collect();
    let rows: Vec<(i64, &str)> = names.iter().enumerate().map(|(i, n)| (i as i64, n.as_str())).collect();
    let c1 = repo.commit(&[c0], vec![people(&rows)]);

    let cancel = CancelToken::new();
    let options = DiffTableOptions {
        config: EngineConfig {
            channel_capacity: 2,
            poll_interval_ms: 1,
        },
        cancel: cancel.clone(),
        ..DiffTableOptions::default()
    };
    let table = repo.open("people", c1, options).unwrap();
    let partitions = table.collect_partitions().unwrap();
    let mut iter = table.partition_rows(partitions.get(0).unwrap()).unwrap();

    assert!(iter.next().unwrap().is_some());
    cancel.cancel();
    assert!(matches!(iter.next(), Err(HistDiffError::Cancelled)));
    assert!(iter.is_closed());
}

#[test]
fn test_partition_index_out_of_range() {
    let mut repo = RepoBuilder::new();
    let c0 = repo.commit(&[], vec![]);
    let c1 = repo.commit(&[c0], vec![people(&[(1, "a")])]);

    let table = repo.open("people", c1, DiffTableOptions::default()).unwrap();
    let partitions = table.collect_partitions().unwrap();
    assert_eq!(partitions.len(), 1);
    assert!(matches!(
        partitions.get(5),
        Err(HistDiffError::PartitionOutOfRange { index: 5, len: 1 })
    ));
    let message = partitions.get(5).err().unwrap().to_string();
    assert_eq!(message, "Partition index 5 out of range (have 1)");
}
