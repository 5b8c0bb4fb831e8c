//! Integration tests running CLI commands end to end

use crate::common::{sample_data, CliTestRunner};
use histdiff::HistDiffError;
use serde_json::json;

fn runner_with_history() -> (CliTestRunner, String) {
    let runner = CliTestRunner::new().unwrap();
    let path = runner
        .fixture()
        .create_json("repo.json", &sample_data::people_history())
        .unwrap();
    (runner, path.to_string_lossy().into_owned())
}

#[test]
fn test_diff_command_formats() {
    let (runner, repo) = runner_with_history();
    runner.expect_success(&["diff", &repo, "people"]);
    runner.expect_success(&["diff", &repo, "people", "--format", "json"]);
    runner.expect_success(&["diff", &repo, "PEOPLE", "--from", "c1", "--to", "c2"]);
}

#[test]
fn test_partitions_command() {
    let (runner, repo) = runner_with_history();
    runner.expect_success(&["partitions", &repo, "people"]);
    runner.expect_success(&["partitions", &repo, "people", "--format", "json", "--from", "c1"]);
}

#[test]
fn test_schema_command() {
    let runner = CliTestRunner::new().unwrap();
    let path = runner
        .fixture()
        .create_json("repo.json", &sample_data::evolving_schema_history())
        .unwrap();
    let repo = path.to_string_lossy().into_owned();

    runner.expect_success(&["schema", &repo, "people"]);
    runner.expect_success(&["schema", &repo, "people", "--format", "json", "--verbose"]);
}

#[test]
fn test_config_file_is_applied() {
    let (runner, repo) = runner_with_history();
    let config = runner
        .fixture()
        .create_json("engine.json", &json!({ "channel_capacity": 1, "poll_interval_ms": 1 }))
        .unwrap();
    let config = config.to_string_lossy().into_owned();

    runner.expect_success(&["diff", &repo, "people", "--config", &config]);
}

#[test]
fn test_invalid_config_fails() {
    let (runner, repo) = runner_with_history();
    let config = runner
        .fixture()
        .create_json("engine.json", &json!({ "channel_capacity": 0 }))
        .unwrap();
    let config = config.to_string_lossy().into_owned();

    let err = runner.expect_failure(&["diff", &repo, "people", "--config", &config]);
    assert!(matches!(err, HistDiffError::Config { .. }));
}

#[test]
fn test_unknown_table_fails() {
    let (runner, repo) = runner_with_history();
    let err = runner.expect_failure(&["diff", &repo, "orders"]);
    assert!(matches!(err, HistDiffError::TableNotFound { .. }));
    assert!(err.is_structural());
}

#[test]
fn test_unknown_commit_fails() {
    let (runner, repo) = runner_with_history();
    let err = runner.expect_failure(&["diff", &repo, "people", "--from", "nope"]);
    assert!(!err.is_structural());
}

#[test]
fn test_missing_fixture_fails() {
    let runner = CliTestRunner::new().unwrap();
    let missing = runner.fixture().root().join("absent.json");
    let missing = missing.to_string_lossy().into_owned();

    let err = runner.expect_failure(&["partitions", &missing, "people"]);
    assert!(matches!(err, HistDiffError::Generic(_)));
}

#[test]
fn test_bad_arguments_fail() {
    let runner = CliTestRunner::new().unwrap();
    let err = runner.expect_failure(&["diff"]);
    assert!(matches!(err, HistDiffError::InvalidInput { .. }));
}
