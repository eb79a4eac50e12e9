use std::process::{Command, Output};

const CONTEXT_VARS: &[&str] = &[
    "GITHUB_REPOSITORY",
    "GITHUB_TOKEN",
    "GH_TOKEN",
    "OPENAI_API_KEY",
    "GITHUB_EVENT_PATH",
    "MAX_BLOCKS",
    "DIFFSCRIBE_MODE",
    "DIFFSCRIBE_SIMULATE",
    "RUST_LOG",
];

fn diffscribe(dir: &std::path::Path, args: &[&str]) -> Output {
    diffscribe_with_env(dir, args, &[])
}

fn diffscribe_with_env(dir: &std::path::Path, args: &[&str], env: &[(&str, &str)]) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_diffscribe"));
    cmd.args(args).current_dir(dir);
    for var in CONTEXT_VARS {
        cmd.env_remove(var);
    }
    cmd.envs(env.iter().copied());
    cmd.output().unwrap()
}

#[test]
fn simulated_review_needs_no_credentials() {
    let dir = tempfile::tempdir().unwrap();

    let output = diffscribe(dir.path(), &["review", "--simulate", "--format", "json"]);

    assert!(
        output.status.success(),
        "simulated run failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["simulated"], true);
    assert_eq!(summary["model"], "simulated");
    assert_eq!(summary["filesChanged"], 4);
    assert_eq!(summary["filesWithoutPatch"].as_array().unwrap().len(), 1);
    assert_eq!(summary["commentsPosted"], 2);
}

#[test]
fn simulate_can_be_enabled_from_the_environment() {
    let dir = tempfile::tempdir().unwrap();

    for value in ["1", "yes", "true"] {
        let output = diffscribe_with_env(
            dir.path(),
            &["review", "--format", "json"],
            &[("DIFFSCRIBE_SIMULATE", value)],
        );

        assert!(
            output.status.success(),
            "DIFFSCRIBE_SIMULATE={value} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(summary["simulated"], true);
    }
}

#[test]
fn simulated_block_mode_respects_item_cap() {
    let dir = tempfile::tempdir().unwrap();

    let output = diffscribe(
        dir.path(),
        &["review", "--simulate", "--mode", "blocks", "--max-items", "2", "--format", "json"],
    );

    assert!(output.status.success());
    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["mode"], "blocks");
    assert_eq!(summary["itemsFound"], 3);
    assert_eq!(summary["itemsProcessed"], 2);
}

#[test]
fn live_review_without_environment_fails_with_missing_variables() {
    let dir = tempfile::tempdir().unwrap();

    let output = diffscribe(dir.path(), &["review"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("GITHUB_REPOSITORY"), "stderr: {stderr}");
    assert!(stderr.contains("OPENAI_API_KEY"), "stderr: {stderr}");
}

#[test]
fn doctor_hints_point_at_review_flags() {
    let dir = tempfile::tempdir().unwrap();

    let output = diffscribe(dir.path(), &["doctor", "--format", "json"]);

    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let checks = report["checks"].as_array().unwrap();
    let event = checks
        .iter()
        .find(|c| c["name"] == "github_event_path")
        .unwrap();
    assert_eq!(event["status"], "fail");
    assert!(event["hint"].as_str().unwrap().contains("review --pr"));
}
