use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn remedy(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("remedy").unwrap();
    cmd.current_dir(dir.path()).env("REMEDY_ROOT", dir.path());
    cmd
}

fn init_project(dir: &TempDir) {
    remedy(dir).arg("init").assert().success();
}

/// Point the gate at cat-based fake tools; tests control their output by
/// rewriting analysis.json / tests.json between steps.
fn configure_fake_tools(dir: &TempDir) {
    let yaml = "project: test\n\
                analysis:\n  command: cat analysis.json\n  timeout_seconds: 30\n\
                tests:\n  command: cat tests.json\n  timeout_seconds: 30\n";
    std::fs::write(dir.path().join(".remedy/config.yaml"), yaml).unwrap();
}

fn write_analysis(dir: &TempDir, json: &str) {
    std::fs::write(dir.path().join("analysis.json"), json).unwrap();
}

fn write_tests(dir: &TempDir, json: &str) {
    std::fs::write(dir.path().join("tests.json"), json).unwrap();
}

const THREE_FINDINGS: &str = r#"{"findings": [
    {"rule": "unused-binding", "file": "a", "line": 3, "severity": "warning", "message": "x is never used"},
    {"rule": "debug-output", "file": "a", "line": 9, "severity": "warning", "message": "leftover print"},
    {"rule": "missing-error-handling", "file": "b", "line": 1, "severity": "error", "message": "result ignored"}
]}"#;

const NO_FINDINGS: &str = r#"{"findings": []}"#;
const SUITE_GREEN: &str = r#"{"passed": ["T1"], "failed": []}"#;

// ---------------------------------------------------------------------------
// remedy init
// ---------------------------------------------------------------------------

#[test]
fn init_creates_directory_tree() {
    let dir = TempDir::new().unwrap();
    remedy(&dir).arg("init").assert().success();

    assert!(dir.path().join(".remedy").is_dir());
    assert!(dir.path().join(".remedy/sessions").is_dir());
    assert!(dir.path().join(".remedy/config.yaml").exists());
}

#[test]
fn init_is_idempotent() {
    let dir = TempDir::new().unwrap();
    remedy(&dir).arg("init").assert().success();
    remedy(&dir).arg("init").assert().success();
}

// ---------------------------------------------------------------------------
// remedy scan / plan
// ---------------------------------------------------------------------------

#[test]
fn scan_builds_plan_in_tier_order() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    configure_fake_tools(&dir);
    write_analysis(&dir, THREE_FINDINGS);

    remedy(&dir)
        .arg("scan")
        .assert()
        .success()
        .stdout(predicate::str::contains("3 finding(s) in 3 categorie(s)"));

    let output = remedy(&dir)
        .args(["plan", "show", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let plan: serde_json::Value = serde_json::from_slice(&output).unwrap();
    let names: Vec<&str> = plan["entries"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["name"].as_str().unwrap())
        .collect();
    assert_eq!(
        names,
        ["unused-binding", "debug-output", "missing-error-handling"]
    );
}

#[test]
fn plan_advance_verify_done_flow() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    configure_fake_tools(&dir);
    write_analysis(&dir, THREE_FINDINGS);
    write_tests(&dir, SUITE_GREEN);

    remedy(&dir).arg("scan").assert().success();

    remedy(&dir)
        .args(["plan", "advance"])
        .assert()
        .success()
        .stdout(predicate::str::contains("unused-binding"));

    // The fix removed this category's findings; the suite held.
    write_analysis(
        &dir,
        r#"{"findings": [
            {"rule": "debug-output", "file": "a", "line": 9},
            {"rule": "missing-error-handling", "file": "b", "line": 1}
        ]}"#,
    );
    remedy(&dir)
        .args(["plan", "verify"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Done: unused-binding"));

    remedy(&dir)
        .args(["plan", "advance"])
        .assert()
        .success()
        .stdout(predicate::str::contains("debug-output"));
}

#[test]
fn verify_with_remaining_findings_keeps_category_open() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    configure_fake_tools(&dir);
    write_analysis(&dir, THREE_FINDINGS);
    write_tests(&dir, SUITE_GREEN);

    remedy(&dir).arg("scan").assert().success();
    remedy(&dir).args(["plan", "advance"]).assert().success();

    // Findings for the in-progress category are still present.
    remedy(&dir)
        .args(["plan", "verify"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Still in progress"));
}

#[test]
fn test_regression_blocks_plan_until_decision() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    configure_fake_tools(&dir);
    write_analysis(&dir, THREE_FINDINGS);
    write_tests(&dir, SUITE_GREEN);

    remedy(&dir).arg("scan").assert().success();
    remedy(&dir).args(["plan", "advance"]).assert().success();

    // First verify: category fixed, suite green. Establishes T1 as passing.
    write_analysis(
        &dir,
        r#"{"findings": [
            {"rule": "debug-output", "file": "a", "line": 9},
            {"rule": "missing-error-handling", "file": "b", "line": 1}
        ]}"#,
    );
    remedy(&dir).args(["plan", "verify"]).assert().success();
    remedy(&dir).args(["plan", "advance"]).assert().success();

    // Second category's fix broke T1.
    write_analysis(&dir, r#"{"findings": [{"rule": "missing-error-handling", "file": "b", "line": 1}]}"#);
    write_tests(&dir, r#"{"passed": [], "failed": ["T1"]}"#);
    remedy(&dir)
        .args(["plan", "verify"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("regression detected"));

    // The plan is halted until a terminal decision.
    remedy(&dir)
        .args(["plan", "advance"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("blocked"));

    remedy(&dir)
        .args(["plan", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("blocked"));

    // Retry puts the same category back in progress.
    remedy(&dir)
        .args(["plan", "retry"])
        .assert()
        .success()
        .stdout(predicate::str::contains("debug-output"));

    // Abandoning it lets the plan move on.
    write_tests(&dir, SUITE_GREEN);
    remedy(&dir)
        .args(["plan", "abandon", "debug-output"])
        .assert()
        .success();
    remedy(&dir)
        .args(["plan", "advance"])
        .assert()
        .success()
        .stdout(predicate::str::contains("missing-error-handling"));
}

#[test]
fn rescan_rebuilds_the_plan() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    configure_fake_tools(&dir);
    write_analysis(&dir, THREE_FINDINGS);

    remedy(&dir).arg("scan").assert().success();
    remedy(&dir).args(["plan", "advance"]).assert().success();

    // A fresh scan supersedes the old plan and its in-progress category.
    remedy(&dir).arg("scan").assert().success();
    let output = remedy(&dir)
        .args(["plan", "show", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let plan: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert!(plan["entries"]
        .as_array()
        .unwrap()
        .iter()
        .all(|e| e["status"] == "pending"));
}

#[test]
fn scan_with_missing_tool_fails() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    let yaml = "project: test\n\
                analysis:\n  command: definitely-not-a-real-tool-9000\n";
    std::fs::write(dir.path().join(".remedy/config.yaml"), yaml).unwrap();

    remedy(&dir)
        .arg("scan")
        .assert()
        .failure()
        .stderr(predicate::str::contains("tool unavailable"));
}

// ---------------------------------------------------------------------------
// remedy cycle
// ---------------------------------------------------------------------------

#[test]
fn cycle_red_green_refactor_close() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    configure_fake_tools(&dir);

    remedy(&dir)
        .args(["cycle", "begin", "T1", "--description", "parses empty input"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Red: T1"));

    write_tests(&dir, r#"{"passed": [], "failed": ["T1"]}"#);
    remedy(&dir)
        .args(["cycle", "confirm-red", "T1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("fails as expected"));

    write_tests(&dir, SUITE_GREEN);
    remedy(&dir)
        .args(["cycle", "confirm-green", "T1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Green: T1"));

    remedy(&dir).args(["cycle", "refactor", "T1"]).assert().success();
    remedy(&dir)
        .args(["cycle", "check", "T1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Suite clean"));

    remedy(&dir).args(["cycle", "close", "T1"]).assert().success();
    remedy(&dir)
        .args(["cycle", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("closed"));
}

#[test]
fn confirm_green_without_red_evidence_fails() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    configure_fake_tools(&dir);
    write_tests(&dir, r#"{"passed": ["T1"], "failed": []}"#);

    remedy(&dir).args(["cycle", "begin", "T1"]).assert().success();
    remedy(&dir)
        .args(["cycle", "confirm-green", "T1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no confirmed red run"));

    // Still red.
    let output = remedy(&dir)
        .args(["cycle", "show", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let cases: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(cases[0]["state"], "red");
}

#[test]
fn refactor_regression_freezes_case() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    configure_fake_tools(&dir);

    remedy(&dir).args(["cycle", "begin", "T1"]).assert().success();
    write_tests(&dir, r#"{"passed": [], "failed": ["T1"]}"#);
    remedy(&dir).args(["cycle", "confirm-red", "T1"]).assert().success();
    write_tests(&dir, SUITE_GREEN);
    remedy(&dir).args(["cycle", "confirm-green", "T1"]).assert().success();
    remedy(&dir).args(["cycle", "refactor", "T1"]).assert().success();

    // The structural change broke T1, which passed before.
    write_tests(&dir, r#"{"passed": [], "failed": ["T1"]}"#);
    remedy(&dir)
        .args(["cycle", "check", "T1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("refactor regression"));

    let output = remedy(&dir)
        .args(["cycle", "show", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let cases: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(cases[0]["state"], "refactor");
}

#[test]
fn one_test_case_at_a_time() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    configure_fake_tools(&dir);

    remedy(&dir).args(["cycle", "begin", "T1"]).assert().success();
    remedy(&dir)
        .args(["cycle", "begin", "T2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("one test case at a time"));
}

// ---------------------------------------------------------------------------
// remedy status / sessions
// ---------------------------------------------------------------------------

#[test]
fn status_json_reports_plan_and_cycle() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    configure_fake_tools(&dir);
    write_analysis(&dir, THREE_FINDINGS);

    remedy(&dir).arg("scan").assert().success();
    remedy(&dir).args(["cycle", "begin", "T1"]).assert().success();

    let output = remedy(&dir)
        .args(["status", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let status: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(status["session"], "default");
    assert_eq!(status["categories"].as_array().unwrap().len(), 3);
    assert_eq!(status["test_cases"][0]["id"], "T1");
    assert_eq!(status["last_run"]["kind"], "analysis");
}

#[test]
fn sessions_are_independent() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    configure_fake_tools(&dir);

    remedy(&dir)
        .args(["--session", "a", "cycle", "begin", "T1"])
        .assert()
        .success();

    // Session b has no case T1 and no active-case conflict.
    remedy(&dir)
        .args(["--session", "b", "cycle", "begin", "T1"])
        .assert()
        .success();

    assert!(dir.path().join(".remedy/sessions/a.yaml").exists());
    assert!(dir.path().join(".remedy/sessions/b.yaml").exists());
}

#[test]
fn session_state_survives_interruption() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    configure_fake_tools(&dir);
    write_analysis(&dir, THREE_FINDINGS);

    remedy(&dir).arg("scan").assert().success();
    remedy(&dir).args(["plan", "advance"]).assert().success();

    // Every invocation is a fresh process; the in-progress category came
    // back from the session file.
    remedy(&dir)
        .args(["plan", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("in_progress"));

    // The snapshot on disk round-trips the plan fields.
    let raw = std::fs::read_to_string(dir.path().join(".remedy/sessions/default.yaml")).unwrap();
    let snapshot: serde_yaml::Value = serde_yaml::from_str(&raw).unwrap();
    assert_eq!(snapshot["id"], "default");
    assert_eq!(snapshot["plan"]["entries"][0]["name"], "unused-binding");
    assert_eq!(snapshot["plan"]["entries"][0]["status"], "in_progress");
}
