//! Verification gate: the single interface between the orchestrator and the
//! external analysis/test tools.
//!
//! Tools are plain shell commands configured in `.remedy/config.yaml`. They
//! receive the scope as trailing arguments and report JSON on stdout:
//!
//! - analysis: `{"findings": [{"rule", "file", "line", ...}]}`
//! - tests:    `{"passed": [...], "failed": [...]}`
//!
//! A non-zero exit with parseable JSON is a finding/failure report, not a
//! crash. The gate normalizes every run into a [`GateResult`] and keeps the
//! most recent result per scope so it can report deltas; it holds no other
//! state across calls.

use crate::config::{Config, ToolCommand};
use crate::error::{RemedyError, Result};
use crate::finding::{Finding, FindingReport};
use crate::types::GateStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;
use tracing::debug;

// ---------------------------------------------------------------------------
// Scopes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnalysisScope {
    All,
    Files { files: Vec<String> },
}

impl AnalysisScope {
    /// Stable key identifying this scope in the gate's per-scope memory.
    pub fn key(&self) -> String {
        match self {
            AnalysisScope::All => "analysis:all".to_string(),
            AnalysisScope::Files { files } => {
                let mut sorted = files.clone();
                sorted.sort();
                format!("analysis:files:{}", sorted.join(","))
            }
        }
    }

    fn args(&self) -> Vec<String> {
        match self {
            AnalysisScope::All => Vec::new(),
            AnalysisScope::Files { files } => files.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TestScope {
    All,
    Case { id: String },
    Cases { ids: Vec<String> },
}

impl TestScope {
    pub fn key(&self) -> String {
        match self {
            TestScope::All => "tests:all".to_string(),
            TestScope::Case { id } => format!("tests:case:{id}"),
            TestScope::Cases { ids } => {
                let mut sorted = ids.clone();
                sorted.sort();
                format!("tests:cases:{}", sorted.join(","))
            }
        }
    }

    fn args(&self) -> Vec<String> {
        match self {
            TestScope::All => Vec::new(),
            TestScope::Case { id } => vec![id.clone()],
            TestScope::Cases { ids } => ids.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// GateResult
// ---------------------------------------------------------------------------

/// The normalized outcome of exactly one tool invocation. Never synthesized
/// or carried across scopes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateResult {
    pub status: GateStatus,
    pub scope: String,
    pub at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub findings: Vec<Finding>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub passed: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed: Vec<String>,
    /// Change in finding/failure count vs. the previous run of this scope.
    pub delta: i64,
    pub duration_ms: u64,
}

// ---------------------------------------------------------------------------
// Wire reports
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct AnalysisReport {
    #[serde(default)]
    findings: Vec<FindingReport>,
}

#[derive(Debug, Deserialize)]
struct TestReport {
    #[serde(default)]
    passed: Vec<String>,
    #[serde(default)]
    failed: Vec<String>,
}

// ---------------------------------------------------------------------------
// Gate
// ---------------------------------------------------------------------------

pub struct Gate {
    analysis: ToolCommand,
    tests: ToolCommand,
    /// Most recent result per scope key, used solely to compute deltas.
    pub memory: BTreeMap<String, GateResult>,
}

impl Gate {
    pub fn new(config: &Config) -> Self {
        Self {
            analysis: config.analysis.clone(),
            tests: config.tests.clone(),
            memory: BTreeMap::new(),
        }
    }

    pub fn with_memory(config: &Config, memory: BTreeMap<String, GateResult>) -> Self {
        Self {
            memory,
            ..Self::new(config)
        }
    }

    /// Run the analysis tool over `scope`. `clean` when no findings,
    /// `regressed` when findings are present.
    pub fn run_analysis(&mut self, root: &Path, scope: &AnalysisScope) -> Result<GateResult> {
        let key = scope.key();
        let raw = invoke(&self.analysis, root, &scope.args())?;

        let report: AnalysisReport = parse_report("analysis", &raw)?;
        let mut findings: Vec<Finding> = report
            .findings
            .into_iter()
            .map(Finding::from_report)
            .collect();
        findings.sort_by(|a, b| {
            (a.file.as_str(), a.line, a.id.as_str()).cmp(&(b.file.as_str(), b.line, b.id.as_str()))
        });
        findings.dedup_by(|a, b| a.id == b.id);

        let prior = self.memory.get(&key).map(|r| r.findings.len()).unwrap_or(0);
        let count = findings.len();
        let status = if findings.is_empty() {
            GateStatus::Clean
        } else {
            GateStatus::Regressed
        };
        let result = GateResult {
            status,
            scope: key.clone(),
            at: Utc::now(),
            findings,
            passed: Vec::new(),
            failed: Vec::new(),
            delta: count as i64 - prior as i64,
            duration_ms: raw.duration_ms,
        };
        debug!(scope = %key, status = %result.status, count, "analysis gate");
        self.memory.insert(key, result.clone());
        Ok(result)
    }

    /// Run the test tool over `scope`. `clean` when every targeted test
    /// passes, `regressed` when a previously-passing test now fails,
    /// `unchanged` when the targeted tests were already failing.
    pub fn run_tests(&mut self, root: &Path, scope: &TestScope) -> Result<GateResult> {
        let key = scope.key();
        let raw = invoke(&self.tests, root, &scope.args())?;

        let report: TestReport = parse_report("tests", &raw)?;
        let mut passed = report.passed;
        let mut failed = report.failed;
        passed.sort();
        passed.dedup();
        failed.sort();
        failed.dedup();

        let prior = self.memory.get(&key);
        let prior_passed: BTreeSet<&str> = prior
            .map(|r| r.passed.iter().map(String::as_str).collect())
            .unwrap_or_default();
        let prior_failed = prior.map(|r| r.failed.len()).unwrap_or(0);

        let status = if failed.is_empty() {
            GateStatus::Clean
        } else if failed.iter().any(|t| prior_passed.contains(t.as_str())) {
            GateStatus::Regressed
        } else {
            GateStatus::Unchanged
        };
        let result = GateResult {
            status,
            scope: key.clone(),
            at: Utc::now(),
            findings: Vec::new(),
            delta: failed.len() as i64 - prior_failed as i64,
            passed,
            failed,
            duration_ms: raw.duration_ms,
        };
        debug!(scope = %key, status = %result.status, failed = result.failed.len(), "test gate");
        self.memory.insert(key, result.clone());
        Ok(result)
    }
}

/// A placeholder result recorded in run history when the tool itself could
/// not produce one (spawn failure or timeout). Never stored in gate memory.
pub fn failed_to_run(scope_key: &str) -> GateResult {
    GateResult {
        status: GateStatus::FailedToRun,
        scope: scope_key.to_string(),
        at: Utc::now(),
        findings: Vec::new(),
        passed: Vec::new(),
        failed: Vec::new(),
        delta: 0,
        duration_ms: 0,
    }
}

// ---------------------------------------------------------------------------
// Subprocess plumbing
// ---------------------------------------------------------------------------

struct RawOutput {
    stdout: String,
    stderr: String,
    success: bool,
    duration_ms: u64,
}

fn parse_report<T: serde::de::DeserializeOwned>(kind: &str, raw: &RawOutput) -> Result<T> {
    serde_json::from_str(&raw.stdout).map_err(|e| {
        let hint = if raw.stdout.trim().is_empty() {
            raw.stderr.chars().take(500).collect::<String>()
        } else {
            raw.stdout.chars().take(500).collect::<String>()
        };
        let exit = if raw.success {
            ""
        } else {
            ", tool exited non-zero"
        };
        RemedyError::ToolUnavailable(format!(
            "{kind} tool produced no parseable report ({e}{exit}): {}",
            hint.trim()
        ))
    })
}

fn check_available(root: &Path, command: &str) -> Result<()> {
    let first = command
        .split_whitespace()
        .next()
        .ok_or_else(|| RemedyError::ToolUnavailable("no command configured".to_string()))?;
    if first.contains('/') {
        let path = if Path::new(first).is_absolute() {
            PathBuf::from(first)
        } else {
            root.join(first)
        };
        if !path.exists() {
            return Err(RemedyError::ToolUnavailable(format!("'{first}' not found")));
        }
    } else if which::which(first).is_err() {
        return Err(RemedyError::ToolUnavailable(format!(
            "'{first}' not found on PATH"
        )));
    }
    Ok(())
}

fn shell_quote(arg: &str) -> String {
    format!("'{}'", arg.replace('\'', r"'\''"))
}

/// Execute a tool command with the scope appended, under its configured
/// timeout. Uses dedicated threads for stdout/stderr reading (avoiding
/// pipe-buffer deadlocks) and a waiter thread with `mpsc::recv_timeout` for
/// timeout support; on timeout the process is killed by PID and no result is
/// produced.
fn invoke(tool: &ToolCommand, root: &Path, extra_args: &[String]) -> Result<RawOutput> {
    if tool.command.trim().is_empty() {
        return Err(RemedyError::ToolUnavailable(
            "no command configured".to_string(),
        ));
    }
    check_available(root, &tool.command)?;

    let mut full = tool.command.clone();
    for arg in extra_args {
        full.push(' ');
        full.push_str(&shell_quote(arg));
    }

    let start = std::time::Instant::now();
    let mut child = Command::new("sh")
        .arg("-c")
        .arg(&full)
        .current_dir(root)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| RemedyError::ToolUnavailable(format!("failed to spawn: {e}")))?;

    let child_pid = child.id();

    let stdout_handle = child.stdout.take();
    let stderr_handle = child.stderr.take();

    let stdout_thread = std::thread::spawn(move || -> String {
        let mut buf = String::new();
        if let Some(mut r) = stdout_handle {
            use std::io::Read;
            let _ = r.read_to_string(&mut buf);
        }
        buf
    });
    let stderr_thread = std::thread::spawn(move || -> String {
        let mut buf = String::new();
        if let Some(mut r) = stderr_handle {
            use std::io::Read;
            let _ = r.read_to_string(&mut buf);
        }
        buf
    });

    let timeout = Duration::from_secs(tool.timeout_seconds);
    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let _ = tx.send(child.wait());
    });

    let wait_result = match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(_) => {
            // Timeout — kill the process. The waiter thread will unblock once
            // the killed process exits; reader threads will get EOF on the
            // closed pipes and terminate naturally.
            kill_process(child_pid);
            return Err(RemedyError::Timeout {
                seconds: tool.timeout_seconds,
            });
        }
    };

    let stdout = stdout_thread.join().unwrap_or_default();
    let stderr = stderr_thread.join().unwrap_or_default();

    let status =
        wait_result.map_err(|e| RemedyError::ToolUnavailable(format!("wait failed: {e}")))?;

    Ok(RawOutput {
        stdout,
        stderr,
        success: status.success(),
        duration_ms: start.elapsed().as_millis() as u64,
    })
}

/// Terminate a process by PID using SIGKILL. Best-effort; errors are
/// silently ignored.
fn kill_process(pid: u32) {
    let _ = Command::new("kill")
        .arg("-9")
        .arg(pid.to_string())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
