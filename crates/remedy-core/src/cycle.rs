//! Red-Green-Refactor cycle state machine.
//!
//! One test case at a time moves through `red -> green -> refactor ->
//! closed`. Every transition that claims progress must be backed by a
//! recorded [`CycleRun`]; the machine validates the evidence and refuses the
//! transition otherwise. It never reverts state on a violation — it reports
//! and leaves the position unchanged.

use crate::error::{RemedyError, Result};
use crate::gate::{GateResult, TestScope};
use crate::paths;
use crate::types::{CycleState, GateStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const MAX_RUNS: usize = 200;

// ---------------------------------------------------------------------------
// TestCase
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub state: CycleState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Id of the cycle run that confirmed this case failing. Green is
    /// unreachable until this is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub red_run: Option<String>,
}

// ---------------------------------------------------------------------------
// CycleRun
// ---------------------------------------------------------------------------

/// One recorded execution of the test gate. Immutable; superseded by the
/// next run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleRun {
    pub id: String,
    pub at: DateTime<Utc>,
    pub scope: String,
    pub status: GateStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub passed: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed: Vec<String>,
}

impl CycleRun {
    pub fn from_gate(result: &GateResult) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            at: result.at,
            scope: result.scope.clone(),
            status: result.status,
            passed: result.passed.clone(),
            failed: result.failed.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// CycleBoard
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CycleBoard {
    #[serde(default)]
    pub cases: Vec<TestCase>,
    #[serde(default)]
    pub runs: Vec<CycleRun>,
}

impl CycleBoard {
    // ---------------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------------

    pub fn case(&self, id: &str) -> Result<&TestCase> {
        self.cases
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| RemedyError::TestCaseNotFound(id.to_string()))
    }

    fn case_index(&self, id: &str) -> Result<usize> {
        self.cases
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| RemedyError::TestCaseNotFound(id.to_string()))
    }

    /// The case currently in red or green, if any. At most one exists.
    pub fn active(&self) -> Option<&TestCase> {
        self.cases.iter().find(|c| c.state.is_active())
    }

    pub fn run(&self, id: &str) -> Option<&CycleRun> {
        self.runs.iter().find(|r| r.id == id)
    }

    // ---------------------------------------------------------------------------
    // Runs
    // ---------------------------------------------------------------------------

    /// Record a test gate result as a durable cycle run.
    pub fn record_run(&mut self, result: &GateResult) -> CycleRun {
        let run = CycleRun::from_gate(result);
        self.runs.push(run.clone());
        if self.runs.len() > MAX_RUNS {
            self.runs.drain(..self.runs.len() - MAX_RUNS);
        }
        run
    }

    // ---------------------------------------------------------------------------
    // Transitions
    // ---------------------------------------------------------------------------

    /// Open a new test case in red. Refused while another case is red or
    /// green — one test at a time.
    pub fn begin_red(&mut self, id: &str, description: Option<String>) -> Result<&TestCase> {
        paths::validate_id(id)?;
        if self.cases.iter().any(|c| c.id == id) {
            return Err(RemedyError::TestCaseExists(id.to_string()));
        }
        if let Some(active) = self.active() {
            return Err(RemedyError::InvalidTransition {
                from: active.state.to_string(),
                to: CycleState::Red.to_string(),
                reason: format!("'{}' is already active; one test case at a time", active.id),
            });
        }
        let now = Utc::now();
        self.cases.push(TestCase {
            id: id.to_string(),
            description,
            state: CycleState::Red,
            created_at: now,
            updated_at: now,
            red_run: None,
        });
        Ok(self.cases.last().expect("just pushed"))
    }

    /// Record the failing-run evidence for a red case. The run must show the
    /// case failing — a passing test cannot be confirmed red.
    pub fn confirm_red(&mut self, id: &str, run: &CycleRun) -> Result<()> {
        let idx = self.case_index(id)?;
        let case = &self.cases[idx];
        if case.state != CycleState::Red {
            return Err(RemedyError::InvalidTransition {
                from: case.state.to_string(),
                to: CycleState::Red.to_string(),
                reason: "only a case in red can be confirmed red".to_string(),
            });
        }
        if !run.failed.iter().any(|t| t == id) {
            return Err(RemedyError::InvalidTransition {
                from: CycleState::Red.to_string(),
                to: CycleState::Red.to_string(),
                reason: format!("'{id}' did not fail in the given run; a failing test must be observed first"),
            });
        }
        self.cases[idx].red_run = Some(run.id.clone());
        self.cases[idx].updated_at = Utc::now();
        Ok(())
    }

    /// Move a red case to green. Requires confirmed red evidence, a run
    /// where the case passes, and no previously-passing case failing in
    /// that run.
    pub fn confirm_green(&mut self, id: &str, run: &CycleRun) -> Result<()> {
        let idx = self.case_index(id)?;
        let case = &self.cases[idx];
        if case.state != CycleState::Red {
            return Err(RemedyError::InvalidTransition {
                from: case.state.to_string(),
                to: CycleState::Green.to_string(),
                reason: "green is only reachable from red".to_string(),
            });
        }
        if case.red_run.is_none() {
            return Err(RemedyError::SkippedRedPhase(id.to_string()));
        }
        if !run.passed.iter().any(|t| t == id) {
            return Err(RemedyError::InvalidTransition {
                from: CycleState::Red.to_string(),
                to: CycleState::Green.to_string(),
                reason: format!("'{id}' is not passing in the given run"),
            });
        }
        let regressions: Vec<String> = self
            .cases
            .iter()
            .filter(|c| c.id != id && c.state != CycleState::Red)
            .filter(|c| run.failed.iter().any(|t| t == &c.id))
            .map(|c| c.id.clone())
            .collect();
        if !regressions.is_empty() {
            return Err(RemedyError::RegressionDetected {
                failed: regressions,
            });
        }
        self.cases[idx].state = CycleState::Green;
        self.cases[idx].updated_at = Utc::now();
        Ok(())
    }

    /// Green to refactor, unconditional.
    pub fn enter_refactor(&mut self, id: &str) -> Result<()> {
        let idx = self.case_index(id)?;
        let case = &self.cases[idx];
        if case.state != CycleState::Green {
            return Err(RemedyError::InvalidTransition {
                from: case.state.to_string(),
                to: CycleState::Refactor.to_string(),
                reason: "refactor is only reachable from green".to_string(),
            });
        }
        self.cases[idx].state = CycleState::Refactor;
        self.cases[idx].updated_at = Utc::now();
        Ok(())
    }

    /// Validate a structural change during refactor: the full suite must be
    /// clean. A regressed run freezes the case in refactor and reports; the
    /// triggering change is the caller's to revert.
    pub fn refactor_check(&mut self, id: &str, run: &CycleRun) -> Result<()> {
        let idx = self.case_index(id)?;
        let case = &self.cases[idx];
        if case.state != CycleState::Refactor {
            return Err(RemedyError::InvalidTransition {
                from: case.state.to_string(),
                to: CycleState::Refactor.to_string(),
                reason: "no refactor in progress for this case".to_string(),
            });
        }
        if run.scope != TestScope::All.key() {
            return Err(RemedyError::InvalidTransition {
                from: CycleState::Refactor.to_string(),
                to: CycleState::Refactor.to_string(),
                reason: "refactor verification requires a full-suite run".to_string(),
            });
        }
        match run.status {
            GateStatus::Clean => {
                self.cases[idx].updated_at = Utc::now();
                Ok(())
            }
            GateStatus::Regressed => Err(RemedyError::RefactorRegression {
                failed: run.failed.clone(),
            }),
            _ => Err(RemedyError::InvalidTransition {
                from: CycleState::Refactor.to_string(),
                to: CycleState::Refactor.to_string(),
                reason: format!("full suite is not clean ({})", run.status),
            }),
        }
    }

    /// Refactor to closed. Terminal.
    pub fn close(&mut self, id: &str) -> Result<()> {
        let idx = self.case_index(id)?;
        let case = &self.cases[idx];
        if case.state != CycleState::Refactor {
            return Err(RemedyError::InvalidTransition {
                from: case.state.to_string(),
                to: CycleState::Closed.to_string(),
                reason: "closed is only reachable from refactor".to_string(),
            });
        }
        self.cases[idx].state = CycleState::Closed;
        self.cases[idx].updated_at = Utc::now();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn test_run(scope: &TestScope, status: GateStatus, passed: &[&str], failed: &[&str]) -> CycleRun {
        CycleRun {
            id: Uuid::new_v4().to_string(),
            at: Utc::now(),
            scope: scope.key(),
            status,
            passed: passed.iter().map(|s| s.to_string()).collect(),
            failed: failed.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn case_scope(id: &str) -> TestScope {
        TestScope::Case { id: id.to_string() }
    }

    #[test]
    fn full_cycle_red_to_closed() {
        let mut board = CycleBoard::default();
        board.begin_red("T1", Some("parses empty input".to_string())).unwrap();
        assert_eq!(board.case("T1").unwrap().state, CycleState::Red);

        let red = test_run(&case_scope("T1"), GateStatus::Unchanged, &[], &["T1"]);
        board.confirm_red("T1", &red).unwrap();

        let green = test_run(&TestScope::All, GateStatus::Clean, &["T1"], &[]);
        board.confirm_green("T1", &green).unwrap();
        assert_eq!(board.case("T1").unwrap().state, CycleState::Green);

        board.enter_refactor("T1").unwrap();
        let clean = test_run(&TestScope::All, GateStatus::Clean, &["T1"], &[]);
        board.refactor_check("T1", &clean).unwrap();
        assert_eq!(board.case("T1").unwrap().state, CycleState::Refactor);

        board.close("T1").unwrap();
        assert_eq!(board.case("T1").unwrap().state, CycleState::Closed);
    }

    #[test]
    fn green_without_confirmed_red_is_refused() {
        let mut board = CycleBoard::default();
        board.begin_red("T1", None).unwrap();
        let green = test_run(&TestScope::All, GateStatus::Clean, &["T1"], &[]);
        assert!(matches!(
            board.confirm_green("T1", &green),
            Err(RemedyError::SkippedRedPhase(_))
        ));
        assert_eq!(board.case("T1").unwrap().state, CycleState::Red);
    }

    #[test]
    fn confirm_red_requires_a_failing_run() {
        let mut board = CycleBoard::default();
        board.begin_red("T1", None).unwrap();
        let passing = test_run(&case_scope("T1"), GateStatus::Clean, &["T1"], &[]);
        assert!(matches!(
            board.confirm_red("T1", &passing),
            Err(RemedyError::InvalidTransition { .. })
        ));
        assert!(board.case("T1").unwrap().red_run.is_none());
    }

    #[test]
    fn one_test_case_at_a_time() {
        let mut board = CycleBoard::default();
        board.begin_red("T1", None).unwrap();
        assert!(matches!(
            board.begin_red("T2", None),
            Err(RemedyError::InvalidTransition { .. })
        ));

        // Once T1 reaches refactor, a new case may begin.
        let red = test_run(&case_scope("T1"), GateStatus::Unchanged, &[], &["T1"]);
        board.confirm_red("T1", &red).unwrap();
        let green = test_run(&TestScope::All, GateStatus::Clean, &["T1"], &[]);
        board.confirm_green("T1", &green).unwrap();
        board.enter_refactor("T1").unwrap();
        board.begin_red("T2", None).unwrap();
    }

    #[test]
    fn regression_blocks_green() {
        let mut board = CycleBoard::default();
        // T0 already closed.
        board.begin_red("T0", None).unwrap();
        let red0 = test_run(&case_scope("T0"), GateStatus::Unchanged, &[], &["T0"]);
        board.confirm_red("T0", &red0).unwrap();
        let green0 = test_run(&TestScope::All, GateStatus::Clean, &["T0"], &[]);
        board.confirm_green("T0", &green0).unwrap();
        board.enter_refactor("T0").unwrap();
        board.close("T0").unwrap();

        board.begin_red("T1", None).unwrap();
        let red1 = test_run(&case_scope("T1"), GateStatus::Unchanged, &[], &["T1"]);
        board.confirm_red("T1", &red1).unwrap();

        // T1 now passes but the implementation broke T0.
        let run = test_run(
            &TestScope::All,
            GateStatus::Regressed,
            &["T1"],
            &["T0"],
        );
        let err = board.confirm_green("T1", &run);
        match err {
            Err(RemedyError::RegressionDetected { failed }) => {
                assert_eq!(failed, vec!["T0"]);
            }
            other => panic!("expected RegressionDetected, got {other:?}"),
        }
        assert_eq!(board.case("T1").unwrap().state, CycleState::Red);
    }

    #[test]
    fn refactor_regression_freezes_case() {
        let mut board = CycleBoard::default();
        board.begin_red("T1", None).unwrap();
        let red = test_run(&case_scope("T1"), GateStatus::Unchanged, &[], &["T1"]);
        board.confirm_red("T1", &red).unwrap();
        let green = test_run(&TestScope::All, GateStatus::Clean, &["T1"], &[]);
        board.confirm_green("T1", &green).unwrap();
        board.enter_refactor("T1").unwrap();

        let bad = test_run(&TestScope::All, GateStatus::Regressed, &[], &["T1"]);
        assert!(matches!(
            board.refactor_check("T1", &bad),
            Err(RemedyError::RefactorRegression { .. })
        ));
        // Frozen in refactor, not closed.
        assert_eq!(board.case("T1").unwrap().state, CycleState::Refactor);
    }

    #[test]
    fn refactor_check_requires_full_suite() {
        let mut board = CycleBoard::default();
        board.begin_red("T1", None).unwrap();
        let red = test_run(&case_scope("T1"), GateStatus::Unchanged, &[], &["T1"]);
        board.confirm_red("T1", &red).unwrap();
        let green = test_run(&TestScope::All, GateStatus::Clean, &["T1"], &[]);
        board.confirm_green("T1", &green).unwrap();
        board.enter_refactor("T1").unwrap();

        let narrow = test_run(&case_scope("T1"), GateStatus::Clean, &["T1"], &[]);
        assert!(matches!(
            board.refactor_check("T1", &narrow),
            Err(RemedyError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn close_only_from_refactor() {
        let mut board = CycleBoard::default();
        board.begin_red("T1", None).unwrap();
        assert!(matches!(
            board.close("T1"),
            Err(RemedyError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn refactor_never_returns_to_red() {
        let mut board = CycleBoard::default();
        board.begin_red("T1", None).unwrap();
        let red = test_run(&case_scope("T1"), GateStatus::Unchanged, &[], &["T1"]);
        board.confirm_red("T1", &red).unwrap();
        let green = test_run(&TestScope::All, GateStatus::Clean, &["T1"], &[]);
        board.confirm_green("T1", &green).unwrap();
        board.enter_refactor("T1").unwrap();

        // Confirming red again from refactor is an invalid transition.
        let failing = test_run(&case_scope("T1"), GateStatus::Unchanged, &[], &["T1"]);
        assert!(matches!(
            board.confirm_red("T1", &failing),
            Err(RemedyError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn duplicate_case_id_refused() {
        let mut board = CycleBoard::default();
        board.begin_red("T1", None).unwrap();
        let red = test_run(&case_scope("T1"), GateStatus::Unchanged, &[], &["T1"]);
        board.confirm_red("T1", &red).unwrap();
        let green = test_run(&TestScope::All, GateStatus::Clean, &["T1"], &[]);
        board.confirm_green("T1", &green).unwrap();
        board.enter_refactor("T1").unwrap();
        assert!(matches!(
            board.begin_red("T1", None),
            Err(RemedyError::TestCaseExists(_))
        ));
    }

    #[test]
    fn run_history_is_trimmed() {
        let mut board = CycleBoard::default();
        let result = crate::gate::failed_to_run("tests:all");
        for _ in 0..(MAX_RUNS + 10) {
            board.record_run(&result);
        }
        assert_eq!(board.runs.len(), MAX_RUNS);
    }

    #[test]
    fn board_yaml_roundtrip() {
        let mut board = CycleBoard::default();
        board.begin_red("T1", Some("first case".to_string())).unwrap();
        let red = test_run(&case_scope("T1"), GateStatus::Unchanged, &[], &["T1"]);
        board.confirm_red("T1", &red).unwrap();

        let yaml = serde_yaml::to_string(&board).unwrap();
        let parsed: CycleBoard = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.cases.len(), 1);
        assert_eq!(parsed.cases[0].state, CycleState::Red);
        assert!(parsed.cases[0].red_run.is_some());
    }
}
