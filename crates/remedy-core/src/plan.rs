//! Remediation plan: an ordered run of categories through
//! `pending -> in_progress -> done`, halting on `blocked`.

use crate::category::Category;
use crate::error::{RemedyError, Result};
use crate::gate::{AnalysisScope, GateResult};
use crate::types::{CategoryStatus, GateStatus, RiskTier};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// PlanEntry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanEntry {
    pub name: String,
    pub tier: RiskTier,
    pub finding_ids: Vec<String>,
    pub status: CategoryStatus,
}

impl PlanEntry {
    fn from_category(category: Category) -> Self {
        Self {
            name: category.name,
            tier: category.tier,
            finding_ids: category.finding_ids,
            status: CategoryStatus::Pending,
        }
    }
}

// ---------------------------------------------------------------------------
// StepOutcome
// ---------------------------------------------------------------------------

/// What a verification pass concluded about the in-progress category.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    /// Category findings are gone and the suite held: marked done.
    Done { category: String },
    /// Findings for this category's rule remain; still in progress.
    Incomplete { category: String, remaining: usize },
}

// ---------------------------------------------------------------------------
// RemediationPlan
// ---------------------------------------------------------------------------

/// Owned exclusively by one session; rebuilt whenever a fresh finding set is
/// categorized. Entries stay in categorizer order, which is already the
/// remediation order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemediationPlan {
    pub created_at: DateTime<Utc>,
    pub scope: AnalysisScope,
    pub entries: Vec<PlanEntry>,
    /// Categories the caller gave up on after a block. Kept for inspection;
    /// no longer processed.
    #[serde(default)]
    pub abandoned: Vec<PlanEntry>,
}

impl RemediationPlan {
    pub fn build(scope: AnalysisScope, categories: Vec<Category>) -> Self {
        Self {
            created_at: Utc::now(),
            scope,
            entries: categories
                .into_iter()
                .map(PlanEntry::from_category)
                .collect(),
            abandoned: Vec::new(),
        }
    }

    // ---------------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------------

    pub fn current(&self) -> Option<&PlanEntry> {
        self.entries
            .iter()
            .find(|e| e.status == CategoryStatus::InProgress)
    }

    pub fn blocked_entry(&self) -> Option<&PlanEntry> {
        self.entries
            .iter()
            .find(|e| e.status == CategoryStatus::Blocked)
    }

    pub fn is_complete(&self) -> bool {
        self.entries
            .iter()
            .all(|e| e.status == CategoryStatus::Done)
    }

    pub fn entry(&self, name: &str) -> Option<&PlanEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    // ---------------------------------------------------------------------------
    // Transitions
    // ---------------------------------------------------------------------------

    /// Select the next pending category (entries are already in risk order)
    /// and mark it in progress. Returns `None` when every entry is done.
    pub fn advance(&mut self) -> Result<Option<&PlanEntry>> {
        if let Some(blocked) = self.blocked_entry() {
            return Err(RemedyError::Blocked(format!(
                "category '{}' is blocked; retry or abandon it first",
                blocked.name
            )));
        }
        if let Some(current) = self.current() {
            return Err(RemedyError::InvalidTransition {
                from: current.name.clone(),
                to: "next category".to_string(),
                reason: "at most one category may be in progress".to_string(),
            });
        }
        let Some(idx) = self
            .entries
            .iter()
            .position(|e| e.status == CategoryStatus::Pending)
        else {
            return Ok(None);
        };
        self.entries[idx].status = CategoryStatus::InProgress;
        Ok(Some(&self.entries[idx]))
    }

    /// Apply the outcome of a verification pass to the in-progress category:
    /// done when the category's rule is clean and the suite held, blocked on
    /// a test regression, otherwise still in progress. Gate failures never
    /// reach this point, so a retried step is idempotent.
    pub fn record_verdict(
        &mut self,
        analysis: &GateResult,
        tests: &GateResult,
    ) -> Result<StepOutcome> {
        let Some(idx) = self
            .entries
            .iter()
            .position(|e| e.status == CategoryStatus::InProgress)
        else {
            return Err(RemedyError::InvalidTransition {
                from: "idle".to_string(),
                to: "verify".to_string(),
                reason: "no category is in progress".to_string(),
            });
        };

        if analysis.status == GateStatus::FailedToRun || tests.status == GateStatus::FailedToRun {
            return Err(RemedyError::ToolUnavailable(
                "verification gate did not produce a result".to_string(),
            ));
        }

        if tests.status == GateStatus::Regressed {
            self.entries[idx].status = CategoryStatus::Blocked;
            return Err(RemedyError::RegressionDetected {
                failed: tests.failed.clone(),
            });
        }

        let name = self.entries[idx].name.clone();
        let remaining = analysis
            .findings
            .iter()
            .filter(|f| f.rule_name() == name)
            .count();
        if remaining > 0 {
            return Ok(StepOutcome::Incomplete {
                category: name,
                remaining,
            });
        }

        self.entries[idx].status = CategoryStatus::Done;
        Ok(StepOutcome::Done { category: name })
    }

    /// Put the blocked category back in progress for another attempt.
    pub fn retry_blocked(&mut self) -> Result<&PlanEntry> {
        let Some(idx) = self
            .entries
            .iter()
            .position(|e| e.status == CategoryStatus::Blocked)
        else {
            return Err(RemedyError::InvalidTransition {
                from: "idle".to_string(),
                to: "in_progress".to_string(),
                reason: "no category is blocked".to_string(),
            });
        };
        self.entries[idx].status = CategoryStatus::InProgress;
        Ok(&self.entries[idx])
    }

    /// Give up on a blocked or in-progress category. It moves to the
    /// abandoned list and the plan resumes past it.
    pub fn abandon(&mut self, name: &str) -> Result<()> {
        let Some(idx) = self.entries.iter().position(|e| e.name == name) else {
            return Err(RemedyError::CategoryNotFound(name.to_string()));
        };
        match self.entries[idx].status {
            CategoryStatus::Blocked | CategoryStatus::InProgress => {
                let entry = self.entries.remove(idx);
                self.abandoned.push(entry);
                Ok(())
            }
            status => Err(RemedyError::InvalidTransition {
                from: status.to_string(),
                to: "abandoned".to_string(),
                reason: "only a blocked or in-progress category can be abandoned".to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
