use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = crate::error::RemedyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "error" => Ok(Severity::Error),
            "warning" => Ok(Severity::Warning),
            _ => Err(crate::error::RemedyError::InvalidId(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// RiskTier
// ---------------------------------------------------------------------------

/// Sequencing priority for a category of findings. Lower tiers are fixed
/// first: removing dead code is low-risk, while findings that imply
/// incomplete logic need the most scrutiny and go last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    Structural,
    Stylistic,
    IncompleteLogic,
}

impl RiskTier {
    pub fn all() -> &'static [RiskTier] {
        &[
            RiskTier::Structural,
            RiskTier::Stylistic,
            RiskTier::IncompleteLogic,
        ]
    }

    /// 1-based tier number used in output: 1 = fix first, 3 = fix last.
    pub fn number(self) -> u8 {
        self as u8 + 1
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskTier::Structural => "structural",
            RiskTier::Stylistic => "stylistic",
            RiskTier::IncompleteLogic => "incomplete_logic",
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RiskTier {
    type Err = crate::error::RemedyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "structural" | "1" => Ok(RiskTier::Structural),
            "stylistic" | "2" => Ok(RiskTier::Stylistic),
            "incomplete_logic" | "3" => Ok(RiskTier::IncompleteLogic),
            _ => Err(crate::error::RemedyError::InvalidId(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// CategoryStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryStatus {
    Pending,
    InProgress,
    Done,
    Blocked,
}

impl CategoryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CategoryStatus::Pending => "pending",
            CategoryStatus::InProgress => "in_progress",
            CategoryStatus::Done => "done",
            CategoryStatus::Blocked => "blocked",
        }
    }
}

impl fmt::Display for CategoryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// CycleState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleState {
    Red,
    Green,
    Refactor,
    Closed,
}

impl CycleState {
    pub fn as_str(self) -> &'static str {
        match self {
            CycleState::Red => "red",
            CycleState::Green => "green",
            CycleState::Refactor => "refactor",
            CycleState::Closed => "closed",
        }
    }

    /// Red and green are exclusive: only one test case may occupy either
    /// at a time across a session.
    pub fn is_active(self) -> bool {
        matches!(self, CycleState::Red | CycleState::Green)
    }
}

impl fmt::Display for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CycleState {
    type Err = crate::error::RemedyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "red" => Ok(CycleState::Red),
            "green" => Ok(CycleState::Green),
            "refactor" => Ok(CycleState::Refactor),
            "closed" => Ok(CycleState::Closed),
            _ => Err(crate::error::RemedyError::InvalidId(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// GateStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateStatus {
    Clean,
    Regressed,
    Unchanged,
    FailedToRun,
}

impl GateStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            GateStatus::Clean => "clean",
            GateStatus::Regressed => "regressed",
            GateStatus::Unchanged => "unchanged",
            GateStatus::FailedToRun => "failed_to_run",
        }
    }
}

impl fmt::Display for GateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
