use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemedyError {
    #[error("not initialized: run 'remedy init'")]
    NotInitialized,

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("category not found: {0}")]
    CategoryNotFound(String),

    #[error("test case not found: {0}")]
    TestCaseNotFound(String),

    #[error("test case already exists: {0}")]
    TestCaseExists(String),

    #[error("invalid id '{0}': must be alphanumeric with hyphens or underscores")]
    InvalidId(String),

    #[error("no remediation plan: run 'remedy scan' first")]
    NoPlan,

    #[error("tool unavailable: {0}")]
    ToolUnavailable(String),

    #[error("tool timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("regression detected: previously passing tests now fail: {}", .failed.join(", "))]
    RegressionDetected { failed: Vec<String> },

    #[error("refactor regression: previously passing tests now fail: {}", .failed.join(", "))]
    RefactorRegression { failed: Vec<String> },

    #[error("cannot confirm green for '{0}': no confirmed red run exists")]
    SkippedRedPhase(String),

    #[error("invalid transition from {from} to {to}: {reason}")]
    InvalidTransition {
        from: String,
        to: String,
        reason: String,
    },

    #[error("blocked by: {0}")]
    Blocked(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RemedyError>;
