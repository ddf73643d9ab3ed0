use crate::category::{default_tier_rules, TierRule};
use crate::error::{RemedyError, Result};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// ToolCommand
// ---------------------------------------------------------------------------

/// An external verification tool: a shell command plus its deadline.
/// The command is run through `sh -c` with the scope arguments appended and
/// must print the tool's JSON report on stdout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCommand {
    #[serde(default)]
    pub command: String,
    #[serde(default = "default_tool_timeout")]
    pub timeout_seconds: u64,
}

fn default_tool_timeout() -> u64 {
    300
}

impl Default for ToolCommand {
    fn default() -> Self {
        Self {
            command: String::new(),
            timeout_seconds: default_tool_timeout(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    pub project: String,
    /// Static-analysis tool; emits `{"findings": [...]}` on stdout.
    #[serde(default)]
    pub analysis: ToolCommand,
    /// Test-runner tool; emits `{"passed": [...], "failed": [...]}` on stdout.
    #[serde(default)]
    pub tests: ToolCommand,
    /// Rule pattern → risk tier. Unlisted rules are treated as highest-risk.
    #[serde(default = "default_tier_rules")]
    pub tiers: Vec<TierRule>,
}

fn default_version() -> u32 {
    1
}

impl Config {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            version: 1,
            project: project.into(),
            analysis: ToolCommand::default(),
            tests: ToolCommand::default(),
            tiers: default_tier_rules(),
        }
    }

    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(RemedyError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let config: Config = serde_yaml::from_str(&data)?;
        Ok(config)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
