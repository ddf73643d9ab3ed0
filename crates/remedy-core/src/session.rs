use crate::cycle::CycleBoard;
use crate::error::{RemedyError, Result};
use crate::gate::GateResult;
use crate::paths;
use crate::plan::RemediationPlan;
use crate::types::GateStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

const MAX_HISTORY: usize = 200;

// ---------------------------------------------------------------------------
// Gate run history
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunKind {
    Analysis,
    Tests,
}

impl fmt::Display for RunKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RunKind::Analysis => "analysis",
            RunKind::Tests => "tests",
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateRunEntry {
    pub at: DateTime<Utc>,
    pub kind: RunKind,
    pub scope: String,
    pub status: GateStatus,
    pub delta: i64,
    pub duration_ms: u64,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// The durable state of one orchestration session: the remediation plan, the
/// cycle board, the gate's per-scope memory, and a trimmed run history.
/// One session is owned by one logical worker; independent sessions don't
/// share state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    #[serde(default = "default_version")]
    pub version: u32,
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<RemediationPlan>,
    #[serde(default)]
    pub cycle: CycleBoard,
    #[serde(default)]
    pub gate_memory: BTreeMap<String, GateResult>,
    #[serde(default)]
    pub history: Vec<GateRunEntry>,
}

fn default_version() -> u32 {
    1
}

impl Session {
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        paths::validate_id(&id)?;
        let now = Utc::now();
        Ok(Self {
            version: 1,
            id,
            created_at: now,
            updated_at: now,
            plan: None,
            cycle: CycleBoard::default(),
            gate_memory: BTreeMap::new(),
            history: Vec::new(),
        })
    }

    // ---------------------------------------------------------------------------
    // Persistence
    // ---------------------------------------------------------------------------

    pub fn load(root: &Path, id: &str) -> Result<Self> {
        if !paths::remedy_dir(root).exists() {
            return Err(RemedyError::NotInitialized);
        }
        let path = paths::session_path(root, id);
        if !path.exists() {
            return Err(RemedyError::SessionNotFound(id.to_string()));
        }
        let data = std::fs::read_to_string(&path)?;
        let session: Session = serde_yaml::from_str(&data)?;
        Ok(session)
    }

    /// Load the session if it exists, otherwise start a fresh one.
    pub fn open_or_create(root: &Path, id: &str) -> Result<Self> {
        match Self::load(root, id) {
            Ok(session) => Ok(session),
            Err(RemedyError::SessionNotFound(_)) => Self::new(id),
            Err(e) => Err(e),
        }
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::session_path(root, &self.id);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    pub fn list(root: &Path) -> Result<Vec<String>> {
        let dir = paths::sessions_dir(root);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some(id) = name.strip_suffix(".yaml") {
                ids.push(id.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }

    // ---------------------------------------------------------------------------
    // Mutations
    // ---------------------------------------------------------------------------

    /// Install a freshly built plan, superseding any previous one.
    pub fn set_plan(&mut self, plan: RemediationPlan) {
        self.plan = Some(plan);
        self.updated_at = Utc::now();
    }

    pub fn plan_mut(&mut self) -> Result<&mut RemediationPlan> {
        self.updated_at = Utc::now();
        self.plan.as_mut().ok_or(RemedyError::NoPlan)
    }

    /// Record one gate invocation in the run history.
    pub fn record_gate_run(&mut self, kind: RunKind, result: &GateResult) {
        self.history.push(GateRunEntry {
            at: result.at,
            kind,
            scope: result.scope.clone(),
            status: result.status,
            delta: result.delta,
            duration_ms: result.duration_ms,
        });
        if self.history.len() > MAX_HISTORY {
            self.history.drain(..self.history.len() - MAX_HISTORY);
        }
        self.updated_at = Utc::now();
    }

    pub fn last_run(&self) -> Option<&GateRunEntry> {
        self.history.last()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
