//! Saved plans and rollout results
//!
//! The last synthesized plan is kept as JSON so later runs can diff against
//! it. Rollout summaries are kept next to it for audit.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use stackgraph::{DeploymentPlan, RolloutSummary};
use std::fs;
use std::path::{Path, PathBuf};

const PLAN_FILE: &str = "last-plan.json";
const ROLLOUT_FILE: &str = "last-rollout.json";

/// A plan as written to disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedPlan {
    pub saved_at: DateTime<Utc>,
    /// blake3 hash of the serialized plan
    pub fingerprint: String,
    pub plan: DeploymentPlan,
}

/// A rollout as written to disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedRollout {
    pub finished_at: DateTime<Utc>,
    pub plan_fingerprint: String,
    pub summary: RolloutSummary,
}

/// Hash identifying a plan's content
pub fn fingerprint(plan: &DeploymentPlan) -> Result<String> {
    let json = serde_json::to_vec(plan).context("Failed to serialize plan")?;
    Ok(blake3::hash(&json).to_hex().to_string())
}

/// Directory holding saved state
#[derive(Debug, Clone)]
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store in the configured state directory
    pub fn open_default() -> Result<Self> {
        Ok(Self::new(crate::paths::state_dir()?))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn save_plan(&self, plan: &DeploymentPlan) -> Result<SavedPlan> {
        let saved = SavedPlan {
            saved_at: Utc::now(),
            fingerprint: fingerprint(plan)?,
            plan: plan.clone(),
        };
        self.write(PLAN_FILE, &saved)?;
        Ok(saved)
    }

    pub fn load_plan(&self) -> Result<Option<SavedPlan>> {
        self.read(PLAN_FILE)
    }

    pub fn save_rollout(&self, plan: &DeploymentPlan, summary: &RolloutSummary) -> Result<()> {
        let saved = SavedRollout {
            finished_at: Utc::now(),
            plan_fingerprint: fingerprint(plan)?,
            summary: summary.clone(),
        };
        self.write(ROLLOUT_FILE, &saved)
    }

    pub fn load_rollout(&self) -> Result<Option<SavedRollout>> {
        self.read(ROLLOUT_FILE)
    }

    fn write<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        fs::create_dir_all(&self.dir).with_context(|| {
            format!("Failed to create state directory: {}", self.dir.display())
        })?;

        let path = self.dir.join(name);
        let content =
            serde_json::to_string_pretty(value).context("Failed to serialize state to JSON")?;
        fs::write(&path, content)
            .with_context(|| format!("Failed to write state file: {}", path.display()))?;

        log::debug!("Saved state to {}", path.display());
        Ok(())
    }

    fn read<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        let path = self.dir.join(name);
        if !path.exists() {
            log::debug!("State file {} does not exist", path.display());
            return Ok(None);
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read state file: {}", path.display()))?;
        let value = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse state file: {}", path.display()))?;
        Ok(Some(value))
    }
}
