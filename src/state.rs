use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::agent::Message;

pub(crate) const STATE_FILE: &str = ".sandpipe/state.toml";

/// Position in the sandbox lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    #[default]
    Start,
    Provisioned,
    AgentRun,
    CleanedUp,
    End,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::Provisioned => write!(f, "provisioned"),
            Self::AgentRun => write!(f, "agent-run"),
            Self::CleanedUp => write!(f, "cleaned-up"),
            Self::End => write!(f, "end"),
        }
    }
}

/// State threaded through the pipeline.
///
/// Only the sandbox name is kept between stages; each stage reconnects to
/// the sandbox by that name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentState {
    pub stage: Stage,
    pub sandbox_id: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl Default for AgentState {
    fn default() -> Self {
        Self {
            stage: Stage::Start,
            sandbox_id: None,
            started_at: Utc::now(),
            messages: Vec::new(),
        }
    }
}

impl AgentState {
    /// Fresh state holding the initial conversation.
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    /// Load state from file if it exists
    pub fn load(project_dir: &Path) -> Result<Option<Self>> {
        let state_path = project_dir.join(STATE_FILE);

        if !state_path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&state_path)
            .with_context(|| format!("Failed to read state file: {}", state_path.display()))?;

        let state: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse state file: {}", state_path.display()))?;

        Ok(Some(state))
    }

    /// Save state to file
    pub fn save(&self, project_dir: &Path) -> Result<()> {
        let state_path = project_dir.join(STATE_FILE);

        if let Some(parent) = state_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize state")?;

        fs::write(&state_path, content)
            .with_context(|| format!("Failed to write state file: {}", state_path.display()))?;

        Ok(())
    }

    /// Delete state file
    pub fn delete(project_dir: &Path) -> Result<bool> {
        let state_path = project_dir.join(STATE_FILE);

        if state_path.exists() {
            fs::remove_file(&state_path).with_context(|| {
                format!("Failed to delete state file: {}", state_path.display())
            })?;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}
