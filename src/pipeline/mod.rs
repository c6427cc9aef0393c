//! Sandbox lifecycle pipeline.
//!
//! Runs three stages in a fixed order, threading only the sandbox name
//! through [`AgentState`]:
//!
//! 1. `provision`: make sure the template exists, create a sandbox, probe it.
//! 2. `delegate`: reconnect by name and hand the conversation to an agent.
//! 3. `cleanup`: delete the sandbox, best-effort.
//!
//! [`Pipeline::run`] guarantees that cleanup runs once a sandbox exists,
//! whether delegation succeeds, fails or panics.

mod error;

pub(crate) use error::PipelineError;

use anyhow::{Context, Result};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::agent::{AgentFactory, AgentSpec, Checkpointer, MemoryCheckpointer, RunConfig};
use crate::backend::RemoteBackend;
use crate::config::Config;
use crate::sandbox::{RemoteSandbox, SandboxError, SandboxService};
use crate::state::{AgentState, Stage};

/// Command used to check that a new sandbox accepts work.
const READINESS_PROBE: &str = "echo ready";

/// Knobs for one pipeline.
#[derive(Debug, Clone)]
pub(crate) struct PipelineSettings {
    pub template_name: String,
    pub template_image: String,
    pub strict_template_lookup: bool,
    pub create_timeout: Duration,
    pub readiness_timeout: Duration,
    pub command_timeout: Duration,
    pub system_prompt: String,
}

impl From<&Config> for PipelineSettings {
    fn from(config: &Config) -> Self {
        Self {
            template_name: config.template.name.clone(),
            template_image: config.template.image.clone(),
            strict_template_lookup: config.template.strict_lookup,
            create_timeout: config.sandbox.create_timeout(),
            readiness_timeout: config.sandbox.readiness_timeout(),
            command_timeout: config.sandbox.command_timeout(),
            system_prompt: config.agent.system_prompt.clone(),
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

/// Provision → delegate → cleanup over a remote sandbox service.
pub(crate) struct Pipeline {
    service: Arc<dyn SandboxService>,
    agents: Arc<dyn AgentFactory>,
    checkpointer: Arc<dyn Checkpointer>,
    settings: PipelineSettings,
    journal_dir: Option<PathBuf>,
}

impl Pipeline {
    pub fn new(
        service: Arc<dyn SandboxService>,
        agents: Arc<dyn AgentFactory>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            service,
            agents,
            checkpointer: Arc::new(MemoryCheckpointer::new()),
            settings,
            journal_dir: None,
        }
    }

    /// Uses a shared checkpointer instead of a private one.
    #[cfg(test)]
    pub fn with_checkpointer(mut self, checkpointer: Arc<dyn Checkpointer>) -> Self {
        self.checkpointer = checkpointer;
        self
    }

    /// Records the state under `project_dir` after every transition.
    pub fn with_journal(mut self, project_dir: &Path) -> Self {
        self.journal_dir = Some(project_dir.to_path_buf());
        self
    }

    /// Runs the whole pipeline with the configured agent.
    pub async fn run(&self, state: AgentState) -> Result<AgentState> {
        let (state, ()) = self
            .run_with(state, |pipeline, state| Box::pin(pipeline.delegate(state)))
            .await?;
        Ok(state)
    }

    /// Provisions a sandbox, runs `step` against it and always cleans up.
    ///
    /// Provisioning failures are returned before `step` runs. Once a sandbox
    /// exists, cleanup happens before `step`'s error is returned or its
    /// panic is resumed.
    pub async fn run_with<T, F>(&self, mut state: AgentState, step: F) -> Result<(AgentState, T)>
    where
        F: for<'a> FnOnce(&'a Self, &'a mut AgentState) -> BoxFuture<'a, Result<T>>,
    {
        self.provision(&mut state).await?;

        let outcome = AssertUnwindSafe(step(self, &mut state))
            .catch_unwind()
            .await;

        self.cleanup(&mut state).await;

        let value = match outcome {
            Ok(result) => result?,
            Err(panic) => std::panic::resume_unwind(panic),
        };

        state.stage = Stage::End;
        self.journal(&state)?;
        Ok((state, value))
    }

    /// Start → Provisioned.
    pub async fn provision(&self, state: &mut AgentState) -> Result<()> {
        let settings = &self.settings;
        self.ensure_template().await?;

        info!("Creating sandbox from template '{}'", settings.template_name);
        let sandbox = self
            .service
            .create_sandbox(&settings.template_name, settings.create_timeout)
            .await
            .with_context(|| {
                format!(
                    "Failed to create sandbox from template '{}'",
                    settings.template_name
                )
            })?;
        let name = sandbox.name().to_string();

        if let Err(err) = self.probe(sandbox.as_ref()).await {
            self.discard(&name).await;
            return Err(err);
        }

        info!("Sandbox ready: {}", name);
        let previous = state.stage;
        state.sandbox_id = Some(name.clone());
        state.stage = Stage::Provisioned;

        // An unrecorded sandbox could never be found by `clean`.
        if let Err(err) = self.journal(state) {
            state.sandbox_id = None;
            state.stage = previous;
            self.discard(&name).await;
            return Err(err);
        }
        Ok(())
    }

    /// Provisioned → AgentRun.
    pub async fn delegate(&self, state: &mut AgentState) -> Result<()> {
        let Some(id) = state.sandbox_id.clone() else {
            return Err(PipelineError::MissingSandboxId.into());
        };

        let backend = self.connect(&id).await?;
        let agent = self
            .agents
            .build(AgentSpec {
                backend: Arc::new(backend),
                system_prompt: self.settings.system_prompt.clone(),
                checkpointer: Arc::clone(&self.checkpointer),
            })
            .with_context(|| format!("Failed to build {} agent", self.agents.name()))?;

        info!("Running {} agent in sandbox {}", self.agents.name(), id);
        let config = RunConfig { thread_id: id };
        state.messages = agent.invoke(state.messages.clone(), &config).await?;
        debug!("Agent returned {} messages", state.messages.len());

        state.stage = Stage::AgentRun;
        self.journal(state)
    }

    /// Any stage → CleanedUp. Never fails.
    pub async fn cleanup(&self, state: &mut AgentState) {
        if let Some(id) = state.sandbox_id.take() {
            info!("Cleaning up sandbox: {}...", id);
            match self.release(&id).await {
                Ok(()) => info!("Sandbox deleted."),
                Err(err) => warn!("Failed to delete sandbox {}: {}", id, err),
            }
        }

        state.stage = Stage::CleanedUp;
        if let Err(err) = self.journal(state) {
            warn!("Failed to record cleanup: {:#}", err);
        }
    }

    /// Reconnects to a sandbox by name and wraps it as a backend.
    pub async fn connect(&self, id: &str) -> Result<RemoteBackend> {
        let sandbox = self
            .service
            .get_sandbox(id)
            .await
            .with_context(|| format!("Failed to reconnect to sandbox {id}"))?;
        Ok(RemoteBackend::with_timeout(
            sandbox,
            self.settings.command_timeout,
        ))
    }

    async fn ensure_template(&self) -> Result<()> {
        let name = &self.settings.template_name;
        let image = &self.settings.template_image;

        match self.service.get_template(name).await {
            Ok(info) => {
                debug!(
                    "Template '{}' exists (image: {})",
                    info.name,
                    info.image.as_deref().unwrap_or("unknown")
                );
                return Ok(());
            }
            Err(err) if err.is_not_found() => {
                info!("Creating template '{}'...", name);
            }
            Err(err) if self.settings.strict_template_lookup => {
                return Err(err).with_context(|| format!("Failed to look up template '{name}'"));
            }
            Err(err) => {
                warn!("Template lookup for '{}' failed ({}); creating it", name, err);
            }
        }

        self.service
            .create_template(name, image)
            .await
            .with_context(|| format!("Failed to create template '{name}' from {image}"))
    }

    async fn probe(&self, sandbox: &dyn RemoteSandbox) -> Result<()> {
        let result = sandbox
            .run(READINESS_PROBE, self.settings.readiness_timeout)
            .await
            .with_context(|| format!("Readiness probe failed for sandbox {}", sandbox.name()))?;

        if result.exit_code != 0 {
            return Err(PipelineError::ReadinessCheckFailed {
                sandbox: sandbox.name().to_string(),
                exit_code: result.exit_code,
            }
            .into());
        }
        Ok(())
    }

    /// Deletes a sandbox by name.
    pub async fn release(&self, id: &str) -> Result<(), SandboxError> {
        self.service.delete_sandbox(id).await
    }

    /// Deletes a sandbox that failed provisioning, logging any fault.
    async fn discard(&self, id: &str) {
        if let Err(err) = self.release(id).await {
            warn!("Failed to delete unusable sandbox {}: {}", id, err);
        }
    }

    fn journal(&self, state: &AgentState) -> Result<()> {
        match self.journal_dir {
            Some(ref dir) => state.save(dir),
            None => Ok(()),
        }
    }
}
