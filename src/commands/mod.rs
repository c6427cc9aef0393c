//! CLI command implementations.
//!
//! Each submodule implements a sandpipe CLI command with pure core logic
//! separated from IO for testability.

pub mod clean;
pub mod exec;
pub mod init;
pub mod run;
pub mod status;

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

use crate::agent::ShellAgentFactory;
use crate::config::Config;
use crate::pipeline::{Pipeline, PipelineSettings};
use crate::sandbox::HttpSandboxService;

/// Builds a journaled pipeline against the configured sandbox service.
fn build_pipeline(project_dir: &Path, config: &Config) -> Result<Pipeline> {
    let service = HttpSandboxService::from_config(&config.service)
        .with_context(|| format!("Failed to connect to {}", config.service.api_url))?;

    Ok(Pipeline::new(
        Arc::new(service),
        Arc::new(ShellAgentFactory),
        PipelineSettings::from(config),
    )
    .with_journal(project_dir))
}
