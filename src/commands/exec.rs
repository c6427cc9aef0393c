//! Run a single command in a throwaway sandbox.
//!
//! Local files are uploaded before the command runs and requested files
//! are downloaded after it finishes. The sandbox is deleted either way.

use anyhow::{bail, Context, Result};
use colored::Colorize;
use std::fmt::Write;
use std::fs;
use tracing::info;

use crate::backend::{ExecuteResponse, FileDownloadResponse, SandboxBackend};
use crate::config::Config;
use crate::pipeline::{Pipeline, PipelineError};
use crate::state::AgentState;

/// A `FROM=TO` path pair from the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapping {
    pub from: String,
    pub to: String,
}

/// Parses `FROM=TO`. Splits on the first `=`.
pub fn parse_mapping(value: &str) -> Result<Mapping, String> {
    match value.split_once('=') {
        Some((from, to)) if !from.is_empty() && !to.is_empty() => Ok(Mapping {
            from: from.to_string(),
            to: to.to_string(),
        }),
        _ => Err(format!("expected FROM=TO, got '{value}'")),
    }
}

/// Work to perform inside the sandbox.
struct ExecRequest {
    command: String,
    uploads: Vec<(String, Vec<u8>)>,
    downloads: Vec<String>,
}

struct ExecOutcome {
    response: ExecuteResponse,
    downloads: Vec<FileDownloadResponse>,
}

/// Entry point: reads uploads from disk, runs the command, writes downloads.
pub async fn run(command: Vec<String>, uploads: Vec<Mapping>, downloads: Vec<Mapping>) -> Result<()> {
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    let config = Config::load(&cwd)?;

    let mut files = Vec::with_capacity(uploads.len());
    for mapping in &uploads {
        let content = fs::read(&mapping.from)
            .with_context(|| format!("Failed to read {}", mapping.from))?;
        files.push((mapping.to.clone(), content));
    }

    let request = ExecRequest {
        command: shell_words::join(&command),
        uploads: files,
        downloads: downloads.iter().map(|m| m.from.clone()).collect(),
    };

    let pipeline = super::build_pipeline(&cwd, &config)?;
    let outcome = exec_in_sandbox(&pipeline, request).await?;

    for (mapping, file) in downloads.iter().zip(&outcome.downloads) {
        match (&file.content, &file.error) {
            (Some(content), _) => {
                fs::write(&mapping.to, content)
                    .with_context(|| format!("Failed to write {}", mapping.to))?;
                info!("Downloaded {} to {}", file.path, mapping.to);
            }
            (None, error) => bail!(
                "Failed to download {}: {}",
                file.path,
                error.as_deref().unwrap_or("no content")
            ),
        }
    }

    print!("{}", outcome.response.output);
    if !outcome.response.output.is_empty() && !outcome.response.output.ends_with('\n') {
        println!();
    }
    eprint!("{}", format_summary(&outcome.response));

    if outcome.response.exit_code != 0 {
        bail!("Command exited with code {}", outcome.response.exit_code);
    }
    Ok(())
}

async fn exec_in_sandbox(pipeline: &Pipeline, request: ExecRequest) -> Result<ExecOutcome> {
    let (_, outcome) = pipeline
        .run_with(AgentState::default(), move |pipeline, state| {
            Box::pin(async move {
                let id = state
                    .sandbox_id
                    .clone()
                    .ok_or(PipelineError::MissingSandboxId)?;
                let backend = pipeline.connect(&id).await?;

                for upload in backend.upload_files(&request.uploads).await? {
                    if let Some(error) = upload.error {
                        bail!("Failed to upload {}: {}", upload.path, error);
                    }
                }

                let response = backend.execute(&request.command).await?;
                let downloads = backend.download_files(&request.downloads).await?;

                Ok::<_, anyhow::Error>(ExecOutcome {
                    response,
                    downloads,
                })
            })
        })
        .await?;

    Ok(outcome)
}

fn format_summary(response: &ExecuteResponse) -> String {
    let mut out = String::new();
    if response.exit_code == 0 {
        writeln!(&mut out, "{} exit code 0", "✓".green()).unwrap();
    } else {
        writeln!(
            &mut out,
            "{} exit code {}",
            "✗".red(),
            response.exit_code.to_string().red().bold()
        )
        .unwrap();
    }
    if response.truncated {
        writeln!(&mut out, "{} output was truncated", "ℹ".blue()).unwrap();
    }
    out
}
