//! Remove sandpipe state and release any sandbox an interrupted run left behind.
//!
//! Core logic determines which files to remove based on existence.
//! Formatting is pure. IO happens only at the top level.

use anyhow::{Context, Result};
use colored::Colorize;
use std::fmt::Write;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::config::{Config, CONFIG_FILE};
use crate::state::{AgentState, STATE_FILE};

/// Files that can be cleaned
fn state_files() -> Vec<PathBuf> {
    vec![PathBuf::from(STATE_FILE)]
}

/// Additional files cleaned with --all
fn config_files() -> Vec<PathBuf> {
    vec![PathBuf::from(CONFIG_FILE)]
}

/// Outcome of deleting the sandbox recorded in the journal
#[derive(Debug, Clone, PartialEq, Eq)]
enum Release {
    Deleted(String),
    Failed(String),
}

/// Determine which files to remove based on existence.
///
/// The journal is the only record of a sandbox whose deletion failed, so it
/// is kept unless `all` is set.
fn files_to_clean<E>(all: bool, release: Option<&Release>, exists: E) -> Vec<PathBuf>
where
    E: Fn(&Path) -> bool,
{
    let keep_state = !all && matches!(release, Some(Release::Failed(_)));
    let mut files = if keep_state { Vec::new() } else { state_files() };
    if all {
        files.extend(config_files());
    }
    files.into_iter().filter(|f| exists(f)).collect()
}

/// Remove files and return list of removed paths
fn clean_files<E, R>(
    all: bool,
    release: Option<&Release>,
    exists: E,
    mut remove: R,
) -> Result<Vec<PathBuf>>
where
    E: Fn(&Path) -> bool,
    R: FnMut(&Path) -> Result<()>,
{
    let to_remove = files_to_clean(all, release, &exists);
    let mut removed = Vec::new();

    for file in to_remove {
        remove(&file)?;
        removed.push(file);
    }

    Ok(removed)
}

/// Format the clean results as a displayable string
fn format_results(release: Option<&Release>, removed: &[PathBuf]) -> String {
    let mut out = String::new();
    match release {
        Some(Release::Deleted(id)) => {
            writeln!(&mut out, "\n{} Released sandbox {}", "✓".green(), id.cyan()).unwrap();
        }
        Some(Release::Failed(id)) => {
            writeln!(
                &mut out,
                "\n{} Could not delete sandbox {}; it may still be running",
                "⚠".yellow(),
                id.cyan()
            )
            .unwrap();
        }
        None => {}
    }

    if removed.is_empty() {
        writeln!(&mut out, "\n{} No sandpipe files found to clean.", "ℹ".blue()).unwrap();
    } else {
        writeln!(&mut out, "\n{} Cleaned sandpipe files:", "✓".green()).unwrap();
        for file in removed {
            writeln!(
                &mut out,
                "  {} {}",
                "✗".red(),
                file.display().to_string().dimmed()
            )
            .unwrap();
        }
    }
    out
}

/// Entry point: releases a leftover sandbox, then removes files
pub async fn run(all: bool) -> Result<()> {
    let cwd = std::env::current_dir().context("Failed to get current directory")?;

    let mut release = None;
    if let Some(id) = AgentState::load(&cwd)?.and_then(|state| state.sandbox_id) {
        let config = Config::load(&cwd)?;
        let pipeline = super::build_pipeline(&cwd, &config)?;
        release = Some(match pipeline.release(&id).await {
            Ok(()) => Release::Deleted(id),
            Err(err) => {
                warn!("Failed to delete sandbox {}: {}", id, err);
                Release::Failed(id)
            }
        });
    }

    let removed = clean_files(
        all,
        release.as_ref(),
        |path| cwd.join(path).exists(),
        |path| {
            fs::remove_file(cwd.join(path))
                .with_context(|| format!("Failed to remove {}", path.display()))
        },
    )?;

    print!("{}", format_results(release.as_ref(), &removed));
    Ok(())
}
