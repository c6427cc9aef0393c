//! Write the default sandpipe configuration into a project directory.
//!
//! Filesystem access is passed in as closures so the core logic can be
//! tested without touching disk.

use anyhow::{Context, Result};
use colored::Colorize;
use std::fmt::Write;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::config::CONFIG_FILE;
use crate::templates;

/// Runs the init command.
pub async fn run(force: bool) -> Result<()> {
    let cwd = std::env::current_dir().context("Failed to get current directory")?;

    info!("Initializing sandpipe in {}", cwd.display());

    let result = init_config(
        force,
        |path| cwd.join(path).exists(),
        |path, content| {
            fs::write(cwd.join(path), content)
                .with_context(|| format!("Failed to write {}", path.display()))
        },
    )?;

    print!("{}", format_result(result));

    Ok(())
}

/// Result of attempting to write the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteResult {
    Created,
    Overwritten,
    /// Already present and `--force` was not given.
    Skipped,
}

fn init_config<E, W>(force: bool, exists: E, mut write_file: W) -> Result<WriteResult>
where
    E: Fn(&Path) -> bool,
    W: FnMut(&Path, &str) -> Result<()>,
{
    let path = Path::new(CONFIG_FILE);
    let existed = exists(path);

    if existed && !force {
        return Ok(WriteResult::Skipped);
    }

    write_file(path, templates::SANDPIPE_TOML)?;
    Ok(if existed {
        WriteResult::Overwritten
    } else {
        WriteResult::Created
    })
}

fn format_result(result: WriteResult) -> String {
    let mut out = String::new();

    match result {
        WriteResult::Created => {
            writeln!(&mut out, "\n{} Created {}", "✓".green().bold(), CONFIG_FILE.cyan()).unwrap();
        }
        WriteResult::Overwritten => {
            writeln!(&mut out, "\n{} Overwrote {}", "↻".blue(), CONFIG_FILE.cyan()).unwrap();
        }
        WriteResult::Skipped => {
            writeln!(
                &mut out,
                "\n{} {} already exists, use --force to overwrite",
                "⊘".yellow(),
                CONFIG_FILE
            )
            .unwrap();
            return out;
        }
    }

    writeln!(&mut out, "\n{}", "Next steps:".yellow().bold()).unwrap();
    writeln!(
        &mut out,
        "  1. Point {} at your sandbox service",
        "[service].api_url".cyan()
    )
    .unwrap();
    writeln!(
        &mut out,
        "  2. Export the API key in {}",
        "SANDPIPE_API_KEY".cyan()
    )
    .unwrap();
    writeln!(
        &mut out,
        "  3. Run {} to try it",
        "sandpipe run \"ls -la\"".green()
    )
    .unwrap();

    out
}
