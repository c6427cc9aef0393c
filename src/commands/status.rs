use anyhow::{Context, Result};
use colored::Colorize;
use std::fmt::Write;

use crate::state::{AgentState, Stage};

pub async fn run() -> Result<()> {
    let cwd = std::env::current_dir().context("Failed to get current directory")?;

    match AgentState::load(&cwd)? {
        Some(state) => print!("{}", format_status(&state)),
        None => {
            println!("\n{} No sandpipe run recorded.", "ℹ".blue());
            println!("  Run {} to start one.", "sandpipe run <message>".green());
        }
    }

    Ok(())
}

fn format_status(state: &AgentState) -> String {
    let mut out = String::new();
    writeln!(&mut out, "\n{}", "━".repeat(50).dimmed()).unwrap();
    writeln!(&mut out, "{}", "   Sandpipe Run Status".yellow().bold()).unwrap();
    writeln!(&mut out, "{}", "━".repeat(50).dimmed()).unwrap();

    let stage = match state.stage {
        Stage::End => state.stage.to_string().green().bold(),
        _ => state.stage.to_string().yellow(),
    };
    writeln!(&mut out, "  Stage:      {}", stage).unwrap();
    writeln!(
        &mut out,
        "  Sandbox:    {}",
        state.sandbox_id.as_deref().unwrap_or("none").cyan()
    )
    .unwrap();
    writeln!(
        &mut out,
        "  Messages:   {}",
        state.messages.len().to_string().cyan()
    )
    .unwrap();
    writeln!(
        &mut out,
        "  Started:    {}",
        state
            .started_at
            .format("%Y-%m-%d %H:%M:%S UTC")
            .to_string()
            .cyan()
    )
    .unwrap();

    // A sandbox id only survives in the journal when the run was interrupted.
    if state.sandbox_id.is_some() {
        writeln!(
            &mut out,
            "\n  {} Sandbox may still be running. Run {} to delete it.",
            "⚠".yellow(),
            "sandpipe clean".green()
        )
        .unwrap();
    }

    writeln!(&mut out, "{}", "━".repeat(50).dimmed()).unwrap();
    out
}
