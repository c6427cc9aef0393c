//! Run one message through a fresh sandbox and print the conversation.

use anyhow::{Context, Result};
use colored::Colorize;
use std::fmt::Write;

use crate::agent::{Message, Role};
use crate::config::Config;
use crate::state::AgentState;

/// Entry point: provisions, delegates and cleans up against the real service.
pub async fn run(message: String) -> Result<()> {
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    let config = Config::load(&cwd)?;
    let pipeline = super::build_pipeline(&cwd, &config)?;

    let state = pipeline
        .run(AgentState::new(vec![Message::user(message)]))
        .await?;

    print!("{}", format_transcript(&state.messages));
    Ok(())
}

/// Renders the conversation, one labelled block per message.
fn format_transcript(messages: &[Message]) -> String {
    let mut out = String::new();
    for message in messages {
        let label = match message.role {
            Role::User => "user".cyan().bold(),
            Role::Assistant => "assistant".green().bold(),
            Role::System => "system".dimmed(),
            Role::Tool => "tool".yellow(),
        };
        writeln!(&mut out, "\n{} {}", "▸".dimmed(), label).unwrap();
        for line in message.content.lines() {
            writeln!(&mut out, "  {line}").unwrap();
        }
    }
    out
}
