//! Shell agent: answers the latest user message by acting on the sandbox.
//!
//! The message is treated as a shell command unless it starts with one of
//! the file directives:
//!
//! ```text
//! @ls [dir]
//! @read <path>
//! @write <path>
//! <content...>
//! @edit <path>
//! <old text...>
//! =======
//! <new text...>
//! ```
//!
//! Replies are checkpointed per thread. A thread that already has a
//! transcript continues from it when the caller only sends new messages.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

use super::{Agent, AgentFactory, AgentSpec, Checkpointer, Message, Role, RunConfig};
use crate::backend::{FileOps, SandboxBackend};

/// Maximum number of lines returned by `@read`.
const READ_LIMIT: usize = 2000;

/// Line separating the old and new text of an `@edit`.
const EDIT_SEPARATOR: &str = "\n=======\n";

/// Builds [`ShellAgent`]s.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct ShellAgentFactory;

impl AgentFactory for ShellAgentFactory {
    fn name(&self) -> &'static str {
        "Shell"
    }

    fn build(&self, spec: AgentSpec) -> Result<Box<dyn Agent>> {
        debug!("Shell agent system prompt: {}", spec.system_prompt);
        Ok(Box::new(ShellAgent {
            backend: spec.backend,
            checkpointer: spec.checkpointer,
        }))
    }
}

/// What the user asked for.
#[derive(Debug, PartialEq, Eq)]
enum Request<'a> {
    List(&'a str),
    Read(&'a str),
    Write { path: &'a str, content: &'a str },
    Edit { path: &'a str, old: &'a str, new: &'a str },
    /// A directive that could not be parsed.
    Invalid(&'static str),
    Shell(&'a str),
}

fn parse_request(text: &str) -> Request<'_> {
    let trimmed = text.trim_start();
    let (head, body) = trimmed.split_once('\n').unwrap_or((trimmed, ""));
    let head = head.trim();

    if head == "@ls" {
        return Request::List(".");
    }
    if let Some(dir) = head.strip_prefix("@ls ") {
        return Request::List(dir.trim());
    }
    if let Some(path) = head.strip_prefix("@read ") {
        return Request::Read(path.trim());
    }
    if let Some(path) = head.strip_prefix("@write ") {
        return Request::Write {
            path: path.trim(),
            content: body,
        };
    }
    if let Some(path) = head.strip_prefix("@edit ") {
        return match body.split_once(EDIT_SEPARATOR) {
            Some((old, new)) => Request::Edit {
                path: path.trim(),
                old,
                new,
            },
            None => Request::Invalid("@edit needs old and new text separated by a ======= line"),
        };
    }

    Request::Shell(text.trim())
}

struct ShellAgent {
    backend: Arc<dyn SandboxBackend>,
    checkpointer: Arc<dyn Checkpointer>,
}

impl ShellAgent {
    async fn respond(&self, text: &str) -> Result<String> {
        let backend = self.backend.as_ref();
        let reply = match parse_request(text) {
            Request::List(dir) => match backend.ls(dir).await {
                Ok(entries) => entries.join("\n"),
                Err(e) => format!("error: {e:#}"),
            },
            Request::Read(path) => match backend.read(path, 0, READ_LIMIT).await {
                Ok(rendered) => rendered,
                Err(e) => format!("error: {e:#}"),
            },
            Request::Write { path, content } => match backend.write(path, content).await {
                Ok(()) => format!("wrote {} bytes to {path}", content.len()),
                Err(e) => format!("error: {e:#}"),
            },
            Request::Edit { path, old, new } => match backend.edit(path, old, new, false).await {
                Ok(count) => format!("replaced {count} occurrence(s) in {path}"),
                Err(e) => format!("error: {e:#}"),
            },
            Request::Invalid(reason) => format!("error: {reason}"),
            Request::Shell(command) => {
                let response = backend.execute(command).await?;
                match (response.exit_code, response.output.is_empty()) {
                    (0, _) => response.output,
                    (code, true) => format!("[exit code {code}]"),
                    (code, false) => format!("{}\n[exit code {code}]", response.output),
                }
            }
        };
        Ok(reply)
    }
}

#[async_trait]
impl Agent for ShellAgent {
    async fn invoke(
        &self,
        mut messages: Vec<Message>,
        config: &RunConfig,
    ) -> Result<Vec<Message>> {
        if let Some(saved) = self.checkpointer.get(&config.thread_id) {
            if !messages.starts_with(&saved) {
                debug!(
                    "Resuming thread {} ({} saved messages)",
                    config.thread_id,
                    saved.len()
                );
                let mut resumed = saved;
                resumed.append(&mut messages);
                messages = resumed;
            }
        }

        let Some(request) = messages
            .iter()
            .rev()
            .find(|message| message.role == Role::User)
            .map(|message| message.content.clone())
        else {
            info!("No user message to answer");
            return Ok(messages);
        };

        let reply = self.respond(&request).await?;
        messages.push(Message::assistant(reply));
        self.checkpointer.put(&config.thread_id, &messages);

        Ok(messages)
    }
}
