//! Conversational agents driven by the pipeline.
//!
//! The pipeline only needs one capability from an agent: take an ordered
//! message list and a run configuration, return the updated message list.
//! Agents are built per run by an [`AgentFactory`], which receives the
//! sandbox backend, the system instruction and a [`Checkpointer`].

mod checkpoint;
#[cfg(test)]
pub(crate) mod mock;
mod shell;

pub(crate) use checkpoint::{Checkpointer, MemoryCheckpointer};
pub(crate) use shell::ShellAgentFactory;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::backend::SandboxBackend;

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
            Self::Tool => write!(f, "tool"),
        }
    }
}

/// One conversation message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    /// Creates a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Creates an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Per-invocation settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RunConfig {
    /// Conversation key used for checkpoints. The pipeline uses the sandbox
    /// id so a conversation can later resume against the same sandbox.
    pub thread_id: String,
}

/// Everything an agent is built from.
pub(crate) struct AgentSpec {
    pub backend: Arc<dyn SandboxBackend>,
    pub system_prompt: String,
    pub checkpointer: Arc<dyn Checkpointer>,
}

/// A conversational agent.
#[async_trait]
pub(crate) trait Agent: Send + Sync {
    /// Runs the agent over `messages` and returns the full updated list.
    async fn invoke(&self, messages: Vec<Message>, config: &RunConfig) -> Result<Vec<Message>>;
}

/// Builds agents bound to a backend.
pub(crate) trait AgentFactory: Send + Sync {
    /// Returns the agent name for display.
    fn name(&self) -> &'static str;

    /// Builds an agent from its parts.
    fn build(&self, spec: AgentSpec) -> Result<Box<dyn Agent>>;
}
