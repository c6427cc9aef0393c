//! Scripted agent for testing.
//!
//! Returns configurable responses and tracks invocations for test
//! assertions without a real agent runtime.

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::{Agent, AgentFactory, AgentSpec, Message, RunConfig};
use crate::backend::SandboxBackend;

/// A single scripted response.
#[derive(Debug, Clone)]
pub(crate) enum MockResponse {
    /// Append an assistant message with the given text.
    Reply(String),
    /// Run a command through the backend and reply with its output.
    Execute(String),
    /// Return an error with the given message.
    Error(String),
    /// Panic with the given message.
    Panic(String),
}

#[derive(Debug, Default)]
struct Record {
    threads: Vec<String>,
    backend_ids: Vec<String>,
    system_prompts: Vec<String>,
}

/// Factory for scripted agents.
///
/// Responses are consumed in order across all agents it builds, cycling when
/// there are more invocations than responses.
#[derive(Debug, Clone)]
pub(crate) struct ScriptedAgentFactory {
    responses: Arc<Vec<MockResponse>>,
    invocation_count: Arc<AtomicUsize>,
    record: Arc<Mutex<Record>>,
}

impl ScriptedAgentFactory {
    /// Create a factory whose agents return the given responses in order.
    pub fn new(responses: Vec<MockResponse>) -> Self {
        Self {
            responses: Arc::new(responses),
            invocation_count: Arc::new(AtomicUsize::new(0)),
            record: Arc::default(),
        }
    }

    /// Create a factory whose agents always reply with `text`.
    pub fn always_reply(text: &str) -> Self {
        Self::new(vec![MockResponse::Reply(text.to_string())])
    }

    /// Create a factory whose agents always fail with `error`.
    pub fn always_fail(error: &str) -> Self {
        Self::new(vec![MockResponse::Error(error.to_string())])
    }

    /// Number of times `invoke` was called.
    pub fn invocation_count(&self) -> usize {
        self.invocation_count.load(Ordering::SeqCst)
    }

    /// Thread ids passed to `invoke`, in call order.
    pub fn threads(&self) -> Vec<String> {
        self.record.lock().threads.clone()
    }

    /// Backend ids agents were built with, in build order.
    pub fn backend_ids(&self) -> Vec<String> {
        self.record.lock().backend_ids.clone()
    }

    /// System prompts agents were built with, in build order.
    pub fn system_prompts(&self) -> Vec<String> {
        self.record.lock().system_prompts.clone()
    }
}

impl AgentFactory for ScriptedAgentFactory {
    fn name(&self) -> &'static str {
        "Mock"
    }

    fn build(&self, spec: AgentSpec) -> Result<Box<dyn Agent>> {
        {
            let mut record = self.record.lock();
            record.backend_ids.push(spec.backend.id().to_string());
            record.system_prompts.push(spec.system_prompt.clone());
        }
        Ok(Box::new(ScriptedAgent {
            factory: self.clone(),
            backend: spec.backend,
        }))
    }
}

struct ScriptedAgent {
    factory: ScriptedAgentFactory,
    backend: Arc<dyn SandboxBackend>,
}

#[async_trait]
impl Agent for ScriptedAgent {
    async fn invoke(
        &self,
        mut messages: Vec<Message>,
        config: &RunConfig,
    ) -> Result<Vec<Message>> {
        let count = self.factory.invocation_count.fetch_add(1, Ordering::SeqCst);
        self.factory
            .record
            .lock()
            .threads
            .push(config.thread_id.clone());

        let responses = &self.factory.responses;
        match &responses[count % responses.len()] {
            MockResponse::Reply(text) => messages.push(Message::assistant(text.clone())),
            MockResponse::Execute(command) => {
                let response = self.backend.execute(command).await?;
                messages.push(Message::assistant(response.output));
            }
            MockResponse::Error(msg) => anyhow::bail!("{msg}"),
            MockResponse::Panic(msg) => panic!("{msg}"),
        }

        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::MemoryCheckpointer;
    use crate::backend::RemoteBackend;
    use crate::sandbox::memory::MemorySandbox;

    fn spec() -> AgentSpec {
        AgentSpec {
            backend: Arc::new(RemoteBackend::new(Arc::new(MemorySandbox::new("sb-1")))),
            system_prompt: "prompt".to_string(),
            checkpointer: Arc::new(MemoryCheckpointer::new()),
        }
    }

    fn config() -> RunConfig {
        RunConfig {
            thread_id: "sb-1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_mock_agent_replies() {
        let factory = ScriptedAgentFactory::always_reply("done");
        let agent = factory.build(spec()).unwrap();

        let messages = agent
            .invoke(vec![Message::user("hi")], &config())
            .await
            .unwrap();
        assert_eq!(messages, vec![Message::user("hi"), Message::assistant("done")]);
        assert_eq!(factory.backend_ids(), vec!["sb-1"]);
        assert_eq!(factory.system_prompts(), vec!["prompt"]);
        assert_eq!(factory.threads(), vec!["sb-1"]);
    }

    #[tokio::test]
    async fn test_mock_agent_error() {
        let factory = ScriptedAgentFactory::always_fail("agent crashed");
        let agent = factory.build(spec()).unwrap();

        let err = agent.invoke(vec![], &config()).await.unwrap_err();
        assert!(err.to_string().contains("agent crashed"));
    }

    #[tokio::test]
    async fn test_mock_agent_cycles_responses() {
        let factory = ScriptedAgentFactory::new(vec![
            MockResponse::Reply("first".to_string()),
            MockResponse::Reply("second".to_string()),
        ]);
        let agent = factory.build(spec()).unwrap();

        let mut replies = Vec::new();
        for _ in 0..3 {
            let messages = agent.invoke(vec![], &config()).await.unwrap();
            replies.push(messages[0].content.clone());
        }

        assert_eq!(replies, vec!["first", "second", "first"]);
        assert_eq!(factory.invocation_count(), 3);
    }
}
