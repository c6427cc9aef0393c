//! Remote sandbox service client.
//!
//! The remote service owns every sandbox; this crate only ever holds a
//! sandbox's name. A live handle ([`RemoteSandbox`]) is acquired by name
//! from a [`SandboxService`] whenever a step needs one and dropped when the
//! step ends.

mod error;
mod http;
#[cfg(test)]
pub(crate) mod memory;

pub(crate) use error::SandboxError;
pub(crate) use http::HttpSandboxService;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Raw result of a command run inside a remote sandbox.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct RunOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i64,
}

/// A template known to the remote service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TemplateInfo {
    pub name: String,
    pub image: Option<String>,
}

/// A live connection to one remote sandbox.
#[async_trait]
pub(crate) trait RemoteSandbox: Send + Sync {
    /// The sandbox name assigned by the service.
    fn name(&self) -> &str;

    /// Runs a shell command line, waiting at most `timeout`.
    async fn run(&self, command: &str, timeout: Duration) -> Result<RunOutput, SandboxError>;

    /// Reads a whole file.
    async fn read(&self, path: &str) -> Result<Vec<u8>, SandboxError>;

    /// Writes a whole file, replacing any previous content.
    async fn write(&self, path: &str, content: &[u8]) -> Result<(), SandboxError>;
}

/// Template and sandbox management on the remote service.
#[async_trait]
pub(crate) trait SandboxService: Send + Sync {
    /// Looks up a template. Fails with `NotFound` if it does not exist.
    async fn get_template(&self, name: &str) -> Result<TemplateInfo, SandboxError>;

    /// Registers a template built from a container image.
    async fn create_template(&self, name: &str, image: &str) -> Result<(), SandboxError>;

    /// Starts a new sandbox from a template.
    async fn create_sandbox(
        &self,
        template: &str,
        timeout: Duration,
    ) -> Result<Arc<dyn RemoteSandbox>, SandboxError>;

    /// Reconnects to an existing sandbox by name.
    async fn get_sandbox(&self, name: &str) -> Result<Arc<dyn RemoteSandbox>, SandboxError>;

    /// Deletes a sandbox.
    async fn delete_sandbox(&self, name: &str) -> Result<(), SandboxError>;
}
