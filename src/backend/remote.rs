//! Backend adapter over a remote sandbox handle.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::{
    combine_output, ExecuteResponse, FileDownloadResponse, FileUploadResponse, SandboxBackend,
};
use crate::sandbox::RemoteSandbox;

/// Default timeout for a single command: 30 minutes.
pub(crate) const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Exposes a [`RemoteSandbox`] as a [`SandboxBackend`].
///
/// Every operation is one blocking round trip per item with no retry;
/// the first remote fault aborts the call.
pub(crate) struct RemoteBackend {
    sandbox: Arc<dyn RemoteSandbox>,
    timeout: Duration,
}

impl RemoteBackend {
    /// Wraps a sandbox using the default command timeout.
    #[allow(dead_code)] // Public API for callers
    pub fn new(sandbox: Arc<dyn RemoteSandbox>) -> Self {
        Self::with_timeout(sandbox, DEFAULT_COMMAND_TIMEOUT)
    }

    /// Wraps a sandbox with a custom command timeout.
    pub fn with_timeout(sandbox: Arc<dyn RemoteSandbox>, timeout: Duration) -> Self {
        Self { sandbox, timeout }
    }
}

#[async_trait]
impl SandboxBackend for RemoteBackend {
    fn id(&self) -> &str {
        self.sandbox.name()
    }

    async fn execute(&self, command: &str) -> Result<ExecuteResponse> {
        debug!("Executing in {}: {}", self.id(), command);

        let result = self
            .sandbox
            .run(command, self.timeout)
            .await
            .with_context(|| format!("Command failed in sandbox {}", self.id()))?;

        Ok(ExecuteResponse {
            output: combine_output(&result.stdout, &result.stderr),
            exit_code: result.exit_code,
            truncated: false,
        })
    }

    async fn download_files(&self, paths: &[String]) -> Result<Vec<FileDownloadResponse>> {
        let mut responses = Vec::with_capacity(paths.len());
        for path in paths {
            let content = self
                .sandbox
                .read(path)
                .await
                .with_context(|| format!("Failed to download {path} from {}", self.id()))?;
            responses.push(FileDownloadResponse {
                path: path.clone(),
                content: Some(content),
                error: None,
            });
        }
        Ok(responses)
    }

    async fn upload_files(&self, files: &[(String, Vec<u8>)]) -> Result<Vec<FileUploadResponse>> {
        let mut responses = Vec::with_capacity(files.len());
        for (path, content) in files {
            self.sandbox
                .write(path, content)
                .await
                .with_context(|| format!("Failed to upload {path} to {}", self.id()))?;
            responses.push(FileUploadResponse {
                path: path.clone(),
                error: None,
            });
        }
        Ok(responses)
    }
}
