//! Execution backend contract used by agents.
//!
//! A backend offers three primitives (run a command, download files, upload
//! files) and an identifier. Agents only ever see this trait, so they are
//! decoupled from the API shape of whatever service hosts the sandbox.

mod files;
mod remote;

pub(crate) use files::FileOps;
pub(crate) use remote::RemoteBackend;

use anyhow::Result;
use async_trait::async_trait;

/// Result of running a command through a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ExecuteResponse {
    /// Standard output followed by standard error.
    pub output: String,
    pub exit_code: i64,
    /// Whether `output` was cut short. Never set by [`RemoteBackend`].
    pub truncated: bool,
}

/// Result of downloading one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FileDownloadResponse {
    pub path: String,
    pub content: Option<Vec<u8>>,
    pub error: Option<String>,
}

/// Result of uploading one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FileUploadResponse {
    pub path: String,
    pub error: Option<String>,
}

/// An isolated environment an agent can run commands in.
#[async_trait]
pub(crate) trait SandboxBackend: Send + Sync {
    /// Identifier of the underlying sandbox.
    fn id(&self) -> &str;

    /// Runs a full shell command line.
    async fn execute(&self, command: &str) -> Result<ExecuteResponse>;

    /// Downloads files, one response per path in input order.
    async fn download_files(&self, paths: &[String]) -> Result<Vec<FileDownloadResponse>>;

    /// Uploads `(path, content)` pairs, one response per file in input order.
    async fn upload_files(&self, files: &[(String, Vec<u8>)]) -> Result<Vec<FileUploadResponse>>;
}

/// Joins the two output streams of a command.
///
/// Standard error follows standard output on a new line; the separator is
/// only inserted when both streams have content.
pub(crate) fn combine_output(stdout: &str, stderr: &str) -> String {
    match (stdout.is_empty(), stderr.is_empty()) {
        (_, true) => stdout.to_string(),
        (true, false) => stderr.to_string(),
        (false, false) => format!("{stdout}\n{stderr}"),
    }
}
