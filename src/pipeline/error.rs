//! Errors raised by the pipeline itself rather than the remote service.

/// Fatal pipeline faults.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The freshly created sandbox did not answer the readiness probe.
    #[error("Sandbox readiness check failed for {sandbox} (exit code {exit_code})")]
    ReadinessCheckFailed { sandbox: String, exit_code: i64 },

    /// A stage that needs a sandbox ran before one was provisioned.
    #[error("No sandbox_id in state - provisioning must run first")]
    MissingSandboxId,
}
