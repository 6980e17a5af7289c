//! Orchestration error taxonomy.
//!
//! Failures inside a tool call are recovered locally (recorded as a failed
//! execution step, the loop continues); failures of reasoning or admission
//! are fatal to the request but never to the server process. Nothing escapes
//! to the HTTP layer except via the structured `OrchestrationResponse`.

/// Errors raised on the orchestration paths.
#[derive(Debug, thiserror::Error)]
pub enum OrchestrationError {
    /// Pre-dispatch refusal: the named server is not configured.
    #[error("Server not found: {0}")]
    ServerNotFound(String),

    /// Pre-dispatch refusal: the server exists but is disabled.
    #[error("Server disabled: {0}")]
    ServerDisabled(String),

    /// Pre-dispatch refusal: the server failed its last health check.
    #[error("Server unhealthy: {0}")]
    ServerUnhealthy(String),

    /// Connect refused, read timeout, HTTP non-2xx. Downgrades the server
    /// to unhealthy at the dispatch site.
    #[error("Transport error: {0}")]
    Transport(String),

    /// JSON-RPC `error` object or a malformed result. The server stays
    /// healthy; the call is recorded as failed.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// LLM unavailable or misconfigured. Fatal to the request.
    #[error("Reasoner error: {0}")]
    Reasoner(String),

    /// No admission slot became free within the request's timeout.
    #[error("Request queue is full.")]
    AdmissionTimeout,

    /// Anything unexpected, caught at the driver.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl OrchestrationError {
    /// True for failures that indicate connection collapse and should flip
    /// the originating server to unhealthy.
    pub fn is_transport(&self) -> bool {
        matches!(self, OrchestrationError::Transport(_))
    }
}
