use thiserror::Error;

/// Error kinds surfaced across the memory, procedure, and agent crates.
///
/// Propagation policy (see the root design doc): `InvalidArgument` and
/// `Blocked` are never retried. `NotFound`, `LLMFailure`, and `ToolFailure`
/// are caught by the executor and routed into the adaptation loop. `AskUser`
/// is not a failure — it signals the loop completed without full automation.
/// `Internal` means an invariant the caller should have upheld was violated;
/// it aborts the request.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("llm failure: {0}")]
    LlmFailure(String),

    #[error("tool failure: {0}")]
    ToolFailure(String),

    #[error("blocked: {0}")]
    Blocked(String),

    #[error("ask user: {0}")]
    AskUser(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AgentError {
    pub fn kind(&self) -> &'static str {
        match self {
            AgentError::InvalidArgument(_) => "invalid_argument",
            AgentError::NotFound(_) => "not_found",
            AgentError::LlmFailure(_) => "llm_failure",
            AgentError::ToolFailure(_) => "tool_failure",
            AgentError::Blocked(_) => "blocked",
            AgentError::AskUser(_) => "ask_user",
            AgentError::Internal(_) => "internal",
        }
    }

    /// Whether this error kind is eligible for the PEAL adaptation retry loop.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AgentError::NotFound(_) | AgentError::LlmFailure(_) | AgentError::ToolFailure(_)
        )
    }
}

pub type AgentResult<T> = std::result::Result<T, AgentError>;
