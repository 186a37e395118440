//! Request/response shapes for one PEAL turn.

use aigent_procedures::ExecutionOutcome;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Completed,
    AskUser,
}

/// Terminal result of one request. Per the error-handling policy, the
/// loop never surfaces an exception to the caller: it always bottoms out
/// in either `Completed` or `AskUser`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponse {
    pub status: ResponseStatus,
    pub trace_id: String,
    pub intent: String,
    pub answer: Option<String>,
    pub execution: Option<ExecutionOutcome>,
    pub message: Option<String>,
}

impl AgentResponse {
    pub fn completed(trace_id: impl Into<String>, intent: impl Into<String>, answer: Option<String>, execution: Option<ExecutionOutcome>) -> Self {
        AgentResponse {
            status: ResponseStatus::Completed,
            trace_id: trace_id.into(),
            intent: intent.into(),
            answer,
            execution,
            message: None,
        }
    }

    pub fn ask_user(trace_id: impl Into<String>, intent: impl Into<String>, message: impl Into<String>) -> Self {
        AgentResponse {
            status: ResponseStatus::AskUser,
            trace_id: trace_id.into(),
            intent: intent.into(),
            answer: None,
            execution: None,
            message: Some(message.into()),
        }
    }
}
