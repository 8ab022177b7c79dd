use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use textagent_core::errors::ApplicationError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationRequest {
    #[serde(skip)]
    pub agent_id: String,
    #[serde(skip)]
    pub agent_alias_id: String,
    #[serde(skip)]
    pub session_id: String,
    pub input_text: String,
    pub enable_trace: bool,
    pub stream_final_response: bool,
}

/// One item of the remote event stream, already classified.
#[derive(Clone, Debug, PartialEq)]
pub enum AgentEvent {
    /// Partial answer bytes, appended in arrival order.
    ContentChunk(Vec<u8>),
    /// Reasoning metadata. Logged only.
    Trace(Value),
    /// The agent is delegating to an external action. Logged only.
    ControlHandoff(Value),
    Unknown { kind: String },
}

pub type AgentEventStream =
    Pin<Box<dyn Stream<Item = Result<AgentEvent, AgentInvocationError>> + Send>>;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AgentInvocationError {
    #[error("could not reach agent endpoint: {0}")]
    Connect(String),
    #[error("agent endpoint rejected the invocation with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("agent event stream failed: {0}")]
    Stream(String),
}

impl From<AgentInvocationError> for ApplicationError {
    fn from(error: AgentInvocationError) -> Self {
        Self::AgentInvocation(error.to_string())
    }
}

#[async_trait]
pub trait AgentClient: Send + Sync {
    /// Establishes the remote call. Errors here mean nothing was streamed.
    async fn invoke(
        &self,
        request: InvocationRequest,
    ) -> Result<AgentEventStream, AgentInvocationError>;
}
