use std::sync::Arc;

use crate::client::{AgentClient, AgentInvocationError, InvocationRequest};
use crate::stream::aggregate;

/// Which deployed agent to talk to. Both ids come from the secret store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgentTarget {
    pub agent_id: String,
    pub agent_alias_id: String,
}

/// Long-lived handle built once at startup and shared by every request.
#[derive(Clone)]
pub struct AgentInvoker {
    client: Arc<dyn AgentClient>,
    target: AgentTarget,
}

impl AgentInvoker {
    pub fn new(client: Arc<dyn AgentClient>, target: AgentTarget) -> Self {
        Self { client, target }
    }

    /// Runs one invocation in a fresh session and returns the final answer.
    pub async fn invoke(&self, input_text: &str) -> Result<String, AgentInvocationError> {
        let request = InvocationRequest {
            agent_id: self.target.agent_id.clone(),
            agent_alias_id: self.target.agent_alias_id.clone(),
            session_id: uuid::Uuid::new_v4().to_string(),
            input_text: input_text.to_owned(),
            enable_trace: true,
            stream_final_response: true,
        };

        tracing::info!(
            event_name = "agent.invoke.start",
            agent_id = %request.agent_id,
            agent_alias_id = %request.agent_alias_id,
            session_id = %request.session_id,
            input = %request.input_text,
            "invoking agent"
        );
        let session_id = request.session_id.clone();

        let events = self.client.invoke(request).await.inspect_err(|error| {
            tracing::error!(
                event_name = "agent.invoke.failed",
                session_id = %session_id,
                error = %error,
                "agent invocation could not be established"
            );
        })?;

        let answer = aggregate(events).await.inspect_err(|error| {
            tracing::error!(
                event_name = "agent.invoke.aborted",
                session_id = %session_id,
                error = %error,
                "agent event stream aborted"
            );
        })?;

        tracing::info!(
            event_name = "agent.invoke.completed",
            session_id = %session_id,
            answer_len = answer.len(),
            "agent invocation completed"
        );
        tracing::debug!(
            event_name = "agent.invoke.answer",
            session_id = %session_id,
            answer = %answer,
            "agent answer"
        );

        Ok(answer)
    }
}
