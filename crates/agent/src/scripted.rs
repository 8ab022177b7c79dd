use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream;

use crate::client::{
    AgentClient, AgentEvent, AgentEventStream, AgentInvocationError, InvocationRequest,
};

type Script = Result<Vec<Result<AgentEvent, AgentInvocationError>>, AgentInvocationError>;

/// Replays queued event streams in order and records every request it sees.
/// Once the queue is exhausted each call yields an empty stream.
#[derive(Default)]
pub struct ScriptedAgentClient {
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<InvocationRequest>>,
}

impl ScriptedAgentClient {
    pub fn with_events(self, events: Vec<Result<AgentEvent, AgentInvocationError>>) -> Self {
        self.push(Ok(events));
        self
    }

    pub fn with_connect_failure(self, error: AgentInvocationError) -> Self {
        self.push(Err(error));
        self
    }

    pub fn requests(&self) -> Vec<InvocationRequest> {
        self.requests.lock().map(|requests| requests.clone()).unwrap_or_default()
    }

    fn push(&self, script: Script) {
        if let Ok(mut scripts) = self.scripts.lock() {
            scripts.push_back(script);
        }
    }
}

#[async_trait]
impl AgentClient for ScriptedAgentClient {
    async fn invoke(
        &self,
        request: InvocationRequest,
    ) -> Result<AgentEventStream, AgentInvocationError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }

        let next = self.scripts.lock().ok().and_then(|mut scripts| scripts.pop_front());
        let events = next.unwrap_or_else(|| Ok(Vec::new()))?;
        Ok(Box::pin(stream::iter(events)))
    }
}
