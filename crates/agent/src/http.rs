use std::io;

use async_trait::async_trait;
use bytes::Buf;
use futures::stream::{self, Stream, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tokio::io::AsyncBufReadExt;
use tokio_util::io::StreamReader;

use crate::client::{
    AgentClient, AgentEvent, AgentEventStream, AgentInvocationError, InvocationRequest,
};

/// Invokes the agent runtime over HTTP and reads its newline-delimited JSON
/// event stream.
pub struct HttpAgentClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
}

impl HttpAgentClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<SecretString>) -> Self {
        Self::with_http_client(reqwest::Client::new(), base_url, api_key)
    }

    pub fn with_http_client(
        http: reqwest::Client,
        base_url: impl Into<String>,
        api_key: Option<SecretString>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Self { http, base_url, api_key }
    }

    fn invocation_url(&self, request: &InvocationRequest) -> String {
        format!(
            "{}/agents/{}/agent-aliases/{}/sessions/{}/text",
            self.base_url, request.agent_id, request.agent_alias_id, request.session_id
        )
    }
}

#[async_trait]
impl AgentClient for HttpAgentClient {
    async fn invoke(
        &self,
        request: InvocationRequest,
    ) -> Result<AgentEventStream, AgentInvocationError> {
        let mut builder = self.http.post(self.invocation_url(&request)).json(&request);
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key.expose_secret());
        }

        let response =
            builder.send().await.map_err(|e| AgentInvocationError::Connect(e.to_string()))?;

        let status = response.status();
        tracing::debug!(
            event_name = "agent.http.response",
            status = %status,
            session_id = %request.session_id,
            "agent invocation response received"
        );

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AgentInvocationError::Rejected { status: status.as_u16(), body });
        }

        Ok(ndjson_events(response.bytes_stream().map(|item| item.map_err(io::Error::other))))
    }
}

/// Splits a byte stream into lines and decodes one event per line. Lines may
/// straddle network chunks; a trailing line without a newline is still read.
/// A transport error ends the stream after it is reported.
pub fn ndjson_events<S, B>(bytes: S) -> AgentEventStream
where
    S: Stream<Item = io::Result<B>> + Send + 'static,
    B: Buf + Send + 'static,
{
    let lines = StreamReader::new(Box::pin(bytes)).split(b'\n');

    Box::pin(stream::unfold(Some(lines), |lines| async move {
        let mut lines = lines?;
        loop {
            match lines.next_segment().await {
                Ok(Some(line)) => {
                    if let Some(event) = decode_event_line(&line) {
                        return Some((Ok(event), Some(lines)));
                    }
                }
                Ok(None) => return None,
                Err(error) => {
                    return Some((Err(AgentInvocationError::Stream(error.to_string())), None));
                }
            }
        }
    }))
}

/// Blank lines yield nothing. Anything unparseable is classified, never fatal.
pub fn decode_event_line(line: &[u8]) -> Option<AgentEvent> {
    if line.iter().all(u8::is_ascii_whitespace) {
        return None;
    }

    let value: Value = match serde_json::from_slice(line) {
        Ok(value) => value,
        Err(error) => {
            tracing::debug!(
                event_name = "agent.http.malformed_line",
                error = %error,
                "skipping event line that is not json"
            );
            return Some(AgentEvent::Unknown { kind: "malformed".to_owned() });
        }
    };

    let Value::Object(mut map) = value else {
        return Some(AgentEvent::Unknown { kind: "non_object".to_owned() });
    };

    if let Some(chunk) = map.remove("chunk") {
        return Some(match chunk.get("bytes").and_then(Value::as_str) {
            Some(text) => AgentEvent::ContentChunk(text.as_bytes().to_vec()),
            None => AgentEvent::Unknown { kind: "chunk".to_owned() },
        });
    }
    if let Some(trace) = map.remove("trace") {
        return Some(AgentEvent::Trace(trace));
    }
    if let Some(payload) = map.remove("returnControl") {
        return Some(AgentEvent::ControlHandoff(payload));
    }

    let kind = map.keys().next().cloned().unwrap_or_else(|| "empty".to_owned());
    Some(AgentEvent::Unknown { kind })
}
