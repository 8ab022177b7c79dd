use futures::StreamExt;
use serde::Deserialize;
use serde_json::Value;

use crate::client::{AgentEvent, AgentEventStream, AgentInvocationError};

/// Drains the event stream and returns the concatenated content chunks.
///
/// Trace, hand-off and unrecognized events never abort the stream. An error
/// item does, and whatever text was gathered up to that point is dropped.
pub async fn aggregate(mut events: AgentEventStream) -> Result<String, AgentInvocationError> {
    let mut answer: Vec<u8> = Vec::new();
    let mut chunk_count = 0usize;

    while let Some(event) = events.next().await {
        match event? {
            AgentEvent::ContentChunk(bytes) => {
                chunk_count += 1;
                tracing::debug!(
                    event_name = "agent.stream.chunk",
                    chunk = %String::from_utf8_lossy(&bytes),
                    "received chunk"
                );
                answer.extend_from_slice(&bytes);
            }
            AgentEvent::Trace(trace) => log_trace(&trace),
            AgentEvent::ControlHandoff(payload) => {
                tracing::debug!(
                    event_name = "agent.stream.return_control",
                    payload = %payload,
                    "received return control event"
                );
            }
            AgentEvent::Unknown { kind } => {
                tracing::warn!(
                    event_name = "agent.stream.unknown_event",
                    kind = %kind,
                    "received unknown event type"
                );
            }
        }
    }

    let text = String::from_utf8_lossy(&answer).into_owned();
    if text.is_empty() {
        tracing::warn!(event_name = "agent.stream.empty_answer", "agent stream produced no text");
    }
    tracing::info!(
        event_name = "agent.stream.completed",
        chunk_count,
        answer_len = text.len(),
        "agent stream closed"
    );

    Ok(text)
}

#[derive(Debug, Deserialize)]
struct EmbeddedTrace {
    #[serde(default)]
    messages: Vec<EmbeddedMessage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EmbeddedMessage {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub content: String,
}

fn log_trace(trace: &Value) {
    tracing::debug!(event_name = "agent.stream.trace", trace = %trace, "received trace");

    for message in embedded_messages(trace) {
        tracing::debug!(
            event_name = "agent.stream.trace_message",
            role = %message.role,
            message = %message.content,
            "trace message"
        );
    }
}

/// Model-invocation traces carry the prompt as a JSON document inside a
/// `text` string; pull the conversation messages out of it.
pub(crate) fn embedded_messages(trace: &Value) -> Vec<EmbeddedMessage> {
    let mut found = Vec::new();
    collect_embedded(trace, &mut found);
    found
}

fn collect_embedded(value: &Value, found: &mut Vec<EmbeddedMessage>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                match (key.as_str(), child) {
                    ("text", Value::String(text)) => {
                        if let Ok(embedded) = serde_json::from_str::<EmbeddedTrace>(text) {
                            found.extend(embedded.messages);
                        }
                    }
                    _ => collect_embedded(child, found),
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_embedded(item, found);
            }
        }
        _ => {}
    }
}
