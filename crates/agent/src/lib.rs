//! Remote conversational agent invocation.
//!
//! A call opens a fresh session, streams heterogeneous events back, and folds
//! them into the agent's final text:
//! 1. **Guard** (`guard`) - skip invocations triggered by the agent's own messages
//! 2. **Client** (`client`, `http`) - open the remote event stream
//! 3. **Aggregation** (`stream`) - append content chunks, log everything else
//!
//! `AgentInvoker` (see `invoker`) ties these together for the request handlers.
//! `ScriptedAgentClient` replays canned events and is what the handler tests use.

pub mod client;
pub mod guard;
pub mod http;
pub mod invoker;
pub mod scripted;
pub mod stream;

pub use client::{
    AgentClient, AgentEvent, AgentEventStream, AgentInvocationError, InvocationRequest,
};
pub use guard::{InvocationDecision, SelfOriginationGuard};
pub use http::HttpAgentClient;
pub use invoker::{AgentInvoker, AgentTarget};
pub use scripted::ScriptedAgentClient;
pub use stream::aggregate;
