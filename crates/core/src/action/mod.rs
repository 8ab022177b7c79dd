//! Wire types for the agent action-group protocol.
//!
//! The inbound [`request::ActionRequest`] names a function and carries an
//! unordered parameter list; the outbound [`response::ActionResponse`] echoes
//! the action group and function and wraps a JSON-encoded body string.

pub mod params;
pub mod request;
pub mod response;
