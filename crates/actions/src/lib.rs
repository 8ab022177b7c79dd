//! Action-group handlers for the messaging and task-tracking services.
//!
//! Each service owns an independent routing table; [`router::ActionRouter`]
//! turns a request into exactly one response envelope, whatever happens.

pub mod messaging;
pub mod router;
pub mod tasks;

pub use messaging::{MessagingAction, MessagingService, NEW_MESSAGE_PROMPT};
pub use router::{ActionRouter, ActionService, UNKNOWN_FUNCTION_MESSAGE};
pub use tasks::{TaskAction, TaskTrackingService};

/// Parameter carrying the bracketed participant list, e.g. `[5551112222,5551113333]`.
pub const PHONE_NUMBERS_PARAM: &str = "conversation_phone_numbers";
