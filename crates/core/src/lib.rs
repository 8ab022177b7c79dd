pub mod action;
pub mod config;
pub mod domain;
pub mod errors;
pub mod secrets;

pub use action::request::{ActionParameter, ActionRequest, AgentIdentity};
pub use action::response::{ActionResponse, Reply, ResponseState};
pub use domain::conversation::ConversationKey;
pub use domain::message::{Message, MessageId, NewMessage};
pub use domain::task::{NewTask, Task, TaskId, TaskStatus};
pub use errors::{ApplicationError, DomainError};
pub use secrets::{EnvSecretStore, SecretError, SecretStore, StaticSecretStore};
