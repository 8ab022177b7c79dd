use async_trait::async_trait;
use thiserror::Error;

use textagent_core::config::is_sql_identifier;
use textagent_core::domain::conversation::ConversationKey;
use textagent_core::domain::message::{Message, MessageId, NewMessage};
use textagent_core::domain::task::{NewTask, Task, TaskId, TaskStatus};
use textagent_core::errors::ApplicationError;

pub mod memory;
pub mod message;
pub mod task;

pub use memory::{InMemoryMessageRepository, InMemoryTaskRepository};
pub use message::SqlMessageRepository;
pub use task::SqlTaskRepository;

/// Upper bound on messages returned for a conversation listing.
pub const RECENT_MESSAGE_LIMIT: u32 = 20;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("invalid table name `{0}`")]
    InvalidTableName(String),
}

impl From<RepositoryError> for ApplicationError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::NotFound { entity, id } => Self::RecordNotFound { entity, id },
            other => Self::Persistence(other.to_string()),
        }
    }
}

#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Stores the message under a fresh id stamped with the current time.
    async fn create(&self, message: NewMessage) -> Result<Message, RepositoryError>;

    async fn get(&self, id: &MessageId) -> Result<Message, RepositoryError>;

    /// Most recent messages first, at most `limit` of them.
    async fn list_recent(
        &self,
        conversation_id: &ConversationKey,
        limit: u32,
    ) -> Result<Vec<Message>, RepositoryError>;
}

#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Stores the task under a fresh id with status `open`.
    async fn create(&self, task: NewTask) -> Result<Task, RepositoryError>;

    async fn get(&self, id: &TaskId) -> Result<Task, RepositoryError>;

    async fn list_by_conversation(
        &self,
        conversation_id: &ConversationKey,
    ) -> Result<Vec<Task>, RepositoryError>;

    async fn update_status(&self, id: &TaskId, status: &TaskStatus)
        -> Result<Task, RepositoryError>;

    /// Removing an id that does not exist succeeds.
    async fn delete(&self, id: &TaskId) -> Result<(), RepositoryError>;
}

pub(crate) fn checked_table_name(table: impl Into<String>) -> Result<String, RepositoryError> {
    let table = table.into();
    if is_sql_identifier(&table) {
        Ok(table)
    } else {
        Err(RepositoryError::InvalidTableName(table))
    }
}

pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
