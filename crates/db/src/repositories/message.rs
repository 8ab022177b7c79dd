use sqlx::Row;

use textagent_core::domain::conversation::ConversationKey;
use textagent_core::domain::message::{Message, MessageId, NewMessage};

use super::{checked_table_name, now_millis, MessageRepository, RepositoryError};
use crate::DbPool;

pub struct SqlMessageRepository {
    pool: DbPool,
    table: String,
}

impl SqlMessageRepository {
    pub fn new(pool: DbPool, table: impl Into<String>) -> Result<Self, RepositoryError> {
        Ok(Self { pool, table: checked_table_name(table)? })
    }

    /// Creates the table when it is not one the migrations manage.
    pub async fn ensure_table(&self) -> Result<(), RepositoryError> {
        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                 id TEXT PRIMARY KEY NOT NULL,
                 conversation_id TEXT NOT NULL,
                 body TEXT NOT NULL,
                 sender TEXT NOT NULL,
                 sent_at INTEGER NOT NULL
             )",
            table = self.table
        ))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> Result<Message, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let conversation_id: String =
        row.try_get("conversation_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let body: String = row.try_get("body").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let from: String =
        row.try_get("sender").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let sent_at: i64 =
        row.try_get("sent_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(Message {
        id: MessageId(id),
        conversation_id: ConversationKey::from_stored(conversation_id),
        body,
        from,
        sent_at,
    })
}

#[async_trait::async_trait]
impl MessageRepository for SqlMessageRepository {
    async fn create(&self, message: NewMessage) -> Result<Message, RepositoryError> {
        let message = message.into_message(now_millis());

        sqlx::query(&format!(
            "INSERT INTO {} (id, conversation_id, body, sender, sent_at) VALUES (?, ?, ?, ?, ?)",
            self.table
        ))
        .bind(&message.id.0)
        .bind(message.conversation_id.as_str())
        .bind(&message.body)
        .bind(&message.from)
        .bind(message.sent_at)
        .execute(&self.pool)
        .await?;

        Ok(message)
    }

    async fn get(&self, id: &MessageId) -> Result<Message, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT id, conversation_id, body, sender, sent_at FROM {} WHERE id = ?",
            self.table
        ))
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => row_to_message(r),
            None => Err(RepositoryError::NotFound { entity: "message", id: id.0.clone() }),
        }
    }

    async fn list_recent(
        &self,
        conversation_id: &ConversationKey,
        limit: u32,
    ) -> Result<Vec<Message>, RepositoryError> {
        // rowid breaks ties between messages stored within the same millisecond.
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(&format!(
            "SELECT id, conversation_id, body, sender, sent_at
             FROM {}
             WHERE conversation_id = ?
             ORDER BY sent_at DESC, rowid DESC
             LIMIT ?",
            self.table
        ))
        .bind(conversation_id.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_message).collect::<Result<Vec<_>, _>>()
    }
}
