use chrono::{DateTime, Utc};
use sqlx::Row;

use textagent_core::domain::conversation::ConversationKey;
use textagent_core::domain::task::{NewTask, Task, TaskId, TaskStatus};

use super::{checked_table_name, RepositoryError, TaskRepository};
use crate::DbPool;

pub struct SqlTaskRepository {
    pool: DbPool,
    table: String,
}

impl SqlTaskRepository {
    pub fn new(pool: DbPool, table: impl Into<String>) -> Result<Self, RepositoryError> {
        Ok(Self { pool, table: checked_table_name(table)? })
    }

    /// Creates the table when it is not one the migrations manage.
    pub async fn ensure_table(&self) -> Result<(), RepositoryError> {
        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                 id TEXT PRIMARY KEY NOT NULL,
                 conversation_id TEXT NOT NULL,
                 name TEXT NOT NULL,
                 description TEXT,
                 source TEXT NOT NULL,
                 status TEXT NOT NULL DEFAULT 'open',
                 due_date TEXT
             )",
            table = self.table
        ))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    fn select_columns(&self) -> String {
        format!(
            "SELECT id, conversation_id, name, description, source, status, due_date FROM {}",
            self.table
        )
    }
}

fn row_to_task(row: &sqlx::sqlite::SqliteRow) -> Result<Task, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let conversation_id: String =
        row.try_get("conversation_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let name: String = row.try_get("name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let description: Option<String> =
        row.try_get("description").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let source: String =
        row.try_get("source").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let status_str: String =
        row.try_get("status").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let due_date_str: Option<String> =
        row.try_get("due_date").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let status =
        TaskStatus::parse_stored(&status_str).map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let due_date = due_date_str
        .map(|value| {
            DateTime::parse_from_rfc3339(&value)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| RepositoryError::Decode(format!("due_date `{value}`: {e}")))
        })
        .transpose()?;

    Ok(Task {
        id: TaskId(id),
        conversation_id: ConversationKey::from_stored(conversation_id),
        name,
        description,
        source,
        status,
        due_date,
    })
}

#[async_trait::async_trait]
impl TaskRepository for SqlTaskRepository {
    async fn create(&self, task: NewTask) -> Result<Task, RepositoryError> {
        let task = task.into_task();

        sqlx::query(&format!(
            "INSERT INTO {} (id, conversation_id, name, description, source, status, due_date)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            self.table
        ))
        .bind(&task.id.0)
        .bind(task.conversation_id.as_str())
        .bind(&task.name)
        .bind(&task.description)
        .bind(&task.source)
        .bind(task.status.to_string())
        .bind(task.due_date.map(|dt| dt.to_rfc3339()))
        .execute(&self.pool)
        .await?;

        Ok(task)
    }

    async fn get(&self, id: &TaskId) -> Result<Task, RepositoryError> {
        let row = sqlx::query(&format!("{} WHERE id = ?", self.select_columns()))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => row_to_task(r),
            None => Err(RepositoryError::NotFound { entity: "task", id: id.0.clone() }),
        }
    }

    async fn list_by_conversation(
        &self,
        conversation_id: &ConversationKey,
    ) -> Result<Vec<Task>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> =
            sqlx::query(&format!("{} WHERE conversation_id = ?", self.select_columns()))
                .bind(conversation_id.as_str())
                .fetch_all(&self.pool)
                .await?;

        rows.iter().map(row_to_task).collect::<Result<Vec<_>, _>>()
    }

    async fn update_status(
        &self,
        id: &TaskId,
        status: &TaskStatus,
    ) -> Result<Task, RepositoryError> {
        let result = sqlx::query(&format!("UPDATE {} SET status = ? WHERE id = ?", self.table))
            .bind(status.to_string())
            .bind(&id.0)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound { entity: "task", id: id.0.clone() });
        }

        self.get(id).await
    }

    async fn delete(&self, id: &TaskId) -> Result<(), RepositoryError> {
        sqlx::query(&format!("DELETE FROM {} WHERE id = ?", self.table))
            .bind(&id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
