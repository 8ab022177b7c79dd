use std::collections::HashMap;

use tokio::sync::RwLock;

use textagent_core::domain::conversation::ConversationKey;
use textagent_core::domain::message::{Message, MessageId, NewMessage};
use textagent_core::domain::task::{NewTask, Task, TaskId, TaskStatus};

use super::{now_millis, MessageRepository, RepositoryError, TaskRepository};

/// Keeps messages in insertion order so ties on `sent_at` resolve like the
/// sqlite store's rowid ordering.
#[derive(Default)]
pub struct InMemoryMessageRepository {
    messages: RwLock<Vec<Message>>,
}

#[async_trait::async_trait]
impl MessageRepository for InMemoryMessageRepository {
    async fn create(&self, message: NewMessage) -> Result<Message, RepositoryError> {
        let message = message.into_message(now_millis());
        let mut messages = self.messages.write().await;
        messages.push(message.clone());
        Ok(message)
    }

    async fn get(&self, id: &MessageId) -> Result<Message, RepositoryError> {
        let messages = self.messages.read().await;
        messages
            .iter()
            .find(|message| &message.id == id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound { entity: "message", id: id.0.clone() })
    }

    async fn list_recent(
        &self,
        conversation_id: &ConversationKey,
        limit: u32,
    ) -> Result<Vec<Message>, RepositoryError> {
        let messages = self.messages.read().await;
        let mut matching: Vec<(usize, &Message)> = messages
            .iter()
            .enumerate()
            .filter(|(_, message)| &message.conversation_id == conversation_id)
            .collect();
        matching.sort_by(|(a_pos, a), (b_pos, b)| {
            b.sent_at.cmp(&a.sent_at).then_with(|| b_pos.cmp(a_pos))
        });

        Ok(matching.into_iter().take(limit as usize).map(|(_, message)| message.clone()).collect())
    }
}

#[derive(Default)]
pub struct InMemoryTaskRepository {
    tasks: RwLock<HashMap<String, Task>>,
}

#[async_trait::async_trait]
impl TaskRepository for InMemoryTaskRepository {
    async fn create(&self, task: NewTask) -> Result<Task, RepositoryError> {
        let task = task.into_task();
        let mut tasks = self.tasks.write().await;
        tasks.insert(task.id.0.clone(), task.clone());
        Ok(task)
    }

    async fn get(&self, id: &TaskId) -> Result<Task, RepositoryError> {
        let tasks = self.tasks.read().await;
        tasks
            .get(&id.0)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound { entity: "task", id: id.0.clone() })
    }

    async fn list_by_conversation(
        &self,
        conversation_id: &ConversationKey,
    ) -> Result<Vec<Task>, RepositoryError> {
        let tasks = self.tasks.read().await;
        Ok(tasks
            .values()
            .filter(|task| &task.conversation_id == conversation_id)
            .cloned()
            .collect())
    }

    async fn update_status(
        &self,
        id: &TaskId,
        status: &TaskStatus,
    ) -> Result<Task, RepositoryError> {
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .get_mut(&id.0)
            .ok_or_else(|| RepositoryError::NotFound { entity: "task", id: id.0.clone() })?;
        task.status = status.clone();
        Ok(task.clone())
    }

    async fn delete(&self, id: &TaskId) -> Result<(), RepositoryError> {
        let mut tasks = self.tasks.write().await;
        tasks.remove(&id.0);
        Ok(())
    }
}
