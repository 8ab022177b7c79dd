use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde::Serialize;

use textagent_core::action::request::ActionRequest;
use textagent_core::action::response::Reply;
use textagent_core::domain::conversation::ConversationKey;
use textagent_core::domain::task::{
    parse_calendar_date, parse_due_date, NewTask, Task, TaskId, TaskStatus,
};
use textagent_core::errors::ApplicationError;
use textagent_db::TaskRepository;

use crate::router::ActionService;
use crate::PHONE_NUMBERS_PARAM;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskAction {
    Create,
    List,
    UpdateStatus,
    Delete,
}

#[derive(Serialize)]
struct TaskOutcome<'a> {
    message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    task: Option<&'a Task>,
}

fn utc_today() -> NaiveDate {
    Utc::now().date_naive()
}

pub struct TaskTrackingService {
    tasks: Arc<dyn TaskRepository>,
    today: fn() -> NaiveDate,
}

impl TaskTrackingService {
    pub fn new(tasks: Arc<dyn TaskRepository>) -> Self {
        Self { tasks, today: utc_today }
    }

    /// Replaces the calendar used when a task is completed without a date.
    pub fn with_today(mut self, today: fn() -> NaiveDate) -> Self {
        self.today = today;
        self
    }

    fn conversation(request: &ActionRequest) -> Result<ConversationKey, ApplicationError> {
        let participants = request.parameter(PHONE_NUMBERS_PARAM).unwrap_or_default();
        Ok(ConversationKey::from_participant_list(participants)?)
    }

    async fn create(&self, request: &ActionRequest) -> Result<Reply, ApplicationError> {
        let conversation_id = Self::conversation(request)?;
        let name = request.required_parameter("name")?.to_owned();
        let due_date = request
            .non_empty_parameter("due_date")
            .map(|value| parse_due_date("due_date", value))
            .transpose()?;

        let task = self
            .tasks
            .create(NewTask {
                conversation_id,
                name,
                description: request.non_empty_parameter("description").map(str::to_owned),
                source: request.parameter("source").unwrap_or_default().to_owned(),
                due_date,
            })
            .await?;

        tracing::info!(
            event_name = "tasks.task.created",
            conversation_id = %task.conversation_id,
            task_id = %task.id.0,
            "task created"
        );

        let outcome = TaskOutcome { message: "Task created successfully", task: Some(&task) };
        Ok(Reply::reprompt(&outcome))
    }

    async fn list(&self, request: &ActionRequest) -> Result<Reply, ApplicationError> {
        let conversation_id = Self::conversation(request)?;
        let tasks = self.tasks.list_by_conversation(&conversation_id).await?;

        tracing::info!(
            event_name = "tasks.task.listed",
            conversation_id = %conversation_id,
            count = tasks.len(),
            "tasks listed"
        );

        Ok(Reply::reprompt(&tasks))
    }

    async fn update_status(&self, request: &ActionRequest) -> Result<Reply, ApplicationError> {
        let task_id = TaskId(request.required_parameter("task_id")?.to_owned());
        let requested = request.parameter("status").unwrap_or_default();
        let completion_date = request
            .non_empty_parameter("completion_date")
            .map(|value| parse_calendar_date("completion_date", value))
            .transpose()?;

        let status = TaskStatus::from_update(requested, completion_date, (self.today)())?;
        let task = self.tasks.update_status(&task_id, &status).await?;

        tracing::info!(
            event_name = "tasks.task.status_updated",
            task_id = %task.id.0,
            status = %task.status,
            "task status updated"
        );

        Ok(Reply::reprompt(&TaskOutcome { message: "Task status updated", task: Some(&task) }))
    }

    async fn delete(&self, request: &ActionRequest) -> Result<Reply, ApplicationError> {
        let task_id = TaskId(request.required_parameter("task_id")?.to_owned());
        self.tasks.delete(&task_id).await?;

        tracing::info!(event_name = "tasks.task.deleted", task_id = %task_id.0, "task deleted");

        Ok(Reply::success(&TaskOutcome { message: "Task deleted successfully", task: None }))
    }
}

#[async_trait]
impl ActionService for TaskTrackingService {
    type Action = TaskAction;

    const NAME: &'static str = "task_tracking";
    const ROUTES: &'static [(&'static str, TaskAction)] = &[
        ("task_create", TaskAction::Create),
        ("task_list", TaskAction::List),
        ("task_update_status", TaskAction::UpdateStatus),
        ("task_delete", TaskAction::Delete),
    ];

    async fn perform(
        &self,
        action: TaskAction,
        request: &ActionRequest,
    ) -> Result<Reply, ApplicationError> {
        match action {
            TaskAction::Create => self.create(request).await,
            TaskAction::List => self.list(request).await,
            TaskAction::UpdateStatus => self.update_status(request).await,
            TaskAction::Delete => self.delete(request).await,
        }
    }
}
