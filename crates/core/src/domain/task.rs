use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::conversation::ConversationKey;
use crate::errors::DomainError;

pub const COMPLETION_DATE_FORMAT: &str = "%Y-%m-%d";

const COMPLETED_PREFIX: &str = "completed on ";

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

/// Task lifecycle. `Completed` keeps the date fixed at completion time and is
/// persisted as the composite string `completed on YYYY-MM-DD`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum TaskStatus {
    Open,
    Canceled,
    Completed { on: NaiveDate },
}

impl TaskStatus {
    /// Validates a requested status change. `completed` without a date
    /// completes on `today`.
    pub fn from_update(
        requested: &str,
        completion_date: Option<NaiveDate>,
        today: NaiveDate,
    ) -> Result<Self, DomainError> {
        match requested {
            "open" => Ok(Self::Open),
            "canceled" => Ok(Self::Canceled),
            "completed" => Ok(Self::Completed { on: completion_date.unwrap_or(today) }),
            _ => Err(DomainError::InvalidStatus { value: requested.to_owned() }),
        }
    }

    pub fn parse_stored(value: &str) -> Result<Self, DomainError> {
        match value {
            "open" => Ok(Self::Open),
            "canceled" => Ok(Self::Canceled),
            other => other
                .strip_prefix(COMPLETED_PREFIX)
                .and_then(|date| NaiveDate::parse_from_str(date, COMPLETION_DATE_FORMAT).ok())
                .map(|on| Self::Completed { on })
                .ok_or_else(|| DomainError::InvalidStatus { value: other.to_owned() }),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => f.write_str("open"),
            Self::Canceled => f.write_str("canceled"),
            Self::Completed { on } => {
                write!(f, "{COMPLETED_PREFIX}{}", on.format(COMPLETION_DATE_FORMAT))
            }
        }
    }
}

impl From<TaskStatus> for String {
    fn from(status: TaskStatus) -> Self {
        status.to_string()
    }
}

impl TryFrom<String> for TaskStatus {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse_stored(&value)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub conversation_id: ConversationKey,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub source: String,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewTask {
    pub conversation_id: ConversationKey,
    pub name: String,
    pub description: Option<String>,
    pub source: String,
    pub due_date: Option<DateTime<Utc>>,
}

impl NewTask {
    pub fn into_task(self) -> Task {
        Task {
            id: TaskId::generate(),
            conversation_id: self.conversation_id,
            name: self.name,
            description: self.description,
            source: self.source,
            status: TaskStatus::Open,
            due_date: self.due_date,
        }
    }
}

pub fn parse_calendar_date(name: &str, value: &str) -> Result<NaiveDate, DomainError> {
    let trimmed = value.trim();
    NaiveDate::parse_from_str(trimmed, COMPLETION_DATE_FORMAT)
        .or_else(|_| DateTime::parse_from_rfc3339(trimmed).map(|dt| dt.date_naive()))
        .map_err(|_| DomainError::InvalidParameter {
            name: name.to_owned(),
            reason: format!("expected YYYY-MM-DD, got `{trimmed}`"),
        })
}

/// Accepts RFC 3339 timestamps or bare dates (midnight UTC).
pub fn parse_due_date(name: &str, value: &str) -> Result<DateTime<Utc>, DomainError> {
    let trimmed = value.trim();
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(timestamp.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(trimmed, COMPLETION_DATE_FORMAT)
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| DomainError::InvalidParameter {
            name: name.to_owned(),
            reason: format!("expected YYYY-MM-DD or RFC 3339, got `{trimmed}`"),
        })
}
