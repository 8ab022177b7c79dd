use thiserror::Error;

/// Message returned to the agent for any failure whose detail must stay internal.
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal error";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("no phone numbers found")]
    EmptyParticipantList,
    #[error("failed to parse phone number {raw}")]
    InvalidPhoneNumber { raw: String },
    #[error("invalid status: {value}, must be 'open', 'canceled', or 'completed'")]
    InvalidStatus { value: String },
    #[error("missing required parameter: {name}")]
    MissingParameter { name: String },
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("{entity} not found: {id}")]
    RecordNotFound { entity: &'static str, id: String },
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("agent invocation failure: {0}")]
    AgentInvocation(String),
}

impl ApplicationError {
    /// Text that is safe to hand back to the remote agent.
    pub fn user_message(&self) -> String {
        match self {
            Self::Domain(error) => error.to_string(),
            Self::RecordNotFound { .. } => self.to_string(),
            Self::Persistence(_) | Self::AgentInvocation(_) => INTERNAL_ERROR_MESSAGE.to_owned(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Domain(_) | Self::RecordNotFound { .. })
    }
}
