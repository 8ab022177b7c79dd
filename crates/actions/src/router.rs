use std::fmt;

use async_trait::async_trait;

use textagent_core::action::request::ActionRequest;
use textagent_core::action::response::{ActionResponse, Reply};
use textagent_core::errors::ApplicationError;

pub const UNKNOWN_FUNCTION_MESSAGE: &str = "Unknown function";

/// One service's handlers plus the function names that reach them.
#[async_trait]
pub trait ActionService: Send + Sync {
    type Action: Copy + fmt::Debug + Send + Sync + 'static;

    const NAME: &'static str;
    const ROUTES: &'static [(&'static str, Self::Action)];

    async fn perform(
        &self,
        action: Self::Action,
        request: &ActionRequest,
    ) -> Result<Reply, ApplicationError>;
}

pub struct ActionRouter<S> {
    service: S,
}

impl<S> ActionRouter<S>
where
    S: ActionService,
{
    pub fn new(service: S) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn classify(function: &str) -> Option<S::Action> {
        S::ROUTES.iter().find(|(name, _)| *name == function).map(|(_, action)| *action)
    }

    pub fn functions() -> impl Iterator<Item = &'static str> {
        S::ROUTES.iter().map(|(name, _)| *name)
    }

    /// Always answers; failures become FAILURE envelopes.
    pub async fn route(&self, request: &ActionRequest) -> ActionResponse {
        let Some(action) = Self::classify(&request.function) else {
            tracing::warn!(
                event_name = "action.route.unknown_function",
                service = S::NAME,
                action_group = %request.action_group,
                function = %request.function,
                "no handler for function"
            );
            return ActionResponse::failure(request, UNKNOWN_FUNCTION_MESSAGE);
        };

        tracing::info!(
            event_name = "action.route.dispatch",
            service = S::NAME,
            action = ?action,
            "dispatching action"
        );

        match self.service.perform(action, request).await {
            Ok(reply) => {
                tracing::info!(
                    event_name = "action.route.completed",
                    service = S::NAME,
                    action = ?action,
                    state = ?reply.state,
                    "action completed"
                );
                ActionResponse::for_request(request, reply)
            }
            Err(error) if error.is_validation() => {
                tracing::warn!(
                    event_name = "action.route.rejected",
                    service = S::NAME,
                    action = ?action,
                    error = %error,
                    "action rejected"
                );
                ActionResponse::failure(request, &error.user_message())
            }
            Err(error) => {
                tracing::error!(
                    event_name = "action.route.failed",
                    service = S::NAME,
                    action = ?action,
                    error = %error,
                    "action failed"
                );
                ActionResponse::failure(request, &error.user_message())
            }
        }
    }

    /// Parses a raw payload first; anything that is not an ActionRequest
    /// gets the `invalid_request` envelope.
    pub async fn handle_payload(&self, payload: &[u8]) -> ActionResponse {
        match serde_json::from_slice::<ActionRequest>(payload) {
            Ok(request) => self.route(&request).await,
            Err(error) => self.reject_malformed(&error),
        }
    }

    /// Answer for a payload the caller already failed to parse.
    pub fn reject_malformed(&self, error: &serde_json::Error) -> ActionResponse {
        tracing::warn!(
            event_name = "action.route.invalid_request",
            service = S::NAME,
            error = %error,
            "payload is not a valid action request"
        );
        ActionResponse::invalid_request()
    }
}
