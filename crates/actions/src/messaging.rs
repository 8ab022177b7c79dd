use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use textagent_agent::{AgentInvoker, InvocationDecision, SelfOriginationGuard};
use textagent_core::action::request::ActionRequest;
use textagent_core::action::response::Reply;
use textagent_core::domain::conversation::{normalize_sender, ConversationKey};
use textagent_core::domain::message::{Message, NewMessage};
use textagent_core::errors::ApplicationError;
use textagent_db::{MessageRepository, RECENT_MESSAGE_LIMIT};

use crate::router::ActionService;
use crate::PHONE_NUMBERS_PARAM;

/// Prefix of the prompt sent to the agent after a new message is stored.
pub const NEW_MESSAGE_PROMPT: &str =
    "A new message was received for the conversation between these numbers: ";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessagingAction {
    Create,
    ListRecent,
}

#[derive(Serialize)]
struct MessageCreated<'a> {
    info: &'static str,
    message: &'a Message,
}

pub struct MessagingService {
    messages: Arc<dyn MessageRepository>,
    agent: AgentInvoker,
    guard: SelfOriginationGuard,
}

impl MessagingService {
    pub fn new(messages: Arc<dyn MessageRepository>, agent: AgentInvoker) -> Self {
        Self { messages, agent, guard: SelfOriginationGuard }
    }

    async fn create(&self, request: &ActionRequest) -> Result<Reply, ApplicationError> {
        let participants = request.parameter(PHONE_NUMBERS_PARAM).unwrap_or_default();
        let conversation_id = ConversationKey::from_participant_list(participants)?;
        // Senders may be labels such as "Assistant" rather than numbers.
        let from = normalize_sender(request.parameter("from").unwrap_or_default());

        let message = self
            .messages
            .create(NewMessage {
                conversation_id,
                from,
                body: request.parameter("body").unwrap_or_default().to_owned(),
            })
            .await?;

        tracing::info!(
            event_name = "messaging.message.created",
            conversation_id = %message.conversation_id,
            message_id = %message.id.0,
            "message stored"
        );

        self.notify_agent(request, participants).await?;

        let created = MessageCreated { info: "Message created successfully", message: &message };
        Ok(Reply::reprompt(&created))
    }

    /// The stored message stays in place when the invocation fails.
    async fn notify_agent(
        &self,
        request: &ActionRequest,
        participants: &str,
    ) -> Result<(), ApplicationError> {
        match self.guard.evaluate_request(request) {
            InvocationDecision::Skip { reason_code } => {
                tracing::info!(
                    event_name = "messaging.agent.skipped",
                    agent_name = %request.agent.name,
                    reason_code,
                    "message from agent, skipping invocation"
                );
                Ok(())
            }
            InvocationDecision::Invoke => {
                let prompt = format!("{NEW_MESSAGE_PROMPT}{participants}");
                self.agent.invoke(&prompt).await?;
                Ok(())
            }
        }
    }

    async fn list_recent(&self, request: &ActionRequest) -> Result<Reply, ApplicationError> {
        let participants = request.parameter(PHONE_NUMBERS_PARAM).unwrap_or_default();
        let conversation_id = ConversationKey::from_participant_list(participants)?;

        let mut messages =
            self.messages.list_recent(&conversation_id, RECENT_MESSAGE_LIMIT).await?;
        messages.reverse();

        tracing::info!(
            event_name = "messaging.message.listed",
            conversation_id = %conversation_id,
            count = messages.len(),
            "recent messages listed"
        );

        Ok(Reply::reprompt(&messages))
    }
}

#[async_trait]
impl ActionService for MessagingService {
    type Action = MessagingAction;

    const NAME: &'static str = "messaging";
    const ROUTES: &'static [(&'static str, MessagingAction)] = &[
        ("message_create", MessagingAction::Create),
        ("message_list_recent", MessagingAction::ListRecent),
    ];

    async fn perform(
        &self,
        action: MessagingAction,
        request: &ActionRequest,
    ) -> Result<Reply, ApplicationError> {
        match action {
            MessagingAction::Create => self.create(request).await,
            MessagingAction::ListRecent => self.list_recent(request).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::Value;

    use textagent_agent::{
        AgentEvent, AgentInvocationError, AgentInvoker, AgentTarget, ScriptedAgentClient,
    };
    use textagent_core::action::request::{ActionParameter, ActionRequest, AgentIdentity};
    use textagent_core::action::response::ResponseState;
    use textagent_core::domain::conversation::ConversationKey;
    use textagent_db::{InMemoryMessageRepository, MessageRepository};

    use super::{MessagingService, NEW_MESSAGE_PROMPT};
    use crate::router::ActionRouter;

    fn setup(
        client: ScriptedAgentClient,
    ) -> (ActionRouter<MessagingService>, Arc<InMemoryMessageRepository>, Arc<ScriptedAgentClient>)
    {
        let repo = Arc::new(InMemoryMessageRepository::default());
        let client = Arc::new(client);
        let invoker = AgentInvoker::new(
            client.clone(),
            AgentTarget { agent_id: "AGENT".to_owned(), agent_alias_id: "ALIAS".to_owned() },
        );
        (ActionRouter::new(MessagingService::new(repo.clone(), invoker)), repo, client)
    }

    fn create_request(from: &str) -> ActionRequest {
        ActionRequest {
            action_group: "Messaging".to_owned(),
            function: "message_create".to_owned(),
            parameters: vec![
                ActionParameter::string("conversation_phone_numbers", "[5551113333, 5551112222]"),
                ActionParameter::string("from", from),
                ActionParameter::string("body", "see you at 5"),
            ],
            ..ActionRequest::default()
        }
    }

    fn body(response: &textagent_core::ActionResponse) -> Value {
        serde_json::from_str(response.body()).expect("json body")
    }

    #[tokio::test]
    async fn create_stores_message_and_prompts_agent() {
        let (router, repo, client) = setup(
            ScriptedAgentClient::default()
                .with_events(vec![Ok(AgentEvent::ContentChunk(b"sent".to_vec()))]),
        );

        let response = router.route(&create_request("(555) 111-2222")).await;

        assert_eq!(response.state(), ResponseState::Reprompt);
        let body = body(&response);
        assert_eq!(body["info"], "Message created successfully");
        assert_eq!(body["message"]["from"], "+15551112222");
        assert_eq!(body["message"]["conversation_id"], "+15551112222_+15551113333");

        let key = ConversationKey::from_stored("+15551112222_+15551113333");
        assert_eq!(repo.list_recent(&key, 20).await.expect("list").len(), 1);

        let requests = client.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0].input_text,
            format!("{NEW_MESSAGE_PROMPT}[5551113333, 5551112222]")
        );
    }

    #[tokio::test]
    async fn sender_labels_are_kept_verbatim() {
        let (router, _repo, _client) = setup(ScriptedAgentClient::default());

        let response = router.route(&create_request("Assistant")).await;
        assert_eq!(body(&response)["message"]["from"], "Assistant");
    }

    #[tokio::test]
    async fn agent_originated_messages_do_not_invoke_the_agent() {
        let (router, repo, client) = setup(ScriptedAgentClient::default());
        let mut request = create_request("Assistant");
        request.agent = AgentIdentity { name: "text-agent".to_owned(), ..AgentIdentity::default() };

        let response = router.route(&request).await;

        assert_eq!(response.state(), ResponseState::Reprompt);
        assert!(client.requests().is_empty());
        let key = ConversationKey::from_stored("+15551112222_+15551113333");
        assert_eq!(repo.list_recent(&key, 20).await.expect("list").len(), 1);
    }

    #[tokio::test]
    async fn agent_failure_is_internal_error_but_message_is_kept() {
        let (router, repo, _client) = setup(
            ScriptedAgentClient::default()
                .with_connect_failure(AgentInvocationError::Connect("timed out".to_owned())),
        );

        let response = router.route(&create_request("5551112222")).await;

        assert_eq!(response.state(), ResponseState::Failure);
        assert_eq!(body(&response)["message"], "Internal error");
        let key = ConversationKey::from_stored("+15551112222_+15551113333");
        assert_eq!(repo.list_recent(&key, 20).await.expect("list").len(), 1);
    }

    #[tokio::test]
    async fn bad_participant_number_is_reported() {
        let (router, _repo, client) = setup(ScriptedAgentClient::default());
        let mut request = create_request("5551112222");
        request.parameters[0] = ActionParameter::string("conversation_phone_numbers", "[abc]");

        let response = router.route(&request).await;

        assert_eq!(response.state(), ResponseState::Failure);
        assert_eq!(body(&response)["message"], "failed to parse phone number abc");
        assert!(client.requests().is_empty());
    }
}
