use textagent_core::action::request::{ActionRequest, AgentIdentity};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InvocationDecision {
    Invoke,
    Skip { reason_code: &'static str },
}

/// Keeps the agent from being re-invoked by a request it issued itself.
///
/// Requests forwarded by the agent runtime carry the agent's identity; messages
/// arriving from people do not. Acting on the former would loop forever.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SelfOriginationGuard;

impl SelfOriginationGuard {
    pub fn evaluate(&self, origin: &AgentIdentity) -> InvocationDecision {
        if origin.is_present() {
            InvocationDecision::Skip { reason_code: "originated_from_agent" }
        } else {
            InvocationDecision::Invoke
        }
    }

    pub fn evaluate_request(&self, request: &ActionRequest) -> InvocationDecision {
        self.evaluate(&request.agent)
    }
}

#[cfg(test)]
mod tests {
    use textagent_core::action::request::AgentIdentity;

    use super::{InvocationDecision, SelfOriginationGuard};

    #[test]
    fn inbound_human_message_invokes() {
        let decision = SelfOriginationGuard.evaluate(&AgentIdentity::default());
        assert_eq!(decision, InvocationDecision::Invoke);
    }

    #[test]
    fn agent_originated_message_skips() {
        let origin = AgentIdentity {
            name: "text-agent".to_owned(),
            version: "DRAFT".to_owned(),
            id: "AGENT".to_owned(),
            alias: "ALIAS".to_owned(),
        };

        let decision = SelfOriginationGuard.evaluate(&origin);
        assert_eq!(decision, InvocationDecision::Skip { reason_code: "originated_from_agent" });
    }

    #[test]
    fn whitespace_name_is_not_an_agent() {
        let origin = AgentIdentity { name: "  ".to_owned(), ..AgentIdentity::default() };
        assert_eq!(SelfOriginationGuard.evaluate(&origin), InvocationDecision::Invoke);
    }
}
