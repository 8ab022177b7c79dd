use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::action::params;
use crate::errors::DomainError;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequest {
    #[serde(default)]
    pub message_version: String,
    #[serde(default)]
    pub function: String,
    #[serde(default)]
    pub action_group: String,
    #[serde(default)]
    pub parameters: Vec<ActionParameter>,
    #[serde(default)]
    pub input_text: String,
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub agent: AgentIdentity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_attributes: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_session_attributes: Option<Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionParameter {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub value: String,
}

impl ActionParameter {
    pub fn string(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self { name: name.into(), kind: "string".to_owned(), value: value.into() }
    }
}

/// Identity of the agent that produced the triggering message, if any.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentIdentity {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub alias: String,
}

impl AgentIdentity {
    pub fn is_present(&self) -> bool {
        !self.name.trim().is_empty()
    }
}

impl ActionRequest {
    pub fn parameter(&self, name: &str) -> Option<&str> {
        params::parameter(&self.parameters, name)
    }

    /// Parameter value with empty strings treated as absent.
    pub fn non_empty_parameter(&self, name: &str) -> Option<&str> {
        self.parameter(name).map(str::trim).filter(|value| !value.is_empty())
    }

    pub fn required_parameter(&self, name: &str) -> Result<&str, DomainError> {
        self.non_empty_parameter(name)
            .ok_or_else(|| DomainError::MissingParameter { name: name.to_owned() })
    }
}

#[cfg(test)]
mod tests {
    use super::ActionRequest;
    use crate::errors::DomainError;

    #[test]
    fn deserializes_agent_request_shape() {
        let request: ActionRequest = serde_json::from_str(
            r#"{
                "messageVersion": "1.0",
                "function": "message_create",
                "actionGroup": "Messaging",
                "parameters": [
                    {"name": "body", "type": "string", "value": "hi"},
                    {"name": "body", "type": "string", "value": "ignored"}
                ],
                "inputText": "send hi",
                "sessionId": "s-1",
                "agent": {"name": "texter", "version": "DRAFT", "id": "A1", "alias": "TSTALIAS"},
                "sessionAttributes": {}
            }"#,
        )
        .expect("valid request");

        assert_eq!(request.function, "message_create");
        assert_eq!(request.action_group, "Messaging");
        assert_eq!(request.parameter("body"), Some("hi"));
        assert!(request.agent.is_present());
    }

    #[test]
    fn missing_fields_default_to_empty() {
        let request: ActionRequest =
            serde_json::from_str(r#"{"function": "task_list"}"#).expect("sparse request");

        assert!(request.parameters.is_empty());
        assert!(!request.agent.is_present());
        assert_eq!(
            request.required_parameter("task_id"),
            Err(DomainError::MissingParameter { name: "task_id".to_owned() })
        );
    }
}
