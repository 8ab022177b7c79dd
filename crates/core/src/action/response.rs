use serde::{Deserialize, Serialize};

use crate::action::request::ActionRequest;

pub const MESSAGE_VERSION: &str = "1.0";

/// Action group and function used when the inbound payload could not be parsed.
pub const INVALID_REQUEST: &str = "invalid_request";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseState {
    /// Terminal result; the agent has nothing further to reason over.
    Success,
    /// New information the agent should reason over on its next turn.
    Reprompt,
    /// Unrecoverable problem with this request.
    Failure,
}

/// Handler outcome before it is wrapped in the envelope. The body is already
/// the JSON-encoded inner payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reply {
    pub state: ResponseState,
    pub body: String,
}

impl Reply {
    pub fn reprompt<T: Serialize + ?Sized>(payload: &T) -> Self {
        Self { state: ResponseState::Reprompt, body: encode_body(payload) }
    }

    pub fn success<T: Serialize + ?Sized>(payload: &T) -> Self {
        Self { state: ResponseState::Success, body: encode_body(payload) }
    }

    pub fn failure(message: &str) -> Self {
        Self { state: ResponseState::Failure, body: encode_body(&FailureBody { message }) }
    }
}

#[derive(Serialize)]
struct FailureBody<'a> {
    message: &'a str,
}

/// Serialization failures degrade to an empty body; the envelope still goes out.
fn encode_body<T: Serialize + ?Sized>(payload: &T) -> String {
    serde_json::to_string(payload).unwrap_or_else(|error| {
        tracing::error!(
            event_name = "action.response.serialize_failed",
            error = %error,
            "failed to serialize response payload"
        );
        String::new()
    })
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResponse {
    pub message_version: String,
    pub response: FunctionResult,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionResult {
    pub action_group: String,
    pub function: String,
    pub function_response: FunctionResponse,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionResponse {
    pub response_state: ResponseState,
    pub response_body: ResponseBody,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseBody {
    #[serde(rename = "TEXT")]
    pub text: TextBody,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextBody {
    /// JSON-encoded inner payload, nested as a string.
    pub body: String,
}

impl ActionResponse {
    pub fn new(action_group: impl Into<String>, function: impl Into<String>, reply: Reply) -> Self {
        Self {
            message_version: MESSAGE_VERSION.to_owned(),
            response: FunctionResult {
                action_group: action_group.into(),
                function: function.into(),
                function_response: FunctionResponse {
                    response_state: reply.state,
                    response_body: ResponseBody { text: TextBody { body: reply.body } },
                },
            },
        }
    }

    /// Echoes the request's action group and function so callers can correlate.
    pub fn for_request(request: &ActionRequest, reply: Reply) -> Self {
        Self::new(request.action_group.clone(), request.function.clone(), reply)
    }

    pub fn failure(request: &ActionRequest, message: &str) -> Self {
        Self::for_request(request, Reply::failure(message))
    }

    pub fn invalid_request() -> Self {
        Self::new(INVALID_REQUEST, INVALID_REQUEST, Reply::failure("Invalid request"))
    }

    pub fn state(&self) -> ResponseState {
        self.response.function_response.response_state
    }

    pub fn body(&self) -> &str {
        &self.response.function_response.response_body.text.body
    }

    pub fn action_group(&self) -> &str {
        &self.response.action_group
    }

    pub fn function(&self) -> &str {
        &self.response.function
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|error| {
            tracing::error!(
                event_name = "action.response.envelope_serialize_failed",
                error = %error,
                "failed to serialize response envelope"
            );
            format!(
                concat!(
                    "{{\"messageVersion\":\"{}\",\"response\":{{",
                    "\"actionGroup\":\"{}\",\"function\":\"{}\",",
                    "\"functionResponse\":{{\"responseState\":\"FAILURE\",",
                    "\"responseBody\":{{\"TEXT\":{{\"body\":\"\"}}}}}}}}}}"
                ),
                MESSAGE_VERSION,
                INVALID_REQUEST,
                INVALID_REQUEST
            )
        })
    }
}
