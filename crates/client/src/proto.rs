use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Error;

// ---------
// Endpoints
// ---------

pub const AGENT_CONFIGURATIONS_PATH: &str = "/assistant/agent_configurations";
pub const CONVERSATIONS_PATH: &str = "/assistant/conversations";
pub const FILES_PATH: &str = "/files";

#[inline]
pub fn messages_path(conversation_id: &str) -> String {
    format!("{CONVERSATIONS_PATH}/{conversation_id}/messages")
}

#[inline]
pub fn conversation_events_path(conversation_id: &str) -> String {
    format!("{CONVERSATIONS_PATH}/{conversation_id}/events")
}

#[inline]
pub fn message_events_path(conversation_id: &str, message_id: &str) -> String {
    format!("{}/{message_id}/events", messages_path(conversation_id))
}

// ------------------------------
// Types received from the server
// ------------------------------

/// An agent configured in the workspace.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentConfiguration {
    /// Stable remote identifier of the agent.
    #[serde(rename = "sId")]
    pub id: String,
    /// Display name of the agent.
    pub name: String,
    /// What the agent is meant for.
    #[serde(default)]
    pub description: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfigurationsResponse {
    pub agent_configurations: Vec<AgentConfiguration>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CreateConversationResponse {
    pub conversation: ResourceId,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ResourceId {
    #[serde(rename = "sId")]
    pub id: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct FileUploadUrlResponse {
    pub file: FileUploadUrl,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileUploadUrl {
    pub upload_url: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct FileUploadedResponse {
    pub file: ResourceId,
}

// ------------------------
// Types sent to the server
// ------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Mention<'a> {
    pub configuration_id: &'a str,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageContext<'a> {
    pub username: &'a str,
    pub timezone: &'a str,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PostMessageRequest<'a> {
    pub content: &'a str,
    pub mentions: Vec<Mention<'a>>,
    pub context: MessageContext<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocking: Option<bool>,
}

/// A reference to an uploaded file, attached to the first message of a
/// conversation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentFragment {
    /// The title shown for the fragment, usually the file name.
    pub title: String,
    /// The remote file identifier returned by the upload.
    pub file_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateConversationRequest<'a> {
    pub message: PostMessageRequest<'a>,
    pub content_fragments: &'a [ContentFragment],
    pub blocking: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileUploadRequest<'a> {
    pub content_type: &'a str,
    pub file_name: &'a str,
    pub file_size: u64,
    pub use_case: &'a str,
}

// ------
// Events
// ------

/// An event from the conversation-level stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConversationEvent {
    /// The echo of a user message.
    UserMessageNew,
    /// An agent started a reply.
    AgentMessageNew {
        /// The id of the agent message.
        message_id: String,
    },
    /// The conversation got a title.
    ConversationTitle {
        /// The new title.
        title: String,
    },
    /// An event kind this client doesn't know about.
    Unknown {
        /// The `type` discriminator of the event.
        raw_type: String,
    },
}

impl ConversationEvent {
    /// Classifies a decoded event payload.
    pub fn from_payload(payload: &Value) -> Result<Self, Error> {
        let event = match event_type(payload)? {
            "user_message_new" => Self::UserMessageNew,
            "agent_message_new" => {
                let message_id = str_field(payload, "/messageId")
                    .or_else(|| str_field(payload, "/message/sId"))
                    .ok_or_else(|| Error::malformed(payload.to_string()))?;
                Self::AgentMessageNew {
                    message_id: message_id.to_owned(),
                }
            }
            "conversation_title" => Self::ConversationTitle {
                title: str_field(payload, "/title")
                    .unwrap_or_default()
                    .to_owned(),
            },
            other => Self::Unknown {
                raw_type: other.to_owned(),
            },
        };
        Ok(event)
    }
}

/// A tool-use event reported while an agent works on its reply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgentAction {
    /// The `type` discriminator, e.g. `retrieval_params`.
    pub kind: String,
    /// The whole event payload.
    pub payload: Value,
}

/// An event from the message-level stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MessageEvent {
    /// A piece of generated text.
    GenerationTokens {
        /// The text to append to the reply.
        text: String,
    },
    /// The agent is using a tool.
    AgentAction(AgentAction),
    /// The reply is complete.
    AgentMessageSuccess,
    /// The agent failed.
    AgentError {
        /// The error message.
        message: String,
    },
    /// An event kind this client doesn't know about.
    Unknown {
        /// The `type` discriminator of the event.
        raw_type: String,
    },
}

impl MessageEvent {
    /// Classifies a decoded event payload.
    pub fn from_payload(payload: Value) -> Result<Self, Error> {
        let kind = event_type(&payload)?.to_owned();
        let event = match kind.as_str() {
            "generation_tokens" => Self::GenerationTokens {
                text: str_field(&payload, "/text")
                    .ok_or_else(|| Error::malformed(payload.to_string()))?
                    .to_owned(),
            },
            "agent_message_success" => Self::AgentMessageSuccess,
            "agent_error" => Self::AgentError {
                message: error_message(&payload),
            },
            "retrieval_params"
            | "dust_app_run_params"
            | "dust_app_run_block"
            | "agent_action_success" => Self::AgentAction(AgentAction {
                kind: kind.clone(),
                payload,
            }),
            other => Self::Unknown {
                raw_type: other.to_owned(),
            },
        };
        Ok(event)
    }
}

fn event_type(payload: &Value) -> Result<&str, Error> {
    str_field(payload, "/type")
        .ok_or_else(|| Error::malformed(payload.to_string()))
}

#[inline]
fn str_field<'a>(payload: &'a Value, pointer: &str) -> Option<&'a str> {
    payload.pointer(pointer).and_then(Value::as_str)
}

fn error_message(payload: &Value) -> String {
    let error = payload.get("error");
    error
        .and_then(|e| e.get("message"))
        .and_then(Value::as_str)
        .or_else(|| error.and_then(Value::as_str))
        .map(ToOwned::to_owned)
        .or_else(|| error.map(Value::to_string))
        .unwrap_or_else(|| "unknown agent error".to_owned())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_conversation_events() {
        let event = ConversationEvent::from_payload(&json!({
            "type": "agent_message_new",
            "messageId": "m1",
        }))
        .unwrap();
        assert_eq!(
            event,
            ConversationEvent::AgentMessageNew {
                message_id: "m1".to_owned()
            }
        );

        let event = ConversationEvent::from_payload(&json!({
            "type": "agent_message_new",
            "message": { "sId": "m2" },
        }))
        .unwrap();
        assert_eq!(
            event,
            ConversationEvent::AgentMessageNew {
                message_id: "m2".to_owned()
            }
        );

        let event = ConversationEvent::from_payload(&json!({
            "type": "conversation_title",
            "title": "Weather",
        }))
        .unwrap();
        assert_eq!(
            event,
            ConversationEvent::ConversationTitle {
                title: "Weather".to_owned()
            }
        );

        let event =
            ConversationEvent::from_payload(&json!({ "type": "brand_new" }))
                .unwrap();
        assert_eq!(
            event,
            ConversationEvent::Unknown {
                raw_type: "brand_new".to_owned()
            }
        );

        assert!(
            ConversationEvent::from_payload(&json!({
                "type": "agent_message_new"
            }))
            .is_err()
        );
        assert!(ConversationEvent::from_payload(&json!({})).is_err());
    }

    #[test]
    fn test_message_events() {
        let event = MessageEvent::from_payload(json!({
            "type": "generation_tokens",
            "text": "Hel",
        }))
        .unwrap();
        assert_eq!(
            event,
            MessageEvent::GenerationTokens {
                text: "Hel".to_owned()
            }
        );

        let event = MessageEvent::from_payload(json!({
            "type": "agent_error",
            "error": { "code": "model_error", "message": "overloaded" },
        }))
        .unwrap();
        assert_eq!(
            event,
            MessageEvent::AgentError {
                message: "overloaded".to_owned()
            }
        );

        let event = MessageEvent::from_payload(json!({
            "type": "agent_error",
            "error": "boom",
        }))
        .unwrap();
        assert_eq!(
            event,
            MessageEvent::AgentError {
                message: "boom".to_owned()
            }
        );

        let payload = json!({ "type": "retrieval_params", "query": "q" });
        let event = MessageEvent::from_payload(payload.clone()).unwrap();
        assert_eq!(
            event,
            MessageEvent::AgentAction(AgentAction {
                kind: "retrieval_params".to_owned(),
                payload,
            })
        );
    }

    #[test]
    fn test_create_conversation_request() {
        let fragments = [ContentFragment {
            title: "notes.txt".to_owned(),
            file_id: "fil_1".to_owned(),
        }];
        let request = CreateConversationRequest {
            message: PostMessageRequest {
                content: "Hi",
                mentions: vec![Mention {
                    configuration_id: "agent",
                }],
                context: MessageContext {
                    username: "dust-cli-user",
                    timezone: "Europe/Paris",
                },
                blocking: None,
            },
            content_fragments: &fragments,
            blocking: false,
        };
        let expected = json!({
            "message": {
                "content": "Hi",
                "mentions": [{ "configurationId": "agent" }],
                "context": {
                    "username": "dust-cli-user",
                    "timezone": "Europe/Paris",
                },
            },
            "contentFragments": [{ "title": "notes.txt", "fileId": "fil_1" }],
            "blocking": false,
        });
        assert_eq!(serde_json::to_value(&request).unwrap(), expected);
    }
}
