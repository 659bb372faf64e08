use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// Re-export common types
pub use serde;
pub use serde_json;

/// One inbound email as posted by the email-parsing provider.  Lives for a
/// single webhook call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEmail {
    pub to: String,
    #[serde(rename = "from")]
    pub sender: String,
    #[serde(default)]
    pub subject: String,
    /// Plain-text body, including any quoted history.
    #[serde(default)]
    pub text: String,
    /// Raw RFC 5322 header block of the original message.
    #[serde(default)]
    pub headers: String,
    /// Number of attachments announced by the provider.  Not forwarded.
    #[serde(default)]
    pub attachments: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IoType {
    Chat,
    Text,
    Any,
}

/// Request body for the flow `run` API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
    pub output_type: IoType,
    pub input_type: IoType,
    pub session_id: String,
    #[serde(default)]
    pub tweaks: Map<String, Value>,
    pub input_value: String,
}

impl RunRequest {
    /// Chat-in, chat-out request with no component tweaks.
    pub fn chat(session_id: impl Into<String>, input_value: impl Into<String>) -> Self {
        Self {
            output_type: IoType::Chat,
            input_type: IoType::Chat,
            session_id: session_id.into(),
            tweaks: Map::new(),
            input_value: input_value.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AckStatus {
    Accepted,
    Error,
}

/// Body returned to the webhook caller.  Failures are reported here rather
/// than through the HTTP status so the provider does not redeliver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookAck {
    pub status: AckStatus,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub message: Option<String>,
}

impl WebhookAck {
    pub fn accepted() -> Self {
        Self {
            status: AckStatus::Accepted,
            message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: AckStatus::Error,
            message: Some(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn run_request_serializes_to_chat_payload() {
        let request = RunRequest::chat("user@example.com", "hello");
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "output_type": "chat",
                "input_type": "chat",
                "session_id": "user@example.com",
                "tweaks": {},
                "input_value": "hello",
            })
        );
    }

    #[test]
    fn accepted_ack_omits_message() {
        assert_eq!(
            serde_json::to_value(WebhookAck::accepted()).unwrap(),
            json!({"status": "accepted"})
        );
    }

    #[test]
    fn error_ack_carries_message() {
        assert_eq!(
            serde_json::to_value(WebhookAck::error("Internal server error")).unwrap(),
            json!({"status": "error", "message": "Internal server error"})
        );
    }

    #[test]
    fn inbound_email_reads_provider_field_names() {
        let email: InboundEmail = serde_json::from_value(json!({
            "to": "agent@example.com",
            "from": "user@example.com",
        }))
        .unwrap();
        assert_eq!(email.sender, "user@example.com");
        assert_eq!(email.subject, "");
        assert_eq!(email.attachments, 0);
    }
}
