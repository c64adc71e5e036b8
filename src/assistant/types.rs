//! Wire types for the assistants API (threads, messages, runs).

use serde::Deserialize;

/// Error envelope returned with non-2xx responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorDetail {
    pub message: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub param: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

impl ApiErrorBody {
    /// Human-readable description of a failed response body. Falls back to
    /// the raw body when it is not an error envelope.
    pub fn describe(raw: &str) -> String {
        match serde_json::from_str::<ApiErrorBody>(raw) {
            Ok(body) => {
                let detail = body.error;
                match (detail.kind, detail.code) {
                    (Some(kind), Some(code)) => format!("{} ({kind}, {code})", detail.message),
                    (Some(kind), None) => format!("{} ({kind})", detail.message),
                    (None, Some(code)) => format!("{} ({code})", detail.message),
                    (None, None) => detail.message,
                }
            }
            Err(_) => raw.to_string(),
        }
    }
}

/// `POST /v1/threads` response.
#[derive(Debug, Clone, Deserialize)]
pub struct ThreadObject {
    pub id: String,
}

/// Lifecycle status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    RequiresAction,
    Cancelling,
    Cancelled,
    Failed,
    Completed,
    Incomplete,
    Expired,
    #[serde(other)]
    Unknown,
}

/// A run as returned by create-run and poll-run.
#[derive(Debug, Clone, Deserialize)]
pub struct RunObject {
    pub id: String,
    pub status: RunStatus,
    #[serde(default)]
    pub last_error: Option<RunError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunError {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

/// `GET /v1/threads/{id}/messages` response.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageList {
    #[serde(default)]
    pub data: Vec<ThreadMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThreadMessage {
    pub id: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub content: Vec<MessageContent>,
}

impl ThreadMessage {
    /// Text of the first text-typed content block.
    pub fn first_text(&self) -> Option<&str> {
        self.content.iter().find_map(|block| match block {
            MessageContent::Text { text } => Some(text.value.as_str()),
            MessageContent::Other => None,
        })
    }
}

/// One content block of a message.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    Text { text: TextContent },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextContent {
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_uses_error_envelope() {
        let raw = r#"{"error":{"message":"No thread found","type":"invalid_request_error","param":null,"code":null}}"#;
        assert_eq!(
            ApiErrorBody::describe(raw),
            "No thread found (invalid_request_error)"
        );
    }

    #[test]
    fn describe_falls_back_to_raw_body() {
        assert_eq!(ApiErrorBody::describe("<html>bad gateway</html>"), "<html>bad gateway</html>");
    }

    #[test]
    fn run_status_unknown_values_tolerated() {
        let run: RunObject =
            serde_json::from_str(r#"{"id":"run_1","status":"something_new"}"#).unwrap();
        assert_eq!(run.status, RunStatus::Unknown);

        let run: RunObject =
            serde_json::from_str(r#"{"id":"run_1","status":"in_progress"}"#).unwrap();
        assert_eq!(run.status, RunStatus::InProgress);
    }

    #[test]
    fn first_text_skips_non_text_blocks() {
        let message: ThreadMessage = serde_json::from_str(
            r#"{
                "id": "msg_1",
                "role": "assistant",
                "content": [
                    {"type": "image_file", "image_file": {"file_id": "file_1"}},
                    {"type": "text", "text": {"value": "hello", "annotations": []}}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(message.first_text(), Some("hello"));
    }

    #[test]
    fn first_text_none_without_text_blocks() {
        let message: ThreadMessage = serde_json::from_str(
            r#"{"id": "msg_1", "content": [{"type": "image_file", "image_file": {}}]}"#,
        )
        .unwrap();
        assert_eq!(message.first_text(), None);
    }
}
