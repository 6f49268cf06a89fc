//! Role-tagged chat messages consumed by the context renderer

use serde::{Deserialize, Serialize};

/// Message role in a conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    /// Lowercase name used when flattening messages into query text
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

/// One part of a message body
///
/// Only textual parts participate in query flattening; other parts are
/// carried for the caller's benefit and ignored by the renderer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub enum MessagePart {
    Text { text: String },
    Data { media_type: String, reference: String },
}

impl MessagePart {
    pub fn text(content: impl Into<String>) -> Self {
        MessagePart::Text {
            text: content.into(),
        }
    }
}

/// A message in a conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub parts: Vec<MessagePart>,
}

impl ChatMessage {
    pub fn new(role: Role, parts: Vec<MessagePart>) -> Self {
        Self { role, parts }
    }

    /// Flatten into `role: text text ...` form
    ///
    /// Textual parts are joined with single spaces; non-textual parts
    /// are skipped. A message with no textual parts flattens to an
    /// empty string.
    pub fn flatten(&self) -> String {
        let body: Vec<&str> = self
            .parts
            .iter()
            .filter_map(|part| match part {
                MessagePart::Text { text } => Some(text.as_str()),
                MessagePart::Data { .. } => None,
            })
            .collect();

        if body.is_empty() {
            return String::new();
        }
        format!("{}: {}", self.role.as_str(), body.join(" "))
    }
}

/// Helper function to create a system message
pub fn system_message(content: impl Into<String>) -> ChatMessage {
    ChatMessage::new(Role::System, vec![MessagePart::text(content)])
}

/// Helper function to create a user message
pub fn user_message(content: impl Into<String>) -> ChatMessage {
    ChatMessage::new(Role::User, vec![MessagePart::text(content)])
}

/// Helper function to create an assistant message
pub fn assistant_message(content: impl Into<String>) -> ChatMessage {
    ChatMessage::new(Role::Assistant, vec![MessagePart::text(content)])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_helpers() {
        let msg = user_message("Hello");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.flatten(), "user: Hello");

        let msg = system_message("You are helpful");
        assert_eq!(msg.flatten(), "system: You are helpful");
    }

    #[test]
    fn test_flatten_joins_text_parts() {
        let msg = ChatMessage::new(
            Role::Assistant,
            vec![
                MessagePart::text("first"),
                MessagePart::Data {
                    media_type: "image/png".to_string(),
                    reference: "attachment-1".to_string(),
                },
                MessagePart::text("second"),
            ],
        );
        assert_eq!(msg.flatten(), "assistant: first second");
    }

    #[test]
    fn test_flatten_empty_message() {
        let msg = ChatMessage::new(Role::User, vec![]);
        assert_eq!(msg.flatten(), "");

        let data_only = ChatMessage::new(
            Role::User,
            vec![MessagePart::Data {
                media_type: "audio/wav".to_string(),
                reference: "clip".to_string(),
            }],
        );
        assert_eq!(data_only.flatten(), "");
    }
}
