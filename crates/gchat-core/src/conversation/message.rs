//! Conversation message model.

use crate::error::GchatError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
            Role::System => "system",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = GchatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "model" => Ok(Role::Model),
            "system" => Ok(Role::System),
            other => Err(GchatError::parse(format!(
                "invalid role '{other}': expected user, model or system"
            ))),
        }
    }
}

/// Base64 payload of a multimodal attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

/// One element of a turn's `parts` array, in Gemini wire shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    pub fn inline_data(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Part::InlineData {
            inline_data: InlineData {
                mime_type: mime_type.into(),
                data: data.into(),
            },
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Part::Text { text } => Some(text),
            Part::InlineData { .. } => None,
        }
    }
}

/// One conversational turn as stored in the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    /// Plain text of the turn; empty when only attachments were sent
    #[serde(default)]
    pub content: String,
    /// Never empty
    pub parts: Vec<Part>,
    /// Assigned when the message is created for appending
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Creates a message stamped with the current instant.
    ///
    /// The text becomes the first part when non-empty, followed by the
    /// attachment parts. A message with neither still carries one empty
    /// text part so `parts` is never empty.
    pub fn new(role: Role, content: impl Into<String>, attachments: Vec<Part>) -> Self {
        let content = content.into();
        let mut parts = Vec::with_capacity(attachments.len() + 1);
        if !content.is_empty() {
            parts.push(Part::text(content.clone()));
        }
        parts.extend(attachments);
        if parts.is_empty() {
            parts.push(Part::text(String::new()));
        }

        Self {
            role,
            content,
            parts,
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content, Vec::new())
    }

    pub fn model(content: impl Into<String>) -> Self {
        Self::new(Role::Model, content, Vec::new())
    }

    /// Number of inline attachments carried by this turn.
    pub fn attachment_count(&self) -> usize {
        self.parts
            .iter()
            .filter(|p| matches!(p, Part::InlineData { .. }))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trips_through_str() {
        for role in [Role::User, Role::Model, Role::System] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("assistant".parse::<Role>().is_err());
    }

    #[test]
    fn test_message_always_has_a_part() {
        let msg = Message::new(Role::User, "", Vec::new());
        assert_eq!(msg.parts.len(), 1);
        assert_eq!(msg.parts[0].as_text(), Some(""));
    }

    #[test]
    fn test_attachment_only_message_has_no_text_part() {
        let msg = Message::new(Role::User, "", vec![Part::inline_data("image/png", "AAAA")]);
        assert_eq!(msg.parts.len(), 1);
        assert_eq!(msg.attachment_count(), 1);
    }

    #[test]
    fn test_part_wire_shape() {
        let text = serde_json::to_value(Part::text("hi")).unwrap();
        assert_eq!(text, serde_json::json!({"text": "hi"}));

        let inline = serde_json::to_value(Part::inline_data("image/png", "QUJD")).unwrap();
        assert_eq!(
            inline,
            serde_json::json!({"inlineData": {"mimeType": "image/png", "data": "QUJD"}})
        );
    }
}
