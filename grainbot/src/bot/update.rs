//! Inbound update types.
//!
//! Shaped after the bot platform's JSON: an update carries at most one of
//! `message` or `inline_query`; anything else is classified as
//! [`UpdateKind::Other`]. Entity offsets and lengths count UTF-16 code
//! units.

use serde::{Deserialize, Serialize};

/// One inbound update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Update {
    /// Platform-assigned update id.
    pub update_id: i64,
    /// A new text message, if this update carries one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<TextMessage>,
    /// An inline query, if this update carries one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_query: Option<InlineQuery>,
}

/// Classified payload of an [`Update`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateKind {
    /// A text message.
    Message(TextMessage),
    /// An inline query.
    InlineQuery(InlineQuery),
    /// Anything this front end does not handle.
    Other,
}

impl Update {
    /// Classify the update. A message takes precedence over an inline query.
    pub fn into_kind(self) -> UpdateKind {
        match (self.message, self.inline_query) {
            (Some(message), _) => UpdateKind::Message(message),
            (None, Some(query)) => UpdateKind::InlineQuery(query),
            (None, None) => UpdateKind::Other,
        }
    }
}

/// Sender of a message or query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Platform user id.
    pub id: i64,
    /// Username without the leading `@`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// A text message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextMessage {
    /// Message id within the chat.
    pub message_id: i64,
    /// Chat the message was sent in.
    pub chat_id: i64,
    /// Sender, absent for channel posts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<User>,
    /// Message text.
    #[serde(default)]
    pub text: String,
    /// Entities marked up in `text`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entities: Vec<MessageEntity>,
}

impl TextMessage {
    /// The bot command entity starting at offset 0, if any.
    pub fn leading_command(&self) -> Option<&MessageEntity> {
        self.entities
            .iter()
            .find(|e| e.kind == EntityKind::BotCommand && e.offset == 0)
    }
}

/// Markup entity inside a message text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEntity {
    /// Entity type.
    #[serde(rename = "type")]
    pub kind: EntityKind,
    /// Start, in UTF-16 code units.
    pub offset: usize,
    /// Length, in UTF-16 code units.
    pub length: usize,
}

/// Entity types relevant to command resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// `/command` or `/command@bot`.
    BotCommand,
    /// `@username`.
    Mention,
    /// Any other entity type.
    #[serde(other)]
    Other,
}

/// An inline query typed in the message box.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineQuery {
    /// Query id, used to answer it.
    pub id: String,
    /// Who is typing.
    pub from: User,
    /// Text typed so far.
    #[serde(default)]
    pub query: String,
}

/// One item offered in answer to an inline query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineResult {
    /// Result id, unique within one answer.
    pub id: String,
    /// Short title shown in the result list.
    pub title: String,
    /// Text sent when the result is picked.
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_command_message() {
        let raw = r#"{
            "update_id": 7,
            "message": {
                "message_id": 1,
                "chat_id": 99,
                "from": {"id": 42, "username": "alice"},
                "text": "/joke@mybot now",
                "entities": [{"type": "bot_command", "offset": 0, "length": 11}]
            }
        }"#;

        let update: Update = serde_json::from_str(raw).expect("decode");
        let UpdateKind::Message(message) = update.into_kind() else {
            panic!("expected message");
        };
        let entity = message.leading_command().expect("command entity");
        assert_eq!(entity.length, 11);
    }

    #[test]
    fn test_unknown_entity_types_decode_as_other() {
        let raw = r#"{"type": "hashtag", "offset": 3, "length": 4}"#;
        let entity: MessageEntity = serde_json::from_str(raw).expect("decode");
        assert_eq!(entity.kind, EntityKind::Other);
    }

    #[test]
    fn test_command_not_at_start_is_not_leading() {
        let message = TextMessage {
            message_id: 1,
            chat_id: 1,
            from: None,
            text: "hey /joke".to_string(),
            entities: vec![MessageEntity {
                kind: EntityKind::BotCommand,
                offset: 4,
                length: 5,
            }],
        };
        assert!(message.leading_command().is_none());
    }

    #[test]
    fn test_update_without_payload_is_other() {
        let update: Update = serde_json::from_str(r#"{"update_id": 3}"#).expect("decode");
        assert_eq!(update.into_kind(), UpdateKind::Other);
    }
}
