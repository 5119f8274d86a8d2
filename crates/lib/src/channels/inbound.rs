//! Inbound message from a channel: delivered to the agent runner for session dispatch.

use std::fmt;

/// Backend-qualified chat identity (`<channel id>:<native chat id>`).
///
/// Unique across every channel registered with a manager, so sessions of two
/// backends never collide even when their native ids do.
#[derive(Debug, Clone, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct ChatId(String);

impl ChatId {
    pub fn new(channel_id: &str, conversation_id: &str) -> Self {
        Self(format!("{}:{}", channel_id, conversation_id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who sent a message. Every field except `id` is best effort and may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct User {
    /// Backend-qualified user id (e.g. "tg:42").
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    /// Handle or profile link, when the backend exposes one.
    pub username: Option<String>,
}

impl User {
    /// First and last name joined by a space; empty when both are unknown.
    pub fn full_name(&self) -> String {
        let first = self.first_name.trim();
        let last = self.last_name.trim();
        match (first.is_empty(), last.is_empty()) {
            (false, false) => format!("{} {}", first, last),
            (false, true) => first.to_string(),
            (true, false) => last.to_string(),
            (true, true) => String::new(),
        }
    }
}

/// A message from a channel to be routed to the chat's session.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Id of the channel that received it (e.g. "tg").
    pub channel_id: String,
    /// Native conversation id on that channel; replies are addressed to it.
    pub conversation_id: String,
    pub sender: User,
    /// Message text; empty for non-text events (stickers, photos, ...).
    pub text: String,
}

impl InboundMessage {
    pub fn chat_id(&self) -> ChatId {
        ChatId::new(&self.channel_id, &self.conversation_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_id_is_qualified_by_channel() {
        let tg = ChatId::new("tg", "100");
        let vk = ChatId::new("vk", "100");
        assert_ne!(tg, vk);
        assert_eq!(tg.as_str(), "tg:100");
    }

    #[test]
    fn full_name_skips_missing_parts() {
        let mut user = User {
            id: "tg:1".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            username: None,
        };
        assert_eq!(user.full_name(), "Ada Lovelace");
        user.last_name.clear();
        assert_eq!(user.full_name(), "Ada");
        user.first_name.clear();
        assert_eq!(user.full_name(), "");
    }
}
