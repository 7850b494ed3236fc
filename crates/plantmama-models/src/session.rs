//! Conversation sessions and their messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{MessageId, PlantId, SessionId, UserId};

/// A conversation between a user and the agent.
///
/// A session stays open until the agent or the user ends it; new messages are
/// appended to the newest open session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Unique identifier.
    pub id: SessionId,

    /// User the session belongs to.
    pub user_id: UserId,

    /// When the session started.
    pub start_time: DateTime<Utc>,

    /// When the session ended (None while open).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,

    /// Number of messages exchanged.
    #[serde(default)]
    pub messages_count: u32,

    /// Model tokens spent.
    #[serde(default)]
    pub tokens_used: u32,

    /// Plants discussed in the session.
    #[serde(default)]
    pub plant_ids: Vec<PlantId>,

    /// Short summary written when the session ends.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl Session {
    /// Opens a new session.
    pub fn new(user_id: UserId) -> Self {
        Self {
            id: SessionId::new(),
            user_id,
            start_time: Utc::now(),
            end_time: None,
            messages_count: 0,
            tokens_used: 0,
            plant_ids: Vec::new(),
            summary: None,
        }
    }

    /// Counts a message and its token cost.
    pub fn record_message(&mut self, tokens: u32) {
        self.messages_count = self.messages_count.saturating_add(1);
        self.tokens_used = self.tokens_used.saturating_add(tokens);
    }

    /// Links a plant to the session, ignoring duplicates.
    pub fn add_plant(&mut self, plant_id: PlantId) {
        if !self.plant_ids.contains(&plant_id) {
            self.plant_ids.push(plant_id);
        }
    }

    /// Ends the session now. Ending twice keeps the first end time.
    pub fn end(&mut self) {
        if self.end_time.is_none() {
            self.end_time = Some(Utc::now());
        }
    }

    /// Whether the session is still open.
    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }
}

/// Role of a stored message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// The Telegram user.
    User,
    /// The agent.
    Assistant,
    /// System notes.
    System,
}

impl std::fmt::Display for ChatRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
            Self::System => write!(f, "system"),
        }
    }
}

/// A message persisted in a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Unique identifier.
    pub id: MessageId,

    /// Session the message belongs to.
    pub session_id: SessionId,

    /// Who wrote the message.
    pub role: ChatRole,

    /// Message text.
    pub content: String,

    /// Whether a photo accompanied the message.
    #[serde(default)]
    pub has_image: bool,

    /// Stored photo path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,

    /// When the message was written.
    pub timestamp: DateTime<Utc>,

    /// Model tokens attributed to the message.
    #[serde(default)]
    pub tokens_used: u32,
}

impl ChatMessage {
    /// Creates a message in a session.
    pub fn new(session_id: SessionId, role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            session_id,
            role,
            content: content.into(),
            has_image: false,
            image_path: None,
            timestamp: Utc::now(),
            tokens_used: 0,
        }
    }

    /// Attaches a stored image.
    pub fn with_image(mut self, image_path: Option<String>) -> Self {
        self.has_image = true;
        self.image_path = image_path;
        self
    }

    /// Sets the token count.
    pub fn with_tokens(mut self, tokens: u32) -> Self {
        self.tokens_used = tokens;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_counters() {
        let mut session = Session::new(UserId::new());
        session.record_message(0);
        session.record_message(120);
        assert_eq!(session.messages_count, 2);
        assert_eq!(session.tokens_used, 120);
    }

    #[test]
    fn test_end_is_idempotent() {
        let mut session = Session::new(UserId::new());
        assert!(session.is_open());
        session.end();
        let first = session.end_time;
        session.end();
        assert_eq!(session.end_time, first);
        assert!(!session.is_open());
    }

    #[test]
    fn test_add_plant_dedupes() {
        let mut session = Session::new(UserId::new());
        let plant = PlantId::new();
        session.add_plant(plant.clone());
        session.add_plant(plant);
        assert_eq!(session.plant_ids.len(), 1);
    }

    #[test]
    fn test_message_with_image() {
        let msg = ChatMessage::new(SessionId::new(), ChatRole::User, "look")
            .with_image(Some("uploads/x.jpg".into()))
            .with_tokens(3);
        assert!(msg.has_image);
        assert_eq!(msg.tokens_used, 3);
        assert_eq!(msg.role.to_string(), "user");
    }
}
