//! Conversation history: messages, sessions and their on-disk store.
//!
//! A [`ChatSession`] is one conversation: an ordered list of
//! [`Message`]s, a title taken from the first user message, and the time it
//! was last updated.  [`SessionStore`] keeps every session in a single JSON
//! document, most recently updated first.

pub mod store;

pub use store::{SessionError, SessionStore};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Title shown for a session that has no user message yet.
pub const UNTITLED: &str = "New conversation";

/// Longest title, in characters, before it is cut with an ellipsis.
const TITLE_MAX_CHARS: usize = 40;

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// Who wrote a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Author {
    User,
    Assistant,
}

/// One chat message.  Only `audio` is filled in after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub text: String,
    pub author: Author,
    pub timestamp: DateTime<Utc>,
    /// Synthesized speech for assistant messages; kept in memory only.
    #[serde(skip)]
    pub audio: Option<Vec<u8>>,
    /// Recognition confidence for user messages (0.0 – 1.0).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

impl Message {
    pub fn user(text: impl Into<String>, confidence: Option<f32>) -> Self {
        Self::new(Author::User, text.into(), confidence)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Author::Assistant, text.into(), None)
    }

    fn new(author: Author, text: String, confidence: Option<f32>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text,
            author,
            timestamp: Utc::now(),
            audio: None,
            confidence,
        }
    }

    /// Attach synthesized audio (builder style, before the message is stored).
    pub fn with_audio(mut self, audio: Vec<u8>) -> Self {
        self.audio = Some(audio);
        self
    }
}

// ---------------------------------------------------------------------------
// ChatSession
// ---------------------------------------------------------------------------

/// One conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: Uuid,
    pub title: String,
    pub messages: Vec<Message>,
    pub updated_at: DateTime<Utc>,
}

impl ChatSession {
    /// An empty session with a fresh id.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            title: UNTITLED.to_string(),
            messages: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    /// Append `message`, bump `updated_at`, and take the title from the
    /// first user message.
    pub fn push(&mut self, message: Message) {
        let first_user = message.author == Author::User
            && !self.messages.iter().any(|m| m.author == Author::User);
        if first_user {
            self.title = derive_title(&message.text);
        }
        self.updated_at = message.timestamp.max(self.updated_at);
        self.messages.push(message);
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Collapse whitespace and cut to [`TITLE_MAX_CHARS`] characters.
pub fn derive_title(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return UNTITLED.to_string();
    }
    if collapsed.chars().count() <= TITLE_MAX_CHARS {
        return collapsed;
    }
    let cut: String = collapsed.chars().take(TITLE_MAX_CHARS).collect();
    format!("{}…", cut.trim_end())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_comes_from_first_user_message() {
        let mut s = ChatSession::new();
        assert_eq!(s.title, UNTITLED);

        s.push(Message::assistant("Welcome."));
        assert_eq!(s.title, UNTITLED);

        s.push(Message::user("  Share   a verse  ", Some(0.9)));
        assert_eq!(s.title, "Share a verse");

        s.push(Message::user("Something else", None));
        assert_eq!(s.title, "Share a verse");
    }

    #[test]
    fn long_titles_are_truncated_on_char_boundary() {
        let text = "é".repeat(60);
        let title = derive_title(&text);
        assert_eq!(title.chars().count(), TITLE_MAX_CHARS + 1);
        assert!(title.ends_with('…'));
    }

    #[test]
    fn blank_text_gives_untitled() {
        assert_eq!(derive_title("   \n "), UNTITLED);
    }

    #[test]
    fn push_bumps_updated_at() {
        let mut s = ChatSession::new();
        let before = s.updated_at;
        let msg = Message::user("hello", None);
        let stamp = msg.timestamp;
        s.push(msg);
        assert!(s.updated_at >= before);
        assert_eq!(s.updated_at, stamp.max(before));
    }

    #[test]
    fn identical_first_messages_make_independent_sessions() {
        let mut a = ChatSession::new();
        let mut b = ChatSession::new();
        a.push(Message::user("hello", None));
        b.push(Message::user("hello", None));
        b.push(Message::assistant("Hi!"));

        assert_ne!(a.id, b.id);
        assert_eq!(a.title, b.title);
        assert_eq!(a.messages.len(), 1);
        assert_eq!(b.messages.len(), 2);
        assert_ne!(a.messages[0].id, b.messages[0].id);
    }

    #[test]
    fn audio_is_not_serialized() {
        let msg = Message::assistant("Amen.").with_audio(vec![1, 2, 3]);
        let json = serde_json::to_string(&msg).unwrap();
        assert!(!json.contains("audio"));
        let back: Message = serde_json::from_str(&json).unwrap();
        assert!(back.audio.is_none());
        assert_eq!(back.text, "Amen.");
    }
}
