//! Prompt assembly for the companion's chat-completion requests.
//!
//! Every request carries the same fixed system prompt, then the recent
//! conversation (oldest first), then the new utterance.  Replies are spoken
//! aloud, so the prompt asks for short, plain sentences without markup.

use serde::Serialize;

// ---------------------------------------------------------------------------
// System prompt
// ---------------------------------------------------------------------------

/// Fixed instruction sent as the first message of every request.
pub const SYSTEM_PROMPT: &str = "\
You are a warm, gentle spiritual companion speaking with someone by voice.
Your replies are converted to speech, so:

1. Answer in two to four short, natural sentences.
2. Never use lists, markdown, emoji, or headings.
3. When asked for a verse, quote one fitting Bible verse with its reference, \
then add one sentence of encouragement.
4. When asked to pray, offer a brief, personal prayer in the first person plural.
5. Be kind and non-judgemental; do not give medical, legal, or financial advice.
6. If you are unsure what the person meant, ask a short clarifying question.";

// ---------------------------------------------------------------------------
// ChatTurn
// ---------------------------------------------------------------------------

/// Author of a chat-completion message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One message in OpenAI chat-completions wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// PromptBuilder
// ---------------------------------------------------------------------------

/// Builds the `messages` array for a request.
///
/// # Example
/// ```rust
/// use voice_companion::llm::{ChatTurn, PromptBuilder, Role};
///
/// let builder = PromptBuilder::new();
/// let messages = builder.build("Share a verse about peace", &[]);
/// assert_eq!(messages.len(), 2);
/// assert_eq!(messages[0].role, Role::System);
/// assert_eq!(messages[1], ChatTurn::user("Share a verse about peace"));
/// ```
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    system_prompt: String,
}

impl PromptBuilder {
    /// Builder using [`SYSTEM_PROMPT`].
    pub fn new() -> Self {
        Self::with_system_prompt(SYSTEM_PROMPT)
    }

    pub fn with_system_prompt(prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: prompt.into(),
        }
    }

    /// `[system, history..., user]`.  Blank history entries are skipped.
    pub fn build(&self, text: &str, history: &[ChatTurn]) -> Vec<ChatTurn> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatTurn {
            role: Role::System,
            content: self.system_prompt.clone(),
        });
        messages.extend(
            history
                .iter()
                .filter(|t| t.role != Role::System && !t.content.trim().is_empty())
                .cloned(),
        );
        messages.push(ChatTurn::user(text.trim()));
        messages
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_asks_for_speakable_replies() {
        assert!(SYSTEM_PROMPT.contains("converted to speech"));
        assert!(SYSTEM_PROMPT.contains("verse"));
        assert!(SYSTEM_PROMPT.contains("pray"));
    }

    #[test]
    fn history_sits_between_system_and_user() {
        let builder = PromptBuilder::new();
        let history = vec![ChatTurn::user("hello"), ChatTurn::assistant("Hi there.")];
        let messages = builder.build("  how are you?  ", &history);

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1], history[0]);
        assert_eq!(messages[2], history[1]);
        assert_eq!(messages[3], ChatTurn::user("how are you?"));
    }

    #[test]
    fn system_and_blank_history_entries_are_dropped() {
        let builder = PromptBuilder::with_system_prompt("sys");
        let history = vec![
            ChatTurn {
                role: Role::System,
                content: "injected".into(),
            },
            ChatTurn::assistant("   "),
        ];
        let messages = builder.build("hi", &history);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "sys");
    }

    #[test]
    fn roles_serialize_lowercase() {
        let json = serde_json::to_value(ChatTurn::assistant("ok")).unwrap();
        assert_eq!(json["role"], "assistant");
        assert_eq!(json["content"], "ok");
    }
}
