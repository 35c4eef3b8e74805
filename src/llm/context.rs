//! Conversation window sent along with each generation request.
//!
//! The last `max_turns` user/assistant exchanges of the active session are
//! converted into [`ChatTurn`]s, oldest first, so the model can follow the
//! thread of the conversation.

use crate::llm::prompt::ChatTurn;
use crate::session::{Author, Message};

/// Converts session messages into request history.
///
/// # Example
/// ```rust
/// use voice_companion::llm::ContextWindow;
/// use voice_companion::session::Message;
///
/// let messages = vec![Message::user("hello", None), Message::assistant("Hi!")];
/// let history = ContextWindow::new(4).history(&messages);
/// assert_eq!(history.len(), 2);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ContextWindow {
    max_turns: usize,
}

impl ContextWindow {
    /// A window of `max_turns` exchanges (two messages each).
    pub fn new(max_turns: usize) -> Self {
        Self { max_turns }
    }

    /// The tail of `messages`, at most `2 * max_turns` entries.
    pub fn history(&self, messages: &[Message]) -> Vec<ChatTurn> {
        let keep = self.max_turns.saturating_mul(2);
        let start = messages.len().saturating_sub(keep);
        messages[start..]
            .iter()
            .map(|m| match m.author {
                Author::User => ChatTurn::user(m.text.clone()),
                Author::Assistant => ChatTurn::assistant(m.text.clone()),
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::prompt::Role;

    fn exchange(n: usize) -> Vec<Message> {
        (0..n)
            .flat_map(|i| {
                [
                    Message::user(format!("question {i}"), None),
                    Message::assistant(format!("answer {i}")),
                ]
            })
            .collect()
    }

    #[test]
    fn empty_session_has_no_history() {
        assert!(ContextWindow::new(4).history(&[]).is_empty());
    }

    #[test]
    fn window_keeps_most_recent_turns_in_order() {
        let history = ContextWindow::new(2).history(&exchange(5));
        assert_eq!(history.len(), 4);
        assert_eq!(history[0], ChatTurn::user("question 3"));
        assert_eq!(history[1], ChatTurn::assistant("answer 3"));
        assert_eq!(history[3].content, "answer 4");
    }

    #[test]
    fn zero_turns_disables_history() {
        assert!(ContextWindow::new(0).history(&exchange(3)).is_empty());
    }

    #[test]
    fn authors_map_to_roles() {
        let history = ContextWindow::new(1).history(&exchange(1));
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[1].role, Role::Assistant);
    }
}
