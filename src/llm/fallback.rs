//! Fallback generator — wraps any [`ReplyGenerator`] and answers with a
//! canned, topic-appropriate reply when the remote call fails.
//!
//! There is no retry: one attempt, and any error (`Request`, `Timeout`,
//! `Status`, `Parse`, `EmptyResponse`) maps to the fallback text chosen by
//! [`TopicDetector`] from the user's utterance.  The conversation therefore
//! always continues to the synthesis step.

use async_trait::async_trait;

use crate::llm::generator::{LlmError, ReplyGenerator};
use crate::llm::prompt::ChatTurn;
use crate::llm::topic::{Topic, TopicDetector};

/// Canned reply for each topic.
pub fn fallback_reply(topic: Topic) -> &'static str {
    match topic {
        Topic::Verse => {
            "Here is a verse to hold onto: \"The Lord is my shepherd; I shall not want.\" \
             Psalm 23, verse 1. I'm having trouble reaching my thoughts right now, \
             but that promise still stands."
        }
        Topic::Prayer => {
            "Let's pray together. Lord, we bring this moment to you. Grant peace, \
             strength, and comfort, and remind us that we are never alone. Amen."
        }
        Topic::Greeting => {
            "Hello! It's good to hear from you. I'm having a little trouble connecting \
             right now, but I'm still here with you."
        }
        Topic::General => {
            "I'm sorry, I'm having trouble connecting right now. \
             Could you try asking me again in a moment?"
        }
    }
}

// ---------------------------------------------------------------------------
// FallbackGenerator
// ---------------------------------------------------------------------------

/// A wrapper around any [`ReplyGenerator`] that never returns an error.
///
/// # Example
/// ```rust
/// use voice_companion::config::LlmConfig;
/// use voice_companion::llm::{ApiGenerator, FallbackGenerator};
///
/// let generator = FallbackGenerator::new(ApiGenerator::from_config(&LlmConfig::default()));
/// // `generator` is safe to use even when the service is unreachable.
/// ```
pub struct FallbackGenerator<G: ReplyGenerator> {
    inner: G,
    topics: TopicDetector,
}

impl<G: ReplyGenerator> FallbackGenerator<G> {
    pub fn new(inner: G) -> Self {
        Self {
            inner,
            topics: TopicDetector::new(),
        }
    }
}

#[async_trait]
impl<G: ReplyGenerator> ReplyGenerator for FallbackGenerator<G> {
    /// This implementation **never** returns `Err(_)`.
    async fn generate(&self, text: &str, history: &[ChatTurn]) -> Result<String, LlmError> {
        match self.inner.generate(text, history).await {
            Ok(reply) => Ok(reply),
            Err(err) => {
                let topic = self.topics.detect(text);
                log::warn!("text generation failed ({err}); using {topic:?} fallback");
                Ok(fallback_reply(topic).to_string())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct AlwaysOk(String);

    #[async_trait]
    impl ReplyGenerator for AlwaysOk {
        async fn generate(&self, _text: &str, _h: &[ChatTurn]) -> Result<String, LlmError> {
            Ok(self.0.clone())
        }
    }

    /// Fails every call and counts attempts.
    #[derive(Default)]
    struct AlwaysFails {
        calls: std::sync::Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ReplyGenerator for AlwaysFails {
        async fn generate(&self, _text: &str, _h: &[ChatTurn]) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(LlmError::Status {
                status: 503,
                body: "unavailable".into(),
            })
        }
    }

    #[tokio::test]
    async fn passes_through_success() {
        let g = FallbackGenerator::new(AlwaysOk("Grace and peace.".into()));
        assert_eq!(g.generate("hello", &[]).await.unwrap(), "Grace and peace.");
    }

    #[tokio::test]
    async fn hello_gets_greeting_fallback() {
        let g = FallbackGenerator::new(AlwaysFails::default());
        let reply = g.generate("hello", &[]).await.unwrap();
        assert_eq!(reply, fallback_reply(Topic::Greeting));
        assert!(reply.starts_with("Hello"));
    }

    #[tokio::test]
    async fn verse_and_prayer_get_distinct_fallbacks() {
        let g = FallbackGenerator::new(AlwaysFails::default());
        let verse = g.generate("give me a verse", &[]).await.unwrap();
        let prayer = g.generate("please pray for me", &[]).await.unwrap();
        let general = g.generate("what's the weather", &[]).await.unwrap();

        assert_eq!(verse, fallback_reply(Topic::Verse));
        assert_eq!(prayer, fallback_reply(Topic::Prayer));
        assert_eq!(general, fallback_reply(Topic::General));
        assert_ne!(verse, prayer);
    }

    #[tokio::test]
    async fn makes_a_single_attempt() {
        let failing = AlwaysFails::default();
        let calls = std::sync::Arc::clone(&failing.calls);
        let g = FallbackGenerator::new(failing);
        let _ = g.generate("hello", &[]).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn fallback_is_object_safe() {
        let _: Box<dyn ReplyGenerator> = Box::new(FallbackGenerator::new(AlwaysOk("ok".into())));
    }
}
