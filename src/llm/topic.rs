//! Keyword-based topic detection on the user's utterance.
//!
//! [`TopicDetector`] picks the canned fallback reply used when the
//! text-generation service is unreachable.  Keywords match whole words,
//! case-insensitively; multi-word keywords match as a phrase.  Topics are
//! checked in priority order and the first hit wins.

// ---------------------------------------------------------------------------
// Topic
// ---------------------------------------------------------------------------

/// What the user is asking about, as far as a keyword scan can tell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topic {
    /// Asking for or about a scripture passage.
    Verse,
    /// Asking for prayer.
    Prayer,
    /// Saying hello.
    Greeting,
    /// Anything else.
    General,
}

struct TopicKeywords {
    topic: Topic,
    keywords: &'static [&'static str],
}

/// Priority order: the first topic with any matching keyword wins.
static TOPICS: &[TopicKeywords] = &[
    TopicKeywords {
        topic: Topic::Verse,
        keywords: &["verse", "verses", "scripture", "bible", "psalm", "psalms"],
    },
    TopicKeywords {
        topic: Topic::Prayer,
        keywords: &["prayer", "prayers", "pray", "praying"],
    },
    TopicKeywords {
        topic: Topic::Greeting,
        keywords: &["hello", "hi", "hey", "good morning", "good evening"],
    },
];

// ---------------------------------------------------------------------------
// TopicDetector
// ---------------------------------------------------------------------------

/// Classifies an utterance into a [`Topic`].
///
/// # Example
/// ```rust
/// use voice_companion::llm::{Topic, TopicDetector};
///
/// let detector = TopicDetector::new();
/// assert_eq!(detector.detect("Can you share a verse about hope?"), Topic::Verse);
/// assert_eq!(detector.detect("Hello there"), Topic::Greeting);
/// ```
#[derive(Debug, Default)]
pub struct TopicDetector;

impl TopicDetector {
    pub fn new() -> Self {
        Self
    }

    /// Detect the topic of `text`; [`Topic::General`] when nothing matches.
    pub fn detect(&self, text: &str) -> Topic {
        let words = normalize(text);
        TOPICS
            .iter()
            .find(|t| t.keywords.iter().any(|kw| contains_phrase(&words, kw)))
            .map(|t| t.topic)
            .unwrap_or(Topic::General)
    }
}

/// Lower-case and split on anything that is not a letter, digit or
/// apostrophe.
fn normalize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

fn contains_phrase(words: &[String], phrase: &str) -> bool {
    let needle: Vec<&str> = phrase.split_whitespace().collect();
    if needle.is_empty() || needle.len() > words.len() {
        return false;
    }
    words
        .windows(needle.len())
        .any(|w| w.iter().zip(&needle).all(|(a, b)| a == b))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_verse_requests() {
        let d = TopicDetector::new();
        assert_eq!(d.detect("Read me a Bible verse"), Topic::Verse);
        assert_eq!(d.detect("what does psalm 23 say"), Topic::Verse);
    }

    #[test]
    fn detects_prayer_requests() {
        let d = TopicDetector::new();
        assert_eq!(d.detect("Will you pray for my mother?"), Topic::Prayer);
        assert_eq!(d.detect("I need a PRAYER tonight"), Topic::Prayer);
    }

    #[test]
    fn detects_greetings() {
        let d = TopicDetector::new();
        assert_eq!(d.detect("hello"), Topic::Greeting);
        assert_eq!(d.detect("Hey!"), Topic::Greeting);
        assert_eq!(d.detect("good morning friend"), Topic::Greeting);
    }

    #[test]
    fn verse_outranks_prayer_and_greeting() {
        let d = TopicDetector::new();
        assert_eq!(d.detect("hi, can you pray a verse with me"), Topic::Verse);
        assert_eq!(d.detect("hello, please pray with me"), Topic::Prayer);
    }

    #[test]
    fn keywords_match_whole_words_only() {
        let d = TopicDetector::new();
        // "this" contains "hi", "universe" contains "verse"
        assert_eq!(d.detect("this universe is big"), Topic::General);
        // "good" alone is not "good morning"
        assert_eq!(d.detect("that sounds good"), Topic::General);
    }

    #[test]
    fn empty_text_is_general() {
        assert_eq!(TopicDetector::new().detect(""), Topic::General);
    }
}
