//! Remote text-generation client.
//!
//! This module provides:
//! * [`ReplyGenerator`] — async trait implemented by all generator backends.
//! * [`ApiGenerator`] — OpenAI-compatible chat-completions client.
//! * [`FallbackGenerator`] — wraps any generator; answers with a canned,
//!   topic-appropriate reply on failure.
//! * [`PromptBuilder`] / [`SYSTEM_PROMPT`] — the fixed instructional prompt.
//! * [`ContextWindow`] — recent turns of the active session.
//! * [`TopicDetector`] — keyword topics that pick the fallback reply.
//! * [`LlmError`] — error variants for generation.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use voice_companion::config::AppConfig;
//! use voice_companion::llm::{ApiGenerator, FallbackGenerator, ReplyGenerator};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::default();
//!
//!     // Never fails: falls back to a canned reply.
//!     let generator = FallbackGenerator::new(ApiGenerator::from_config(&config.llm));
//!
//!     let reply = generator.generate("Share a verse about hope", &[]).await.unwrap();
//!     println!("{reply}");
//! }
//! ```

pub mod context;
pub mod fallback;
pub mod generator;
pub mod prompt;
pub mod topic;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use context::ContextWindow;
pub use fallback::{fallback_reply, FallbackGenerator};
pub use generator::{ApiGenerator, LlmError, ReplyGenerator};
pub use prompt::{ChatTurn, PromptBuilder, Role, SYSTEM_PROMPT};
pub use topic::{Topic, TopicDetector};
