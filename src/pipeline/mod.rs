//! Conversation pipeline: the state machine behind the window.
//!
//! This module wires recognition → reply generation → synthesis → playback
//! and exposes the shared state that the UI reads every frame.
//!
//! # Architecture
//!
//! ```text
//! ControllerCommand (mpsc)      SpeechEvent (unbounded mpsc)
//!        │                              │
//!        └──────────────┬───────────────┘
//!                       ▼
//!        ConversationController::run()  ← async tokio task
//!                       │
//!                       ├─ ReplyGenerator::generate        (tokio::spawn)
//!                       ├─ VoiceSynthesizer::synthesize    (tokio::spawn)
//!                       ├─ AudioPlayer::play               (spawn_blocking)
//!                       └─ SessionStore::save
//!
//! SharedState (Arc<Mutex<AppState>>) ←─── read by egui update() each frame
//! ```

pub mod runner;
pub mod state;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use runner::{ControllerCommand, ConversationController, SynthesizerFactory, TurnToken};
pub use state::{
    lock_state, new_shared_state, AppState, ConnectionStatus, ConversationState, SessionSummary,
    SharedState, UserFacingError,
};
