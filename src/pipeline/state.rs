//! Conversation state and the shared snapshot the UI renders.
//!
//! [`ConversationState`] is owned by the controller and is the only guard
//! on what may happen next.  [`AppState`] is everything the UI needs for one
//! frame; it lives behind [`SharedState`] (`Arc<Mutex<AppState>>`), written
//! only by the controller and read by egui every frame.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::audio::{PlaybackError, WaveformData};
use crate::config::AppConfig;
use crate::session::ChatSession;
use crate::speech::RecognitionError;
use crate::tts::{TtsError, Voice};

// ---------------------------------------------------------------------------
// ConversationState
// ---------------------------------------------------------------------------

/// ```text
/// Idle ──StartListening──▶ Listening ──capture ends──▶ Processing
///   ▲                                                     │ final transcript
///   │                                                     ▼
///   └──────────── playback done ◀── Speaking ◀── reply synthesized
/// any ──failure──▶ Error ──StartListening──▶ Listening
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConversationState {
    #[default]
    Idle,
    Listening,
    Processing,
    Speaking,
    Error,
}

impl ConversationState {
    /// A turn or capture is in progress.
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Listening | Self::Processing | Self::Speaking)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "Ready",
            Self::Listening => "Listening…",
            Self::Processing => "Thinking…",
            Self::Speaking => "Speaking",
            Self::Error => "Something went wrong",
        }
    }
}

// ---------------------------------------------------------------------------
// UserFacingError
// ---------------------------------------------------------------------------

/// Banner categories shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserFacingError {
    Microphone,
    Recognition,
    Connectivity,
    InteractionRequired,
    Playback,
}

impl UserFacingError {
    pub fn message(&self) -> &'static str {
        match self {
            Self::Microphone => {
                "Microphone unavailable. Check that one is connected and allowed, then try again."
            }
            Self::Recognition => "Sorry, I couldn't make that out. Please try again.",
            Self::Connectivity => {
                "Couldn't reach the voice service. Check your connection and API key."
            }
            Self::InteractionRequired => {
                "Audio output isn't available. Check your speakers, then tap to try again."
            }
            Self::Playback => "Couldn't play the reply audio.",
        }
    }

    /// `None` for outcomes the user need not hear about.
    pub fn from_recognition(error: &RecognitionError) -> Option<Self> {
        match error {
            RecognitionError::PermissionDenied(_) => Some(Self::Microphone),
            RecognitionError::Service(_) => Some(Self::Recognition),
            RecognitionError::NoSpeech | RecognitionError::Aborted => None,
        }
    }

    pub fn from_tts(_error: &TtsError) -> Self {
        Self::Connectivity
    }

    pub fn from_playback(error: &PlaybackError) -> Self {
        match error {
            PlaybackError::OutputUnavailable(_) => Self::InteractionRequired,
            PlaybackError::UnsupportedFormat | PlaybackError::Decode(_) | PlaybackError::Timeout => {
                Self::Playback
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Supporting view types
// ---------------------------------------------------------------------------

/// One row of the history browser.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub id: Uuid,
    pub title: String,
    pub updated_at: DateTime<Utc>,
    pub message_count: usize,
}

impl From<&ChatSession> for SessionSummary {
    fn from(s: &ChatSession) -> Self {
        Self {
            id: s.id,
            title: s.title.clone(),
            updated_at: s.updated_at,
            message_count: s.messages.len(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionStatus {
    #[default]
    Unknown,
    Testing,
    Connected,
    Failed,
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct AppState {
    pub conversation: ConversationState,
    /// Interim or final transcript of the current utterance.
    pub transcript: String,
    pub confidence: Option<f32>,
    pub banner: Option<UserFacingError>,
    /// The conversation on screen; `None` until its first message.
    pub active_session: Option<ChatSession>,
    /// Most recently updated first.
    pub sessions: Vec<SessionSummary>,
    pub waveform: WaveformData,
    pub voices: Vec<Voice>,
    pub voices_error: Option<String>,
    pub connection: ConnectionStatus,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            conversation: ConversationState::Idle,
            transcript: String::new(),
            confidence: None,
            banner: None,
            active_session: None,
            sessions: Vec::new(),
            waveform: WaveformData::default(),
            voices: Vec::new(),
            voices_error: None,
            connection: ConnectionStatus::Unknown,
            config,
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(AppConfig::default())
    }
}

// ---------------------------------------------------------------------------
// SharedState
// ---------------------------------------------------------------------------

/// Do not hold the lock across `.await`.
pub type SharedState = Arc<Mutex<AppState>>;

pub fn new_shared_state(config: AppConfig) -> SharedState {
    Arc::new(Mutex::new(AppState::new(config)))
}

/// Lock `state`, recovering the data if a panicking holder poisoned it.
pub fn lock_state(state: &SharedState) -> MutexGuard<'_, AppState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
