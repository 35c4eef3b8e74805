//! Speech capture adapter: microphone → utterances → transcripts.
//!
//! * [`RecognitionProfile`] — timing strategy picked once from
//!   [`DeviceCapabilities`] (or pinned in `settings.toml`).
//! * [`SpeechRecognizer`] — runs listening sessions and reports
//!   [`SpeechEvent`]s; implements [`SpeechInput`] for the controller.
//! * [`RecognitionError`] — permission, no-speech, recognizer and abort
//!   outcomes.

pub mod profile;
pub mod recognizer;

pub use profile::{DeviceCapabilities, ProfileKind, RecognitionProfile};
pub use recognizer::{
    RecognitionError, RecognizerSnapshot, SpeechEvent, SpeechInput, SpeechRecognizer,
};
