//! Voice companion: talk to an assistant that listens, replies and speaks.
//!
//! The crate is split by concern:
//!
//! * [`speech`] / [`stt`] / [`audio`] — microphone capture, endpointing and
//!   on-device recognition, plus decoding and playback of synthesized audio.
//! * [`llm`] — the remote text-generation client and its canned fallbacks.
//! * [`tts`] — the remote voice-synthesis client.
//! * [`session`] — conversations and their JSON store.
//! * [`pipeline`] — the conversation controller and the state the UI reads.
//! * [`app`] — the eframe window.
//! * [`config`] — `settings.toml` and platform paths.

pub mod app;
pub mod audio;
pub mod config;
pub mod llm;
pub mod pipeline;
pub mod session;
pub mod speech;
pub mod stt;
pub mod tts;
