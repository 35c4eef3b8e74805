//! Remote voice-synthesis client.
//!
//! * [`VoiceSynthesizer`] — async trait for text-to-speech backends.
//! * [`ElevenLabsClient`] — ElevenLabs-compatible REST implementation.
//! * [`Voice`] — one entry of the provider's voice catalog.
//! * [`TtsError`] — error variants; every one maps to the connectivity banner.

pub mod client;

pub use client::{ElevenLabsClient, TtsError, Voice, VoiceSynthesizer};
