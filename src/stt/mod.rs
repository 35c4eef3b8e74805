//! On-device speech recognition.
//!
//! ```text
//! 16 kHz mono f32 ──▶ SttEngine::transcribe ──▶ Recognition { text, confidence }
//!                        └─ WhisperEngine (whisper-rs, GGML model)
//! ```
//!
//! ```rust,no_run
//! use voice_companion::config::AppPaths;
//! use voice_companion::stt::{SttEngine, TranscribeParams, WhisperEngine};
//!
//! let path = AppPaths::new().model_file("ggml-base.en");
//! let engine = WhisperEngine::load(path, TranscribeParams::default()).unwrap();
//! let heard = engine.transcribe(&vec![0.0; 16_000]).unwrap();
//! println!("{} ({:.2})", heard.text, heard.confidence);
//! ```

pub mod engine;
pub mod transcribe;

pub use engine::{SttEngine, SttError, WhisperEngine, MAX_AUDIO_SAMPLES, MIN_AUDIO_SAMPLES};
pub use transcribe::{optimal_threads, Recognition, TranscribeParams};

#[cfg(test)]
pub use engine::MockSttEngine;
