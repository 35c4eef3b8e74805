//! Configuration module for Voice Companion.
//!
//! Provides `AppConfig` (top-level settings), sub-configs for each service,
//! `AppPaths` for cross-platform data directories, and TOML persistence via
//! `AppConfig::load` / `AppConfig::save`.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{
    AppConfig, LlmConfig, ProfilePreference, RecognitionConfig, TtsConfig, UiConfig,
    VoiceSettings,
};
