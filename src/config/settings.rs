//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.
//! Every struct is `#[serde(default)]`: a partial or older `settings.toml`
//! still loads, with missing keys taking their default values.

use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// Resolve a credential: the named environment variable wins, then the value
/// the user saved through the settings form.  Empty strings count as unset.
fn resolve_secret(env_var: &str, saved: Option<&str>) -> Option<String> {
    std::env::var(env_var)
        .ok()
        .filter(|k| !k.trim().is_empty())
        .or_else(|| saved.filter(|k| !k.trim().is_empty()).map(str::to_string))
}

// ---------------------------------------------------------------------------
// LlmConfig
// ---------------------------------------------------------------------------

/// Settings for the remote text-generation service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible API (`/v1/chat/completions` is
    /// appended).
    pub base_url: String,
    /// Key entered in the settings form.  `None` for local providers.
    pub api_key: Option<String>,
    /// Environment variable consulted before `api_key`.
    pub api_key_env: String,
    /// Model identifier sent to the API.
    pub model: String,
    /// Sampling temperature (0.0 – 2.0).
    pub temperature: f32,
    /// Upper bound on reply length.
    pub max_tokens: u32,
    /// Maximum seconds to wait for a reply before falling back.
    pub timeout_secs: u64,
    /// Number of previous user/assistant turns sent along as context.
    pub history_turns: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".into(),
            api_key: None,
            api_key_env: "OPENAI_API_KEY".into(),
            model: "gpt-4o-mini".into(),
            temperature: 0.7,
            max_tokens: 300,
            timeout_secs: 30,
            history_turns: 4,
        }
    }
}

impl LlmConfig {
    /// The bearer token to send, if any.
    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_secret(&self.api_key_env, self.api_key.as_deref())
    }
}

// ---------------------------------------------------------------------------
// VoiceSettings
// ---------------------------------------------------------------------------

/// Parameters controlling the character of synthesized speech.
///
/// Serialized as the `voice_settings` object of a synthesis request, and as
/// the `[tts.voice]` table of `settings.toml`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceSettings {
    /// 0.0 (expressive) – 1.0 (monotone, consistent).
    pub stability: f32,
    /// 0.0 – 1.0; how closely output tracks the original voice.
    pub similarity_boost: f32,
    /// 0.0 – 1.0 style exaggeration; omitted from requests when `None`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<f32>,
    /// Omitted from requests when `None`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_speaker_boost: Option<bool>,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            stability: 0.5,
            similarity_boost: 0.75,
            style: Some(0.0),
            use_speaker_boost: Some(true),
        }
    }
}

impl VoiceSettings {
    /// Clamp every numeric parameter into `[0.0, 1.0]`.
    pub fn clamped(self) -> Self {
        Self {
            stability: self.stability.clamp(0.0, 1.0),
            similarity_boost: self.similarity_boost.clamp(0.0, 1.0),
            style: self.style.map(|s| s.clamp(0.0, 1.0)),
            use_speaker_boost: self.use_speaker_boost,
        }
    }
}

// ---------------------------------------------------------------------------
// TtsConfig
// ---------------------------------------------------------------------------

/// Settings for the remote voice-synthesis service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    /// Base URL of the ElevenLabs-compatible API.
    pub base_url: String,
    /// Key entered in the settings form.
    pub api_key: Option<String>,
    /// Environment variable consulted before `api_key`.
    pub api_key_env: String,
    /// Voice used when a request does not name one.
    pub voice_id: String,
    /// Synthesis model identifier.
    pub model_id: String,
    /// Maximum seconds to wait for synthesized audio.
    pub timeout_secs: u64,
    /// Default voice parameters.
    pub voice: VoiceSettings,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.elevenlabs.io".into(),
            api_key: None,
            api_key_env: "ELEVENLABS_API_KEY".into(),
            voice_id: "21m00Tcm4TlvDq8ikWAM".into(),
            model_id: "eleven_monolingual_v1".into(),
            timeout_secs: 30,
            voice: VoiceSettings::default(),
        }
    }
}

impl TtsConfig {
    /// The `xi-api-key` value to send, if any.
    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_secret(&self.api_key_env, self.api_key.as_deref())
    }
}

// ---------------------------------------------------------------------------
// RecognitionConfig
// ---------------------------------------------------------------------------

/// Which recognition profile to use.  `Auto` runs capability detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProfilePreference {
    #[default]
    Auto,
    Continuous,
    FinalOnly,
}

/// Settings for microphone capture and on-device speech recognition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    /// GGML model file stem under the models directory.
    pub model: String,
    /// ISO-639-1 code, or `"auto"` for language detection.
    pub language: String,
    /// Attempt GPU-accelerated inference when available.
    pub use_gpu: bool,
    /// Input device name, or `None` for the system default.
    pub input_device: Option<String>,
    /// Pin a profile instead of detecting one.
    pub profile: ProfilePreference,
    /// RMS level above which a 30 ms frame counts as speech.
    pub speech_threshold: f32,
    /// Trailing silence that ends an utterance, in milliseconds.
    pub end_silence_ms: u64,
    /// Utterances with less voiced audio than this are treated as no speech.
    pub min_speech_ms: u64,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            model: "ggml-base.en".into(),
            language: "en".into(),
            use_gpu: false,
            input_device: None,
            profile: ProfilePreference::Auto,
            speech_threshold: 0.015,
            end_silence_ms: 1_200,
            min_speech_ms: 300,
        }
    }
}

// ---------------------------------------------------------------------------
// UiConfig
// ---------------------------------------------------------------------------

/// Window and interaction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Initial window size in logical pixels.
    pub window_size: (f32, f32),
    /// Speak `greeting` once on startup.
    pub auto_greet: bool,
    /// Text spoken by the startup greeting.
    pub greeting: String,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            window_size: (520.0, 720.0),
            auto_greet: false,
            greeting: "Hello! I'm here to listen. What's on your heart today?".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use voice_companion::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Text-generation service.
    pub llm: LlmConfig,
    /// Voice-synthesis service.
    pub tts: TtsConfig,
    /// Capture + recognition.
    pub recognition: RecognitionConfig,
    /// Window / interaction.
    pub ui: UiConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Like [`load_from`](Self::load_from) but never fails: unreadable or
    /// malformed files revert to defaults with a warning.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load_from(path).unwrap_or_else(|e| {
            log::warn!("ignoring unreadable {} ({e}); using defaults", path.display());
            Self::default()
        })
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trip_toml() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");

        let original = AppConfig::default();
        original.save_to(&path).expect("save");

        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(original.llm.base_url, loaded.llm.base_url);
        assert_eq!(original.llm.model, loaded.llm.model);
        assert_eq!(original.llm.history_turns, loaded.llm.history_turns);
        assert_eq!(original.tts, loaded.tts);
        assert_eq!(original.recognition.model, loaded.recognition.model);
        assert_eq!(original.recognition.profile, loaded.recognition.profile);
        assert_eq!(original.ui.greeting, loaded.ui.greeting);
    }

    #[test]
    fn voice_settings_survive_round_trip() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("voice.toml");

        let mut cfg = AppConfig::default();
        cfg.tts.api_key = Some("xi-test".into());
        cfg.tts.voice_id = "voice-123".into();
        cfg.tts.voice = VoiceSettings {
            stability: 0.31,
            similarity_boost: 0.92,
            style: Some(0.4),
            use_speaker_boost: Some(false),
        };
        cfg.save_to(&path).expect("save");

        let loaded = AppConfig::load_from(&path).expect("load");
        assert_eq!(loaded.tts.voice, cfg.tts.voice);
        assert_eq!(loaded.tts.api_key.as_deref(), Some("xi-test"));
        assert_eq!(loaded.tts.voice_id, "voice-123");
    }

    #[test]
    fn unset_optional_voice_fields_stay_unset() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("voice.toml");

        let mut cfg = AppConfig::default();
        cfg.tts.voice.style = None;
        cfg.tts.voice.use_speaker_boost = None;
        cfg.save_to(&path).expect("save");

        let loaded = AppConfig::load_from(&path).expect("load");
        assert_eq!(loaded.tts.voice.style, None);
        assert_eq!(loaded.tts.voice.use_speaker_boost, None);
    }

    #[test]
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nonexistent.toml");

        let config = AppConfig::load_from(&path).expect("should not error");
        assert_eq!(config.tts, TtsConfig::default());
        assert_eq!(config.llm.model, LlmConfig::default().model);
    }

    #[test]
    fn malformed_file_reverts_to_defaults() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "this is [not valid toml").unwrap();

        assert!(AppConfig::load_from(&path).is_err());
        let config = AppConfig::load_or_default(&path);
        assert_eq!(config.tts.voice, VoiceSettings::default());
    }

    #[test]
    fn partial_file_fills_missing_keys() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "[tts.voice]\nstability = 0.2\n").unwrap();

        let config = AppConfig::load_from(&path).expect("load");
        assert!((config.tts.voice.stability - 0.2).abs() < f32::EPSILON);
        assert!((config.tts.voice.similarity_boost - 0.75).abs() < f32::EPSILON);
        assert_eq!(config.tts.voice_id, TtsConfig::default().voice_id);
    }

    #[test]
    fn default_values() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.llm.base_url, "https://api.openai.com");
        assert!(cfg.llm.api_key.is_none());
        assert_eq!(cfg.tts.base_url, "https://api.elevenlabs.io");
        assert!(cfg.tts.api_key.is_none());
        assert!((cfg.tts.voice.stability - 0.5).abs() < f32::EPSILON);
        assert_eq!(cfg.recognition.profile, ProfilePreference::Auto);
        assert!(!cfg.ui.auto_greet);
    }

    #[test]
    fn environment_key_wins_over_saved_key() {
        let var = "VOICE_COMPANION_TEST_KEY_ENV_WINS";
        std::env::set_var(var, "from-env");
        let cfg = TtsConfig {
            api_key: Some("from-file".into()),
            api_key_env: var.into(),
            ..TtsConfig::default()
        };
        assert_eq!(cfg.resolve_api_key().as_deref(), Some("from-env"));
        std::env::remove_var(var);
    }

    #[test]
    fn saved_key_used_when_environment_unset() {
        let cfg = LlmConfig {
            api_key: Some("sk-saved".into()),
            api_key_env: "VOICE_COMPANION_TEST_KEY_NEVER_SET".into(),
            ..LlmConfig::default()
        };
        assert_eq!(cfg.resolve_api_key().as_deref(), Some("sk-saved"));

        let blank = LlmConfig {
            api_key: Some("   ".into()),
            ..cfg
        };
        assert_eq!(blank.resolve_api_key(), None);
    }

    #[test]
    fn clamped_limits_voice_parameters() {
        let v = VoiceSettings {
            stability: 1.7,
            similarity_boost: -0.2,
            style: Some(3.0),
            use_speaker_boost: None,
        }
        .clamped();
        assert_eq!(v.stability, 1.0);
        assert_eq!(v.similarity_boost, 0.0);
        assert_eq!(v.style, Some(1.0));
    }
}
