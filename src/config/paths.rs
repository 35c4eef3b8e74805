//! Cross-platform application paths using the `dirs` crate.
//!
//! Layout:
//!
//! Config dir (settings + conversation history):
//!   Windows: %APPDATA%\voice-companion\
//!   macOS:   ~/Library/Application Support/voice-companion/
//!   Linux:   ~/.config/voice-companion/
//!
//! Data dir (recognition models):
//!   Windows: %LOCALAPPDATA%\voice-companion\
//!   macOS:   ~/Library/Application Support/voice-companion/
//!   Linux:   ~/.local/share/voice-companion/

use std::path::{Path, PathBuf};

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory for `settings.toml` and `sessions.json`.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// Full path to `sessions.json` (the persisted session list).
    pub sessions_file: PathBuf,
    /// Directory for GGML recognition model files.
    pub models_dir: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "voice-companion";

    /// Resolves all paths using the `dirs` crate.
    ///
    /// Falls back to the current directory if the platform cannot provide a
    /// standard path.
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        Self::rooted(config_dir, data_dir.join("models"))
    }

    /// Lay the files out under explicit directories (used by tests).
    pub fn rooted(config_dir: impl AsRef<Path>, models_dir: impl AsRef<Path>) -> Self {
        let config_dir = config_dir.as_ref().to_path_buf();
        Self {
            settings_file: config_dir.join("settings.toml"),
            sessions_file: config_dir.join("sessions.json"),
            models_dir: models_dir.as_ref().to_path_buf(),
            config_dir,
        }
    }

    /// Path of the GGML file for a recognition model stem, e.g.
    /// `"ggml-base.en"` → `<models_dir>/ggml-base.en.bin`.
    pub fn model_file(&self, stem: &str) -> PathBuf {
        self.models_dir.join(format!("{stem}.bin"))
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_non_empty() {
        let paths = AppPaths::new();
        assert!(paths.config_dir.to_str().is_some_and(|s| !s.is_empty()));
        assert!(paths.models_dir.to_str().is_some_and(|s| !s.is_empty()));
        assert!(paths
            .settings_file
            .file_name()
            .is_some_and(|n| n == "settings.toml"));
        assert!(paths
            .sessions_file
            .file_name()
            .is_some_and(|n| n == "sessions.json"));
    }

    #[test]
    fn rooted_layout_and_model_file() {
        let paths = AppPaths::rooted("/tmp/cfg", "/tmp/models");
        assert_eq!(paths.sessions_file, PathBuf::from("/tmp/cfg/sessions.json"));
        assert_eq!(
            paths.model_file("ggml-base.en"),
            PathBuf::from("/tmp/models/ggml-base.en.bin")
        );
    }
}
