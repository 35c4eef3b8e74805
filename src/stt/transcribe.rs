//! Recognition parameters and result types.

use crate::config::RecognitionConfig;

// ---------------------------------------------------------------------------
// TranscribeParams
// ---------------------------------------------------------------------------

/// Parameters for one Whisper inference run.
///
/// ```
/// use voice_companion::stt::TranscribeParams;
///
/// let params = TranscribeParams {
///     language: "auto".into(),
///     ..TranscribeParams::default()
/// };
/// assert!(params.n_threads >= 1);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct TranscribeParams {
    /// ISO-639-1 code, or `"auto"` for language detection.
    pub language: String,
    /// CPU threads handed to Whisper.
    pub n_threads: i32,
    pub use_gpu: bool,
    /// Suppress Whisper's progress output to stderr.
    pub suppress_progress: bool,
}

impl Default for TranscribeParams {
    fn default() -> Self {
        Self {
            language: "en".into(),
            n_threads: optimal_threads(),
            use_gpu: false,
            suppress_progress: true,
        }
    }
}

impl TranscribeParams {
    pub fn from_config(config: &RecognitionConfig) -> Self {
        Self {
            language: config.language.clone(),
            use_gpu: config.use_gpu,
            ..Self::default()
        }
    }
}

/// Inference threads for this machine, capped at 8.
pub fn optimal_threads() -> i32 {
    std::thread::available_parallelism()
        .map(|n| n.get().min(8) as i32)
        .unwrap_or(2)
}

// ---------------------------------------------------------------------------
// Recognition
// ---------------------------------------------------------------------------

/// Text recognized from one stretch of audio.
#[derive(Debug, Clone, PartialEq)]
pub struct Recognition {
    /// Trimmed transcript; empty when nothing intelligible was heard.
    pub text: String,
    /// Mean token probability in `[0.0, 1.0]`.
    pub confidence: f32,
}

impl Recognition {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Mean of token probabilities, `0.0` for none.
pub fn mean_confidence(probs: &[f32]) -> f32 {
    if probs.is_empty() {
        return 0.0;
    }
    (probs.iter().sum::<f32>() / probs.len() as f32).clamp(0.0, 1.0)
}

/// Whisper marks silence and non-speech with bracketed tags such as
/// `[BLANK_AUDIO]` or `(music)`.  Strip them and collapse whitespace.
pub fn clean_transcript(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut depth = 0usize;
    for c in raw.chars() {
        match c {
            '[' | '(' => depth += 1,
            ']' | ')' if depth > 0 => depth -= 1,
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_follow_config() {
        let config = RecognitionConfig {
            language: "es".into(),
            use_gpu: true,
            ..RecognitionConfig::default()
        };
        let params = TranscribeParams::from_config(&config);
        assert_eq!(params.language, "es");
        assert!(params.use_gpu);
        assert!(params.suppress_progress);
    }

    #[test]
    fn optimal_threads_is_bounded() {
        let t = optimal_threads();
        assert!((1..=8).contains(&t));
    }

    #[test]
    fn mean_confidence_averages_and_clamps() {
        assert_eq!(mean_confidence(&[]), 0.0);
        assert!((mean_confidence(&[0.5, 1.0]) - 0.75).abs() < 1e-6);
        assert_eq!(mean_confidence(&[1.5, 1.5]), 1.0);
    }

    #[test]
    fn clean_transcript_drops_tags() {
        assert_eq!(clean_transcript(" [BLANK_AUDIO] "), "");
        assert_eq!(
            clean_transcript(" Share a verse (upbeat music)  about   hope."),
            "Share a verse about hope."
        );
    }
}
