//! Recognition engine trait and the Whisper implementation.
//!
//! [`SttEngine`] is object-safe and `Send + Sync` so the recognizer can hold
//! it behind an `Arc<dyn SttEngine>` and call it from its worker thread.
//! [`MockSttEngine`] (test builds only) replays canned results without a
//! model file.

use std::path::Path;

use thiserror::Error;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::stt::transcribe::{clean_transcript, mean_confidence, Recognition, TranscribeParams};

// ---------------------------------------------------------------------------
// SttError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error)]
pub enum SttError {
    #[error("model not found: {0}")]
    ModelNotFound(String),

    #[error("whisper context initialisation failed: {0}")]
    ContextInit(String),

    #[error("transcription failed: {0}")]
    Transcription(String),

    /// Shorter than [`MIN_AUDIO_SAMPLES`].
    #[error("audio too short to transcribe")]
    AudioTooShort,
}

// ---------------------------------------------------------------------------
// SttEngine trait
// ---------------------------------------------------------------------------

/// Speech-to-text over **16 kHz mono f32** audio.
///
/// Audio longer than [`MAX_AUDIO_SAMPLES`] is truncated to its most recent
/// part; shorter than [`MIN_AUDIO_SAMPLES`] is an error.
pub trait SttEngine: Send + Sync {
    fn transcribe(&self, audio: &[f32]) -> Result<Recognition, SttError>;
}

/// 0.25 s at 16 kHz.
pub const MIN_AUDIO_SAMPLES: usize = 4_000;
/// 30 s at 16 kHz, Whisper's context window.
pub const MAX_AUDIO_SAMPLES: usize = 480_000;

fn window(audio: &[f32]) -> Result<&[f32], SttError> {
    if audio.len() < MIN_AUDIO_SAMPLES {
        return Err(SttError::AudioTooShort);
    }
    Ok(&audio[audio.len().saturating_sub(MAX_AUDIO_SAMPLES)..])
}

// ---------------------------------------------------------------------------
// WhisperEngine
// ---------------------------------------------------------------------------

/// Whisper GGML model loaded through whisper-rs.  A fresh `WhisperState` is
/// created per call, so one engine serves any thread without locking.
pub struct WhisperEngine {
    ctx: WhisperContext,
    params: TranscribeParams,
}

impl std::fmt::Debug for WhisperEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperEngine")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

// SAFETY: WhisperContext is Send+Sync as declared by whisper-rs; the model
// weights are read-only after loading.
unsafe impl Send for WhisperEngine {}
unsafe impl Sync for WhisperEngine {}

impl WhisperEngine {
    pub fn load(model_path: impl AsRef<Path>, params: TranscribeParams) -> Result<Self, SttError> {
        let path = model_path.as_ref();
        if !path.exists() {
            return Err(SttError::ModelNotFound(path.display().to_string()));
        }
        let path_str = path.to_str().ok_or_else(|| {
            SttError::ModelNotFound(format!("non-UTF-8 model path: {}", path.display()))
        })?;

        let mut ctx_params = WhisperContextParameters::default();
        ctx_params.use_gpu(params.use_gpu);
        let ctx = WhisperContext::new_with_params(path_str, ctx_params)
            .map_err(|e| SttError::ContextInit(e.to_string()))?;

        log::info!("stt: loaded {} ({} threads)", path.display(), params.n_threads);
        Ok(Self { ctx, params })
    }

    pub fn params(&self) -> &TranscribeParams {
        &self.params
    }
}

impl SttEngine for WhisperEngine {
    fn transcribe(&self, audio: &[f32]) -> Result<Recognition, SttError> {
        let audio = window(audio)?;
        let fail = |e: whisper_rs::WhisperError| SttError::Transcription(e.to_string());

        let mut fp = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        let lang = (self.params.language != "auto").then_some(self.params.language.as_str());
        fp.set_language(lang);
        fp.set_n_threads(self.params.n_threads);
        fp.set_single_segment(true);
        if self.params.suppress_progress {
            fp.set_print_progress(false);
            fp.set_print_realtime(false);
            fp.set_print_special(false);
        }

        let mut state = self
            .ctx
            .create_state()
            .map_err(|e| SttError::ContextInit(e.to_string()))?;
        state.full(fp, audio).map_err(fail)?;

        let mut raw = String::new();
        let mut probs = Vec::new();
        for i in 0..state.full_n_segments().map_err(fail)? {
            raw.push_str(&state.full_get_segment_text(i).map_err(fail)?);
            for j in 0..state.full_n_tokens(i).map_err(fail)? {
                let token = state.full_get_token_text(i, j).map_err(fail)?;
                if token.starts_with("[_") || token.starts_with("<|") {
                    continue;
                }
                probs.push(state.full_get_token_prob(i, j).map_err(fail)?);
            }
        }

        let text = clean_transcript(&raw);
        let confidence = if text.is_empty() { 0.0 } else { mean_confidence(&probs) };
        Ok(Recognition { text, confidence })
    }
}

// ---------------------------------------------------------------------------
// MockSttEngine  (test-only)
// ---------------------------------------------------------------------------

/// Replays queued results in order, repeating the last one; counts calls.
#[cfg(test)]
pub struct MockSttEngine {
    responses: std::sync::Mutex<std::collections::VecDeque<Result<Recognition, SttError>>>,
    calls: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl MockSttEngine {
    pub fn ok(text: &str, confidence: f32) -> Self {
        Self::sequence(vec![Ok(Recognition {
            text: text.into(),
            confidence,
        })])
    }

    pub fn err(error: SttError) -> Self {
        Self::sequence(vec![Err(error)])
    }

    pub fn sequence(responses: Vec<Result<Recognition, SttError>>) -> Self {
        Self {
            responses: std::sync::Mutex::new(responses.into()),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
impl SttEngine for MockSttEngine {
    fn transcribe(&self, audio: &[f32]) -> Result<Recognition, SttError> {
        window(audio)?;
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let mut queue = self.responses.lock().unwrap();
        if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            queue.front().cloned().unwrap()
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_audio_is_rejected() {
        let engine = MockSttEngine::ok("hello", 0.9);
        assert!(matches!(
            engine.transcribe(&vec![0.0; MIN_AUDIO_SAMPLES - 1]),
            Err(SttError::AudioTooShort)
        ));
        assert_eq!(engine.calls(), 0);
    }

    #[test]
    fn long_audio_keeps_the_latest_window() {
        let mut audio = vec![1.0_f32; 10];
        audio.extend(vec![0.0; MAX_AUDIO_SAMPLES]);
        let w = window(&audio).unwrap();
        assert_eq!(w.len(), MAX_AUDIO_SAMPLES);
        assert!(w.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn mock_replays_sequence_then_repeats_last() {
        let engine = MockSttEngine::sequence(vec![
            Ok(Recognition {
                text: "share".into(),
                confidence: 0.5,
            }),
            Ok(Recognition {
                text: "share a verse".into(),
                confidence: 0.8,
            }),
        ]);
        let audio = vec![0.0; MIN_AUDIO_SAMPLES];
        assert_eq!(engine.transcribe(&audio).unwrap().text, "share");
        assert_eq!(engine.transcribe(&audio).unwrap().text, "share a verse");
        assert_eq!(engine.transcribe(&audio).unwrap().text, "share a verse");
        assert_eq!(engine.calls(), 3);
    }

    #[test]
    fn load_missing_model_returns_model_not_found() {
        let result = WhisperEngine::load("/nonexistent/model.bin", TranscribeParams::default());
        assert!(matches!(result, Err(SttError::ModelNotFound(_))));
    }

    #[test]
    fn engine_is_object_safe() {
        let engine: Box<dyn SttEngine> = Box::new(MockSttEngine::ok("ok", 1.0));
        assert!(engine.transcribe(&vec![0.0; MIN_AUDIO_SAMPLES]).is_ok());
    }
}
