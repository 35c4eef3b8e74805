//! Energy-based voice activity detection on 16 kHz mono audio.
//!
//! Audio is judged in 30 ms frames (480 samples); a frame is *voiced* when
//! its RMS exceeds the configured threshold.
//!
//! * [`EndpointDetector`] runs while listening and reports when speech has
//!   started and when it has ended (enough trailing silence after enough
//!   speech).
//! * [`trim_silence`] cuts leading and trailing silence from a finished
//!   utterance before it is transcribed, so the recognizer does not
//!   hallucinate text in quiet stretches.

use std::time::Duration;

use super::resample::RECOGNIZER_RATE;

/// 30 ms at 16 kHz.
pub const FRAME_SAMPLES: usize = 480;

/// Root-mean-square amplitude of `frame`.
pub fn rms(frame: &[f32]) -> f32 {
    if frame.is_empty() {
        return 0.0;
    }
    (frame.iter().map(|s| s * s).sum::<f32>() / frame.len() as f32).sqrt()
}

fn frames_for(duration: Duration) -> usize {
    let samples = duration.as_millis() as usize * RECOGNIZER_RATE as usize / 1000;
    samples.div_ceil(FRAME_SAMPLES).max(1)
}

// ---------------------------------------------------------------------------
// EndpointDetector
// ---------------------------------------------------------------------------

/// What the detector concluded after a chunk of audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VadEvent {
    /// Nothing new.
    Continue,
    /// Enough voiced audio has been seen to count as speech.
    SpeechStarted,
    /// Speech was followed by the configured trailing silence.
    EndOfUtterance,
}

/// Streaming end-of-utterance detector.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use voice_companion::audio::{EndpointDetector, VadEvent};
///
/// let mut vad = EndpointDetector::new(0.01, Duration::from_millis(90), Duration::from_millis(60));
/// assert_eq!(vad.push(&vec![0.5; 960]), VadEvent::SpeechStarted);
/// assert_eq!(vad.push(&vec![0.0; 1440]), VadEvent::EndOfUtterance);
/// ```
#[derive(Debug, Clone)]
pub struct EndpointDetector {
    threshold: f32,
    end_silence_frames: usize,
    min_speech_frames: usize,
    pending: Vec<f32>,
    speech_frames: usize,
    trailing_silence: usize,
    ended: bool,
}

impl EndpointDetector {
    /// `end_silence`: trailing quiet that ends an utterance.
    /// `min_speech`: voiced audio needed before an utterance counts.
    pub fn new(threshold: f32, end_silence: Duration, min_speech: Duration) -> Self {
        Self {
            threshold,
            end_silence_frames: frames_for(end_silence),
            min_speech_frames: frames_for(min_speech),
            pending: Vec::with_capacity(FRAME_SAMPLES),
            speech_frames: 0,
            trailing_silence: 0,
            ended: false,
        }
    }

    /// Feed 16 kHz mono samples.  Each event is reported once; after
    /// `EndOfUtterance` the detector stays ended.
    pub fn push(&mut self, samples: &[f32]) -> VadEvent {
        let mut event = VadEvent::Continue;
        if self.ended {
            return event;
        }

        self.pending.extend_from_slice(samples);
        let whole = self.pending.len() / FRAME_SAMPLES * FRAME_SAMPLES;
        let frames: Vec<bool> = self.pending[..whole]
            .chunks_exact(FRAME_SAMPLES)
            .map(|f| rms(f) > self.threshold)
            .collect();
        self.pending.drain(..whole);

        for voiced in frames {
            if voiced {
                self.speech_frames += 1;
                self.trailing_silence = 0;
                if self.speech_frames == self.min_speech_frames {
                    event = VadEvent::SpeechStarted;
                }
            } else if self.has_speech() {
                self.trailing_silence += 1;
                if self.trailing_silence >= self.end_silence_frames {
                    self.ended = true;
                    return VadEvent::EndOfUtterance;
                }
            }
        }
        event
    }

    /// `true` once at least the minimum amount of speech has been heard.
    pub fn has_speech(&self) -> bool {
        self.speech_frames >= self.min_speech_frames
    }
}

// ---------------------------------------------------------------------------
// trim_silence
// ---------------------------------------------------------------------------

/// Sub-slice of `audio` from the first to the last voiced frame.
/// Entirely silent input gives an empty slice.
pub fn trim_silence(audio: &[f32], threshold: f32) -> &[f32] {
    let voiced = |i: &usize| {
        let start = i * FRAME_SAMPLES;
        let end = (start + FRAME_SAMPLES).min(audio.len());
        rms(&audio[start..end]) > threshold
    };
    let total = audio.len().div_ceil(FRAME_SAMPLES);

    let Some(first) = (0..total).find(voiced) else {
        return &audio[..0];
    };
    let last = (0..total).rfind(voiced).unwrap_or(first);
    &audio[first * FRAME_SAMPLES..((last + 1) * FRAME_SAMPLES).min(audio.len())]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn signal(silent_pre: usize, voice: usize, silent_post: usize) -> Vec<f32> {
        let mut v = vec![0.0_f32; silent_pre];
        v.extend(vec![0.5_f32; voice]);
        v.extend(vec![0.0_f32; silent_post]);
        v
    }

    #[test]
    fn trims_leading_and_trailing_silence() {
        assert_eq!(trim_silence(&signal(480, 480, 480), 0.01).len(), 480);
    }

    #[test]
    fn all_silence_trims_to_empty() {
        assert!(trim_silence(&vec![0.0; 1440], 0.01).is_empty());
        assert!(trim_silence(&[], 0.01).is_empty());
    }

    #[test]
    fn end_of_utterance_after_trailing_silence() {
        // 300 ms speech, 1.2 s end silence: 10 speech frames, 40 silent.
        let mut vad = EndpointDetector::new(0.015, ms(1200), ms(300));
        assert_eq!(vad.push(&vec![0.3; 4800]), VadEvent::SpeechStarted);
        assert!(vad.has_speech());

        // 1.17 s of silence is not enough.
        assert_eq!(vad.push(&vec![0.0; 480 * 39]), VadEvent::Continue);
        assert_eq!(vad.push(&vec![0.0; 480]), VadEvent::EndOfUtterance);
        // Reported once.
        assert_eq!(vad.push(&vec![0.0; 4800]), VadEvent::Continue);
    }

    #[test]
    fn silence_without_speech_never_ends() {
        let mut vad = EndpointDetector::new(0.015, ms(90), ms(60));
        assert_eq!(vad.push(&vec![0.0; 16_000]), VadEvent::Continue);
        assert!(!vad.has_speech());
    }

    #[test]
    fn short_blip_is_not_speech() {
        let mut vad = EndpointDetector::new(0.015, ms(90), ms(300));
        vad.push(&vec![0.5; 480]);
        assert_eq!(vad.push(&vec![0.0; 4800]), VadEvent::Continue);
        assert!(!vad.has_speech());
    }

    #[test]
    fn renewed_speech_resets_silence_count() {
        let mut vad = EndpointDetector::new(0.015, ms(90), ms(30));
        vad.push(&vec![0.5; 480]);
        assert_eq!(vad.push(&vec![0.0; 960]), VadEvent::Continue);
        vad.push(&vec![0.5; 480]);
        assert_eq!(vad.push(&vec![0.0; 960]), VadEvent::Continue);
        assert_eq!(vad.push(&vec![0.0; 480]), VadEvent::EndOfUtterance);
    }

    #[test]
    fn partial_frames_are_buffered() {
        let mut vad = EndpointDetector::new(0.015, ms(30), ms(30));
        // 240 + 240 samples form one voiced frame.
        assert_eq!(vad.push(&vec![0.5; 240]), VadEvent::Continue);
        assert_eq!(vad.push(&vec![0.5; 240]), VadEvent::SpeechStarted);
    }
}
