//! Audio in and out.
//!
//! ```text
//! capture:  microphone → cpal callback → AudioChunk (mpsc) → to_recognizer_rate
//!           → EndpointDetector / LevelMeter → recognizer buffer
//! playback: MP3/WAV bytes → decode → resample_hq → cpal output stream
//! ```

pub mod capture;
pub mod playback;
pub mod resample;
pub mod vad;
pub mod waveform;

pub use capture::{
    AudioCapture, AudioChunk, AudioSource, CaptureError, MicrophoneSource,
    OpenCapture, StreamHandle,
};
pub use playback::{
    decode, sniff_format, AudioFormat, AudioPlayer, CpalPlayer, DecodedAudio, PlaybackError,
    PlaybackGate, PlaybackOutcome, PlaybackTicket,
};
pub use resample::{downmix, resample_hq, resample_linear, to_recognizer_rate, RECOGNIZER_RATE};
pub use vad::{trim_silence, EndpointDetector, VadEvent};
pub use waveform::{LevelMeter, WaveformData, DEFAULT_BARS};
