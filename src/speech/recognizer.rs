//! Microphone listening sessions turned into transcripts.
//!
//! Each [`SpeechRecognizer::start_listening`] opens one **utterance** with a
//! fresh id and runs it on a dedicated worker thread:
//!
//! ```text
//! warm-up → open AudioSource → collect 16 kHz audio ─┬─ interim transcripts (Continuous)
//!                                                     └─ until stop / end of speech / timeout
//!         → trim silence → transcribe → SpeechEvent::Final
//! ```
//!
//! Events go to the controller over a tokio channel.  A worker only ever
//! reports on its own utterance; starting a new one aborts the old.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::RecvTimeoutError;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;

use crate::audio::{
    to_recognizer_rate, trim_silence, AudioSource, EndpointDetector, LevelMeter, VadEvent,
    WaveformData, DEFAULT_BARS, RECOGNIZER_RATE,
};
use crate::config::RecognitionConfig;
use crate::speech::profile::RecognitionProfile;
use crate::stt::{SttEngine, MIN_AUDIO_SAMPLES};

const POLL: Duration = Duration::from_millis(50);
const LEVEL_INTERVAL: Duration = Duration::from_millis(100);

// ---------------------------------------------------------------------------
// Events and errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error, PartialEq)]
pub enum RecognitionError {
    /// The microphone is missing or refused to open.  Clears the transcript.
    #[error("microphone unavailable: {0}")]
    PermissionDenied(String),

    /// Listening ended without any speech.  The transcript is kept.
    #[error("no speech detected")]
    NoSpeech,

    /// The recognizer failed on captured audio.  Clears the transcript.
    #[error("speech recognition failed: {0}")]
    Service(String),

    /// Listening was cancelled.  The transcript is kept.
    #[error("listening aborted")]
    Aborted,
}

impl RecognitionError {
    /// Whether the user should be told about it.
    pub fn is_benign(&self) -> bool {
        matches!(self, Self::NoSpeech | Self::Aborted)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SpeechEvent {
    ListeningChanged(bool),
    Interim { utterance: u64, text: String },
    Final { utterance: u64, text: String, confidence: f32 },
    /// Microphone level while listening.
    Level(WaveformData),
    Error { utterance: u64, error: RecognitionError },
}

/// Point-in-time view of the recognizer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecognizerSnapshot {
    pub utterance: u64,
    pub transcript: String,
    pub listening: bool,
    pub confidence: Option<f32>,
}

// ---------------------------------------------------------------------------
// SpeechInput trait
// ---------------------------------------------------------------------------

/// What the conversation controller needs from speech capture.
pub trait SpeechInput: Send + Sync {
    /// Begin a new utterance and return its id.
    fn start_listening(&self) -> u64;
    /// Stop capturing; the utterance then produces its final transcript.
    fn stop_listening(&self);
    /// Stop capturing without a final transcript.
    fn abort(&self);
    fn reset_transcript(&self);
}

// ---------------------------------------------------------------------------
// SpeechRecognizer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct Endpointing {
    threshold: f32,
    end_silence: Duration,
    min_speech: Duration,
}

struct Control {
    stop: AtomicBool,
    abort: AtomicBool,
    /// True from spawn until the microphone is released.
    capturing: AtomicBool,
}

impl Control {
    fn new() -> Self {
        Self {
            stop: AtomicBool::new(false),
            abort: AtomicBool::new(false),
            capturing: AtomicBool::new(true),
        }
    }

    /// False as soon as a stop or abort is requested, before the worker notices.
    fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
            && !self.stop.load(Ordering::SeqCst)
            && !self.abort.load(Ordering::SeqCst)
    }
}

struct Active {
    utterance: u64,
    control: Arc<Control>,
    worker: JoinHandle<()>,
}

pub struct SpeechRecognizer {
    engine: Arc<dyn SttEngine>,
    source: Arc<dyn AudioSource>,
    profile: RecognitionProfile,
    endpointing: Endpointing,
    events: UnboundedSender<SpeechEvent>,
    snapshot: Arc<Mutex<RecognizerSnapshot>>,
    next_utterance: AtomicU64,
    active: Mutex<Option<Active>>,
}

impl SpeechRecognizer {
    pub fn new(
        engine: Arc<dyn SttEngine>,
        source: Arc<dyn AudioSource>,
        profile: RecognitionProfile,
        config: &RecognitionConfig,
        events: UnboundedSender<SpeechEvent>,
    ) -> Self {
        Self {
            engine,
            source,
            profile,
            endpointing: Endpointing {
                threshold: config.speech_threshold,
                end_silence: Duration::from_millis(config.end_silence_ms),
                min_speech: Duration::from_millis(config.min_speech_ms),
            },
            events,
            snapshot: Arc::new(Mutex::new(RecognizerSnapshot::default())),
            next_utterance: AtomicU64::new(1),
            active: Mutex::new(None),
        }
    }

    pub fn profile(&self) -> &RecognitionProfile {
        &self.profile
    }

    pub fn snapshot(&self) -> RecognizerSnapshot {
        lock(&self.snapshot).clone()
    }
}

impl SpeechInput for SpeechRecognizer {
    fn start_listening(&self) -> u64 {
        let mut active = lock(&self.active);
        if let Some(current) = active.as_ref() {
            if current.control.is_capturing() && !current.worker.is_finished() {
                return current.utterance;
            }
            current.control.abort.store(true, Ordering::SeqCst);
        }

        let utterance = self.next_utterance.fetch_add(1, Ordering::SeqCst);
        *lock(&self.snapshot) = RecognizerSnapshot {
            utterance,
            ..RecognizerSnapshot::default()
        };

        let control = Arc::new(Control::new());
        let worker = Worker {
            utterance,
            engine: Arc::clone(&self.engine),
            source: Arc::clone(&self.source),
            profile: self.profile,
            endpointing: self.endpointing,
            events: self.events.clone(),
            snapshot: Arc::clone(&self.snapshot),
            control: Arc::clone(&control),
        };
        let handle = std::thread::Builder::new()
            .name(format!("utterance-{utterance}"))
            .spawn(move || worker.run());

        match handle {
            Ok(worker) => {
                log::debug!("speech: utterance {utterance} started");
                *active = Some(Active {
                    utterance,
                    control,
                    worker,
                });
            }
            Err(e) => {
                log::error!("speech: cannot spawn capture thread: {e}");
                let _ = self.events.send(SpeechEvent::Error {
                    utterance,
                    error: RecognitionError::Service(e.to_string()),
                });
                *active = None;
            }
        }
        utterance
    }

    fn stop_listening(&self) {
        if let Some(a) = lock(&self.active).as_ref() {
            a.control.stop.store(true, Ordering::SeqCst);
        }
    }

    fn abort(&self) {
        if let Some(a) = lock(&self.active).as_ref() {
            a.control.abort.store(true, Ordering::SeqCst);
        }
    }

    fn reset_transcript(&self) {
        let mut snap = lock(&self.snapshot);
        snap.transcript.clear();
        snap.confidence = None;
    }
}

impl Drop for SpeechRecognizer {
    fn drop(&mut self) {
        if let Some(a) = lock(&self.active).take() {
            a.control.abort.store(true, Ordering::SeqCst);
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

/// Why capture ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ending {
    Stopped,
    EndOfSpeech,
    TimedOut,
    InputClosed,
    Aborted,
}

struct Worker {
    utterance: u64,
    engine: Arc<dyn SttEngine>,
    source: Arc<dyn AudioSource>,
    profile: RecognitionProfile,
    endpointing: Endpointing,
    events: UnboundedSender<SpeechEvent>,
    snapshot: Arc<Mutex<RecognizerSnapshot>>,
    control: Arc<Control>,
}

impl Worker {
    fn aborted(&self) -> bool {
        self.control.abort.load(Ordering::SeqCst)
    }

    fn emit(&self, event: SpeechEvent) {
        let _ = self.events.send(event);
    }

    fn fail(&self, error: RecognitionError) {
        self.emit(SpeechEvent::Error {
            utterance: self.utterance,
            error,
        });
    }

    fn is_current(&self) -> bool {
        lock(&self.snapshot).utterance == self.utterance
    }

    /// Apply `f` to the snapshot if it still belongs to this utterance.
    fn update(&self, f: impl FnOnce(&mut RecognizerSnapshot)) {
        let mut snap = lock(&self.snapshot);
        if snap.utterance == self.utterance {
            f(&mut snap);
        }
    }

    fn run(self) {
        self.listen();
        self.control.capturing.store(false, Ordering::SeqCst);
    }

    fn listen(&self) {
        // Warm-up, still cancellable.
        let warm_until = Instant::now() + self.profile.warmup_delay;
        while Instant::now() < warm_until {
            if self.aborted() {
                self.fail(RecognitionError::Aborted);
                return;
            }
            std::thread::sleep(POLL.min(warm_until.saturating_duration_since(Instant::now())));
        }

        let capture = match self.source.open() {
            Ok(capture) => capture,
            Err(e) => {
                log::warn!("speech: microphone unavailable: {e}");
                self.update(|s| {
                    s.transcript.clear();
                    s.confidence = None;
                });
                self.fail(RecognitionError::PermissionDenied(e.to_string()));
                return;
            }
        };

        self.update(|s| s.listening = true);
        if self.is_current() {
            self.emit(SpeechEvent::ListeningChanged(true));
        }

        let mut vad = EndpointDetector::new(
            self.endpointing.threshold,
            self.endpointing.end_silence,
            self.endpointing.min_speech,
        );
        let mut meter = LevelMeter::new(RECOGNIZER_RATE as usize);
        let mut audio: Vec<f32> = Vec::new();
        let started = Instant::now();
        let mut last_level = Instant::now();
        let mut last_interim = Instant::now();

        let ending = loop {
            match capture.chunks.recv_timeout(POLL) {
                Ok(chunk) => {
                    let mono = to_recognizer_rate(&chunk.samples, chunk.sample_rate, chunk.channels);
                    meter.push(&mono);
                    audio.extend_from_slice(&mono);
                    if vad.push(&mono) == VadEvent::EndOfUtterance {
                        break Ending::EndOfSpeech;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break Ending::InputClosed,
            }

            if self.aborted() {
                break Ending::Aborted;
            }
            if self.control.stop.load(Ordering::SeqCst) {
                break Ending::Stopped;
            }
            if started.elapsed() >= self.profile.forced_timeout {
                break Ending::TimedOut;
            }

            if last_level.elapsed() >= LEVEL_INTERVAL {
                last_level = Instant::now();
                self.emit(SpeechEvent::Level(meter.waveform(DEFAULT_BARS)));
            }

            if let Some(interval) = self.profile.interim_interval {
                if vad.has_speech() && last_interim.elapsed() >= interval {
                    last_interim = Instant::now();
                    self.interim(&audio);
                }
            }
        };
        drop(capture);
        self.control.capturing.store(false, Ordering::SeqCst);

        log::debug!(
            "speech: utterance {} ended ({ending:?}) after {:.1}s",
            self.utterance,
            started.elapsed().as_secs_f32()
        );
        self.update(|s| s.listening = false);
        // A superseded utterance must not flip the listening flag of its successor.
        if self.is_current() {
            self.emit(SpeechEvent::ListeningChanged(false));
            self.emit(SpeechEvent::Level(WaveformData::compute(&[], DEFAULT_BARS)));
        }

        if ending == Ending::Aborted {
            self.fail(RecognitionError::Aborted);
            return;
        }
        self.finish(&audio, vad.has_speech());
    }

    fn interim(&self, audio: &[f32]) {
        let speech = trim_silence(audio, self.endpointing.threshold);
        if speech.len() < MIN_AUDIO_SAMPLES {
            return;
        }
        match self.engine.transcribe(speech) {
            Ok(heard) if !heard.is_empty() && !self.aborted() => {
                self.update(|s| s.transcript = heard.text.clone());
                self.emit(SpeechEvent::Interim {
                    utterance: self.utterance,
                    text: heard.text,
                });
            }
            Ok(_) => {}
            Err(e) => log::debug!("speech: interim transcription skipped: {e}"),
        }
    }

    fn finish(&self, audio: &[f32], heard_speech: bool) {
        let speech = trim_silence(audio, self.endpointing.threshold);
        if !heard_speech || speech.len() < MIN_AUDIO_SAMPLES {
            self.fail(RecognitionError::NoSpeech);
            return;
        }

        match self.engine.transcribe(speech) {
            _ if self.aborted() => self.fail(RecognitionError::Aborted),
            Ok(heard) if heard.is_empty() => self.fail(RecognitionError::NoSpeech),
            Ok(heard) => {
                self.update(|s| {
                    s.transcript = heard.text.clone();
                    s.confidence = Some(heard.confidence);
                });
                log::info!(
                    "speech: \"{}\" (confidence {:.2})",
                    heard.text,
                    heard.confidence
                );
                self.emit(SpeechEvent::Final {
                    utterance: self.utterance,
                    text: heard.text,
                    confidence: heard.confidence,
                });
            }
            Err(e) => {
                log::error!("speech: recognition failed: {e}");
                self.update(|s| {
                    s.transcript.clear();
                    s.confidence = None;
                });
                self.fail(RecognitionError::Service(e.to_string()));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{AudioChunk, CaptureError, OpenCapture};
    use crate::speech::profile::ProfileKind;
    use crate::stt::{MockSttEngine, Recognition, SttError};
    use std::sync::mpsc;
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

    /// Replays fixed chunks, then either closes the input or keeps it open.
    struct ScriptedSource {
        chunks: Vec<AudioChunk>,
        keep_open: bool,
        fail: bool,
        held: Mutex<Vec<mpsc::Sender<AudioChunk>>>,
    }

    impl ScriptedSource {
        fn new(chunks: Vec<AudioChunk>) -> Self {
            Self {
                chunks,
                keep_open: false,
                fail: false,
                held: Mutex::new(Vec::new()),
            }
        }

        fn open_ended(mut self) -> Self {
            self.keep_open = true;
            self
        }

        fn broken() -> Self {
            Self {
                fail: true,
                ..Self::new(Vec::new())
            }
        }
    }

    impl AudioSource for ScriptedSource {
        fn open(&self) -> Result<OpenCapture, CaptureError> {
            if self.fail {
                return Err(CaptureError::NoDevice);
            }
            let (tx, rx) = mpsc::channel();
            for chunk in &self.chunks {
                tx.send(chunk.clone()).unwrap();
            }
            if self.keep_open {
                self.held.lock().unwrap().push(tx);
            }
            Ok(OpenCapture {
                chunks: rx,
                guard: Box::new(()),
            })
        }
    }

    fn chunk(level: f32, millis: usize) -> AudioChunk {
        AudioChunk {
            samples: vec![level; 16 * millis],
            sample_rate: 16_000,
            channels: 1,
        }
    }

    /// 600 ms of speech followed by `silence_ms` of quiet.
    fn utterance_audio(silence_ms: usize) -> Vec<AudioChunk> {
        let mut chunks: Vec<_> = (0..6).map(|_| chunk(0.3, 100)).collect();
        chunks.extend((0..silence_ms / 100).map(|_| chunk(0.0, 100)));
        chunks
    }

    fn quick_profile(kind: ProfileKind) -> RecognitionProfile {
        RecognitionProfile {
            kind,
            interim_interval: match kind {
                ProfileKind::Continuous => Some(Duration::ZERO),
                ProfileKind::FinalOnly => None,
            },
            warmup_delay: Duration::ZERO,
            forced_timeout: Duration::from_secs(5),
        }
    }

    fn recognizer(
        engine: Arc<MockSttEngine>,
        source: ScriptedSource,
        profile: RecognitionProfile,
    ) -> (SpeechRecognizer, UnboundedReceiver<SpeechEvent>) {
        let (tx, rx) = unbounded_channel();
        let r = SpeechRecognizer::new(
            engine,
            Arc::new(source),
            profile,
            &RecognitionConfig::default(),
            tx,
        );
        (r, rx)
    }

    /// Collect events until the utterance reports its outcome.
    async fn outcome(rx: &mut UnboundedReceiver<SpeechEvent>) -> Vec<SpeechEvent> {
        let mut seen = Vec::new();
        loop {
            let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .expect("recognizer went quiet")
                .expect("channel closed");
            let done = matches!(event, SpeechEvent::Final { .. } | SpeechEvent::Error { .. });
            if !matches!(event, SpeechEvent::Level(_)) {
                seen.push(event);
            }
            if done {
                return seen;
            }
        }
    }

    #[tokio::test]
    async fn end_of_speech_produces_one_final() {
        let engine = Arc::new(MockSttEngine::ok("share a verse", 0.82));
        let (r, mut rx) = recognizer(
            Arc::clone(&engine),
            ScriptedSource::new(utterance_audio(1_500)).open_ended(),
            quick_profile(ProfileKind::FinalOnly),
        );

        let id = r.start_listening();
        let events = outcome(&mut rx).await;

        assert_eq!(events[0], SpeechEvent::ListeningChanged(true));
        assert_eq!(events[1], SpeechEvent::ListeningChanged(false));
        assert_eq!(
            events[2],
            SpeechEvent::Final {
                utterance: id,
                text: "share a verse".into(),
                confidence: 0.82,
            }
        );
        assert_eq!(engine.calls(), 1);

        let snap = r.snapshot();
        assert_eq!(snap.transcript, "share a verse");
        assert_eq!(snap.confidence, Some(0.82));
        assert!(!snap.listening);
    }

    #[tokio::test]
    async fn continuous_profile_emits_interim_before_final() {
        let engine = Arc::new(MockSttEngine::sequence(vec![
            Ok(Recognition {
                text: "share".into(),
                confidence: 0.4,
            }),
            Ok(Recognition {
                text: "share a verse".into(),
                confidence: 0.9,
            }),
        ]));
        let (r, mut rx) = recognizer(
            Arc::clone(&engine),
            ScriptedSource::new(utterance_audio(1_500)).open_ended(),
            quick_profile(ProfileKind::Continuous),
        );

        let id = r.start_listening();
        let events = outcome(&mut rx).await;

        assert!(events.iter().any(|e| matches!(
            e,
            SpeechEvent::Interim { utterance, text } if *utterance == id && text == "share"
        )));
        assert!(matches!(
            events.last(),
            Some(SpeechEvent::Final { text, .. }) if text == "share a verse"
        ));
        let finals = events
            .iter()
            .filter(|e| matches!(e, SpeechEvent::Final { .. }))
            .count();
        assert_eq!(finals, 1);
    }

    #[tokio::test]
    async fn stop_listening_finalizes() {
        // Speech with no trailing silence; the input stays open.
        let engine = Arc::new(MockSttEngine::ok("amen", 0.7));
        let (r, mut rx) = recognizer(
            Arc::clone(&engine),
            ScriptedSource::new(utterance_audio(0)).open_ended(),
            quick_profile(ProfileKind::FinalOnly),
        );

        r.start_listening();
        assert_eq!(rx.recv().await, Some(SpeechEvent::ListeningChanged(true)));
        tokio::time::sleep(Duration::from_millis(150)).await;
        r.stop_listening();

        let events = outcome(&mut rx).await;
        assert!(matches!(events.last(), Some(SpeechEvent::Final { text, .. }) if text == "amen"));
    }

    #[tokio::test]
    async fn forced_timeout_ends_listening() {
        let engine = Arc::new(MockSttEngine::ok("still talking", 0.6));
        let mut profile = quick_profile(ProfileKind::FinalOnly);
        profile.forced_timeout = Duration::from_millis(200);
        let (r, mut rx) = recognizer(
            Arc::clone(&engine),
            ScriptedSource::new(utterance_audio(0)).open_ended(),
            profile,
        );

        r.start_listening();
        let events = outcome(&mut rx).await;
        assert!(matches!(events.last(), Some(SpeechEvent::Final { .. })));
        assert!(!r.snapshot().listening);
    }

    #[tokio::test]
    async fn silence_reports_no_speech_and_keeps_transcript() {
        let engine = Arc::new(MockSttEngine::ok("unused", 0.5));
        let (r, mut rx) = recognizer(
            Arc::clone(&engine),
            ScriptedSource::new(vec![chunk(0.0, 500)]),
            quick_profile(ProfileKind::FinalOnly),
        );

        let id = r.start_listening();
        let events = outcome(&mut rx).await;
        assert_eq!(
            events.last(),
            Some(&SpeechEvent::Error {
                utterance: id,
                error: RecognitionError::NoSpeech
            })
        );
        assert_eq!(engine.calls(), 0);
    }

    #[tokio::test]
    async fn missing_microphone_is_permission_denied() {
        let engine = Arc::new(MockSttEngine::ok("unused", 0.5));
        let (r, mut rx) = recognizer(
            engine,
            ScriptedSource::broken(),
            quick_profile(ProfileKind::FinalOnly),
        );

        let id = r.start_listening();
        let events = outcome(&mut rx).await;
        assert!(matches!(
            events.as_slice(),
            [SpeechEvent::Error { utterance, error: RecognitionError::PermissionDenied(_) }] if *utterance == id
        ));
        assert_eq!(r.snapshot().transcript, "");
    }

    #[tokio::test]
    async fn engine_failure_is_service_error_and_clears_transcript() {
        let engine = Arc::new(MockSttEngine::err(SttError::Transcription("boom".into())));
        let (r, mut rx) = recognizer(
            engine,
            ScriptedSource::new(utterance_audio(1_500)),
            quick_profile(ProfileKind::FinalOnly),
        );

        r.start_listening();
        let events = outcome(&mut rx).await;
        assert!(matches!(
            events.last(),
            Some(SpeechEvent::Error {
                error: RecognitionError::Service(_),
                ..
            })
        ));
        assert_eq!(r.snapshot().transcript, "");
        assert_eq!(r.snapshot().confidence, None);
    }

    #[tokio::test]
    async fn abort_skips_final() {
        let engine = Arc::new(MockSttEngine::ok("never", 0.5));
        let (r, mut rx) = recognizer(
            Arc::clone(&engine),
            ScriptedSource::new(utterance_audio(0)).open_ended(),
            quick_profile(ProfileKind::FinalOnly),
        );

        r.start_listening();
        assert_eq!(rx.recv().await, Some(SpeechEvent::ListeningChanged(true)));
        r.abort();
        let events = outcome(&mut rx).await;
        assert!(matches!(
            events.last(),
            Some(SpeechEvent::Error {
                error: RecognitionError::Aborted,
                ..
            })
        ));
        assert_eq!(engine.calls(), 0);
    }

    #[tokio::test]
    async fn start_after_abort_begins_a_new_utterance() {
        let engine = Arc::new(MockSttEngine::ok("never", 0.5));
        let mut profile = quick_profile(ProfileKind::FinalOnly);
        profile.warmup_delay = Duration::from_millis(300);
        let (r, mut rx) = recognizer(
            Arc::clone(&engine),
            ScriptedSource::new(utterance_audio(0)).open_ended(),
            profile,
        );

        // Abort lands while the worker is still warming up.
        let first = r.start_listening();
        r.abort();
        let second = r.start_listening();
        assert!(second > first);

        let events = outcome(&mut rx).await;
        assert!(matches!(
            events.last(),
            Some(SpeechEvent::Error {
                utterance,
                error: RecognitionError::Aborted,
            }) if *utterance == first
        ));
        r.abort();
    }

    #[tokio::test]
    async fn utterance_ids_increase() {
        let engine = Arc::new(MockSttEngine::ok("hello", 0.9));
        let (r, mut rx) = recognizer(
            engine,
            ScriptedSource::new(utterance_audio(1_500)),
            quick_profile(ProfileKind::FinalOnly),
        );

        let first = r.start_listening();
        outcome(&mut rx).await;
        let second = r.start_listening();
        assert!(second > first);
        assert!(matches!(
            outcome(&mut rx).await.last(),
            Some(SpeechEvent::Final { utterance, .. }) if *utterance == second
        ));
    }

    #[tokio::test]
    async fn reset_transcript_clears_text() {
        let engine = Arc::new(MockSttEngine::ok("hello", 0.9));
        let (r, mut rx) = recognizer(
            engine,
            ScriptedSource::new(utterance_audio(1_500)),
            quick_profile(ProfileKind::FinalOnly),
        );
        r.start_listening();
        outcome(&mut rx).await;
        assert_eq!(r.snapshot().transcript, "hello");

        r.reset_transcript();
        assert_eq!(r.snapshot().transcript, "");
        assert_eq!(r.snapshot().confidence, None);
    }

    #[test]
    fn benign_errors() {
        assert!(RecognitionError::NoSpeech.is_benign());
        assert!(RecognitionError::Aborted.is_benign());
        assert!(!RecognitionError::PermissionDenied("x".into()).is_benign());
        assert!(!RecognitionError::Service("x".into()).is_benign());
    }
}
