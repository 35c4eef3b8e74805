//! Playback of synthesized speech on the default output device.
//!
//! Encoded bytes are sniffed (MP3 or WAV), decoded to mono `f32` with
//! minimp3 / hound, resampled to the device rate and written to a cpal
//! output stream.  [`AudioPlayer::play`] blocks until playback ends, so the
//! controller runs it on `spawn_blocking`.

use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SizedSample};
use thiserror::Error;

use super::resample::{downmix, resample_hq};

/// Playback that has not started within this window is abandoned.
pub const START_TIMEOUT: Duration = Duration::from_secs(5);

const POLL: Duration = Duration::from_millis(20);

// ---------------------------------------------------------------------------
// Errors and outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("unsupported audio format")]
    UnsupportedFormat,

    /// No output device, or the device refused the stream.
    #[error("audio output unavailable: {0}")]
    OutputUnavailable(String),

    #[error("failed to decode audio: {0}")]
    Decode(String),

    #[error("playback did not start within {}s", START_TIMEOUT.as_secs())]
    Timeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    /// Played to the end.
    Finished,
    /// Cut short by [`AudioPlayer::stop`] or a newer playback.
    Stopped,
}

// ---------------------------------------------------------------------------
// Format sniffing and decoding
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Mp3,
    Wav,
}

/// Identify the container from the first bytes.
pub fn sniff_format(bytes: &[u8]) -> Result<AudioFormat, PlaybackError> {
    match bytes {
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'A', b'V', b'E', ..] => Ok(AudioFormat::Wav),
        [b'I', b'D', b'3', ..] => Ok(AudioFormat::Mp3),
        [0xFF, b, ..] if b & 0xE0 == 0xE0 => Ok(AudioFormat::Mp3),
        _ => Err(PlaybackError::UnsupportedFormat),
    }
}

/// Mono samples at their native rate.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl DecodedAudio {
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }
}

pub fn decode(bytes: &[u8]) -> Result<DecodedAudio, PlaybackError> {
    match sniff_format(bytes)? {
        AudioFormat::Mp3 => decode_mp3(bytes),
        AudioFormat::Wav => decode_wav(bytes),
    }
}

fn decode_mp3(bytes: &[u8]) -> Result<DecodedAudio, PlaybackError> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(bytes));
    let mut samples = Vec::new();
    let mut sample_rate = 0u32;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                sample_rate = frame.sample_rate as u32;
                let pcm: Vec<f32> = frame.data.iter().map(|&s| f32::from(s) / 32768.0).collect();
                samples.extend(downmix(&pcm, frame.channels as u16));
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(PlaybackError::Decode(e.to_string())),
        }
    }

    if samples.is_empty() || sample_rate == 0 {
        return Err(PlaybackError::Decode("no MP3 frames".into()));
    }
    Ok(DecodedAudio {
        samples,
        sample_rate,
    })
}

fn decode_wav(bytes: &[u8]) -> Result<DecodedAudio, PlaybackError> {
    let reader =
        hound::WavReader::new(Cursor::new(bytes)).map_err(|e| PlaybackError::Decode(e.to_string()))?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| PlaybackError::Decode(e.to_string()))?,
        hound::SampleFormat::Int => {
            let scale = (1_i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()
                .map_err(|e| PlaybackError::Decode(e.to_string()))?
        }
    };

    Ok(DecodedAudio {
        samples: downmix(&interleaved, spec.channels),
        sample_rate: spec.sample_rate,
    })
}

// ---------------------------------------------------------------------------
// AudioPlayer trait
// ---------------------------------------------------------------------------

/// Issued by [`AudioPlayer::schedule`] before a clip is handed to a
/// blocking thread.  Records how many stops had been requested at that point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackTicket(u64);

/// Plays one clip at a time.
pub trait AudioPlayer: Send + Sync {
    /// Reserve the next clip.  A [`stop`](Self::stop) issued after this call
    /// cancels the clip even if [`play`](Self::play) has not started yet.
    fn schedule(&self) -> PlaybackTicket;

    /// Blocks until the clip ends or is stopped.  Starting a clip stops the
    /// one in flight.
    fn play(&self, ticket: PlaybackTicket, audio: &[u8])
        -> Result<PlaybackOutcome, PlaybackError>;

    /// Stop the current clip and any clip scheduled before this call.
    fn stop(&self);
}

// ---------------------------------------------------------------------------
// PlaybackGate
// ---------------------------------------------------------------------------

/// Stop bookkeeping shared by players.
///
/// Every `stop` bumps a counter under the same lock that `begin` takes, so a
/// clip whose ticket predates a stop never starts.
#[derive(Default)]
pub struct PlaybackGate {
    stops: AtomicU64,
    active: Mutex<Option<Arc<AtomicBool>>>,
}

impl PlaybackGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&self) -> PlaybackTicket {
        let _active = self.lock();
        PlaybackTicket(self.stops.load(Ordering::SeqCst))
    }

    /// Register the clip about to start and stop the previous one.  `None`
    /// when a stop arrived after `ticket` was issued.
    pub fn begin(&self, ticket: PlaybackTicket) -> Option<Arc<AtomicBool>> {
        let mut active = self.lock();
        if self.stops.load(Ordering::SeqCst) != ticket.0 {
            return None;
        }
        let flag = Arc::new(AtomicBool::new(false));
        if let Some(previous) = active.replace(Arc::clone(&flag)) {
            previous.store(true, Ordering::SeqCst);
        }
        Some(flag)
    }

    /// Forget `flag` unless a newer clip has already replaced it.
    pub fn finish(&self, flag: &Arc<AtomicBool>) {
        let mut active = self.lock();
        if active.as_ref().is_some_and(|a| Arc::ptr_eq(a, flag)) {
            *active = None;
        }
    }

    pub fn stop(&self) {
        let active = self.lock();
        self.stops.fetch_add(1, Ordering::SeqCst);
        if let Some(flag) = active.as_ref() {
            flag.store(true, Ordering::SeqCst);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Arc<AtomicBool>>> {
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }
}

// ---------------------------------------------------------------------------
// CpalPlayer
// ---------------------------------------------------------------------------

/// Default-output-device player.
#[derive(Default)]
pub struct CpalPlayer {
    gate: PlaybackGate,
}

impl CpalPlayer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AudioPlayer for CpalPlayer {
    fn schedule(&self) -> PlaybackTicket {
        self.gate.schedule()
    }

    fn play(
        &self,
        ticket: PlaybackTicket,
        audio: &[u8],
    ) -> Result<PlaybackOutcome, PlaybackError> {
        let Some(stop) = self.gate.begin(ticket) else {
            log::debug!("playback: stopped before start");
            return Ok(PlaybackOutcome::Stopped);
        };
        let result = play_on_default_output(audio, &stop);
        self.gate.finish(&stop);
        result
    }

    fn stop(&self) {
        self.gate.stop();
    }
}

fn play_on_default_output(audio: &[u8], stop: &AtomicBool) -> Result<PlaybackOutcome, PlaybackError> {
    let decoded = decode(audio)?;

    let device = cpal::default_host()
        .default_output_device()
        .ok_or_else(|| PlaybackError::OutputUnavailable("no output device".into()))?;
    let supported = device
        .default_output_config()
        .map_err(|e| PlaybackError::OutputUnavailable(e.to_string()))?;
    let device_rate = supported.sample_rate().0;
    let format = supported.sample_format();
    let config: cpal::StreamConfig = supported.into();

    let samples = resample_hq(&decoded.samples, decoded.sample_rate, device_rate)
        .map_err(|e| PlaybackError::Decode(e.to_string()))?;
    let total = samples.len();
    let cursor = PlayHead::new(samples);

    let stream = match format {
        cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, cursor.clone()),
        cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, cursor.clone()),
        cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config, cursor.clone()),
        other => Err(PlaybackError::OutputUnavailable(format!(
            "unsupported sample format {other:?}"
        ))),
    }?;
    stream
        .play()
        .map_err(|e| PlaybackError::OutputUnavailable(e.to_string()))?;

    log::debug!(
        "playback: {:.1}s @ {device_rate} Hz",
        decoded.duration().as_secs_f32()
    );

    let started_at = Instant::now();
    let deadline = decoded.duration() + START_TIMEOUT;
    loop {
        if stop.load(Ordering::SeqCst) {
            return Ok(PlaybackOutcome::Stopped);
        }
        let position = cursor.position();
        if position == 0 && !cursor.started() && started_at.elapsed() > START_TIMEOUT {
            return Err(PlaybackError::Timeout);
        }
        if position >= total || started_at.elapsed() > deadline {
            // Let the device drain its last buffer.
            std::thread::sleep(Duration::from_millis(80));
            return Ok(PlaybackOutcome::Finished);
        }
        std::thread::sleep(POLL);
    }
}

/// Shared read position over the samples being played.
#[derive(Clone)]
struct PlayHead {
    samples: Arc<Vec<f32>>,
    position: Arc<AtomicUsize>,
    started: Arc<AtomicBool>,
}

impl PlayHead {
    fn new(samples: Vec<f32>) -> Self {
        Self {
            samples: Arc::new(samples),
            position: Arc::new(AtomicUsize::new(0)),
            started: Arc::new(AtomicBool::new(false)),
        }
    }

    fn position(&self) -> usize {
        self.position.load(Ordering::SeqCst)
    }

    fn started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Next mono sample, or silence past the end.
    fn next_sample(&self) -> f32 {
        let pos = self.position.fetch_add(1, Ordering::SeqCst);
        match self.samples.get(pos) {
            Some(&s) => s,
            None => {
                self.position.store(self.samples.len(), Ordering::SeqCst);
                0.0
            }
        }
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    cursor: PlayHead,
) -> Result<cpal::Stream, PlaybackError>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = config.channels as usize;
    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                cursor.started.store(true, Ordering::SeqCst);
                for frame in data.chunks_mut(channels) {
                    let value = T::from_sample(cursor.next_sample());
                    frame.iter_mut().for_each(|out| *out = value);
                }
            },
            |err| log::error!("playback stream error: {err}"),
            None,
        )
        .map_err(|e| PlaybackError::OutputUnavailable(e.to_string()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_bytes(samples: &[i16], channels: u16, rate: u32) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels,
            sample_rate: rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for &s in samples {
                writer.write_sample(s).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn sniffs_wav_and_mp3_headers() {
        assert_eq!(
            sniff_format(&wav_bytes(&[0; 4], 1, 8_000)).unwrap(),
            AudioFormat::Wav
        );
        assert_eq!(sniff_format(b"ID3\x04\x00rest").unwrap(), AudioFormat::Mp3);
        assert_eq!(sniff_format(&[0xFF, 0xFB, 0x90, 0x00]).unwrap(), AudioFormat::Mp3);
    }

    #[test]
    fn rejects_unknown_headers() {
        let cases: [&[u8]; 4] = [b"OggS\x00\x02", b"{\"detail\":\"quota\"}", b"", &[0xFF, 0x00]];
        for bytes in cases {
            assert!(matches!(
                sniff_format(bytes),
                Err(PlaybackError::UnsupportedFormat)
            ));
        }
    }

    #[test]
    fn decodes_stereo_wav_to_mono() {
        // Two frames: (16384, 16384) and (-16384, 0).
        let bytes = wav_bytes(&[16_384, 16_384, -16_384, 0], 2, 22_050);
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.sample_rate, 22_050);
        assert_eq!(decoded.samples.len(), 2);
        assert!((decoded.samples[0] - 0.5).abs() < 1e-4);
        assert!((decoded.samples[1] + 0.25).abs() < 1e-4);
    }

    #[test]
    fn wav_duration() {
        let bytes = wav_bytes(&vec![0; 8_000], 1, 16_000);
        assert_eq!(decode(&bytes).unwrap().duration(), Duration::from_millis(500));
    }

    #[test]
    fn truncated_mp3_is_a_decode_error() {
        let bytes = [b'I', b'D', b'3', 3, 0, 0, 0, 0, 0, 0];
        assert!(matches!(decode(&bytes), Err(PlaybackError::Decode(_))));
    }

    #[test]
    fn stop_before_start_cancels_scheduled_clip() {
        let gate = PlaybackGate::new();
        let ticket = gate.schedule();
        gate.stop();
        assert!(gate.begin(ticket).is_none());

        // A clip scheduled after the stop plays normally.
        let flag = gate.begin(gate.schedule()).unwrap();
        assert!(!flag.load(Ordering::SeqCst));
    }

    #[test]
    fn stop_signals_running_clip() {
        let gate = PlaybackGate::new();
        let flag = gate.begin(gate.schedule()).unwrap();
        gate.stop();
        assert!(flag.load(Ordering::SeqCst));
    }

    #[test]
    fn scheduled_cpal_clip_honours_earlier_stop() {
        let player = CpalPlayer::new();
        let ticket = player.schedule();
        player.stop();
        // Never reaches the decoder or the output device.
        assert_eq!(
            player.play(ticket, b"not audio").unwrap(),
            PlaybackOutcome::Stopped
        );
    }

    #[test]
    fn new_clip_stops_previous_playback() {
        let gate = PlaybackGate::new();
        let first = gate.begin(gate.schedule()).unwrap();
        let second = gate.begin(gate.schedule()).unwrap();
        assert!(first.load(Ordering::SeqCst));
        assert!(!second.load(Ordering::SeqCst));

        // Finishing a superseded clip leaves the current one in place.
        gate.finish(&first);
        assert!(gate.lock().is_some());
        gate.finish(&second);
        assert!(gate.lock().is_none());
    }

    #[test]
    fn cursor_pads_with_silence() {
        let cursor = PlayHead::new(vec![0.1, 0.2]);
        assert_eq!(cursor.next_sample(), 0.1);
        assert_eq!(cursor.next_sample(), 0.2);
        assert_eq!(cursor.next_sample(), 0.0);
        assert_eq!(cursor.position(), 2);
    }
}
