//! Microphone capture via `cpal`.
//!
//! [`AudioCapture`] wraps the cpal host/device/stream lifecycle and streams
//! [`AudioChunk`]s over an mpsc channel; the returned [`StreamHandle`] stops
//! the hardware stream when dropped.
//!
//! The recognizer does not talk to cpal directly.  It opens an
//! [`AudioSource`], so tests can feed it scripted audio.

use std::sync::mpsc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use thiserror::Error;

// ---------------------------------------------------------------------------
// AudioChunk
// ---------------------------------------------------------------------------

/// Interleaved `f32` samples exactly as delivered by the device.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Keeps the cpal stream alive; dropping it stops capture.
pub struct StreamHandle {
    _stream: cpal::Stream,
}

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

/// Every variant means the microphone is unusable for this attempt, which the
/// recognizer reports as a permission problem.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no input device available")]
    NoDevice,

    #[error("input device {0:?} not found")]
    DeviceNotFound(String),

    #[error("failed to enumerate input devices: {0}")]
    Devices(#[from] cpal::DevicesError),

    #[error("failed to query input config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build input stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start input stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),
}

// ---------------------------------------------------------------------------
// AudioCapture
// ---------------------------------------------------------------------------

pub struct AudioCapture {
    device: cpal::Device,
    config: cpal::StreamConfig,
    sample_rate: u32,
    channels: u16,
}

impl AudioCapture {
    /// Open the input device called `device_name`, or the default one.
    pub fn open(device_name: Option<&str>) -> Result<Self, CaptureError> {
        let host = cpal::default_host();
        let device = match device_name {
            Some(name) => host
                .input_devices()?
                .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                .ok_or_else(|| CaptureError::DeviceNotFound(name.to_string()))?,
            None => host.default_input_device().ok_or(CaptureError::NoDevice)?,
        };

        let supported = device.default_input_config()?;
        let channels = supported.channels();
        let sample_rate = supported.sample_rate().0;

        log::debug!(
            "capture: {} @ {sample_rate} Hz × {channels}",
            device.name().unwrap_or_default()
        );

        Ok(Self {
            device,
            config: supported.into(),
            sample_rate,
            channels,
        })
    }

    /// Start streaming chunks to `tx`.  Send errors are ignored: the
    /// receiver going away just means nobody is listening any more.
    pub fn start(&self, tx: mpsc::Sender<AudioChunk>) -> Result<StreamHandle, CaptureError> {
        let sample_rate = self.sample_rate;
        let channels = self.channels;

        let stream = self.device.build_input_stream(
            &self.config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let _ = tx.send(AudioChunk {
                    samples: data.to_vec(),
                    sample_rate,
                    channels,
                });
            },
            |err: cpal::StreamError| log::error!("capture stream error: {err}"),
            None,
        )?;

        stream.play()?;
        Ok(StreamHandle { _stream: stream })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }
}

// ---------------------------------------------------------------------------
// AudioSource
// ---------------------------------------------------------------------------

/// An open capture: chunks arrive on `chunks` until `guard` is dropped.
/// The guard is created and dropped on the thread that opened it.
pub struct OpenCapture {
    pub chunks: mpsc::Receiver<AudioChunk>,
    pub guard: Box<dyn std::any::Any>,
}

/// Something the recognizer can listen to.
pub trait AudioSource: Send + Sync {
    fn open(&self) -> Result<OpenCapture, CaptureError>;
}

/// The real microphone.
#[derive(Debug, Clone, Default)]
pub struct MicrophoneSource {
    pub device: Option<String>,
}

impl MicrophoneSource {
    pub fn new(device: Option<String>) -> Self {
        Self { device }
    }
}

impl AudioSource for MicrophoneSource {
    fn open(&self) -> Result<OpenCapture, CaptureError> {
        let capture = AudioCapture::open(self.device.as_deref())?;
        let (tx, rx) = mpsc::channel();
        let handle = capture.start(tx)?;
        Ok(OpenCapture {
            chunks: rx,
            guard: Box::new(handle),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_chunk_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<AudioChunk>();
    }

    #[test]
    fn source_is_shareable() {
        fn assert_shared<T: Send + Sync + ?Sized>() {}
        assert_shared::<dyn AudioSource>();
    }

    #[test]
    fn device_not_found_names_the_device() {
        let e = CaptureError::DeviceNotFound("USB Mic".into());
        assert!(e.to_string().contains("USB Mic"));
    }
}
