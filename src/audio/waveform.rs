//! Bar levels for the voice visualizer.
//!
//! While listening, the recognizer keeps the most recent second of audio in
//! a [`LevelMeter`] and publishes [`WaveformData::compute`] of it.  While
//! speaking there is no microphone signal, so the UI animates
//! [`WaveformData::pulse`] instead.

use std::collections::VecDeque;

/// Number of bars drawn by the visualizer.
pub const DEFAULT_BARS: usize = 24;

/// Gain applied to raw RMS so normal speech fills most of the bar height.
const DISPLAY_GAIN: f32 = 4.0;

/// Per-bar levels in `[0.0, 1.0]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WaveformData {
    pub bars: Vec<f32>,
}

impl WaveformData {
    /// `num_bars` RMS levels over equal slices of `audio`, scaled for display.
    /// Short input is padded with zero bars.
    ///
    /// ```rust
    /// use voice_companion::audio::WaveformData;
    ///
    /// let w = WaveformData::compute(&vec![0.1_f32; 1_600], 8);
    /// assert_eq!(w.bars.len(), 8);
    /// assert!(w.bars.iter().all(|&b| b > 0.0 && b <= 1.0));
    /// ```
    pub fn compute(audio: &[f32], num_bars: usize) -> Self {
        if num_bars == 0 {
            return Self::default();
        }
        let chunk = (audio.len() / num_bars).max(1);
        let mut bars: Vec<f32> = audio
            .chunks(chunk)
            .take(num_bars)
            .map(|c| (super::vad::rms(c) * DISPLAY_GAIN).min(1.0))
            .collect();
        bars.resize(num_bars, 0.0);
        Self { bars }
    }

    /// Synthetic speaking animation at time `t` (seconds).
    pub fn pulse(t: f64, num_bars: usize) -> Self {
        let bars = (0..num_bars)
            .map(|i| {
                let phase = t * 6.0 + i as f64 * 0.55;
                (0.35 + 0.3 * phase.sin() + 0.15 * (phase * 2.3).cos()).clamp(0.05, 1.0) as f32
            })
            .collect();
        Self { bars }
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}

// ---------------------------------------------------------------------------
// LevelMeter
// ---------------------------------------------------------------------------

/// Fixed-capacity window over the most recent samples.
#[derive(Debug, Clone)]
pub struct LevelMeter {
    window: VecDeque<f32>,
    capacity: usize,
}

impl LevelMeter {
    pub fn new(capacity: usize) -> Self {
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, samples: &[f32]) {
        let skip = samples.len().saturating_sub(self.capacity);
        for &s in &samples[skip..] {
            if self.window.len() == self.capacity {
                self.window.pop_front();
            }
            self.window.push_back(s);
        }
    }

    pub fn waveform(&self, num_bars: usize) -> WaveformData {
        let (a, b) = self.window.as_slices();
        if b.is_empty() {
            WaveformData::compute(a, num_bars)
        } else {
            WaveformData::compute(&[a, b].concat(), num_bars)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
