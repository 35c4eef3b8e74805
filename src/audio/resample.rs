//! Sample-rate conversion and channel mixing.
//!
//! Two directions flow through the app:
//!
//! 1. Capture: device rate/channels → **16 kHz mono** for the recognizer.
//!    [`downmix`] then [`resample_linear`]; cheap enough to run on every
//!    chunk.
//! 2. Playback: decoded speech (typically 22.05 or 44.1 kHz mono) → the
//!    output device's rate.  [`resample_hq`] uses rubato's FFT resampler.

use rubato::{FftFixedIn, Resampler};
use thiserror::Error;

/// Rate expected by the recognizer.
pub const RECOGNIZER_RATE: u32 = 16_000;

/// Input block size for the FFT resampler.
const HQ_CHUNK: usize = 1024;

#[derive(Debug, Error)]
#[error("resampling {from} Hz → {to} Hz failed: {reason}")]
pub struct ResampleError {
    pub from: u32,
    pub to: u32,
    pub reason: String,
}

// ---------------------------------------------------------------------------
// downmix
// ---------------------------------------------------------------------------

/// Average interleaved frames of `channels` samples down to mono.
///
/// ```rust
/// use voice_companion::audio::downmix;
///
/// let stereo = vec![0.5_f32, -0.5, 0.2, 0.2];
/// assert_eq!(downmix(&stereo, 2), vec![0.0, 0.2]);
/// ```
pub fn downmix(samples: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.to_vec(),
        n => {
            let n = n as usize;
            samples
                .chunks_exact(n)
                .map(|frame| frame.iter().sum::<f32>() / n as f32)
                .collect()
        }
    }
}

// ---------------------------------------------------------------------------
// resample_linear
// ---------------------------------------------------------------------------

/// Linear-interpolation resampler for mono audio.
///
/// Output length is `ceil(len * to / from)`.  Same-rate input is returned
/// unchanged.
pub fn resample_linear(samples: &[f32], from: u32, to: u32) -> Vec<f32> {
    if from == to || from == 0 || to == 0 {
        return samples.to_vec();
    }
    if samples.is_empty() {
        return Vec::new();
    }

    let ratio = to as f64 / from as f64;
    let output_len = (samples.len() as f64 * ratio).ceil() as usize;

    (0..output_len)
        .map(|i| {
            let src_pos = i as f64 / ratio;
            let idx = src_pos as usize;
            let frac = (src_pos - idx as f64) as f32;
            match (samples.get(idx), samples.get(idx + 1)) {
                (Some(&a), Some(&b)) => a * (1.0 - frac) + b * frac,
                (Some(&a), None) => a,
                _ => 0.0,
            }
        })
        .collect()
}

/// Capture helper: downmix then bring to [`RECOGNIZER_RATE`].
pub fn to_recognizer_rate(samples: &[f32], rate: u32, channels: u16) -> Vec<f32> {
    resample_linear(&downmix(samples, channels), rate, RECOGNIZER_RATE)
}

// ---------------------------------------------------------------------------
// resample_hq
// ---------------------------------------------------------------------------

/// Band-limited resampling of mono audio with rubato's `FftFixedIn`.
///
/// The last partial block is zero-padded and the output trimmed to the
/// expected length, so no trailing speech is dropped.
pub fn resample_hq(samples: &[f32], from: u32, to: u32) -> Result<Vec<f32>, ResampleError> {
    if from == to || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let err = |reason: String| ResampleError { from, to, reason };

    let mut resampler = FftFixedIn::<f32>::new(from as usize, to as usize, HQ_CHUNK, 2, 1)
        .map_err(|e| err(e.to_string()))?;

    let expected = (samples.len() as u64 * to as u64 / from as u64) as usize;
    let delay = resampler.output_delay();
    let mut output = Vec::with_capacity(expected + delay + HQ_CHUNK);

    let mut block = vec![0.0_f32; HQ_CHUNK];
    // Trailing silent blocks flush the filter delay.
    let blocks = samples.chunks(HQ_CHUNK).map(Some).chain([None, None]);
    for chunk in blocks {
        block.iter_mut().for_each(|s| *s = 0.0);
        if let Some(chunk) = chunk {
            block[..chunk.len()].copy_from_slice(chunk);
        }
        let result = resampler
            .process(&[&block[..]], None)
            .map_err(|e| err(e.to_string()))?;
        output.extend_from_slice(&result[0]);
    }

    let start = delay.min(output.len());
    let end = (start + expected).min(output.len());
    Ok(output[start..end].to_vec())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downmix_mono_is_identity() {
        let input = vec![0.1_f32, 0.2, 0.3];
        assert_eq!(downmix(&input, 1), input);
    }

    #[test]
    fn downmix_averages_frames() {
        let out = downmix(&[1.0, -1.0, 0.5, 0.5], 2);
        assert_eq!(out.len(), 2);
        assert!(out[0].abs() < 1e-6);
        assert!((out[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn downmix_zero_channels_is_empty() {
        assert!(downmix(&[1.0, 2.0], 0).is_empty());
    }

    #[test]
    fn linear_same_rate_is_noop() {
        let input: Vec<f32> = (0..160).map(|i| i as f32 / 160.0).collect();
        assert_eq!(resample_linear(&input, 16_000, 16_000), input);
    }

    #[test]
    fn linear_output_lengths() {
        assert_eq!(resample_linear(&vec![0.5; 480], 48_000, 16_000).len(), 160);
        assert_eq!(resample_linear(&vec![0.0; 80], 8_000, 16_000).len(), 160);
        let one_second = resample_linear(&vec![0.0; 44_100], 44_100, 16_000).len();
        assert!(one_second.abs_diff(16_000) <= 1);
    }

    #[test]
    fn linear_preserves_dc_level() {
        for s in resample_linear(&vec![0.5; 480], 48_000, 16_000) {
            assert!((s - 0.5).abs() < 1e-5);
        }
    }

    #[test]
    fn capture_helper_downmixes_and_resamples() {
        // 10 ms of stereo @ 48 kHz.
        let stereo = vec![0.25_f32; 960];
        let out = to_recognizer_rate(&stereo, 48_000, 2);
        assert_eq!(out.len(), 160);
    }

    #[test]
    fn hq_same_rate_is_noop() {
        let input = vec![0.3_f32; 100];
        assert_eq!(resample_hq(&input, 24_000, 24_000).unwrap(), input);
    }

    #[test]
    fn hq_keeps_duration() {
        // 0.5 s at 22.05 kHz → 0.5 s at 48 kHz.
        let input: Vec<f32> = (0..11_025)
            .map(|i| (i as f32 * 440.0 * std::f32::consts::TAU / 22_050.0).sin() * 0.5)
            .collect();
        let out = resample_hq(&input, 22_050, 48_000).unwrap();
        assert_eq!(out.len(), 24_000);
        let peak = out.iter().fold(0.0_f32, |m, s| m.max(s.abs()));
        assert!(peak > 0.3 && peak < 0.7, "peak = {peak}");
    }
}
