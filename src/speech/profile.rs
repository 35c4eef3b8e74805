//! Recognition strategy, chosen once at start-up from what the machine can do.

use std::time::Duration;

use crate::config::{ProfilePreference, RecognitionConfig};
use crate::stt::optimal_threads;

/// Threads needed before interim re-transcription is affordable.
const CONTINUOUS_MIN_THREADS: usize = 4;

/// What the recognizer has to work with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceCapabilities {
    pub inference_threads: usize,
}

impl DeviceCapabilities {
    pub fn detect() -> Self {
        Self {
            inference_threads: optimal_threads().max(1) as usize,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileKind {
    /// Interim transcripts while listening.
    Continuous,
    /// A single transcript when listening ends.
    FinalOnly,
}

/// Timing policy for one listening session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecognitionProfile {
    pub kind: ProfileKind,
    /// `None` disables interim results.
    pub interim_interval: Option<Duration>,
    /// Pause before the microphone is opened.
    pub warmup_delay: Duration,
    /// Listening never lasts longer than this.
    pub forced_timeout: Duration,
}

impl RecognitionProfile {
    pub const fn continuous() -> Self {
        Self {
            kind: ProfileKind::Continuous,
            interim_interval: Some(Duration::from_millis(1_500)),
            warmup_delay: Duration::from_millis(100),
            forced_timeout: Duration::from_secs(30),
        }
    }

    pub const fn final_only() -> Self {
        Self {
            kind: ProfileKind::FinalOnly,
            interim_interval: None,
            warmup_delay: Duration::from_millis(500),
            forced_timeout: Duration::from_secs(15),
        }
    }

    /// Pick a profile from measured capabilities.
    ///
    /// ```rust
    /// use voice_companion::speech::{DeviceCapabilities, ProfileKind, RecognitionProfile};
    ///
    /// let caps = DeviceCapabilities { inference_threads: 2 };
    /// assert_eq!(RecognitionProfile::detect(&caps).kind, ProfileKind::FinalOnly);
    /// ```
    pub fn detect(caps: &DeviceCapabilities) -> Self {
        if caps.inference_threads >= CONTINUOUS_MIN_THREADS {
            Self::continuous()
        } else {
            Self::final_only()
        }
    }

    /// Honour a pinned preference, otherwise detect.
    pub fn select(config: &RecognitionConfig, caps: &DeviceCapabilities) -> Self {
        let profile = match config.profile {
            ProfilePreference::Auto => Self::detect(caps),
            ProfilePreference::Continuous => Self::continuous(),
            ProfilePreference::FinalOnly => Self::final_only(),
        };
        log::info!(
            "speech: {:?} profile ({} inference threads)",
            profile.kind,
            caps.inference_threads
        );
        profile
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn many_threads_select_continuous() {
        let p = RecognitionProfile::detect(&DeviceCapabilities {
            inference_threads: 8,
        });
        assert_eq!(p.kind, ProfileKind::Continuous);
        assert_eq!(p.interim_interval, Some(Duration::from_millis(1_500)));
        assert_eq!(p.warmup_delay, Duration::from_millis(100));
        assert_eq!(p.forced_timeout, Duration::from_secs(30));
    }

    #[test]
    fn threshold_is_four_threads() {
        let at = |n| RecognitionProfile::detect(&DeviceCapabilities { inference_threads: n }).kind;
        assert_eq!(at(4), ProfileKind::Continuous);
        assert_eq!(at(3), ProfileKind::FinalOnly);
    }

    #[test]
    fn final_only_has_no_interim_and_longer_warmup() {
        let p = RecognitionProfile::final_only();
        assert!(p.interim_interval.is_none());
        assert_eq!(p.warmup_delay, Duration::from_millis(500));
        assert_eq!(p.forced_timeout, Duration::from_secs(15));
    }

    #[test]
    fn pinned_preference_overrides_detection() {
        let caps = DeviceCapabilities {
            inference_threads: 16,
        };
        let config = RecognitionConfig {
            profile: ProfilePreference::FinalOnly,
            ..RecognitionConfig::default()
        };
        assert_eq!(
            RecognitionProfile::select(&config, &caps).kind,
            ProfileKind::FinalOnly
        );
        assert_eq!(
            RecognitionProfile::select(&RecognitionConfig::default(), &caps).kind,
            ProfileKind::Continuous
        );
    }
}
