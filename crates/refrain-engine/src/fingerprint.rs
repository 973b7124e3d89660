//! Samples → spectrogram → landmarks → hashes.

use refrain_core::Fingerprint;
use std::collections::BTreeSet;

use crate::config::FingerprintConfig;
use crate::dsp::{find_peaks, hash_peaks, Spectrogram};
use crate::error::ConfigError;

/// Applies the fingerprinting stages with one fixed configuration.
///
/// Holds no mutable state, so a single instance can be shared across
/// worker threads.
#[derive(Debug, Clone)]
pub struct Fingerprinter {
    config: FingerprintConfig,
}

impl Fingerprinter {
    pub fn new(config: FingerprintConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Samples between consecutive frames, used to convert frame offsets
    /// to seconds.
    pub fn hop(&self) -> usize {
        self.config.spectrogram().hop()
    }

    /// Fingerprint a single channel. Identical input always produces the
    /// identical sequence.
    pub fn fingerprint(&self, samples: &[f32]) -> Vec<Fingerprint> {
        let spectrogram = Spectrogram::build(samples, &self.config.spectrogram());
        let peaks = find_peaks(&spectrogram, &self.config.peaks());
        let hashes = hash_peaks(&peaks, &self.config.hashing());
        log::trace!(
            "{} frames, {} peaks, {} hashes",
            spectrogram.frames(),
            peaks.len(),
            hashes.len()
        );
        hashes
    }

    /// Union of the per-channel fingerprints of a multi-channel source.
    pub fn fingerprint_channels(&self, channels: &[Vec<f32>]) -> BTreeSet<Fingerprint> {
        let mut hashes = BTreeSet::new();
        for (index, channel) in channels.iter().enumerate() {
            log::debug!(
                "Fingerprinting channel {}/{} ({} samples)",
                index + 1,
                channels.len(),
                channel.len()
            );
            hashes.extend(self.fingerprint(channel));
        }
        hashes
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::f32::consts::PI;

    /// A deterministic melody: a sequence of two-tone chords whose pitches
    /// follow a simple LCG seeded by `seed`.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_precision_loss,
        clippy::cast_sign_loss
    )]
    pub(crate) fn melody(seed: u64, sample_rate: u32, seconds: f32) -> Vec<f32> {
        let rate = sample_rate as f32;
        let len = (rate * seconds) as usize;
        let note_len = (rate * 0.25) as usize;

        let mut state = seed;
        let mut notes = Vec::new();
        for _ in 0..=len / note_len {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            let a = 200.0 + ((state >> 33) % 1800) as f32;
            let b = 300.0 + ((state >> 13) % 2500) as f32;
            notes.push((a, b));
        }

        (0..len)
            .map(|i| {
                let (a, b) = notes[i / note_len];
                let t = i as f32 / rate;
                0.4 * (2.0 * PI * a * t).sin() + 0.3 * (2.0 * PI * b * t).sin()
            })
            .collect()
    }

    pub(crate) fn small_config() -> FingerprintConfig {
        FingerprintConfig {
            window_size: 512,
            overlap_ratio: 0.5,
            neighborhood_size: 6,
            amplitude_min: 10.0,
            fan_value: 5,
            min_time_delta: 0,
            max_time_delta: 50,
            hash_bytes: 10,
        }
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = FingerprintConfig {
            fan_value: 0,
            ..FingerprintConfig::default()
        };
        assert_eq!(
            Fingerprinter::new(config).unwrap_err(),
            ConfigError::FanValue
        );
    }

    #[test]
    fn test_fingerprint_is_deterministic() {
        let fingerprinter = Fingerprinter::new(small_config()).unwrap();
        let samples = melody(7, 8000, 6.0);
        let a = fingerprinter.fingerprint(&samples);
        let b = fingerprinter.fingerprint(&samples);
        assert!(!a.is_empty());
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_audio_differs() {
        let fingerprinter = Fingerprinter::new(small_config()).unwrap();
        let a: BTreeSet<_> = fingerprinter
            .fingerprint(&melody(1, 8000, 6.0))
            .into_iter()
            .map(|fp| fp.hash)
            .collect();
        let b: BTreeSet<_> = fingerprinter
            .fingerprint(&melody(2, 8000, 6.0))
            .into_iter()
            .map(|fp| fp.hash)
            .collect();
        assert!(a.intersection(&b).count() < a.len() / 2);
    }

    #[test]
    fn test_channels_are_unioned() {
        let fingerprinter = Fingerprinter::new(small_config()).unwrap();
        let left = melody(3, 8000, 4.0);
        let right = melody(4, 8000, 4.0);

        let union = fingerprinter.fingerprint_channels(&[left.clone(), right.clone()]);
        let left_only: BTreeSet<_> = fingerprinter.fingerprint(&left).into_iter().collect();
        let right_only: BTreeSet<_> = fingerprinter.fingerprint(&right).into_iter().collect();

        assert!(left_only.is_subset(&union));
        assert!(right_only.is_subset(&union));
        assert_eq!(union.len(), left_only.union(&right_only).count());
    }

    #[test]
    fn test_duplicate_channels_collapse() {
        let fingerprinter = Fingerprinter::new(small_config()).unwrap();
        let mono = melody(5, 8000, 4.0);
        let once = fingerprinter.fingerprint_channels(&[mono.clone()]);
        let twice = fingerprinter.fingerprint_channels(&[mono.clone(), mono]);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_hop() {
        let fingerprinter = Fingerprinter::new(FingerprintConfig::default()).unwrap();
        assert_eq!(fingerprinter.hop(), 2048);
    }
}
