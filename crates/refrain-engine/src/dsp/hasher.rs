use refrain_core::Fingerprint;
use sha2::{Digest, Sha256};

use crate::dsp::peaks::Peak;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashConfig {
    pub fan_value: usize,
    pub min_time_delta: u32,
    pub max_time_delta: u32,
    /// Digest bytes kept per hash.
    pub hash_bytes: usize,
}

/// Pair each peak with its nearby successors and hash every pair.
///
/// For peak `i`, the candidates are peaks `i + 1 ..= i + fan_value`; a
/// candidate is kept when its time frame is more than `min_time_delta` and
/// at most `max_time_delta` frames after the anchor. Each kept pair yields
/// one [`Fingerprint`] at the anchor's time frame. Input must be sorted by
/// time frame, then frequency bin.
pub fn hash_peaks(peaks: &[Peak], config: &HashConfig) -> Vec<Fingerprint> {
    let mut fingerprints = Vec::new();

    for (i, anchor) in peaks.iter().enumerate() {
        for target in peaks[i + 1..].iter().take(config.fan_value) {
            let delta = target.time_frame - anchor.time_frame;
            if delta > config.max_time_delta {
                break;
            }
            if delta <= config.min_time_delta {
                continue;
            }

            fingerprints.push(Fingerprint::new(
                landmark_hash(
                    anchor.frequency_bin,
                    target.frequency_bin,
                    delta,
                    config.hash_bytes,
                ),
                anchor.time_frame,
            ));
        }
    }

    fingerprints
}

/// Truncated SHA-256 of the pair's canonical text form `f1|f2|dt`.
pub fn landmark_hash(freq1: u32, freq2: u32, time_delta: u32, hash_bytes: usize) -> Vec<u8> {
    let digest = Sha256::digest(format!("{freq1}|{freq2}|{time_delta}").as_bytes());
    digest[..hash_bytes.min(digest.len())].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peak(time_frame: u32, frequency_bin: u32) -> Peak {
        Peak {
            time_frame,
            frequency_bin,
            magnitude: 50.0,
        }
    }

    fn config(fan_value: usize) -> HashConfig {
        HashConfig {
            fan_value,
            min_time_delta: 0,
            max_time_delta: 200,
            hash_bytes: 10,
        }
    }

    #[test]
    fn test_hash_width() {
        assert_eq!(landmark_hash(1, 2, 3, 10).len(), 10);
        assert_eq!(landmark_hash(1, 2, 3, 32).len(), 32);
    }

    #[test]
    fn test_hash_is_deterministic_and_order_sensitive() {
        assert_eq!(landmark_hash(10, 20, 5, 10), landmark_hash(10, 20, 5, 10));
        assert_ne!(landmark_hash(10, 20, 5, 10), landmark_hash(20, 10, 5, 10));
        assert_ne!(landmark_hash(10, 20, 5, 10), landmark_hash(10, 20, 6, 10));
    }

    #[test]
    fn test_pairs_within_fan() {
        let peaks = vec![peak(0, 10), peak(1, 20), peak(2, 30), peak(3, 40)];
        let hashes = hash_peaks(&peaks, &config(2));
        // 0→1, 0→2, 1→2, 1→3, 2→3
        assert_eq!(hashes.len(), 5);
        let offsets: Vec<u32> = hashes.iter().map(|fp| fp.offset).collect();
        assert_eq!(offsets, vec![0, 0, 1, 1, 2]);
    }

    #[test]
    fn test_same_frame_successors_are_skipped() {
        let peaks = vec![peak(5, 10), peak(5, 11), peak(6, 12)];
        let hashes = hash_peaks(&peaks, &config(15));
        // 5/10→6/12 and 5/11→6/12 only
        assert_eq!(hashes.len(), 2);
        assert!(hashes.iter().all(|fp| fp.offset == 5));
    }

    #[test]
    fn test_max_time_delta_is_inclusive() {
        let cfg = HashConfig {
            max_time_delta: 10,
            ..config(15)
        };
        let peaks = vec![peak(0, 1), peak(10, 2), peak(11, 3)];
        let hashes = hash_peaks(&peaks, &cfg);
        // 0→10 (Δ10), 10→11 (Δ1); 0→11 is out of range
        assert_eq!(hashes.len(), 2);
        assert_eq!(hashes[0].hash, landmark_hash(1, 2, 10, 10));
    }

    #[test]
    fn test_count_bound() {
        let peaks: Vec<Peak> = (0..50).map(|i| peak(i * 3, i % 7)).collect();
        for fan in [1, 3, 15] {
            let hashes = hash_peaks(&peaks, &config(fan));
            assert!(hashes.len() <= peaks.len() * fan);

            let expected: usize = (0..peaks.len())
                .map(|i| {
                    peaks[i + 1..]
                        .iter()
                        .take(fan)
                        .filter(|p| {
                            let d = p.time_frame - peaks[i].time_frame;
                            d > 0 && d <= 200
                        })
                        .count()
                })
                .sum();
            assert_eq!(hashes.len(), expected);
        }
    }

    #[test]
    fn test_empty_and_single() {
        assert!(hash_peaks(&[], &config(15)).is_empty());
        assert!(hash_peaks(&[peak(0, 0)], &config(15)).is_empty());
    }
}
