//! Spectral analysis, landmark extraction and landmark-pair hashing.

pub mod hasher;
pub mod peaks;
pub mod spectrogram;

pub use hasher::{hash_peaks, HashConfig};
pub use peaks::{find_peaks, Peak, PeakConfig};
pub use spectrogram::{Spectrogram, SpectrogramConfig};
