//! Error types for fingerprinting, the pipeline and recognition.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// A source could not be read or decoded into samples.
///
/// Never fatal for a batch: the source is logged and skipped.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("unsupported or corrupt audio in {}: {message}", path.display())]
    Corrupt { path: PathBuf, message: String },

    #[error("no audio track in {}", path.display())]
    NoTrack { path: PathBuf },

    #[error("no samples decoded from {}", path.display())]
    Empty { path: PathBuf },
}

/// Why fingerprinting a single source did not produce a result.
#[derive(Debug, Error)]
pub enum FingerprintError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The task exceeded the configured per-task timeout.
    #[error("timed out after {0:?}")]
    TimedOut(Duration),

    /// The run was cancelled before the task started.
    #[error("cancelled")]
    Cancelled,

    /// The worker panicked or was aborted.
    #[error("worker failure: {0}")]
    Worker(String),
}

/// Invalid fingerprinting parameters.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("window_size must be even and at least 2, got {0}")]
    WindowSize(usize),

    #[error("overlap_ratio must be in [0, 1), got {0}")]
    OverlapRatio(f64),

    #[error("fan_value must be at least 1")]
    FanValue,

    #[error("min_time_delta ({min}) must be below max_time_delta ({max})")]
    TimeDelta { min: u32, max: u32 },

    #[error("hash_bytes must be between 1 and 32, got {0}")]
    HashBytes(usize),
}

/// A failure that aborts a whole pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("store error: {0}")]
    Store(#[from] refrain_core::Error),
}

/// A failure while recognizing a query sample.
#[derive(Debug, Error)]
pub enum RecognizeError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("store error: {0}")]
    Store(#[from] refrain_core::Error),
}

impl FingerprintError {
    /// Returns `true` when the source could not be read at all.
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode(_))
    }
}
