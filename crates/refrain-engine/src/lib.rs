//! Fingerprinting, matching and the fingerprint pipeline for refrain.
//!
//! Samples become a log-power spectrogram ([`dsp::spectrogram`]), local
//! maxima are picked out as landmarks ([`dsp::peaks`]) and nearby landmark
//! pairs are hashed ([`dsp::hasher`]). The [`pipeline`] writes those hashes
//! for many sources into a [`refrain_core::FingerprintStore`]; the
//! [`recognize`] path looks a query's hashes up and the [`matcher`] turns
//! the hits into an identification.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod audio;
pub mod cache;
pub mod config;
pub mod dsp;
pub mod error;
pub mod fingerprint;
pub mod matcher;
pub mod pipeline;
pub mod recognize;

pub use audio::{find_files, Decoder, LoftyTagReader, SymphoniaDecoder, TagReader};
pub use cache::KnownContent;
pub use config::{Config, FingerprintConfig};
pub use error::{ConfigError, DecodeError, FingerprintError, PipelineError, RecognizeError};
pub use fingerprint::Fingerprinter;
pub use matcher::{align_matches, Alignment, SongScore};
pub use pipeline::{
    fingerprint_source, FingerprintPipeline, PipelineOptions, PipelineReport, SourceOutcome,
};
pub use recognize::{
    best_recommendation, AudioSource, FileSource, RecognitionResult, Recognizer, SampleSource,
};
