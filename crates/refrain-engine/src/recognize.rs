//! The query path: identify an unknown sample against the index.

use refrain_core::{FingerprintStore, SongId, SongRecord};
use serde::Serialize;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::audio::Decoder;
use crate::error::{DecodeError, RecognizeError};
use crate::fingerprint::Fingerprinter;
use crate::matcher::{align_matches, SongScore};

/// Sample channels read from a query source.
#[derive(Debug, Clone, PartialEq)]
pub struct RawAudio {
    pub channels: Vec<Vec<f32>>,
    pub sample_rate: u32,
}

/// Anything a query can be read from: a file, a capture buffer.
pub trait AudioSource {
    fn read(&self) -> Result<RawAudio, DecodeError>;
}

/// A query read from a file through a [`Decoder`].
#[derive(Debug)]
pub struct FileSource<'a, D: ?Sized> {
    decoder: &'a D,
    path: PathBuf,
    limit: Option<Duration>,
}

impl<'a, D: Decoder + ?Sized> FileSource<'a, D> {
    pub fn new(decoder: &'a D, path: impl Into<PathBuf>, limit: Option<Duration>) -> Self {
        Self {
            decoder,
            path: path.into(),
            limit,
        }
    }
}

impl<D: Decoder + ?Sized> AudioSource for FileSource<'_, D> {
    fn read(&self) -> Result<RawAudio, DecodeError> {
        let audio = self.decoder.decode(&self.path, self.limit)?;
        Ok(RawAudio {
            channels: audio.channels,
            sample_rate: audio.sample_rate,
        })
    }
}

/// A query already held in memory, such as a recorded capture.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleSource {
    audio: RawAudio,
}

impl SampleSource {
    pub fn new(channels: Vec<Vec<f32>>, sample_rate: u32) -> Self {
        Self {
            audio: RawAudio {
                channels,
                sample_rate,
            },
        }
    }
}

impl AudioSource for SampleSource {
    fn read(&self) -> Result<RawAudio, DecodeError> {
        Ok(self.audio.clone())
    }
}

/// The runner-up of a recognition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub song_id: SongId,
    pub song_name: String,
    pub song_author: String,
    pub song_genre: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecognitionResult {
    pub song_id: SongId,
    pub song_name: String,
    pub song_author: String,
    pub song_genre: String,
    /// Share of all query matches that point at this song.
    pub confidence: f64,
    /// Alignment point in frames: stored offset minus query offset.
    pub offset: i64,
    /// `offset` in seconds, rounded to five decimals.
    pub offset_seconds: f64,
    /// Seconds spent reading, fingerprinting and matching the query.
    pub match_time: f64,
    pub recommendation: Recommendation,
}

/// Matches query audio against a store.
#[derive(Debug)]
pub struct Recognizer<'a, S: ?Sized> {
    store: &'a S,
    fingerprinter: Fingerprinter,
}

impl<'a, S: FingerprintStore + ?Sized> Recognizer<'a, S> {
    /// `fingerprinter` must use the settings the store was built with.
    pub fn new(store: &'a S, fingerprinter: Fingerprinter) -> Self {
        Self {
            store,
            fingerprinter,
        }
    }

    /// Identify `source`.
    ///
    /// Every channel is fingerprinted and matched; the tallies cover all
    /// of them. Returns `Ok(None)` when fewer than two distinct songs
    /// matched.
    pub fn recognize(
        &self,
        source: &dyn AudioSource,
    ) -> Result<Option<RecognitionResult>, RecognizeError> {
        let started = Instant::now();
        let audio = source.read()?;

        let mut matches = Vec::new();
        for channel in &audio.channels {
            let hashes = self.fingerprinter.fingerprint(channel);
            matches.extend(self.store.match_hashes(&hashes)?);
        }
        log::debug!(
            "{} hash match(es) across {} channel(s)",
            matches.len(),
            audio.channels.len()
        );

        let Some(alignment) = align_matches(matches) else {
            log::info!("No matches for query");
            return Ok(None);
        };
        let Some(runner_up) = alignment.recommendation() else {
            log::info!("Only one song matched; no result");
            return Ok(None);
        };
        let recognized = alignment.recognized();

        let Some(song) = self.lookup(recognized)? else {
            return Ok(None);
        };
        let Some(second) = self.lookup(runner_up)? else {
            return Ok(None);
        };

        let result = RecognitionResult {
            song_id: song.id,
            song_name: song.title,
            song_author: song.artist,
            song_genre: song.genre,
            confidence: recognized.confidence,
            offset: alignment.offset_frames(),
            offset_seconds: alignment.offset_seconds(self.fingerprinter.hop(), audio.sample_rate),
            match_time: started.elapsed().as_secs_f64(),
            recommendation: Recommendation {
                song_id: second.id,
                song_name: second.title,
                song_author: second.artist,
                song_genre: second.genre,
                confidence: runner_up.confidence,
            },
        };

        log::info!(
            "Recognized song {} ({:.1}% of {} matches) at {}s",
            result.song_id,
            result.confidence * 100.0,
            alignment.total_matches(),
            result.offset_seconds
        );
        log::debug!(
            "{} match(es) agree on offset {}",
            alignment.offset_matches(),
            result.offset
        );
        Ok(Some(result))
    }

    fn lookup(&self, score: &SongScore) -> Result<Option<SongRecord>, RecognizeError> {
        let song = self.store.get_song(score.song_id)?;
        if song.is_none() {
            log::warn!("Matched song {} is missing from the store", score.song_id);
        }
        Ok(song)
    }
}

/// The most confident recommendation across several recognitions.
pub fn best_recommendation(results: &[RecognitionResult]) -> Option<&Recommendation> {
    results
        .iter()
        .map(|r| &r.recommendation)
        .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
}
