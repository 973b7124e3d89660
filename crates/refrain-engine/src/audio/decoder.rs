use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::time::Duration;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSourceStream, MediaSourceStreamOptions};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::DecodeError;

/// Decoded PCM, one sample vector per channel.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub channels: Vec<Vec<f32>>,
    pub sample_rate: u32,
    /// Hex SHA-256 of the source file's bytes.
    pub content_hash: String,
}

impl DecodedAudio {
    /// Length of the longest channel, in seconds.
    #[allow(clippy::cast_precision_loss)]
    pub fn duration_secs(&self) -> f64 {
        let longest = self.channels.iter().map(Vec::len).max().unwrap_or(0);
        longest as f64 / f64::from(self.sample_rate.max(1))
    }
}

/// Turns an audio source into sample channels.
///
/// Implementations must fail rather than return partial data for
/// unreadable or corrupt input.
pub trait Decoder: Send + Sync {
    /// Deterministic hash of the source's raw bytes, computed without
    /// decoding.
    fn content_hash(&self, path: &Path) -> Result<String, DecodeError> {
        hash_file(path)
    }

    /// Decode `path`, keeping at most `limit` of audio when given.
    fn decode(&self, path: &Path, limit: Option<Duration>) -> Result<DecodedAudio, DecodeError>;
}

/// Hex SHA-256 of a file's contents.
pub fn hash_file(path: &Path) -> Result<String, DecodeError> {
    let open_error = |source| DecodeError::Open {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = BufReader::new(File::open(path).map_err(open_error)?);
    let mut hasher = Sha256::new();
    io::copy(&mut reader, &mut hasher).map_err(open_error)?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// Decoder backed by symphonia's probe and codec registry.
///
/// Channels are kept separate and no resampling is done; the caller works
/// at whatever rate the file was encoded at.
#[derive(Debug, Default, Clone, Copy)]
pub struct SymphoniaDecoder;

impl SymphoniaDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for SymphoniaDecoder {
    fn decode(&self, path: &Path, limit: Option<Duration>) -> Result<DecodedAudio, DecodeError> {
        let content_hash = self.content_hash(path)?;
        let (channels, sample_rate) = decode_channels(path, limit)?;

        if channels.iter().all(Vec::is_empty) {
            return Err(DecodeError::Empty {
                path: path.to_path_buf(),
            });
        }

        log::debug!(
            "Decoded {}: {} channel(s) at {} Hz",
            path.display(),
            channels.len(),
            sample_rate
        );

        Ok(DecodedAudio {
            channels,
            sample_rate,
            content_hash,
        })
    }
}

fn corrupt(path: &Path, err: &SymphoniaError) -> DecodeError {
    DecodeError::Corrupt {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn limit_in_samples(limit: Option<Duration>, sample_rate: u32) -> Option<usize> {
    limit.map(|d| (d.as_secs_f64() * f64::from(sample_rate)) as usize)
}

fn decode_channels(
    path: &Path,
    limit: Option<Duration>,
) -> Result<(Vec<Vec<f32>>, u32), DecodeError> {
    let file = File::open(path).map_err(|source| DecodeError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let mss = MediaSourceStream::new(Box::new(file), MediaSourceStreamOptions::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|s| s.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| corrupt(path, &e))?;
    let mut format = probed.format;

    let track = format.default_track().ok_or_else(|| DecodeError::NoTrack {
        path: PathBuf::from(path),
    })?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| corrupt(path, &e))?;

    let mut sample_rate = codec_params.sample_rate.unwrap_or(0);
    let mut channels: Vec<Vec<f32>> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;
    let mut max_samples = limit_in_samples(limit, sample_rate);

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(corrupt(path, &e)),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let audio_buf = decoder.decode(&packet).map_err(|e| corrupt(path, &e))?;
        let spec = *audio_buf.spec();
        let count = spec.channels.count().max(1);

        if channels.is_empty() {
            channels = vec![Vec::new(); count];
            if sample_rate == 0 {
                sample_rate = spec.rate;
                max_samples = limit_in_samples(limit, sample_rate);
            }
        }

        let buf = sample_buf.get_or_insert_with(|| {
            SampleBuffer::<f32>::new(audio_buf.capacity() as u64, spec)
        });
        buf.copy_interleaved_ref(audio_buf);

        for frame in buf.samples().chunks(count) {
            for (channel, &sample) in channels.iter_mut().zip(frame) {
                channel.push(sample);
            }
        }

        if let Some(max) = max_samples {
            if channels[0].len() >= max {
                for channel in &mut channels {
                    channel.truncate(max);
                }
                break;
            }
        }
    }

    Ok((channels, sample_rate))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::f32::consts::PI;
    use std::io::Write;
    use tempfile::TempDir;

    /// Write a 16-bit PCM WAV file of a 440 Hz tone.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_precision_loss,
        clippy::cast_possible_wrap
    )]
    pub(crate) fn write_wav(path: &Path, sample_rate: u32, channels: u16, seconds: f32) {
        let frames = (sample_rate as f32 * seconds) as u32;
        let data_len = frames * u32::from(channels) * 2;
        let block_align = channels * 2;

        let mut bytes = Vec::with_capacity(44 + data_len as usize);
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
        bytes.extend_from_slice(b"WAVE");
        bytes.extend_from_slice(b"fmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&channels.to_le_bytes());
        bytes.extend_from_slice(&sample_rate.to_le_bytes());
        bytes.extend_from_slice(&(sample_rate * u32::from(block_align)).to_le_bytes());
        bytes.extend_from_slice(&block_align.to_le_bytes());
        bytes.extend_from_slice(&16u16.to_le_bytes());
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&data_len.to_le_bytes());

        for i in 0..frames {
            let t = i as f32 / sample_rate as f32;
            let value = ((2.0 * PI * 440.0 * t).sin() * 12_000.0) as i16;
            for _ in 0..channels {
                bytes.extend_from_slice(&value.to_le_bytes());
            }
        }

        let mut file = File::create(path).unwrap();
        file.write_all(&bytes).unwrap();
    }

    #[test]
    fn test_decode_wav() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tone.wav");
        write_wav(&path, 8000, 1, 1.0);

        let audio = SymphoniaDecoder::new().decode(&path, None).unwrap();
        assert_eq!(audio.sample_rate, 8000);
        assert_eq!(audio.channels.len(), 1);
        assert_eq!(audio.channels[0].len(), 8000);
        assert!((audio.duration_secs() - 1.0).abs() < 1e-9);
        assert_eq!(audio.content_hash, hash_file(&path).unwrap());
    }

    #[test]
    fn test_decode_keeps_channels_apart() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stereo.wav");
        write_wav(&path, 8000, 2, 0.5);

        let audio = SymphoniaDecoder::new().decode(&path, None).unwrap();
        assert_eq!(audio.channels.len(), 2);
        assert_eq!(audio.channels[0].len(), 4000);
        assert_eq!(audio.channels[0], audio.channels[1]);
    }

    #[test]
    fn test_decode_respects_limit() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tone.wav");
        write_wav(&path, 8000, 1, 1.0);

        let audio = SymphoniaDecoder::new()
            .decode(&path, Some(Duration::from_millis(500)))
            .unwrap();
        assert_eq!(audio.channels[0].len(), 4000);
    }

    #[test]
    fn test_garbage_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("noise.wav");
        std::fs::write(&path, b"definitely not audio").unwrap();

        let err = SymphoniaDecoder::new().decode(&path, None).unwrap_err();
        assert!(matches!(err, DecodeError::Corrupt { .. }));
    }

    #[test]
    fn test_missing_file() {
        let err = SymphoniaDecoder::new()
            .decode(Path::new("/nonexistent/refrain/track.flac"), None)
            .unwrap_err();
        assert!(matches!(err, DecodeError::Open { .. }));
    }

    #[test]
    fn test_hash_file_tracks_content() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.bin");
        let b = dir.path().join("b.bin");
        let c = dir.path().join("c.bin");
        std::fs::write(&a, b"same bytes").unwrap();
        std::fs::write(&b, b"same bytes").unwrap();
        std::fs::write(&c, b"other bytes").unwrap();

        let ha = hash_file(&a).unwrap();
        assert_eq!(ha.len(), 64);
        assert_eq!(ha, hash_file(&b).unwrap());
        assert_ne!(ha, hash_file(&c).unwrap());
    }
}
