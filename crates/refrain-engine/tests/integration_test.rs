//! End-to-end tests: WAV files on disk, fingerprinted into a SQLite index,
//! then recognized from an excerpt.

use std::f32::consts::PI;
use std::path::Path;
use tempfile::TempDir;

use refrain_core::schema::Database;
use refrain_core::FingerprintStore;
use refrain_engine::{
    FileSource, FingerprintConfig, FingerprintPipeline, Fingerprinter, LoftyTagReader,
    PipelineOptions, Recognizer, SymphoniaDecoder,
};

const RATE: u32 = 8000;

fn config() -> FingerprintConfig {
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

/// Two-tone chords, a new pair every quarter second.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
fn melody(seed: u64, seconds: f32) -> Vec<f32> {
    let rate = RATE as f32;
    let len = (rate * seconds) as usize;
    let note_len = (rate * 0.25) as usize;
    let mut state = seed;
    let mut notes = Vec::new();
    for _ in 0..=len / note_len {
        state = state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        notes.push((
            200.0 + ((state >> 33) % 1800) as f32,
            300.0 + ((state >> 13) % 2500) as f32,
        ));
    }
    (0..len)
        .map(|i| {
            let (a, b) = notes[i / note_len];
            let t = i as f32 / rate;
            0.4 * (2.0 * PI * a * t).sin() + 0.3 * (2.0 * PI * b * t).sin()
        })
        .collect()
}

/// Write 16-bit PCM, one slice per channel. Channels are cut to the
/// shortest.
#[allow(clippy::cast_possible_truncation)]
fn write_wav(path: &Path, channels: &[&[f32]]) {
    let frames = channels.iter().map(|c| c.len()).min().unwrap() as u32;
    let count = channels.len() as u16;
    let block_align = count * 2;
    let data_len = frames * u32::from(block_align);

    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
    bytes.extend_from_slice(b"WAVEfmt ");
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&count.to_le_bytes());
    bytes.extend_from_slice(&RATE.to_le_bytes());
    bytes.extend_from_slice(&(RATE * u32::from(block_align)).to_le_bytes());
    bytes.extend_from_slice(&block_align.to_le_bytes());
    bytes.extend_from_slice(&16u16.to_le_bytes());
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_len.to_le_bytes());
    for i in 0..frames as usize {
        for channel in channels {
            let value = (channel[i].clamp(-1.0, 1.0) * 30_000.0) as i16;
            bytes.extend_from_slice(&value.to_le_bytes());
        }
    }
    std::fs::write(path, bytes).unwrap();
}

fn options() -> PipelineOptions {
    PipelineOptions {
        workers: 2,
        task_timeout: None,
        limit: None,
    }
}

#[tokio::test]
async fn test_fingerprint_directory_then_recognize() {
    let temp_dir = TempDir::new().unwrap();
    let library = temp_dir.path().join("library");
    std::fs::create_dir_all(library.join("nested")).unwrap();
    let db_path = temp_dir.path().join("refrain.db");

    let first = melody(101, 5.0);
    let second = melody(202, 5.0);
    let third = melody(303, 5.0);
    write_wav(&library.join("first.wav"), &[&first]);
    write_wav(&library.join("nested").join("second.WAV"), &[&second]);
    write_wav(&library.join("third.wav"), &[&third]);
    std::fs::write(library.join("cover.jpg"), b"not audio").unwrap();

    let extensions = vec!["wav".to_string()];
    {
        let mut db = Database::open(&db_path).unwrap();
        let mut pipeline = FingerprintPipeline::new(
            &mut db,
            SymphoniaDecoder::new(),
            LoftyTagReader::new(),
            Fingerprinter::new(config()).unwrap(),
            options(),
        )
        .unwrap();

        let report = pipeline
            .fingerprint_directory(&library, &extensions, None)
            .await
            .unwrap();
        assert_eq!(report.fingerprinted, 3);
        assert_eq!(report.failed, 0);
    }

    // A second run against the reopened index writes nothing.
    {
        let mut db = Database::open(&db_path).unwrap();
        let mut pipeline = FingerprintPipeline::new(
            &mut db,
            SymphoniaDecoder::new(),
            LoftyTagReader::new(),
            Fingerprinter::new(config()).unwrap(),
            options(),
        )
        .unwrap();
        let report = pipeline
            .fingerprint_directory(&library, &extensions, None)
            .await
            .unwrap();
        assert_eq!(report.fingerprinted, 0);
        assert_eq!(report.skipped_known, 3);
    }

    let db = Database::open(&db_path).unwrap();
    assert_eq!(db.song_count().unwrap(), 3);
    let songs = db.list_songs().unwrap();
    let titles: Vec<&str> = songs.iter().map(|s| s.title.as_str()).collect();
    assert!(titles.contains(&"first"));
    assert!(titles.contains(&"second"));

    // Left channel: `second` from frame 9 on. Right: the opening of `third`.
    let fingerprinter = Fingerprinter::new(config()).unwrap();
    let start = 9 * fingerprinter.hop();
    let query_path = temp_dir.path().join("query.wav");
    write_wav(
        &query_path,
        &[&second[start..start + 3 * RATE as usize], &third[..3 * RATE as usize]],
    );

    let decoder = SymphoniaDecoder::new();
    let recognizer = Recognizer::new(&db, fingerprinter);
    let result = recognizer
        .recognize(&FileSource::new(&decoder, &query_path, None))
        .unwrap()
        .unwrap();

    assert_eq!(result.song_name, "second");
    assert_eq!(result.offset, 9);
    assert_eq!(result.recommendation.song_name, "third");
    assert!(result.confidence > 0.0 && result.confidence <= 1.0);
}

#[tokio::test]
async fn test_corrupt_file_is_skipped() {
    let temp_dir = TempDir::new().unwrap();
    write_wav(&temp_dir.path().join("good.wav"), &[&melody(7, 3.0)]);
    std::fs::write(temp_dir.path().join("bad.wav"), b"RIFF....garbage").unwrap();

    let mut db = Database::open(temp_dir.path().join("refrain.db")).unwrap();
    let mut pipeline = FingerprintPipeline::new(
        &mut db,
        SymphoniaDecoder::new(),
        LoftyTagReader::new(),
        Fingerprinter::new(config()).unwrap(),
        options(),
    )
    .unwrap();

    let report = pipeline
        .fingerprint_directory(temp_dir.path(), &["wav".to_string()], None)
        .await
        .unwrap();
    assert_eq!(report.fingerprinted, 1);
    assert_eq!(report.failed, 1);
    drop(pipeline);

    assert_eq!(db.song_count().unwrap(), 1);
    assert!(db.list_songs().unwrap().iter().all(|s| s.fingerprinted));
}

#[test]
fn test_status_on_empty_database() {
    let temp_dir = TempDir::new().unwrap();
    let db = Database::open(temp_dir.path().join("refrain.db")).unwrap();
    assert_eq!(db.song_count().unwrap(), 0);
    assert_eq!(db.fingerprint_count().unwrap(), 0);
}
