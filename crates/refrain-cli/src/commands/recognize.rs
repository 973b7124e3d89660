use anyhow::{Context, Result};
use refrain_core::schema::Database;
use refrain_engine::{
    best_recommendation, Config, FileSource, Fingerprinter, RecognitionResult, Recognizer,
    SymphoniaDecoder,
};
use std::path::PathBuf;

pub fn run_recognize(config: &Config, files: &[PathBuf], json: bool) -> Result<()> {
    let db = Database::open(&config.database_path)
        .with_context(|| format!("Failed to open {}", config.database_path.display()))?;
    let decoder = SymphoniaDecoder::new();
    let recognizer = Recognizer::new(&db, Fingerprinter::new(config.fingerprint.clone())?);
    let limit = config.fingerprint_limit();

    let mut results = Vec::new();
    for file in files {
        let source = FileSource::new(&decoder, file, limit);
        match recognizer.recognize(&source) {
            Ok(Some(result)) => {
                if !json {
                    print_result(file, &result);
                }
                results.push(result);
            }
            Ok(None) => {
                if !json {
                    println!("{}: no match", file.display());
                }
            }
            Err(e) => {
                log::error!("Failed to recognize {}: {}", file.display(), e);
            }
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    if results.len() > 1 {
        if let Some(best) = best_recommendation(&results) {
            println!(
                "\nYou might also like: {} by {} ({:.1}%)",
                best.song_name,
                display_or(&best.song_author, "unknown artist"),
                best.confidence * 100.0
            );
        }
    }

    Ok(())
}

fn print_result(file: &std::path::Path, result: &RecognitionResult) {
    println!("{}", file.display());
    println!(
        "  ✓ {} by {} ({:.1}% confidence)",
        result.song_name,
        display_or(&result.song_author, "unknown artist"),
        result.confidence * 100.0
    );
    if !result.song_genre.is_empty() {
        println!("    Genre: {}", result.song_genre);
    }
    println!(
        "    Offset: {}s ({} frames), matched in {:.3}s",
        result.offset_seconds, result.offset, result.match_time
    );
    println!(
        "    Recommendation: {} by {}",
        result.recommendation.song_name,
        display_or(&result.recommendation.song_author, "unknown artist")
    );
}

fn display_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.is_empty() {
        fallback
    } else {
        value
    }
}
