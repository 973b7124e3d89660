use anyhow::{Context, Result};
use refrain_core::schema::Database;
use refrain_engine::{
    find_files, Config, FingerprintPipeline, Fingerprinter, LoftyTagReader, PipelineOptions,
    PipelineReport, SourceOutcome, SymphoniaDecoder,
};
use std::path::PathBuf;
use tokio::sync::watch;

pub async fn run_fingerprint(config: &Config, paths: Vec<PathBuf>) -> Result<()> {
    let mut sources = Vec::new();
    for path in paths {
        if path.is_dir() {
            let found = find_files(&path, &config.extensions);
            log::info!("{} audio file(s) under {}", found.len(), path.display());
            sources.extend(found);
        } else if path.is_file() {
            sources.push(path);
        } else {
            log::warn!("Skipping {}: not a file or directory", path.display());
        }
    }

    if sources.is_empty() {
        println!("No audio files to fingerprint");
        return Ok(());
    }

    let mut db = Database::open(&config.database_path)
        .with_context(|| format!("Failed to open {}", config.database_path.display()))?;
    let fingerprinter = Fingerprinter::new(config.fingerprint.clone())?;
    let mut pipeline = FingerprintPipeline::new(
        &mut db,
        SymphoniaDecoder::new(),
        LoftyTagReader::new(),
        fingerprinter,
        PipelineOptions::from_config(config),
    )?;

    if let [source] = sources.as_slice() {
        match pipeline.fingerprint_file(source)? {
            SourceOutcome::Fingerprinted(id) => {
                println!("✓ Fingerprinted {} (song {})", source.display(), id);
            }
            SourceOutcome::AlreadyKnown => {
                println!("Already fingerprinted: {}", source.display());
            }
            SourceOutcome::Failed(e) => {
                anyhow::bail!("Failed to fingerprint {}: {}", source.display(), e);
            }
        }
        return Ok(());
    }

    println!("Fingerprinting {} file(s)...", sources.len());

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nInterrupted: finishing files in progress...");
            if cancel_tx.send(true).is_err() {
                log::debug!("Pipeline already finished");
            }
        }
    });

    let report = pipeline.run(sources, Some(cancel_rx)).await?;
    print_report(&report);

    Ok(())
}

fn print_report(report: &PipelineReport) {
    println!("\nFingerprint Summary");
    println!("  Fingerprinted: {}", report.fingerprinted);
    println!("  Already known: {}", report.skipped_known);
    println!("  Failed:        {}", report.failed);
    if report.cancelled > 0 {
        println!("  Cancelled:     {}", report.cancelled);
    }
    if report.failed > 0 {
        println!("\n  Failed files were skipped; run with logging.level = \"warn\" or lower for details");
    }
}
