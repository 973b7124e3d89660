//! Concurrent fingerprinting of many sources into one store.
//!
//! Decoding and hashing run on a bounded pool of blocking workers; every
//! store mutation happens on the coordinator, one source at a time. A
//! source's write is `insert_song`, `insert_hashes`, then
//! `mark_fingerprinted`. A source interrupted part way is left unflagged,
//! purged when the next pipeline starts, and fingerprinted again.

use refrain_core::{Fingerprint, FingerprintStore, SongId};
use serde::Serialize;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Semaphore};

use crate::audio::{find_files, Decoder, TagReader};
use crate::cache::KnownContent;
use crate::config::{default_workers, Config};
use crate::error::{FingerprintError, PipelineError};
use crate::fingerprint::Fingerprinter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Maximum number of sources decoded and hashed at once.
    pub workers: usize,
    /// Give up on a source that takes longer than this.
    pub task_timeout: Option<Duration>,
    /// Only fingerprint the first part of each source.
    pub limit: Option<Duration>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            task_timeout: None,
            limit: None,
        }
    }
}

impl PipelineOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            workers: config.worker_count(),
            task_timeout: config.task_timeout(),
            limit: config.fingerprint_limit(),
        }
    }
}

/// Everything needed to write one source to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FingerprintedSource {
    pub path: PathBuf,
    pub title: String,
    pub artist: String,
    pub genre: String,
    pub content_hash: String,
    pub hashes: Vec<Fingerprint>,
}

/// What happened to a single source.
#[derive(Debug)]
pub enum SourceOutcome {
    Fingerprinted(SongId),
    AlreadyKnown,
    Failed(FingerprintError),
}

/// Counts for one pipeline run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PipelineReport {
    pub fingerprinted: usize,
    pub skipped_known: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl PipelineReport {
    pub fn total(&self) -> usize {
        self.fingerprinted + self.skipped_known + self.failed + self.cancelled
    }

    fn record(&mut self, path: &Path, outcome: &SourceOutcome) {
        log_outcome(path, outcome);
        match outcome {
            SourceOutcome::Fingerprinted(_) => self.fingerprinted += 1,
            SourceOutcome::AlreadyKnown => self.skipped_known += 1,
            SourceOutcome::Failed(FingerprintError::Cancelled) => self.cancelled += 1,
            SourceOutcome::Failed(_) => self.failed += 1,
        }
    }
}

fn log_outcome(path: &Path, outcome: &SourceOutcome) {
    match outcome {
        SourceOutcome::Fingerprinted(id) => {
            log::info!("Fingerprinted {} as song {}", path.display(), id);
        }
        SourceOutcome::AlreadyKnown => {
            log::debug!("Skipping {}: already fingerprinted", path.display());
        }
        SourceOutcome::Failed(FingerprintError::Cancelled) => {
            log::debug!("Cancelled {}", path.display());
        }
        SourceOutcome::Failed(e @ FingerprintError::Worker(_)) => {
            log::error!("Fingerprinting {} failed: {}", path.display(), e);
        }
        SourceOutcome::Failed(e) => {
            log::warn!("Skipping {}: {}", path.display(), e);
        }
    }
}

/// Decode, tag and fingerprint one source without touching any store.
///
/// When the tags carry no title the file stem is used instead.
pub fn fingerprint_source<D, T>(
    decoder: &D,
    tags: &T,
    fingerprinter: &Fingerprinter,
    path: &Path,
    limit: Option<Duration>,
) -> Result<FingerprintedSource, FingerprintError>
where
    D: Decoder + ?Sized,
    T: TagReader + ?Sized,
{
    let audio = decoder.decode(path, limit)?;
    log::debug!(
        "Decoded {} ({:.1}s, {} channel(s) at {} Hz)",
        path.display(),
        audio.duration_secs(),
        audio.channels.len(),
        audio.sample_rate
    );
    let tags = tags.read_tags(path);
    let hashes: Vec<Fingerprint> = fingerprinter
        .fingerprint_channels(&audio.channels)
        .into_iter()
        .collect();

    let title = tags.title.unwrap_or_else(|| {
        path.file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default()
    });

    Ok(FingerprintedSource {
        path: path.to_path_buf(),
        title,
        artist: tags.artist.unwrap_or_default(),
        genre: tags.genre.unwrap_or_default(),
        content_hash: audio.content_hash,
        hashes,
    })
}

type TaskResult = Result<Option<FingerprintedSource>, FingerprintError>;

/// Hash the source's bytes and, unless that content is already known,
/// fingerprint it.
fn process_source<D, T>(
    decoder: &D,
    tags: &T,
    fingerprinter: &Fingerprinter,
    known: &KnownContent,
    path: &Path,
    limit: Option<Duration>,
) -> TaskResult
where
    D: Decoder + ?Sized,
    T: TagReader + ?Sized,
{
    let content_hash = decoder.content_hash(path)?;
    if known.contains(&content_hash) {
        return Ok(None);
    }
    fingerprint_source(decoder, tags, fingerprinter, path, limit).map(Some)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| (*message).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "worker panicked".to_string())
}

/// Fingerprints sources into a store, skipping content it already holds.
pub struct FingerprintPipeline<'a, S: ?Sized, D, T> {
    store: &'a mut S,
    decoder: Arc<D>,
    tags: Arc<T>,
    fingerprinter: Arc<Fingerprinter>,
    options: PipelineOptions,
    known: KnownContent,
}

impl<S: ?Sized, D, T> fmt::Debug for FingerprintPipeline<'_, S, D, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FingerprintPipeline")
            .field("options", &self.options)
            .field("known", &self.known.len())
            .finish_non_exhaustive()
    }
}

impl<'a, S, D, T> FingerprintPipeline<'a, S, D, T>
where
    S: FingerprintStore + ?Sized,
    D: Decoder + 'static,
    T: TagReader + 'static,
{
    /// Prepare `store`, drop songs an earlier run left unfinished and load
    /// the known content hashes.
    pub fn new(
        store: &'a mut S,
        decoder: D,
        tags: T,
        fingerprinter: Fingerprinter,
        options: PipelineOptions,
    ) -> Result<Self, PipelineError> {
        store.setup()?;

        let purged = store.delete_unfingerprinted()?;
        if purged > 0 {
            log::warn!("Removed {purged} song(s) left unfinished by an earlier run");
        }

        let known = KnownContent::load(&*store)?;

        Ok(Self {
            store,
            decoder: Arc::new(decoder),
            tags: Arc::new(tags),
            fingerprinter: Arc::new(fingerprinter),
            options,
            known,
        })
    }

    pub fn known(&self) -> &KnownContent {
        &self.known
    }

    /// Fingerprint one source on the calling thread.
    ///
    /// A panic while decoding or hashing is caught and reported as
    /// [`FingerprintError::Worker`], the same as on the worker pool.
    pub fn fingerprint_file(&mut self, path: &Path) -> Result<SourceOutcome, PipelineError> {
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            process_source(
                &*self.decoder,
                &*self.tags,
                &self.fingerprinter,
                &self.known,
                path,
                self.options.limit,
            )
        }))
        .unwrap_or_else(|payload| Err(FingerprintError::Worker(panic_message(&*payload))));

        let outcome = match result {
            Ok(Some(source)) => self.commit(source)?,
            Ok(None) => SourceOutcome::AlreadyKnown,
            Err(e) => SourceOutcome::Failed(e),
        };

        log_outcome(path, &outcome);
        Ok(outcome)
    }

    /// Fingerprint every matching file under `dir`.
    pub async fn fingerprint_directory(
        &mut self,
        dir: &Path,
        extensions: &[String],
        cancel: Option<watch::Receiver<bool>>,
    ) -> Result<PipelineReport, PipelineError> {
        let sources = find_files(dir, extensions);
        log::info!("Found {} source(s) in {}", sources.len(), dir.display());
        self.run(sources, cancel).await
    }

    /// Fingerprint `sources` on the worker pool.
    ///
    /// Results are written in completion order. Per-source failures are
    /// logged and counted; a store error stops the run and is returned.
    /// Once `cancel` turns `true`, sources that have not started are
    /// counted as cancelled while sources already in flight finish and are
    /// written.
    pub async fn run(
        &mut self,
        sources: Vec<PathBuf>,
        cancel: Option<watch::Receiver<bool>>,
    ) -> Result<PipelineReport, PipelineError> {
        let mut report = PipelineReport::default();
        if sources.is_empty() {
            return Ok(report);
        }

        let workers = self.options.workers.max(1);
        log::info!(
            "Fingerprinting {} source(s) with {} worker(s)",
            sources.len(),
            workers
        );

        // Closing the semaphore is the cancellation signal for workers.
        let semaphore = Arc::new(Semaphore::new(workers));
        let watcher = cancel.map(|signal| {
            if *signal.borrow() {
                semaphore.close();
            }
            tokio::spawn(watch_cancellation(signal, Arc::clone(&semaphore)))
        });

        let known = Arc::new(self.known.clone());
        let (tx, mut rx) = mpsc::channel::<(PathBuf, TaskResult)>(workers);
        for path in sources {
            self.spawn_task(path, Arc::clone(&known), Arc::clone(&semaphore), tx.clone());
        }
        drop(tx);

        let drained = self.drain(&mut rx, &mut report).await;
        if let Some(watcher) = watcher {
            watcher.abort();
        }
        if drained.is_err() {
            // Queued tasks stop at the closed semaphore; their sends fail
            // once `rx` is dropped.
            semaphore.close();
        }
        drained?;

        log::info!(
            "Pipeline finished: {} fingerprinted, {} already known, {} failed, {} cancelled",
            report.fingerprinted,
            report.skipped_known,
            report.failed,
            report.cancelled
        );
        Ok(report)
    }

    fn spawn_task(
        &self,
        path: PathBuf,
        known: Arc<KnownContent>,
        semaphore: Arc<Semaphore>,
        tx: mpsc::Sender<(PathBuf, TaskResult)>,
    ) {
        let decoder = Arc::clone(&self.decoder);
        let tags = Arc::clone(&self.tags);
        let fingerprinter = Arc::clone(&self.fingerprinter);
        let limit = self.options.limit;
        let timeout = self.options.task_timeout;

        tokio::spawn(async move {
            let result = match Arc::clone(&semaphore).acquire_owned().await {
                Err(_) => Err(FingerprintError::Cancelled),
                Ok(_) if semaphore.is_closed() => Err(FingerprintError::Cancelled),
                Ok(permit) => {
                    let task_path = path.clone();
                    let work = tokio::task::spawn_blocking(move || -> TaskResult {
                        // Held until the work itself ends, even past a timeout.
                        let _permit = permit;
                        process_source(&*decoder, &*tags, &fingerprinter, &known, &task_path, limit)
                    });

                    let joined = match timeout {
                        Some(after) => tokio::time::timeout(after, work)
                            .await
                            .map_err(|_| FingerprintError::TimedOut(after)),
                        None => Ok(work.await),
                    };
                    match joined {
                        Ok(Ok(result)) => result,
                        Ok(Err(e)) => Err(FingerprintError::Worker(e.to_string())),
                        Err(e) => Err(e),
                    }
                }
            };

            if tx.send((path, result)).await.is_err() {
                log::debug!("Pipeline coordinator stopped before a result was delivered");
            }
        });
    }

    async fn drain(
        &mut self,
        rx: &mut mpsc::Receiver<(PathBuf, TaskResult)>,
        report: &mut PipelineReport,
    ) -> Result<(), PipelineError> {
        while let Some((path, result)) = rx.recv().await {
            let outcome = match result {
                Ok(Some(source)) => self.commit(source)?,
                Ok(None) => SourceOutcome::AlreadyKnown,
                Err(e) => SourceOutcome::Failed(e),
            };
            report.record(&path, &outcome);
        }
        Ok(())
    }

    /// Write one source as a unit, unless its content became known while
    /// it was being fingerprinted.
    fn commit(&mut self, source: FingerprintedSource) -> Result<SourceOutcome, PipelineError> {
        if self.known.contains(&source.content_hash) {
            return Ok(SourceOutcome::AlreadyKnown);
        }

        let song_id = self.store.insert_song(
            &source.title,
            &source.artist,
            &source.genre,
            &source.content_hash,
        )?;
        self.store.insert_hashes(song_id, &source.hashes)?;
        self.store.mark_fingerprinted(song_id)?;
        self.known.refresh(&*self.store)?;

        log::debug!(
            "Stored {} hash(es) for {} ({})",
            source.hashes.len(),
            source.path.display(),
            source.content_hash
        );
        Ok(SourceOutcome::Fingerprinted(song_id))
    }
}

async fn watch_cancellation(mut signal: watch::Receiver<bool>, semaphore: Arc<Semaphore>) {
    if signal.wait_for(|&cancelled| cancelled).await.is_ok() {
        log::warn!("Cancellation requested; finishing sources in flight");
        semaphore.close();
    }
}
