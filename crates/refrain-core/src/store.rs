//! The storage contract the fingerprinting engine relies on.

use std::collections::HashSet;

use crate::error::Result;
use crate::model::{Fingerprint, HashMatch, SongId, SongRecord};

/// Persists songs and their fingerprint hashes, and answers hash queries.
///
/// Stores do not deduplicate songs on their own: callers check
/// `content_hash` against [`FingerprintStore::fingerprinted_hashes`] before
/// calling [`FingerprintStore::insert_song`]. Re-inserting an identical
/// `(hash, song_id, offset)` triple is a no-op.
///
/// All mutation goes through a single writer, so implementations need no
/// internal write locking.
pub trait FingerprintStore {
    /// Prepare the backing storage (tables, indexes). Idempotent.
    fn setup(&mut self) -> Result<()>;

    /// All songs, fingerprinted or not, ordered by id.
    fn list_songs(&self) -> Result<Vec<SongRecord>>;

    /// Create a new, not yet fingerprinted, song and return its id.
    fn insert_song(
        &mut self,
        title: &str,
        artist: &str,
        genre: &str,
        content_hash: &str,
    ) -> Result<SongId>;

    /// Bulk insert the hashes of a song, ignoring triples already present.
    fn insert_hashes(&mut self, song_id: SongId, hashes: &[Fingerprint]) -> Result<()>;

    /// Flag a song as completely fingerprinted.
    fn mark_fingerprinted(&mut self, song_id: SongId) -> Result<()>;

    fn get_song(&self, song_id: SongId) -> Result<Option<SongRecord>>;

    /// Look up every query hash and return one [`HashMatch`] per
    /// (stored occurrence, query occurrence) pair sharing a hash value.
    fn match_hashes(&self, query: &[Fingerprint]) -> Result<Vec<HashMatch>>;

    /// Remove songs that were never flagged as fingerprinted, together with
    /// any hashes already written for them. Returns the number removed.
    fn delete_unfingerprinted(&mut self) -> Result<usize>;

    /// Number of fingerprinted songs.
    fn song_count(&self) -> Result<usize>;

    /// Number of stored hash records.
    fn fingerprint_count(&self) -> Result<usize>;

    /// Content hashes of every fingerprinted song.
    fn fingerprinted_hashes(&self) -> Result<HashSet<String>> {
        Ok(self
            .list_songs()?
            .into_iter()
            .filter(|song| song.fingerprinted)
            .map(|song| song.content_hash)
            .collect())
    }
}
