use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::SongId;

/// A catalogued recording.
///
/// Created the first time its `content_hash` is seen. Its fingerprint
/// hashes are inserted afterwards and only then is `fingerprinted` set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongRecord {
    pub id: SongId,

    /// Title from embedded tags, falling back to the source file name.
    pub title: String,

    /// Artist from embedded tags; empty when unknown.
    pub artist: String,

    /// Genre from embedded tags; empty when unknown.
    pub genre: String,

    /// Hex digest of the source's raw bytes. Unique per song.
    pub content_hash: String,

    /// Set once every hash of the song has been stored.
    pub fingerprinted: bool,

    pub created_at: DateTime<Utc>,
}
