//! An in-process [`FingerprintStore`].

use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::error::{Error, Result};
use crate::model::{Fingerprint, HashMatch, SongId, SongRecord};
use crate::store::FingerprintStore;

/// Keeps songs and the hash index in memory. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    songs: BTreeMap<SongId, SongRecord>,
    index: HashMap<Vec<u8>, BTreeSet<(SongId, u32)>>,
    next_id: i64,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn remove_hashes_of(&mut self, song_id: SongId) {
        self.index.retain(|_, entries| {
            entries.retain(|(id, _)| *id != song_id);
            !entries.is_empty()
        });
    }
}

impl FingerprintStore for MemoryStore {
    fn setup(&mut self) -> Result<()> {
        Ok(())
    }

    fn list_songs(&self) -> Result<Vec<SongRecord>> {
        Ok(self.songs.values().cloned().collect())
    }

    fn insert_song(
        &mut self,
        title: &str,
        artist: &str,
        genre: &str,
        content_hash: &str,
    ) -> Result<SongId> {
        if self.songs.values().any(|s| s.content_hash == content_hash) {
            return Err(Error::InvalidData(format!(
                "duplicate content hash {content_hash}"
            )));
        }

        self.next_id += 1;
        let id = SongId::new(self.next_id);
        self.songs.insert(
            id,
            SongRecord {
                id,
                title: title.to_string(),
                artist: artist.to_string(),
                genre: genre.to_string(),
                content_hash: content_hash.to_string(),
                fingerprinted: false,
                created_at: Utc::now(),
            },
        );
        Ok(id)
    }

    fn insert_hashes(&mut self, song_id: SongId, hashes: &[Fingerprint]) -> Result<()> {
        if !self.songs.contains_key(&song_id) {
            return Err(Error::NotFound {
                entity: "song",
                id: song_id.to_string(),
            });
        }
        for fp in hashes {
            self.index
                .entry(fp.hash.clone())
                .or_default()
                .insert((song_id, fp.offset));
        }
        Ok(())
    }

    fn mark_fingerprinted(&mut self, song_id: SongId) -> Result<()> {
        let song = self.songs.get_mut(&song_id).ok_or_else(|| Error::NotFound {
            entity: "song",
            id: song_id.to_string(),
        })?;
        song.fingerprinted = true;
        Ok(())
    }

    fn get_song(&self, song_id: SongId) -> Result<Option<SongRecord>> {
        Ok(self.songs.get(&song_id).cloned())
    }

    fn match_hashes(&self, query: &[Fingerprint]) -> Result<Vec<HashMatch>> {
        let mut matches = Vec::new();
        for fp in query {
            if let Some(entries) = self.index.get(&fp.hash) {
                matches.extend(entries.iter().map(|&(song_id, stored_offset)| {
                    HashMatch::new(song_id, i64::from(stored_offset) - i64::from(fp.offset))
                }));
            }
        }
        Ok(matches)
    }

    fn delete_unfingerprinted(&mut self) -> Result<usize> {
        let unfinished: Vec<SongId> = self
            .songs
            .values()
            .filter(|s| !s.fingerprinted)
            .map(|s| s.id)
            .collect();
        for id in &unfinished {
            self.songs.remove(id);
            self.remove_hashes_of(*id);
        }
        Ok(unfinished.len())
    }

    fn song_count(&self) -> Result<usize> {
        Ok(self.songs.values().filter(|s| s.fingerprinted).count())
    }

    fn fingerprint_count(&self) -> Result<usize> {
        Ok(self.index.values().map(BTreeSet::len).sum())
    }
}
