use refrain_core::FingerprintStore;
use std::collections::HashSet;

/// Content hashes of the sources a store has already fingerprinted.
///
/// Owned by one pipeline run. It is loaded once when the run starts and
/// only changes when [`KnownContent::refresh`] is called after a write;
/// writes made by other processes are not seen until then.
#[derive(Debug, Default, Clone)]
pub struct KnownContent {
    hashes: HashSet<String>,
}

impl KnownContent {
    pub fn load<S: FingerprintStore + ?Sized>(store: &S) -> refrain_core::Result<Self> {
        let hashes = store.fingerprinted_hashes()?;
        log::debug!("Loaded {} known content hash(es)", hashes.len());
        Ok(Self { hashes })
    }

    /// Re-read the set from `store`.
    pub fn refresh<S: FingerprintStore + ?Sized>(&mut self, store: &S) -> refrain_core::Result<()> {
        self.hashes = store.fingerprinted_hashes()?;
        Ok(())
    }

    pub fn contains(&self, content_hash: &str) -> bool {
        self.hashes.contains(content_hash)
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use refrain_core::{Fingerprint, MemoryStore};

    #[test]
    fn test_only_fingerprinted_songs_are_known() {
        let mut store = MemoryStore::new();
        let done = store.insert_song("Done", "", "", "aaa").unwrap();
        store
            .insert_hashes(done, &[Fingerprint::new(vec![1, 2], 0)])
            .unwrap();
        store.mark_fingerprinted(done).unwrap();
        store.insert_song("Half", "", "", "bbb").unwrap();

        let known = KnownContent::load(&store).unwrap();
        assert!(known.contains("aaa"));
        assert!(!known.contains("bbb"));
        assert_eq!(known.len(), 1);
    }

    #[test]
    fn test_refresh_sees_new_writes() {
        let mut store = MemoryStore::new();
        let mut known = KnownContent::load(&store).unwrap();
        assert!(known.is_empty());

        let id = store.insert_song("New", "", "", "ccc").unwrap();
        store.mark_fingerprinted(id).unwrap();
        assert!(!known.contains("ccc"));

        known.refresh(&store).unwrap();
        assert!(known.contains("ccc"));
    }
}
