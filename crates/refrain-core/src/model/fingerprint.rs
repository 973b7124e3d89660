use serde::{Deserialize, Serialize};

use crate::model::ids::SongId;

/// A landmark-pair hash and the frame offset of the pair's first landmark.
///
/// Hash values are truncated digests, so the same value may appear for
/// unrelated songs. Ordering is by hash bytes, then offset.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Fingerprint {
    pub hash: Vec<u8>,
    pub offset: u32,
}

impl Fingerprint {
    #[must_use]
    pub fn new(hash: Vec<u8>, offset: u32) -> Self {
        Self { hash, offset }
    }
}

/// A stored hash that also occurs in a query, already differenced.
///
/// `diff` is `stored offset - query offset`, in frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HashMatch {
    pub song_id: SongId,
    pub diff: i64,
}

impl HashMatch {
    #[must_use]
    pub const fn new(song_id: SongId, diff: i64) -> Self {
        Self { song_id, diff }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_ordering() {
        let a = Fingerprint::new(vec![1, 2], 9);
        let b = Fingerprint::new(vec![1, 3], 0);
        let c = Fingerprint::new(vec![1, 3], 4);
        assert!(a < b);
        assert!(b < c);
    }
}
