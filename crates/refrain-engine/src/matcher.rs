//! Turns raw hash hits into a ranked, time-aligned identification.
//!
//! Two tallies are kept side by side. The `(diff, song)` cell with the most
//! hits locates the alignment point, while the per-song total across all
//! diffs decides which song is recognized. Ties are broken towards the
//! lower song id (and, for the alignment cell, the lower diff) so the
//! outcome never depends on the order the store returned its rows in.

use refrain_core::{HashMatch, SongId};
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};

/// A song's share of the query's matches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SongScore {
    pub song_id: SongId,
    /// Matches against this song, across every diff.
    pub matches: usize,
    /// `matches` divided by all matches of the query.
    pub confidence: f64,
}

/// The outcome of aligning a query against the index.
#[derive(Debug, Clone, PartialEq)]
pub struct Alignment {
    ranking: Vec<SongScore>,
    best_diff: i64,
    best_diff_count: usize,
    total_matches: usize,
}

/// Tally `matches` and rank the songs they point at.
///
/// Returns `None` when there are no matches at all.
pub fn align_matches(matches: impl IntoIterator<Item = HashMatch>) -> Option<Alignment> {
    let mut diff_counts: HashMap<(i64, SongId), usize> = HashMap::new();
    let mut song_totals: BTreeMap<SongId, usize> = BTreeMap::new();
    let mut total_matches = 0usize;

    for m in matches {
        total_matches += 1;
        *diff_counts.entry((m.diff, m.song_id)).or_default() += 1;
        *song_totals.entry(m.song_id).or_default() += 1;
    }

    let (&(best_diff, _), &best_diff_count) = diff_counts
        .iter()
        .max_by_key(|&(&(diff, song_id), &count)| (count, Reverse(song_id), Reverse(diff)))?;

    #[allow(clippy::cast_precision_loss)]
    let total = total_matches as f64;

    let mut ranking: Vec<SongScore> = song_totals
        .into_iter()
        .map(|(song_id, matches)| {
            #[allow(clippy::cast_precision_loss)]
            let confidence = matches as f64 / total;
            SongScore {
                song_id,
                matches,
                confidence,
            }
        })
        .collect();
    ranking.sort_by_key(|score| (Reverse(score.matches), score.song_id));

    Some(Alignment {
        ranking,
        best_diff,
        best_diff_count,
        total_matches,
    })
}

impl Alignment {
    /// The song with the most matches.
    pub fn recognized(&self) -> &SongScore {
        &self.ranking[0]
    }

    /// The runner-up, if a second distinct song matched.
    pub fn recommendation(&self) -> Option<&SongScore> {
        self.ranking.get(1)
    }

    /// Every matched song, best first.
    pub fn ranking(&self) -> &[SongScore] {
        &self.ranking
    }

    pub fn confidence(&self, song_id: SongId) -> f64 {
        self.ranking
            .iter()
            .find(|score| score.song_id == song_id)
            .map_or(0.0, |score| score.confidence)
    }

    /// Frame difference of the most populated `(diff, song)` cell.
    pub fn offset_frames(&self) -> i64 {
        self.best_diff
    }

    /// Hits in the most populated `(diff, song)` cell.
    pub fn offset_matches(&self) -> usize {
        self.best_diff_count
    }

    /// [`Alignment::offset_frames`] in seconds, rounded to five decimals.
    #[allow(clippy::cast_precision_loss)]
    pub fn offset_seconds(&self, hop: usize, sample_rate: u32) -> f64 {
        let seconds = self.best_diff as f64 * hop as f64 / f64::from(sample_rate);
        (seconds * 100_000.0).round() / 100_000.0
    }

    pub fn total_matches(&self) -> usize {
        self.total_matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hits(song: i64, diff: i64, count: usize) -> impl Iterator<Item = HashMatch> {
        std::iter::repeat(HashMatch::new(SongId::new(song), diff)).take(count)
    }

    #[test]
    fn test_no_matches() {
        assert!(align_matches(Vec::new()).is_none());
    }

    #[test]
    fn test_ranking_by_song_total() {
        let (a, b, c) = (1, 2, 3);
        let matches: Vec<HashMatch> = hits(a, 0, 50)
            .chain(hits(b, 4, 30))
            .chain(hits(c, 9, 40))
            .chain(hits(c, 11, 40))
            .collect();

        let alignment = align_matches(matches).unwrap();
        assert_eq!(alignment.recognized().song_id, SongId::new(c));
        assert_eq!(alignment.recognized().matches, 80);
        assert_eq!(alignment.recommendation().unwrap().song_id, SongId::new(a));
    }

    #[test]
    fn test_offset_comes_from_largest_cell_not_winner() {
        // Song 2 wins on totals, but song 1 owns the densest diff bucket.
        let matches: Vec<HashMatch> = hits(1, 17, 30)
            .chain(hits(2, 3, 20))
            .chain(hits(2, 5, 20))
            .collect();

        let alignment = align_matches(matches).unwrap();
        assert_eq!(alignment.recognized().song_id, SongId::new(2));
        assert_eq!(alignment.offset_frames(), 17);
        assert_eq!(alignment.offset_matches(), 30);
    }

    #[test]
    fn test_confidence_is_share_of_all_matches() {
        let matches: Vec<HashMatch> = hits(1, 0, 75).chain(hits(2, 0, 25)).collect();
        let alignment = align_matches(matches).unwrap();
        assert!((alignment.confidence(SongId::new(1)) - 0.75).abs() < 1e-12);
        assert!((alignment.confidence(SongId::new(2)) - 0.25).abs() < 1e-12);
        assert_eq!(alignment.confidence(SongId::new(9)), 0.0);
    }

    #[test]
    fn test_confidences_sum_to_one() {
        let matches: Vec<HashMatch> = hits(1, 0, 7)
            .chain(hits(2, 3, 13))
            .chain(hits(3, -2, 1))
            .chain(hits(4, 8, 29))
            .collect();
        let alignment = align_matches(matches).unwrap();
        let sum: f64 = alignment.ranking().iter().map(|s| s.confidence).sum();
        assert!((sum - 1.0).abs() < 1e-9);
        assert_eq!(alignment.total_matches(), 50);
    }

    #[test]
    fn test_equal_totals_prefer_lower_song_id() {
        let forward: Vec<HashMatch> = hits(8, 1, 10).chain(hits(3, 2, 10)).collect();
        let mut backward = forward.clone();
        backward.reverse();

        for matches in [forward, backward] {
            let alignment = align_matches(matches).unwrap();
            assert_eq!(alignment.recognized().song_id, SongId::new(3));
            assert_eq!(alignment.recommendation().unwrap().song_id, SongId::new(8));
            assert_eq!(alignment.offset_frames(), 2);
        }
    }

    #[test]
    fn test_single_song_has_no_recommendation() {
        let alignment = align_matches(hits(5, 12, 9).collect::<Vec<_>>()).unwrap();
        assert_eq!(alignment.recognized().song_id, SongId::new(5));
        assert!(alignment.recommendation().is_none());
        assert!((alignment.recognized().confidence - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_offset_seconds() {
        let alignment = align_matches(hits(1, 100, 1).collect::<Vec<_>>()).unwrap();
        // 100 frames * 2048 samples / 44100 Hz
        assert!((alignment.offset_seconds(2048, 44_100) - 4.64399).abs() < 1e-9);

        let negative = align_matches(hits(1, -3, 1).collect::<Vec<_>>()).unwrap();
        assert!((negative.offset_seconds(2048, 44_100) - (-0.13932)).abs() < 1e-9);
    }
}
