//! # Refrain
//!
//! Content-based audio identification.
//!
//! Refrain fingerprints an audio library into a SQLite index of landmark
//! hashes and identifies short excerpts against it, reporting the song,
//! where in the song the excerpt starts, and a second-best recommendation.
//! Re-running over the same library only fingerprints content it has not
//! seen before.
