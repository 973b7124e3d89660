pub mod fingerprint;
pub mod ids;
pub mod song;

pub use fingerprint::{Fingerprint, HashMatch};
pub use ids::SongId;
pub use song::SongRecord;
