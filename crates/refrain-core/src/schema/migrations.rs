/// A schema migration.
#[derive(Debug)]
pub struct Migration {
    pub version: u32,
    pub name: &'static str,
    pub sql: &'static str,
}

const MIGRATION_001: &str = r#"
-- Songs: one row per distinct source content
CREATE TABLE IF NOT EXISTS songs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    artist TEXT NOT NULL DEFAULT '',
    genre TEXT NOT NULL DEFAULT '',
    content_hash TEXT NOT NULL UNIQUE,
    fingerprinted INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_songs_fingerprinted ON songs(fingerprinted);

-- Landmark-pair hashes. The unique index doubles as the lookup index on hash.
CREATE TABLE IF NOT EXISTS fingerprints (
    hash BLOB NOT NULL,
    song_id INTEGER NOT NULL REFERENCES songs(id) ON DELETE CASCADE,
    frame_offset INTEGER NOT NULL,
    UNIQUE (hash, song_id, frame_offset)
);

CREATE INDEX IF NOT EXISTS idx_fingerprints_song_id ON fingerprints(song_id);
"#;

pub const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial_schema",
    sql: MIGRATION_001,
}];
