use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{Error, Result};
use crate::model::{Fingerprint, HashMatch, SongId, SongRecord};
use crate::store::FingerprintStore;

use super::migrations::MIGRATIONS;

const SONG_COLUMNS: &str = "id, title, artist, genre, content_hash, fingerprinted, created_at";

/// A SQLite-backed [`FingerprintStore`].
#[derive(Debug)]
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) a database at the given path and apply migrations.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)
            .map_err(|e| Error::Unavailable(format!("{}: {e}", path.display())))?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database (for tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        let mut db = Self { conn };
        db.setup()?;
        Ok(db)
    }

    /// Get a reference to the underlying connection (for advanced queries).
    #[must_use]
    pub const fn conn(&self) -> &Connection {
        &self.conn
    }

    fn apply_migrations(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            )",
            [],
        )?;

        let mut stmt = self
            .conn
            .prepare("SELECT version FROM schema_migrations ORDER BY version")?;
        let applied: Vec<u32> = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        for migration in MIGRATIONS {
            if !applied.contains(&migration.version) {
                log::info!(
                    "Applying migration {} ({})",
                    migration.version,
                    migration.name
                );
                self.conn.execute_batch(migration.sql)?;
                self.conn.execute(
                    "INSERT INTO schema_migrations (version, name) VALUES (?1, ?2)",
                    rusqlite::params![migration.version, migration.name],
                )?;
            }
        }

        Ok(())
    }

    fn row_to_song(row: &rusqlite::Row) -> rusqlite::Result<SongRecord> {
        let created_at_str: String = row.get(6)?;
        let created_at = DateTime::parse_from_rfc3339(&created_at_str)
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e))
            })?
            .with_timezone(&Utc);

        Ok(SongRecord {
            id: SongId::new(row.get(0)?),
            title: row.get(1)?,
            artist: row.get(2)?,
            genre: row.get(3)?,
            content_hash: row.get(4)?,
            fingerprinted: row.get(5)?,
            created_at,
        })
    }

    fn count(&self, sql: &str) -> Result<usize> {
        let count: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
        usize::try_from(count).map_err(|_| Error::InvalidData(format!("negative count {count}")))
    }
}

impl FingerprintStore for Database {
    fn setup(&mut self) -> Result<()> {
        self.apply_migrations()
    }

    fn list_songs(&self) -> Result<Vec<SongRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {SONG_COLUMNS} FROM songs ORDER BY id"))?;
        let songs = stmt
            .query_map([], Self::row_to_song)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(songs)
    }

    fn insert_song(
        &mut self,
        title: &str,
        artist: &str,
        genre: &str,
        content_hash: &str,
    ) -> Result<SongId> {
        self.conn.execute(
            "INSERT INTO songs (title, artist, genre, content_hash, fingerprinted, created_at)
             VALUES (?1, ?2, ?3, ?4, 0, ?5)",
            rusqlite::params![title, artist, genre, content_hash, Utc::now().to_rfc3339()],
        )?;
        Ok(SongId::new(self.conn.last_insert_rowid()))
    }

    fn insert_hashes(&mut self, song_id: SongId, hashes: &[Fingerprint]) -> Result<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR IGNORE INTO fingerprints (hash, song_id, frame_offset)
                 VALUES (?1, ?2, ?3)",
            )?;
            for fp in hashes {
                stmt.execute(rusqlite::params![
                    fp.hash.as_slice(),
                    song_id.get(),
                    i64::from(fp.offset)
                ])?;
            }
        }
        tx.commit()?;
        log::debug!("Stored {} hashes for song {}", hashes.len(), song_id);
        Ok(())
    }

    fn mark_fingerprinted(&mut self, song_id: SongId) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE songs SET fingerprinted = 1 WHERE id = ?1",
            [song_id.get()],
        )?;
        if updated == 0 {
            return Err(Error::NotFound {
                entity: "song",
                id: song_id.to_string(),
            });
        }
        Ok(())
    }

    fn get_song(&self, song_id: SongId) -> Result<Option<SongRecord>> {
        let song = self
            .conn
            .query_row(
                &format!("SELECT {SONG_COLUMNS} FROM songs WHERE id = ?1"),
                [song_id.get()],
                Self::row_to_song,
            )
            .optional()?;
        Ok(song)
    }

    fn match_hashes(&self, query: &[Fingerprint]) -> Result<Vec<HashMatch>> {
        let mut offsets_by_hash: BTreeMap<&[u8], Vec<u32>> = BTreeMap::new();
        for fp in query {
            offsets_by_hash
                .entry(fp.hash.as_slice())
                .or_default()
                .push(fp.offset);
        }

        let mut stmt = self
            .conn
            .prepare_cached("SELECT song_id, frame_offset FROM fingerprints WHERE hash = ?1")?;

        let mut matches = Vec::new();
        for (hash, query_offsets) in &offsets_by_hash {
            let rows = stmt.query_map([*hash], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
            })?;
            for row in rows {
                let (song_id, stored_offset) = row?;
                for &query_offset in query_offsets {
                    matches.push(HashMatch::new(
                        SongId::new(song_id),
                        stored_offset - i64::from(query_offset),
                    ));
                }
            }
        }

        Ok(matches)
    }

    fn delete_unfingerprinted(&mut self) -> Result<usize> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM fingerprints
             WHERE song_id IN (SELECT id FROM songs WHERE fingerprinted = 0)",
            [],
        )?;
        let removed = tx.execute("DELETE FROM songs WHERE fingerprinted = 0", [])?;
        tx.commit()?;
        if removed > 0 {
            log::info!("Removed {} unfinished songs", removed);
        }
        Ok(removed)
    }

    fn song_count(&self) -> Result<usize> {
        self.count("SELECT COUNT(*) FROM songs WHERE fingerprinted = 1")
    }

    fn fingerprint_count(&self) -> Result<usize> {
        self.count("SELECT COUNT(*) FROM fingerprints")
    }
}
