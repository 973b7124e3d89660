use anyhow::Result;
use refrain_core::schema::Database;
use refrain_core::FingerprintStore;
use refrain_engine::Config;

pub fn show_status(config: &Config, list_songs: bool) -> Result<()> {
    let db = Database::open(&config.database_path)?;

    let songs = db.song_count()?;
    let hashes = db.fingerprint_count()?;

    println!("\nRefrain Status\n");
    println!("  Database: {}", config.database_path.display());
    println!("  Fingerprinted songs: {songs}");
    println!("  Stored hashes: {hashes}");

    if songs == 0 {
        println!("\n  Run `refrain fingerprint <dir>` to build the index");
        return Ok(());
    }

    if list_songs {
        println!();
        for song in db.list_songs()?.iter().filter(|s| s.fingerprinted) {
            let artist = if song.artist.is_empty() {
                "unknown artist"
            } else {
                song.artist.as_str()
            };
            println!("  {:>5}  {} - {}", song.id.get(), artist, song.title);
        }
    }

    Ok(())
}
