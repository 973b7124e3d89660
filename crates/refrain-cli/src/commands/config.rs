use anyhow::Result;
use refrain_engine::{config, Config};
use std::path::PathBuf;

/// Show the current effective configuration.
pub fn show_config(db: Option<PathBuf>) -> Result<()> {
    let config = match db {
        Some(path) => Config::load_with_db_path(path)?,
        None => Config::load()?,
    };

    println!("Current Configuration");
    println!("=====================\n");

    println!("Config file: {}", config::config_file_path().display());

    let exists = config::config_file_path().exists();
    println!("File exists: {}\n", if exists { "yes" } else { "no (using defaults)" });

    let limit = config
        .fingerprint_limit()
        .map_or_else(|| "whole track".to_string(), |d| format!("{}s", d.as_secs()));
    let timeout = config
        .task_timeout()
        .map_or_else(|| "none".to_string(), |d| format!("{}s", d.as_secs()));

    println!("Settings:");
    println!("  database_path: {}", config.database_path.display());
    println!("  fingerprint_limit: {limit}");
    println!("  workers: {}", config.worker_count());
    println!("  task_timeout: {timeout}");
    println!("  extensions: {}", config.extensions.join(", "));

    let fp = &config.fingerprint;
    println!("  fingerprint.window_size: {}", fp.window_size);
    println!("  fingerprint.overlap_ratio: {}", fp.overlap_ratio);
    println!("  fingerprint.neighborhood_size: {}", fp.neighborhood_size);
    println!("  fingerprint.amplitude_min: {}", fp.amplitude_min);
    println!("  fingerprint.fan_value: {}", fp.fan_value);
    println!(
        "  fingerprint.time_delta: ({}, {}]",
        fp.min_time_delta, fp.max_time_delta
    );
    println!("  fingerprint.hash_bytes: {}", fp.hash_bytes);
    println!("  logging.level: {}", config.logging.level);
    println!("  logging.coloured: {}", config.logging.coloured);

    println!("\nPriority: CLI args > ENV vars (REFRAIN_*) > Config file > Defaults");

    Ok(())
}

/// Show the config file path.
pub fn show_path() -> Result<()> {
    println!("{}", config::config_file_path().display());
    Ok(())
}

/// Show example configuration.
pub fn show_example() -> Result<()> {
    print!("{}", config::example_config());
    Ok(())
}

/// Initialize config file with defaults.
pub fn init_config() -> Result<()> {
    let created = config::ensure_config_file()?;
    let config_path = config::config_file_path();

    if created {
        println!("✓ Created config file: {}", config_path.display());
        println!("\nEdit this file to configure refrain.");
    } else {
        println!("Config file already exists: {}", config_path.display());
    }

    Ok(())
}
