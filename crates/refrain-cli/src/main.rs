use anyhow::Result;
use clap::Parser;
use refrain_engine::config::LoggingConfig;
use refrain_engine::Config;
use std::path::PathBuf;

mod commands;

#[derive(Debug, Parser)]
#[command(name = "refrain", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the database (default: ~/.local/share/refrain/refrain.db)
    #[arg(long, global = true)]
    db: Option<PathBuf>,
}

#[derive(Debug, clap::Subcommand)]
enum Commands {
    /// Fingerprint audio files and directories into the database
    ///
    /// Directories are walked recursively for files with one of the
    /// configured extensions. Sources whose content is already in the
    /// database are skipped, so re-running over the same library only
    /// fingerprints what is new. A single file is processed inline; larger
    /// batches run on a worker pool. Ctrl-C stops queued sources and lets
    /// those in flight finish.
    Fingerprint {
        /// Files or directories to fingerprint
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Only fingerprint the first N seconds of each source (-1 = whole track)
        #[arg(long, allow_negative_numbers = true)]
        limit: Option<i64>,

        /// Number of concurrent workers (default: available parallelism)
        #[arg(short, long)]
        workers: Option<usize>,
    },
    /// Recognize audio excerpts against the database
    Recognize {
        /// Excerpts to recognize
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Only read the first N seconds of each excerpt (-1 = whole file)
        #[arg(long, allow_negative_numbers = true)]
        limit: Option<i64>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show database statistics
    Status {
        /// Also list every fingerprinted song
        #[arg(long)]
        songs: bool,
    },
    /// Show or initialize configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, clap::Subcommand)]
enum ConfigAction {
    /// Show the effective configuration
    Show,
    /// Print the config file path
    Path,
    /// Print an example config file
    Example,
    /// Create the config file with defaults if it does not exist
    Init,
}

fn load_config(db: Option<PathBuf>) -> Result<Config> {
    match db {
        Some(path) => Config::load_with_db_path(path),
        None => Config::load(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let Cli { command, db } = Cli::parse();

    let command = match command {
        Commands::Config { action } => {
            commands::logging::init(&LoggingConfig::default())?;
            return match action {
                ConfigAction::Show => commands::config::show_config(db),
                ConfigAction::Path => commands::config::show_path(),
                ConfigAction::Example => commands::config::show_example(),
                ConfigAction::Init => commands::config::init_config(),
            };
        }
        other => other,
    };

    let mut config = load_config(db)?;
    commands::logging::init(&config.logging)?;

    // Ensure database directory exists
    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    match command {
        Commands::Fingerprint {
            paths,
            limit,
            workers,
        } => {
            if limit.is_some() {
                config.fingerprint_limit_secs = limit;
            }
            if workers.is_some() {
                config.workers = workers;
            }
            commands::run_fingerprint(&config, paths).await?;
        }
        Commands::Recognize { files, limit, json } => {
            if limit.is_some() {
                config.fingerprint_limit_secs = limit;
            }
            commands::run_recognize(&config, &files, json)?;
        }
        Commands::Status { songs } => {
            commands::show_status(&config, songs)?;
        }
        Commands::Config { .. } => {}
    }

    Ok(())
}
