use anyhow::{Context, Result};
use refrain_engine::config::LoggingConfig;
use twyg::{LogLevel, OptsBuilder};

/// Install the twyg logger for the rest of the process.
pub fn init(logging: &LoggingConfig) -> Result<()> {
    let opts = OptsBuilder::new()
        .coloured(logging.coloured)
        .level(parse_level(&logging.level))
        .build()
        .context("Invalid logging options")?;
    twyg::setup(opts).context("Failed to set up logging")?;
    Ok(())
}

fn parse_level(level: &str) -> LogLevel {
    match level.to_ascii_lowercase().as_str() {
        "trace" => LogLevel::Trace,
        "debug" => LogLevel::Debug,
        "warn" | "warning" => LogLevel::Warn,
        "error" => LogLevel::Error,
        _ => LogLevel::Info,
    }
}
