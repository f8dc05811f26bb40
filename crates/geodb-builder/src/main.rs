use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use log::LevelFilter;

use geodb_builder::config::{BuilderConfig, DEFAULT_CONFIG_FILE};

#[derive(Clone, Debug, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "geodb-builder",
    about = "Builds the geodb snapshot from MaxMind CSVs and the geo catalogue."
)]
struct Opt {
    /// Configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Log level: error|warn|info|debug|trace
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    log_level: LogLevel,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let opt = Opt::parse();

    env_logger::Builder::new()
        .filter_level(opt.log_level.into())
        .filter_module("sqlx", LevelFilter::Warn)
        .init();

    let config = BuilderConfig::load(&opt.config)?;
    geodb_builder::run(&config).await
}
