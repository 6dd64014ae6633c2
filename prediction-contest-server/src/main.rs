mod commands;
mod config;
mod logger;
mod store;

use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

use clap::Parser;
use sqlx::pool::PoolOptions;
use sqlx::MySqlPool;
use thiserror::Error;

use crate::commands::Command;
use crate::config::{Config, ConfigError};
use crate::store::Store;

#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Args {
    /// Path to the config file. The config is read from the environment if the file does
    /// not exist.
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = match load_config(&args.config).await {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Failed to load config: {}", err);
            process::exit(1);
        }
    };

    if let Err(err) = logger::init(config.loglevel) {
        eprintln!("Failed to install logger: {}", err);
    }

    log::debug!("Using config: {:?}", config);

    if let Err(err) = run(args.command, config).await {
        log::error!("{}", err);
        process::exit(1);
    }
}

async fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if path.exists() {
        Ok(Config::from_file(path).await?.with_environment())
    } else {
        Config::from_environment()
    }
}

async fn run(command: Command, config: Config) -> Result<(), Error> {
    let rules = config.rules.cutoff_rules()?;

    let pool: MySqlPool = PoolOptions::new()
        .max_connections(8)
        .max_lifetime(Duration::new(3600, 0))
        .idle_timeout(Duration::new(60, 0))
        .connect(&config.database.connect_string())
        .await?;

    let store = Store {
        pool,
        table_prefix: config.database.prefix.clone(),
    };

    command.run(&store, &rules).await
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Engine(#[from] prediction_contest_core::Error),
    #[error("invalid column value: {0}")]
    InvalidColumn(&'static str),
}

impl From<Error> for prediction_contest_core::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Engine(err) => err,
            err => Self::store(err),
        }
    }
}
