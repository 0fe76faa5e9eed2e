mod associations;
mod cif;
mod cif_importer;
mod error;
mod fetcher;
mod file_fetcher;
mod importer;
mod ingest_manager;
mod logger;
mod nr_fetcher;
mod operators;
mod resolver;
mod schedule;
mod schedule_manager;
mod store;
mod tops;
mod view;

use anyhow::Context;
use clap::{Parser, Subcommand};
use config_file::FromConfigFile;
use serde::Deserialize;
use tracing::info;

use std::collections::HashMap;
use std::path::PathBuf;

use crate::file_fetcher::FileFetcher;
use crate::ingest_manager::IngestManager;
use crate::nr_fetcher::{NrFetcher, NrFetcherConfig};
use crate::resolver::parse_query_date;
use crate::schedule_manager::ScheduleManager;
use crate::store::Store;

#[derive(Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
enum SourceConfig {
    File(PathBuf),
    NetworkRail(NrFetcherConfig),
}

#[derive(Clone, Deserialize)]
struct Config {
    source: SourceConfig,
    snapshot: PathBuf,
    /// Classifier image keys to URLs.
    #[serde(default)]
    images: HashMap<String, String>,
}

#[derive(Parser, Debug)]
#[command(
    name = "railresolve",
    version,
    about = "Resolve trains in a Network Rail CIF timetable for a given day"
)]
struct Args {
    /// Configuration file
    #[arg(short, long, default_value = "./config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch a full extract and replace the stored timetable
    Ingest,
    /// Resolve one train, with its associations and likely class
    Schedule {
        uid: String,
        /// Date in YYYY-MM-DD form
        date: String,
    },
    /// Short summaries for several trains on one day
    Summaries {
        /// Date in YYYY-MM-DD form
        date: String,
        #[arg(required = true)]
        uids: Vec<String>,
    },
}

async fn ingest(config: &Config) -> Result<(), error::Error> {
    let schedule_manager = ScheduleManager::new();
    let snapshot = config.snapshot.clone();
    match &config.source {
        SourceConfig::File(path) => {
            let fetcher = FileFetcher::new(path);
            IngestManager::new(&schedule_manager, fetcher, snapshot)
                .run()
                .await
        }
        SourceConfig::NetworkRail(nr) => {
            let fetcher = NrFetcher::new(nr.clone());
            IngestManager::new(&schedule_manager, fetcher, snapshot)
                .run()
                .await
        }
    }
}

async fn load(config: &Config) -> anyhow::Result<ScheduleManager> {
    let store = Store::load(&config.snapshot).await.with_context(|| {
        format!(
            "could not load timetable snapshot {}; run `railresolve ingest` first",
            config.snapshot.display()
        )
    })?;
    Ok(ScheduleManager::with_store(store))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logger::init_logger();
    let args = Args::parse();
    let config = Config::from_config_file(&args.config)
        .map_err(error::Error::from)
        .with_context(|| format!("could not read configuration from {}", args.config.display()))?;

    let output = match args.command {
        Command::Ingest => {
            ingest(&config).await.context("ingest failed")?;
            return Ok(());
        }
        Command::Schedule { uid, date } => {
            let date = parse_query_date(&date)?;
            let store = load(&config).await?.read();
            info!("Resolving {} on {}", uid, date);
            let schedule = view::schedule_view(store.as_ref(), &uid, date, &config.images)?;
            serde_json::to_string_pretty(&schedule)?
        }
        Command::Summaries { date, uids } => {
            let date = parse_query_date(&date)?;
            let store = load(&config).await?.read();
            serde_json::to_string_pretty(&view::summaries(store.as_ref(), &uids, date))?
        }
    };
    println!("{}", output);

    Ok(())
}
