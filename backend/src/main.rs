use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info};
use tokio::signal;

mod api;
mod config;
mod db;
mod diagnostics;
mod ingest;
mod logger;
mod payload;
mod reading;
mod req;
mod scheduler;
mod schema;
mod sensor;
mod utils;

use config::Config;
use db::Store;
use ingest::Ingest;
use sensor::SensorClient;

/// Polls a Davis AirLink sensor, keeps its readings in SQLite and serves
/// them over HTTP.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Write the process id to this file
    #[arg(short, long)]
    pidfile: Option<PathBuf>,

    /// Run a live self-test against the configured device and exit
    #[arg(long, conflicts_with = "dump")]
    test: bool,

    /// Print the content of the store and exit
    #[arg(long)]
    dump: bool,

    /// Configuration file
    #[arg(env = "AIRLINK_PROXY_CONFIG")]
    config: PathBuf,
}

fn write_pidfile(path: &Path) -> Result<()> {
    std::fs::write(path, format!("{}\n", std::process::id()))
        .with_context(|| format!("Could not write pid file {}", path.display()))
}

fn remove_pidfile(path: &Path) {
    if let Err(err) = std::fs::remove_file(path) {
        debug!("Could not remove pid file {}: {err}", path.display());
    }
}

fn open_or_create(path: &Path) -> Result<Store> {
    if path.exists() {
        Ok(Store::open(path)?)
    } else {
        info!("Creating store {}", path.display());
        Store::create(path).with_context(|| format!("Could not create store {}", path.display()))
    }
}

#[actix_web::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(&cli.config)?;
    logger::init(&config.service_name, config.debug, config.log_to_stdout);
    config.log_summary(&cli.config);

    if cli.dump {
        let store = Store::open(config.database_file()?)?;
        return diagnostics::dump_store(&store, &mut std::io::stdout().lock());
    }
    if cli.test {
        return diagnostics::run_self_test(&config).await;
    }

    let scheduler = config.scheduler()?;
    let client = SensorClient::new(config.hostname()?, config.port, config.fetch_timeout())?;
    let database_file = config.database_file()?;

    if let Some(pidfile) = &cli.pidfile {
        write_pidfile(pidfile)?;
    }
    let store = open_or_create(database_file)?;

    let ingest = Ingest::new(client, store.clone(), scheduler);
    let task = actix_web::rt::spawn(async move {
        tokio::select! {
            _ = ingest.run() => {}
            _ = signal::ctrl_c() => { info!("Stopping ingest."); }
        }
    });

    let (server, _) = tokio::join!(api::new_http_server(store, config.server_port), task);
    server?;

    if let Some(pidfile) = &cli.pidfile {
        remove_pidfile(pidfile);
    }
    Ok(())
}
