mod cli;
mod config;
mod input;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use engine_logging::{engine_error, engine_info, LogDestination};
use grab_engine::Orchestrator;
use log::LevelFilter;

use crate::cli::Cli;
use crate::config::{FileConfig, Settings};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match load_settings(&cli) {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("mediagrab: {err:#}");
            return ExitCode::FAILURE;
        }
    };

    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let destination = match settings.log_file.clone() {
        Some(path) => LogDestination::TerminalAndFile(path),
        None => LogDestination::Terminal,
    };
    engine_logging::initialize(destination, level);

    match run(&cli, settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            engine_error!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn load_settings(cli: &Cli) -> Result<Settings> {
    let file = match &cli.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    config::resolve(cli, file)
}

async fn run(cli: &Cli, settings: Settings) -> Result<()> {
    let urls = input::read_url_file(&cli.urls_file)?;
    engine_info!(
        "Loaded {} url(s) from {}",
        urls.len(),
        cli.urls_file.display()
    );
    engine_info!("Settings: {:?}", settings.pipeline);

    let orchestrator =
        Orchestrator::with_chrome(settings.pipeline).context("cannot build http client")?;
    let summary = orchestrator.run(urls).await;
    engine_info!(
        "Done. {} file(s) saved under {}",
        summary.downloaded(),
        orchestrator.config().output_root.display()
    );
    Ok(())
}
