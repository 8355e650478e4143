// src/main.rs
use anyhow::Result;
use log::info;
use std::path::Path;
use std::time::Instant;

use reconcile_lib::{
    config::{self, ReconcileConfig},
    pipeline,
    sink::CsvSink,
    source::{JsonFileSource, RecordSource},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    info!("Starting mining entity reconciliation run");
    let start_time = Instant::now();

    // Try to load .env file if it exists
    for path in [".env", ".env.local", "../.env"] {
        if Path::new(path).exists() {
            config::load_env_from_file(path)?;
            break;
        }
    }

    let cfg = ReconcileConfig::from_env();

    // Materialize the run input from the collaborator drop-off files.
    let source = JsonFileSource::from_env()?;
    let input = source.load()?;

    // Results land in a CSV staging file unless overridden.
    let out_path = std::env::var("RECONCILE_OUTPUT").unwrap_or_else(|_| "matches.csv".to_string());
    let sink = CsvSink::create(&out_path)?;

    let (outcome, _sink) = pipeline::run(&input, &cfg, sink).await?;

    info!(
        "Run finished in {:.2?}: {}/{} targets matched, results written to {}",
        start_time.elapsed(),
        outcome.summary.matched_targets,
        outcome.summary.total_targets,
        out_path
    );
    Ok(())
}
