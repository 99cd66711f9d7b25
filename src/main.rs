use std::fs;
use std::io::{self, Read, Write};

use anyhow::{Context, Result};
use load_forecast_features::{build_applicator, config, telemetry, DataTable, FeatureApplicator};
use config::Config;
use telemetry::init_tracing;
use tracing::info;

const USAGE: &str = "usage: featurize <input.json|-> [output.json]";

fn read_table(path: &str) -> Result<DataTable> {
    let raw = if path == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read table from stdin")?;
        buf
    } else {
        fs::read_to_string(path).with_context(|| format!("Failed to read {path}"))?
    };
    serde_json::from_str(&raw).context("Input is not a valid table")
}

fn write_table(path: Option<&str>, table: &DataTable) -> Result<()> {
    let json = serde_json::to_string_pretty(table)?;
    match path {
        Some(path) => fs::write(path, json).with_context(|| format!("Failed to write {path}")),
        None => {
            let mut stdout = io::stdout().lock();
            writeln!(stdout, "{json}")?;
            Ok(())
        }
    }
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let mut args = std::env::args().skip(1);
    let input = args.next().context(USAGE)?;
    let output = args.next();

    let cfg = Config::load()?;
    let applicator = build_applicator(
        cfg.features.mode,
        cfg.features.applicator_config()?,
        cfg.features.latency.clone(),
        cfg.features.computer(),
    );

    let table = read_table(&input)?;
    info!(mode = %applicator.mode(), rows = table.len(), columns = table.num_columns(), "Applying features");

    let features = applicator.add_features(&table)?;
    info!(rows = features.len(), columns = features.num_columns(), "Features applied");

    write_table(output.as_deref(), &features)
}
