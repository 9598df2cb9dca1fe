use anyhow::{bail, Context, Result};
use energy_domain::query::total_relative_volume;
use energy_ingest::{
    batch::{Batch, BatchInput},
    config::AppConfig,
    observability,
    sinks::{render, OutputFormat},
    sources::{DirectorySource, FileSource},
};
use std::{
    env,
    io::{self, Write},
};
use time::PrimitiveDateTime;

/// Merge ESL snapshots and SDAT interval files into a cumulative series.
///
/// Usage:
///   merge_files <esl_file_or_dir> <sdat_file_or_dir> [csv|json]
///
/// Directories are scanned for `*.xml`, sorted by name. The rendered meter
/// model goes to stdout; logs go to stderr.
#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        bail!("usage: merge_files <esl_file_or_dir> <sdat_file_or_dir> [csv|json]");
    }

    let cfg = AppConfig::load()?;
    let format = match args.get(3) {
        Some(raw) => raw.parse::<OutputFormat>().map_err(anyhow::Error::msg)?,
        None => cfg.output.format,
    };

    let esl_files = DirectorySource::new(&args[1])
        .load()
        .await
        .context("loading ESL files")?;
    let sdat_files = DirectorySource::new(&args[2])
        .load()
        .await
        .context("loading SDAT files")?;

    let batch = Batch::new(cfg.batch_options());
    let outcome = batch
        .run(BatchInput {
            esl_files,
            sdat_files,
        })?
        .require_data()?;

    for report in outcome.files.iter().filter(|r| !r.issues.is_empty()) {
        tracing::warn!(
            file = %report.filename,
            kind = %report.kind,
            issues = report.issues.len(),
            "file processed with issues"
        );
    }

    for data in outcome.model.meters() {
        tracing::info!(
            meter_id = %data.meter_id(),
            readings = data.len(),
            volume = total_relative_volume(data, PrimitiveDateTime::MIN, PrimitiveDateTime::MAX),
            "meter merged"
        );
    }

    let rendered = render(&outcome.model, format)?;
    let mut stdout = io::stdout().lock();
    stdout.write_all(&rendered)?;
    if format == OutputFormat::Json {
        stdout.write_all(b"\n")?;
    }
    stdout.flush()?;

    Ok(())
}
