use anyhow::Result;
use energy_ingest::{config::AppConfig, metrics_server, observability, sources::UploadServer};

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    // Load configuration
    let cfg = AppConfig::load()?;

    // Start metrics server if configured
    if let Some(metrics_cfg) = &cfg.metrics {
        metrics_server::init(&metrics_cfg.bind_addr)?;
    }

    tracing::info!(
        namespace = %cfg.sdat.namespace,
        fallback_meter_id = %cfg.batch.fallback_meter_id,
        default_format = %cfg.output.format,
        "starting upload service"
    );

    let upload = UploadServer::new(
        &cfg.http.bind_addr,
        cfg.batch_options(),
        cfg.output.format,
        cfg.http.max_body_bytes,
    )?;
    upload.serve().await?;

    Ok(())
}
