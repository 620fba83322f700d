use anyhow::{Context, Result};
use facegate_core::{RelayClient, RelayConfig};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod api;
mod config;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("facegated starting");

    let config = config::Config::load().context("loading configuration")?;
    let addr = config.socket_addr()?;

    let relay = RelayClient::new(RelayConfig {
        base_url: config.external_service_base_url.clone(),
        scratch_dir: config.scratch_dir.clone(),
        timeout: config.upstream_timeout(),
    })
    .context("building upstream client")?;

    tracing::info!(
        upstream = relay.base_url(),
        origin = config.cors_origin(),
        max_payload_bytes = config.max_payload_bytes,
        scratch_dir = %relay.scratch_dir().display(),
        "relay configured"
    );

    let routes = api::api_routes(Arc::new(relay), &config);

    let (bound, server) = warp::serve(routes)
        .try_bind_with_graceful_shutdown(addr, async {
            // Keep running until signaled
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("facegated shutting down");
        })
        .with_context(|| format!("binding {addr}"))?;

    tracing::info!(addr = %bound, "facegated ready");
    server.await;

    Ok(())
}
