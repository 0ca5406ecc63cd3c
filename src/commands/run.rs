//! Gateway run loop

use anyhow::{Context, Result};
use icn_gateway_bridge::{GatewayBridge, GatewayConfig};
use log::{debug, info};
use std::path::PathBuf;
use std::time::Instant;

use crate::utils::{format_duration, print_header};

/// Load the configuration and apply command-line overrides
fn load_config(
    path: Option<PathBuf>,
    mesh: Option<String>,
    baud: Option<u32>,
    icn: Option<String>,
) -> Result<GatewayConfig> {
    let mut config = GatewayConfig::load(path.as_deref())?;

    if let Some(endpoint) = mesh {
        config.mesh.endpoint = endpoint;
    }
    if let Some(baud_rate) = baud {
        config.mesh.baud_rate = baud_rate;
    }
    if let Some(address) = icn {
        config.icn.address = address;
    }

    Ok(config)
}

/// Run the gateway until SIGINT or SIGTERM
pub async fn run_gateway(
    path: Option<PathBuf>,
    mesh: Option<String>,
    baud: Option<u32>,
    icn: Option<String>,
) -> Result<()> {
    let config = load_config(path, mesh, baud, icn)?;
    info!(
        "Starting gateway: mesh={} icn={}",
        config.mesh_endpoint(),
        config.icn.address
    );

    let mut bridge = GatewayBridge::new(config);
    bridge.open().await.context("Gateway failed to start")?;
    let started = Instant::now();

    wait_for_termination().await?;
    info!("Termination requested, shutting down");

    if log::log_enabled!(log::Level::Debug) {
        for (prefix, entry) in bridge.routes().await? {
            debug!("FIB {} -> {:?} (virtual: {})", prefix, entry.next_hops, entry.is_virtual);
        }
    }

    let snapshot = bridge.shutdown().await?;

    print_header("Gateway summary");
    println!("Uptime:             {}", format_duration(started.elapsed()));
    println!("Frames received:    {}", snapshot.frames_received);
    println!("  malformed:        {}", snapshot.frames_malformed);
    println!("  ignored:          {}", snapshot.frames_ignored);
    println!("Readings published: {}", snapshot.data_published);
    println!("  failed:           {}", snapshot.publish_failures);
    println!("Interests received: {}", snapshot.interests_received);
    println!("  forwarded:        {}", snapshot.interests_forwarded);
    println!("  without route:    {}", snapshot.interests_unrouted);
    println!("  send failures:    {}", snapshot.forward_failures);
    println!("FIB entries:        {}", snapshot.fib_size);

    Ok(())
}

/// Print the effective configuration as JSON
pub fn show_config(path: Option<PathBuf>) -> Result<()> {
    let config = load_config(path, None, None, None)?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

#[cfg(unix)]
async fn wait_for_termination() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate =
        signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result.context("Failed to wait for Ctrl-C")?,
        _ = terminate.recv() => {},
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_termination() -> Result<()> {
    tokio::signal::ctrl_c()
        .await
        .context("Failed to wait for Ctrl-C")
}
