use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::watch;

use nowplaying_bridge::bridge::{self, Bridge};
use nowplaying_bridge::config::{BridgeConfig, CliArgs};
use nowplaying_bridge::logging;
use nowplaying_bridge::provider;
use nowplaying_bridge::transport::{self, SerialPortConnector, SerialTransport};

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = logging::init_logging() {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    tracing::info!("=== Now Playing Bridge Starting ===");

    let cli = CliArgs::parse(std::env::args().skip(1))?;
    if cli.list_ports {
        return print_ports();
    }

    let mut config = BridgeConfig::load();
    config.apply_env(|key| std::env::var(key).ok())?;
    config.apply_args(&cli);
    let config = config.validate()?;
    tracing::info!(port = %config.port, baud = config.baud_rate, "Configuration loaded");

    // Step 1: Start the serial transport on its own thread
    let (queue, outbound) = transport::outbound_queue();
    let stop_transport = Arc::new(AtomicBool::new(false));
    let connector =
        SerialPortConnector::new(config.port.clone(), config.baud_rate, config.read_timeout());
    let serial = SerialTransport::new(
        connector,
        outbound,
        config.transport_settings(),
        stop_transport.clone(),
    );
    let transport_thread = std::thread::Builder::new()
        .name("serial-transport".into())
        .spawn(move || serial.run())
        .context("failed to spawn serial transport thread")?;

    // Step 2: Connect to the OS media sessions
    let provider = match provider::platform_provider().await {
        Ok(provider) => provider,
        Err(e) => {
            tracing::error!(error = %e, "Media session provider unavailable");
            stop_transport.store(true, Ordering::SeqCst);
            drop(queue);
            let _ = transport_thread.join();
            return Err(e);
        }
    };

    // Step 3: Run the bridge until Ctrl+C
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(bridge::shutdown_on(tokio::signal::ctrl_c(), shutdown_tx));

    let bridge = Bridge::new(provider, queue, config.bridge_settings());
    let result = bridge.run(shutdown_rx).await;

    stop_transport.store(true, Ordering::SeqCst);
    match transport_thread.join() {
        Ok(attempts) => tracing::debug!(attempts, "Serial transport stopped"),
        Err(_) => tracing::error!("Serial transport thread panicked"),
    }

    if let Err(e) = &result {
        tracing::error!(error = %e, "Bridge stopped with an error");
    }
    tracing::info!("=== Now Playing Bridge Stopped ===");
    result
}

fn print_ports() -> Result<()> {
    let ports = transport::list_ports()?;
    if ports.is_empty() {
        println!("No serial ports found");
    }
    for port in ports {
        println!("{}\t{}", port.name, port.kind);
    }
    Ok(())
}
