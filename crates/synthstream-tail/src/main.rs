#![doc = include_str!("../README.md")]

mod config;
mod telemetry;

use clap::Parser;
use config::{CliArgs, TailConfig};
use core::time::Duration;
use serde_json::{Map, Value as Json};
use std::io::Write;
use std::sync::Arc;
use synthstream::{
    MonotonicClock, Observer, RegistryConfig, StreamEmission, StreamRegistry, StreamState,
    TimeSource,
};
use telemetry::init_telemetry;
use tokio::{signal, sync::mpsc};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = TailConfig::try_from(args)?;

    init_telemetry()?;
    log_startup_info(&config);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let observer: Observer = Arc::new(move |emission| {
        let _ = tx.send(emission);
    });

    let mut registry = StreamRegistry::new(RegistryConfig::default())?;
    let start_time = MonotonicClock::new().current_millis();
    registry.process(config.batch_request(start_time), observer)?;

    let tail = async {
        while let Some(emission) = rx.recv().await {
            if !print_emission(&emission)? {
                break;
            }
        }
        anyhow::Ok(())
    };

    let result = tokio::select! {
        result = tail => result,
        () = shutdown_signal(config.duration) => Ok(()),
    };

    registry.shutdown();
    tracing::info!("Stream closed");
    result
}

fn log_startup_info(config: &TailConfig) {
    if cfg!(debug_assertions) {
        tracing::info!("Starting {} stream with full config: {:#?}", config.kind, config);
    } else {
        tracing::info!(
            "Starting {} stream {}/{}/{}",
            config.kind,
            config.dashboard_id,
            config.panel_id,
            config.ref_id
        );
    }
}

/// Writes each delta row as one JSON object keyed by field name. Returns
/// whether the stream is still live.
fn print_emission(emission: &StreamEmission) -> anyhow::Result<bool> {
    let mut out = std::io::stdout().lock();
    for row in &emission.delta {
        let object: Map<String, Json> = emission
            .series
            .fields
            .iter()
            .zip(row)
            .map(|(field, value)| Ok((field.name.clone(), serde_json::to_value(value)?)))
            .collect::<serde_json::Result<_>>()?;
        serde_json::to_writer(&mut out, &object)?;
        writeln!(out)?;
    }
    out.flush()?;

    match emission.state {
        StreamState::Streaming => Ok(true),
        StreamState::Done => {
            tracing::info!(rows = emission.series.len(), "Source exhausted");
            Ok(false)
        }
        StreamState::Error => match &emission.error {
            Some(e) => Err(e.clone().into()),
            None => anyhow::bail!("stream {} failed", emission.key),
        },
    }
}

async fn shutdown_signal(duration: Option<Duration>) {
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    let elapsed = async {
        match duration {
            Some(duration) => tokio::time::sleep(duration).await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C signal"),
        () = terminate => tracing::info!("Received SIGTERM signal"),
        () = elapsed => tracing::info!("Duration elapsed"),
    }
}
