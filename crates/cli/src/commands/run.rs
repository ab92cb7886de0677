//! `run` command implementation.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use contracts::{
    EyeImageRecord, ExtSignalRecord, GazeRecord, PositioningRecord, StreamKind,
    TimeField, TimeSyncRecord,
};
use ingestion::{BufferedRecord, InletRegistry, SubscriptionId};
use loopback::{LoopbackTransport, MockDevice, MockDeviceConfig};
use observability::InletMetricsAggregator;
use streamer::Streamer;
use tracing::{debug, info, warn};

use super::load_config;
use crate::cli::RunArgs;

/// Execute the `run` command
pub async fn run_streamer(args: &RunArgs) -> Result<()> {
    let mut config = load_config(&args.config)?;

    if let Some(ref streams) = args.streams {
        info!(streams = ?streams, "Overriding outlet streams from CLI");
        config.outlet.streams = streams.clone();
    }
    if args.no_merge {
        config.outlet.merge_openness_into_gaze = false;
    }
    config_loader::ConfigLoader::validate(&config)
        .context("Configuration is invalid after CLI overrides")?;

    let device = MockDevice::new(MockDeviceConfig {
        serial_number: args.serial.clone(),
        frequency_hz: args.frequency,
        ..Default::default()
    });
    let streamer = Streamer::new(Arc::new(LoopbackTransport::new()), config);

    streamer
        .connect(Arc::new(device))
        .context("Failed to connect eye tracker")?;
    let started = streamer
        .start_configured_outlets()
        .context("Failed to start outlets")?;
    info!(
        outlets = ?started,
        merge_openness = streamer.merge_openness_into_gaze(),
        "Outlets started"
    );

    let listeners = subscribe_all(streamer.inlets())?;
    info!(inlets = listeners.len(), "Listening to discovered streams");

    let mut aggregator = InletMetricsAggregator::new();
    let mut ticker = tokio::time::interval(Duration::from_millis(args.drain_interval_ms.max(1)));

    let run_duration = async {
        match args.duration {
            0 => std::future::pending::<()>().await,
            secs => tokio::time::sleep(Duration::from_secs(secs)).await,
        }
    };
    let shutdown = shutdown_signal();
    tokio::pin!(run_duration, shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let drained = drain_all(streamer.inlets(), &listeners, &mut aggregator);
                debug!(records = drained, "Drained inlet buffers");
            }
            _ = &mut run_duration => {
                info!(seconds = args.duration, "Run duration elapsed, stopping");
                break;
            }
            _ = &mut shutdown => {
                warn!("Received shutdown signal, stopping...");
                break;
            }
        }
    }

    streamer.disconnect();
    for (id, _) in &listeners {
        if let Err(e) = streamer.inlets().stop_listening(*id, Some(false)) {
            warn!(inlet = %id, error = %e, "Failed to stop inlet");
        }
    }
    drain_all(streamer.inlets(), &listeners, &mut aggregator);

    print_summary(streamer.inlets(), &listeners, &aggregator);
    info!("Gaze Streamer finished");
    Ok(())
}

/// Create a started listener for every stream this system publishes.
fn subscribe_all(inlets: &InletRegistry) -> Result<Vec<(SubscriptionId, StreamKind)>> {
    let mut listeners = Vec::new();
    for descriptor in inlets
        .remote_streams(None)
        .context("Stream discovery failed")?
    {
        let id = inlets
            .create_listener(&descriptor, None, Some(true))
            .with_context(|| format!("Failed to subscribe to {}", descriptor.source_id))?;
        listeners.push((id, inlets.inlet_kind(id)?));
    }
    Ok(listeners)
}

fn drain_all(
    inlets: &InletRegistry,
    listeners: &[(SubscriptionId, StreamKind)],
    aggregator: &mut InletMetricsAggregator,
) -> usize {
    let mut total = 0;
    for &(id, kind) in listeners {
        let drained = match kind {
            StreamKind::Gaze => drain::<GazeRecord>(inlets, id, aggregator),
            StreamKind::EyeImage => drain::<EyeImageRecord>(inlets, id, aggregator),
            StreamKind::ExtSignal => drain::<ExtSignalRecord>(inlets, id, aggregator),
            StreamKind::TimeSync => drain::<TimeSyncRecord>(inlets, id, aggregator),
            StreamKind::Positioning => drain::<PositioningRecord>(inlets, id, aggregator),
        };
        match drained {
            Ok(n) => total += n,
            Err(e) => warn!(inlet = %id, kind = %kind, error = %e, "Drain failed"),
        }
    }
    total
}

fn drain<R: BufferedRecord>(
    inlets: &InletRegistry,
    id: SubscriptionId,
    aggregator: &mut InletMetricsAggregator,
) -> ingestion::Result<usize> {
    let records: Vec<R> = inlets.consume_n(id, None, None)?;
    for record in &records {
        aggregator.update(
            R::KIND,
            record.time(TimeField::Remote),
            record.time(TimeField::Local),
        );
    }
    Ok(records.len())
}

fn print_summary(
    inlets: &InletRegistry,
    listeners: &[(SubscriptionId, StreamKind)],
    aggregator: &InletMetricsAggregator,
) {
    println!("\n{}", aggregator.summary());

    println!("{:<8} {:<12} {:>10} {:>8} {:>8} {:>8}", "inlet", "kind", "ingested", "pull", "decode", "flushed");
    for &(id, kind) in listeners {
        let Ok(stats) = inlets.inlet_stats(id) else {
            continue;
        };
        println!(
            "{:<8} {:<12} {:>10} {:>8} {:>8} {:>8}",
            id.to_string(),
            kind.as_str(),
            stats.samples_ingested,
            stats.pull_errors,
            stats.decode_errors,
            stats.samples_flushed
        );
    }
    println!();
}

/// Resolves on Ctrl+C or SIGTERM. A handler that cannot be installed never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{DeviceEvent, ExtSignal, ExtSignalChange, StreamerConfig};

    #[test]
    fn test_subscribe_and_drain() {
        let mut config = StreamerConfig::default();
        config.clock_check.enabled = false;
        let streamer = Streamer::new(Arc::new(LoopbackTransport::new()), config);
        let device = Arc::new(MockDevice::manual());
        streamer.connect(device.clone()).unwrap();
        streamer.start_outlet(StreamKind::ExtSignal, None).unwrap();

        let listeners = subscribe_all(streamer.inlets()).unwrap();
        assert_eq!(listeners.len(), 1);
        assert_eq!(listeners[0].1, StreamKind::ExtSignal);

        for value in 0..3 {
            device.emit(DeviceEvent::ExtSignal(ExtSignal {
                value,
                device_time_stamp: 1_000 + i64::from(value),
                system_time_stamp: loopback::clock::now_us(),
                change_type: ExtSignalChange::ValueChanged,
            }));
        }

        let mut aggregator = InletMetricsAggregator::new();
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        let mut drained = 0;
        while drained < 3 && std::time::Instant::now() < deadline {
            drained += drain_all(streamer.inlets(), &listeners, &mut aggregator);
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(drained, 3);
        assert_eq!(aggregator.summary().streams[&StreamKind::ExtSignal].records, 3);
    }
}
