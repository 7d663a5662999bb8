// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! SmartBin - IoT bin telemetry sync
//!
//! Headless front end for the state hub:
//! - `monitor` runs the hub and logs the state stream, alerts and notices
//! - `bridge` forwards a microcontroller's serial output into the store

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{debug, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use smartbin::core::NoticePayload;
use smartbin::{
    AlertEvaluator, AlertMonitor, Config, DemoFeeder, MemoryStore, RemoteStore, SensorState,
    SerialBridge, SmartBinHub, NAME, VERSION,
};

/// SmartBin - IoT bin telemetry sync
#[derive(Parser, Debug)]
#[command(name = "smartbin")]
#[command(author = "SmartBin Project")]
#[command(version = VERSION)]
#[command(about = "Fill level and air quality state hub with simulator fallback")]
struct Args {
    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Enable trace-level logging
    #[arg(long, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Mode,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Run the state hub headless and log its output
    Monitor {
        /// Never use the remote store
        #[arg(long)]
        simulation: bool,

        /// Use an in-process store seeded with defaults
        #[arg(long)]
        local: bool,

        /// Feed the store with the demo hardware simulator
        #[arg(long)]
        demo: bool,

        /// Simulator tick period in milliseconds
        #[arg(long)]
        tick_ms: Option<u64>,
    },

    /// Forward serial device lines into an in-process store.
    ///
    /// Dry run: the store is discarded on exit, so this only checks that the
    /// device output parses and logs what would be written.
    Bridge {
        /// Serial port (defaults to $SERIAL_PORT, then the config value)
        #[arg(long)]
        port: Option<String>,

        /// Baud rate
        #[arg(long)]
        baud: Option<u32>,

        /// Read lines from stdin instead of a serial port
        #[arg(long)]
        stdin: bool,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load_or_create(&config_path)?;

    // Initialize logging
    let log_level = if args.trace {
        Level::TRACE
    } else if args.debug {
        Level::DEBUG
    } else {
        config.log_level.parse().unwrap_or(Level::INFO)
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(args.debug)
        .with_line_number(args.debug)
        .with_ansi(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("{} v{}", NAME, VERSION);
    info!("Configuration loaded from {:?}", config_path);
    debug!("Build: {:?}", smartbin::build_info());

    let rt = tokio::runtime::Runtime::new()?;
    match args.command {
        Mode::Monitor {
            simulation,
            local,
            demo,
            tick_ms,
        } => {
            // Override with command line args
            if simulation {
                config.simulation_only = true;
            }
            if let Some(tick_ms) = tick_ms {
                config.simulator.tick_ms = tick_ms;
            }
            rt.block_on(run_monitor(config, local, demo))
        }
        Mode::Bridge { port, baud, stdin } => {
            if let Some(port) = port.or_else(|| std::env::var("SERIAL_PORT").ok()) {
                config.bridge.serial_port = port;
            }
            if let Some(baud) = baud {
                config.bridge.baud_rate = baud;
            }
            rt.block_on(run_bridge(config, stdin))
        }
    }
}

/// Run the hub until Ctrl+C
async fn run_monitor(config: Config, local: bool, demo: bool) -> Result<()> {
    let store: Option<Arc<dyn RemoteStore>> = if local {
        Some(Arc::new(MemoryStore::new()))
    } else {
        None
    };

    let hub = SmartBinHub::new(config.clone(), store.clone());
    if local && !config.simulation_only {
        hub.seed_database().await;
    }

    let monitor = AlertMonitor::attach(&hub, AlertEvaluator::from_config(&config.alerts));
    match hub.records().get_thresholds().await {
        Some(thresholds) => monitor.set_thresholds(thresholds),
        None => warn!("Could not load thresholds, keeping configured defaults"),
    }

    let mut notices = hub.event_bus().subscribe_notices();
    tokio::spawn(async move {
        while let Ok(notice) = notices.recv().await {
            match notice.payload {
                NoticePayload::SourceSwitched { reason, .. } => {
                    warn!("Now running on the simulator ({})", reason)
                }
                other => debug!("Notice #{}: {:?}", notice.id, other),
            }
        }
    });

    let thresholds = config.alerts.thresholds;
    let _stream = hub.subscribe(move |state: &SensorState| {
        let status = state.status(&thresholds);
        debug!(
            "level={:.1}% ({:?}) ppm={:.0} ({:?}) lid={} fan={} temp={:.1} humidity={:.0}",
            state.level,
            status.level_status,
            state.ppm,
            status.air_quality_status,
            state.lid_open,
            state.fan_on,
            state.temperature,
            state.humidity
        );
    });

    hub.initialize();

    let feeder = DemoFeeder::new(store, config.demo.clone());
    if demo && !feeder.start() {
        warn!("Demo feeder not started");
    }

    info!(
        "{} running ({})",
        NAME,
        if hub.is_simulation_mode() { "simulator" } else { "remote store" }
    );
    info!("   Press Ctrl+C to shutdown");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;

    info!("Shutdown signal received, cleaning up...");
    feeder.stop();
    monitor.detach();
    hub.cleanup();

    info!("{} shutdown complete", NAME);
    Ok(())
}

/// Run the serial bridge against a throwaway in-process store
async fn run_bridge(config: Config, stdin: bool) -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let bridge = SerialBridge::new(store);
    info!("Bridge dry run: updates go to an in-process store and are discarded on exit");

    if stdin {
        info!("Reading device lines from stdin");
        let updates = bridge.run(tokio::io::BufReader::new(tokio::io::stdin())).await?;
        info!("Forwarded {} updates", updates);
        return Ok(());
    }

    run_serial_port(&bridge, &config).await
}

#[cfg(feature = "serial")]
async fn run_serial_port(bridge: &SerialBridge, config: &Config) -> Result<()> {
    let updates = bridge
        .run_serial(&config.bridge.serial_port, config.bridge.baud_rate)
        .await?;
    info!("Forwarded {} updates", updates);
    Ok(())
}

#[cfg(not(feature = "serial"))]
async fn run_serial_port(_bridge: &SerialBridge, _config: &Config) -> Result<()> {
    anyhow::bail!("Serial feature not enabled. Build with --features serial or use --stdin")
}
