use std::path::PathBuf;

use clap::Parser;
use smart_home_sim::{
    RunReport, Simulation,
    alerts::AlertRecord,
    config::{BackendConfig, SimulationConfig, read_config_file},
    util::{apply_env_overrides, round1},
};
use tokio::{spawn, sync::broadcast};
use tokio_util::sync::CancellationToken;
use tracing::{info, level_filters::LevelFilter, trace, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file (the three-device home if omitted)
    #[arg(short)]
    file: Option<String>,

    /// Stop after this many seconds
    #[arg(long)]
    duration: Option<u64>,

    /// Stop after this many updates
    #[arg(long)]
    max_events: Option<u64>,

    /// Seed for a reproducible run
    #[arg(long)]
    seed: Option<u64>,

    /// Append the history to this file
    #[arg(long)]
    history: Option<PathBuf>,

    /// More output (-v debug, -vv trace)
    #[arg(short, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn apply(&self, config: &mut SimulationConfig) {
        if let Some(duration) = self.duration {
            config.run.duration_secs = Some(duration);
        }
        if let Some(max_events) = self.max_events {
            config.run.max_events = Some(max_events);
        }
        if let Some(seed) = self.seed {
            config.seed = Some(seed);
        }
        if let Some(path) = &self.history {
            config.storage.backend = BackendConfig::Jsonl { path: path.clone() };
        }
    }
}

fn init(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    let filter = filter::Targets::new().with_targets(vec![("smart_home_sim", level)]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let args = Args::parse();
    init(args.verbose);
    trace!("started with args: {args:?}");

    let mut config = match &args.file {
        Some(file) => read_config_file(file)?,
        None => SimulationConfig::default(),
    };
    apply_env_overrides(&mut config);
    args.apply(&mut config);

    let simulation = Simulation::new(config);
    let printer = spawn(print_alerts(simulation.subscribe_alerts()));
    spawn(shutdown_signal(simulation.cancel_token()));

    println!("Connecting devices...");
    let report = simulation.run().await?;

    // the alert stream closes with the simulation
    if let Err(e) = printer.await {
        warn!("alert printer failed: {e}");
    }

    print_summary(&report);

    Ok(())
}

async fn print_alerts(mut alerts: broadcast::Receiver<AlertRecord>) {
    loop {
        match alerts.recv().await {
            Ok(alert) => println!("{alert}"),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("alert output lagging, skipped {skipped} alerts")
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

async fn shutdown_signal(cancel: CancellationToken) {
    tokio::select! {
        _ = cancel.cancelled() => {}
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!("failed to listen for Ctrl+C: {e}");
                return;
            }
            info!("received Ctrl+C, stopping simulation");
            cancel.cancel();
        }
    }
}

fn print_summary(report: &RunReport) {
    let summary = &report.summary;

    println!("\nANALYTICS SUMMARY\n");
    println!("Total Updates Processed: {}", summary.total_updates);
    println!("Average Temperature: {}°C", round1(summary.average_temp));
    println!("Total Brightness: {}%", summary.total_brightness);
    println!("Average Battery Level: {}%", round1(summary.average_battery));
    println!("Critical Events: {}", summary.critical_event_count);

    println!(
        "\nPersisted {} records ({} failed, {} retries)",
        report.storage.written, report.storage.failed, report.storage.retries
    );
}
