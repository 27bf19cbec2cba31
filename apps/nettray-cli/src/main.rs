use std::{
    env,
    path::{Path, PathBuf},
    sync::{mpsc, Arc},
};

use anyhow::{Context, Result};
use clap::Parser;
use nettray_chart::ChartGeometry;
use nettray_monitor::{ConnectivityMonitor, MonitorSettings};
use nettray_ops::init_tracing;
use nettray_probe::{NetworkProbe, Probe};
use nettray_types::config::NetTrayConfig;
use tracing::info;

mod ui;

const DEFAULT_CONFIG_PATH: &str = "configs/dev.toml";

#[derive(Debug, Parser)]
#[command(name = "nettray", version, about = "Reachability indicator for a single host")]
struct Args {
    /// Path to a TOML config file (falls back to $NETTRAY_CONFIG, then configs/dev.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Host to monitor, overriding the config file.
    #[arg(short, long)]
    target: Option<String>,
    /// Print every status event as a JSON line instead of drawing the chart.
    #[arg(long)]
    headless: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = load_config(args.config.as_deref());
    if let Some(target) = args.target {
        config.probe.target_host = target;
    }
    if !args.headless && config.ops.log_dir.is_none() {
        let dir = env::temp_dir().join("nettray");
        config.ops.log_dir = Some(dir.to_string_lossy().into_owned());
    }
    init_tracing(&config.ops)?;

    let probe = NetworkProbe::new(&config.probe)?;
    let settings = MonitorSettings::from_config(&config.probe, &config.monitor);
    let monitor = Arc::new(ConnectivityMonitor::new(probe, settings));
    monitor.start()?;
    info!("NetTray watching {}", monitor.target());

    let outcome = if args.headless {
        run_headless(&monitor).await
    } else {
        run_terminal(&monitor, &config).await
    };

    if monitor.stop().await.is_timeout() {
        eprintln!("warning: monitor did not shut down in time; exiting anyway");
    }
    outcome
}

async fn run_headless<P: Probe + 'static>(monitor: &ConnectivityMonitor<P>) -> Result<()> {
    let subscription = monitor.on_status_changed(|event| match serde_json::to_string(event) {
        Ok(line) => println!("{line}"),
        Err(err) => eprintln!("failed to encode status event: {err}"),
    });
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    monitor.unsubscribe(subscription);
    Ok(())
}

async fn run_terminal<P: Probe + 'static>(
    monitor: &ConnectivityMonitor<P>,
    config: &NetTrayConfig,
) -> Result<()> {
    let geometry = ChartGeometry::new(&config.chart)?;
    let (tx, rx) = mpsc::channel();
    let subscription = monitor.on_status_changed(move |event| {
        let _ = tx.send(ui::UiMessage::Status(event.clone()));
    });

    // subscribe before snapshotting so nothing falls between the two
    let context = ui::UiContext {
        target: monitor.target().to_string(),
        geometry,
        history: monitor.history_snapshot(),
    };
    let result = tokio::task::spawn_blocking(move || ui::run(rx, context))
        .await
        .context("terminal UI task panicked")?;

    monitor.unsubscribe(subscription);
    result
}

fn load_config(from_args: Option<&Path>) -> NetTrayConfig {
    let path = from_args
        .map(Path::to_path_buf)
        .or_else(|| env::var("NETTRAY_CONFIG").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    match NetTrayConfig::from_file(&path) {
        Ok(cfg) => {
            if let Err(err) = cfg.validate() {
                eprintln!(
                    "Invalid config in '{}': {err}. Falling back to internal defaults.",
                    path.display()
                );
                default_config()
            } else {
                cfg
            }
        }
        Err(err) => {
            eprintln!(
                "Failed to load config from '{}': {err}. Falling back to internal defaults.",
                path.display()
            );
            default_config()
        }
    }
}

fn default_config() -> NetTrayConfig {
    let config = NetTrayConfig::default();
    debug_assert!(config.validate().is_ok());
    config
}
