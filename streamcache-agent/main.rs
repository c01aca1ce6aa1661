use anyhow::Context;
use axum::{response::IntoResponse, routing::get, Router};
use clap::Parser;
use prometheus::{Encoder, TextEncoder};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use streamcache::common::open_bus;
use streamcache::config::parse_int;
use streamcache::{ExportConfig, MetricCollector, StreamCacheMetricExporter, TransportConfig};
use streamcache_raw::gateway::{StreamCache, DEFAULT_NUM_LANES};

#[derive(Parser, Debug)]
#[command(name = "streamcache")]
#[command(about = "Register access and monitoring for the Camera Link Gateway StreamCache")]
struct Args {
    #[arg(
        long,
        help = "Register window device, e.g. /sys/bus/pci/devices/0000:01:00.0/resource0"
    )]
    device: Option<PathBuf>,

    #[arg(long, help = "Access the device through mmap instead of file reads/writes")]
    mmap: bool,

    #[arg(long, value_parser = parse_int, default_value = "0", help = "File offset of the register window")]
    window_offset: u64,

    #[arg(long, value_parser = parse_int, default_value = "0x1000", help = "Size of the register window in bytes")]
    window_size: u64,

    #[arg(long, value_parser = parse_int, default_value = "0", help = "Offset of the StreamCache block inside the window")]
    base: u64,

    #[arg(long, default_value_t = DEFAULT_NUM_LANES, help = "Number of MIG lanes in the firmware build")]
    lanes: usize,

    #[arg(long, help = "Use an in-memory simulated StreamCache instead of hardware")]
    simulate: bool,

    #[arg(long, default_value = "0.0.0.0:8080", help = "Address for the /metrics endpoint")]
    listen: SocketAddr,

    #[arg(long, default_value_t = 1000, help = "Poll tick in milliseconds")]
    interval_ms: u64,

    #[arg(long, help = "Print the register map and derived values, then exit")]
    dump: bool,

    #[arg(long, requires = "dump", help = "Include hidden registers in the dump")]
    all: bool,

    #[arg(
        short,
        long,
        help = "Enable verbose logging (shows all register read/write operations)"
    )]
    verbose: bool,
}

impl Args {
    fn export_config(&self) -> anyhow::Result<ExportConfig> {
        let size = usize::try_from(self.window_size).context("window size too large")?;

        let transport = match (&self.device, self.simulate) {
            (_, true) => TransportConfig::Simulated,
            (Some(path), false) if self.mmap => TransportConfig::Mmap {
                path: path.clone(),
                offset: self.window_offset,
                size,
            },
            (Some(path), false) => TransportConfig::DevMem {
                path: path.clone(),
                offset: self.window_offset,
                size,
            },
            (None, false) => anyhow::bail!("either --device or --simulate is required"),
        };

        let mut config = ExportConfig::new(transport, self.lanes);
        config.base = u32::try_from(self.base).context("base offset exceeds 32 bits")?;
        config.poll_interval = Duration::from_millis(self.interval_ms);
        config.listen = self.listen;
        config.validate()?;

        Ok(config)
    }
}

struct AppState {
    exporter: Arc<StreamCacheMetricExporter>,
}

async fn metrics_handler(
    axum::extract::State(state): axum::extract::State<Arc<AppState>>,
) -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();

    let metric_families = state.exporter.registry().gather();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode StreamCache metrics: {}", e);
    }

    let content_type = encoder.format_type().to_string();
    (
        [("Content-Type", content_type)],
        String::from_utf8(buffer).unwrap_or_default(),
    )
}

/// Print the register table followed by the derived values
fn dump(cache: &StreamCache, include_hidden: bool) {
    let map = cache.map();
    println!("{} ({} lanes)", map.name(), cache.num_lanes());
    println!("{:<6} {:<8} {:<2} {:<32} VALUE", "ADDR", "BITS", "MD", "NAME");

    let connected = map.is_connected();
    if !connected {
        tracing::warn!("No bus attached; dumping layout only");
    }

    for reg in map.enumerate(include_hidden) {
        let value = if !connected {
            String::new()
        } else {
            match map.read(&reg.path) {
                Ok(v) => format!("0x{v:x}"),
                Err(e) => format!("<error: {e}>"),
            }
        };
        let row = reg.to_string();
        println!("{row:<50} {value}");
    }

    if !connected {
        return;
    }

    println!();
    for reading in map.derived_readings() {
        println!("{:<24} {}", reading.name, reading.formatted());
    }
}

async fn shutdown_signal(cancel_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => tracing::error!("Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::warn!("Shutdown triggered by Ctrl+C");
        },
        _ = terminate => {
            tracing::warn!("Shutdown triggered by SIGTERM");
        },
    }

    cancel_token.cancel();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = args.export_config()?;

    let bus = open_bus(&config).context("failed to open register transport")?;
    let mut cache = StreamCache::with_base(config.num_lanes, config.base)
        .context("failed to build StreamCache register map")?;
    cache.attach(bus);

    if args.dump {
        dump(&cache, args.all);
        return Ok(());
    }

    let cache = Arc::new(cache);
    let cancel_token = CancellationToken::new();

    let collector = MetricCollector::new(&config, Arc::clone(&cache))?;
    let app_state = Arc::new(AppState {
        exporter: collector.exporter(),
    });
    let collection_handle = collector.start(cancel_token.clone());

    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(app_state);

    tracing::warn!("Starting HTTP server on {}", config.listen);
    let listener = tokio::net::TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("failed to bind {}", config.listen))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel_token))
        .await?;

    tracing::info!("Server shutdown complete, waiting for poll loop to finish...");
    let _ = collection_handle.await;

    Ok(())
}
