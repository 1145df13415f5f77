// Anoverif: privacy-preserving verification proxy
//
// Accepts `POST /verify` requests, mixes them through a jittered batch worker,
// and forwards the identifiers to the configured decision service.

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};
use std::path::PathBuf;
use std::sync::Arc;

use anoverif::{HttpBackend, ProxyConfig, ProxyContext, server};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Port to listen on
    #[arg(long, short)]
    port: Option<u16>,

    /// Backend decision service URL
    #[arg(long, short)]
    backend: Option<String>,

    /// Address to bind
    #[arg(long)]
    bind: Option<String>,

    /// Config file (key=value lines); overrides ANON_CONFIG
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Write the effective configuration to this path and exit
    #[arg(long)]
    write_config: Option<PathBuf>,
}

fn load_config(args: &Args) -> Result<ProxyConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let mut config = ProxyConfig::load_from_file(path)?;
            config.apply_env(std::env::vars())?;
            config
        }
        None => ProxyConfig::load()?,
    };

    if let Some(port) = args.port {
        config = config.with_port(port);
    }
    if let Some(backend) = &args.backend {
        config = config.with_backend_url(backend.clone());
    }
    if let Some(bind) = &args.bind {
        config = config.with_bind_address(bind.clone());
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {e}");
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
                error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("Shutdown signal received");
}

fn log_summary(ctx: &ProxyContext) {
    let stats = ctx.stats();
    let mixer = ctx.mixer_stats();
    info!("=== Server Statistics ===");
    info!("Total requests: {}", stats.requests_total);
    info!("Successful: {}", stats.success_total);
    info!("Errors: {} ({} timeouts)", stats.error_total, stats.timeout_total);
    info!(
        "Mixer: {} batches, {} dispatched, {} completed, {} late results discarded",
        mixer.batches, mixer.dispatched, mixer.completed, mixer.abandoned_writes
    );
    info!("Hash cache size: {}", ctx.cache().len());
    info!("Pending requests: {}", ctx.pending().len());
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = load_config(&args)?;

    if let Some(path) = &args.write_config {
        config.save_to_file(path)?;
        info!("Configuration written to {}", path.display());
        return Ok(());
    }

    info!("Starting verification proxy: {config:?}");

    let backend = Arc::new(HttpBackend::from_config(&config)?);
    let ctx = Arc::new(ProxyContext::start(&config, backend));

    let addr = config
        .socket_addr()
        .context("bind address was validated but no longer parses")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    let served = server::serve(listener, Arc::clone(&ctx), shutdown_signal()).await;

    ctx.shutdown().await;
    log_summary(&ctx);

    served.context("HTTP server failed")
}
