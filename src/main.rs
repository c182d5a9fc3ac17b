#![forbid(unsafe_code)]

//! `opi-server`: device-side OPI endpoint binary.
//!
//! Loads configuration, wires the display, light sensor, and trigger
//! inputs to the presentation engine, and serves OPI clients over TCP
//! until interrupted.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use opi_server::config::ServerConfig;
use opi_server::display::{spawn_render_loop, AmbientLight, Display, HeadlessDisplay, Scene};
use opi_server::engine::PresentationEngine;
use opi_server::protocol::dispatcher::{CommandDispatcher, DispatchOptions};
use opi_server::protocol::server::ProtocolServer;
use opi_server::{net, trigger, AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "opi-server", about = "Device-side OPI endpoint", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file; defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the listening port.
    #[arg(long)]
    port: Option<u16>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("opi-server bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let mut config = match args.config {
        Some(ref path) => ServerConfig::load_from_path(path)?,
        None => ServerConfig::default(),
    };
    if let Some(port) = args.port {
        config.server.port = port;
    }
    info!(port = config.server.port, "configuration loaded");

    // ── Device collaborators ────────────────────────────
    let ct = CancellationToken::new();
    let scene = Scene::new();
    let display: Arc<dyn Display> = Arc::new(HeadlessDisplay::new(config.screen_metrics()));
    let light = Arc::new(AmbientLight::new(config.sensor.initial_light_level));
    let render_handle = spawn_render_loop(Arc::clone(&display), &scene, ct.clone());

    let (trigger_input, trigger_queue) = trigger::channel(config.triggers.channel_capacity);
    let stdin_handle = config
        .triggers
        .stdin
        .then(|| trigger::spawn_stdin_source(trigger_input.clone(), ct.clone()));

    // ── Protocol server ─────────────────────────────────
    let engine = PresentationEngine::new(scene.clone(), trigger_queue, config.min_response());
    let options = DispatchOptions {
        step_read_timeout: config.step_read_timeout(),
        reply_to_unknown: config.server.reply_to_unknown_commands,
    };
    let dispatcher = CommandDispatcher::new(scene, engine, display, light, options);

    let addr = SocketAddr::new(config.server.bind_address, config.server.port);
    let server = ProtocolServer::bind(addr, dispatcher)?;
    let bound = server.local_addr()?;

    match net::socket_address(bound.port()) {
        Some(address) => info!(%address, "server socket ready"),
        None => warn!(%bound, "no network interface detected; clients must connect locally"),
    }

    let server_handle = tokio::spawn(server.run(ct.clone()));

    // ── Wait for shutdown signal ────────────────────────
    shutdown_signal().await;
    info!("shutdown signal received");
    ct.cancel();

    drop(trigger_input);

    if let Err(err) = server_handle.await {
        warn!(%err, "server task failed");
    }
    let _ = render_handle.await;
    if let Some(handle) = stdin_handle {
        handle.abort();
    }
    info!("opi-server shut down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
