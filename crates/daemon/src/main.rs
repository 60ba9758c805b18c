// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dynamic Application Loader daemon (`dald`).
//!
//! Background process that owns the single privileged transport to the
//! secure coprocessor and multiplexes host clients over a Unix-domain
//! socket (spec §4.7, C8).

use std::sync::Arc;

use anyhow::Context;
use dal_daemon::Config;
use dal_engine::{Engine, EngineConfig};
use dal_plugin::HeciPlugin;
use tokio::net::UnixListener;
use tokio::signal::unix::{signal, SignalKind};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("dald {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                println!("dald {}", env!("CARGO_PKG_VERSION"));
                println!("Dynamic Application Loader daemon");
                println!();
                println!("The daemon is typically started by the host's service manager and");
                println!("should not be invoked directly. It listens on a Unix socket for");
                println!("requests from the client library.");
                return Ok(());
            }
            _ => {
                eprintln!("error: unexpected argument '{arg}'");
                eprintln!("Usage: dald [--help | --version]");
                std::process::exit(1);
            }
        }
    }

    let config = Config::load().context("loading daemon configuration")?;
    let _log_guard = setup_logging(&config)?;

    info!(vm_family = ?config.vm_family, platform = ?config.platform, "starting DAL daemon");

    std::fs::create_dir_all(&config.repository_dir).context("creating applet repository directory")?;
    if let Some(parent) = config.socket_path.parent() {
        std::fs::create_dir_all(parent).context("creating socket directory")?;
    }
    if config.socket_path.exists() {
        std::fs::remove_file(&config.socket_path).context("removing stale socket")?;
    }
    let listener = UnixListener::bind(&config.socket_path)
        .with_context(|| format!("binding socket at {}", config.socket_path.display()))?;

    let plugin = Arc::new(HeciPlugin::open(config.vm_family));
    let engine = Arc::new(Engine::new(
        plugin,
        EngineConfig {
            repository_dir: config.repository_dir.clone(),
            spooler_applet_path: config.spooler_applet_path.clone(),
            platform: config.platform,
        },
    ));

    let server = tokio::spawn(dal_daemon::run_commands_server(listener, engine, config.max_clients));

    info!("daemon ready, listening on {}", config.socket_path.display());

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
        _ = sigint.recv() => info!("received SIGINT, shutting down"),
        result = server => {
            if let Err(err) = result {
                info!(%err, "commands server task ended");
            }
        }
    }

    let _ = std::fs::remove_file(&config.socket_path);
    info!("daemon stopped");
    Ok(())
}

fn setup_logging(config: &Config) -> anyhow::Result<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    if let Some(parent) = config.log_path.parent() {
        std::fs::create_dir_all(parent).context("creating log directory")?;
    }

    let file_name = config.log_path.file_name().context("log path has no file name")?;
    let file_appender = tracing_appender::rolling::never(config.log_path.parent().unwrap_or(&config.state_dir), file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry().with(filter).with(fmt::layer().with_writer(non_blocking)).init();

    Ok(guard)
}
