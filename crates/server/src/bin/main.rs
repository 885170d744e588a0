// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! Server binary
//!
//! Flags:
//! - `--bind <addr>`: socket address, default 0.0.0.0:8530
//! - `--metadata <dir>`: metadata manifest directory
//! - `--config <file>`: JSON server-configuration document
//! - `--content <dir>`: content store directory
//! - `--content-http-root <url>`: public base URL for content links
//!   (required together with `--content`)
//! - `--approve-all`: approve every software update at startup

use anyhow::Context;
use std::env;
use tracing::info;
use tracing_subscriber::EnvFilter;
use update_sync_server::{ServerOptions, UpdateServer, SERVER_NAME, VERSION};

fn flag_value(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|arg| arg == flag)
        .and_then(|idx| args.get(idx + 1))
        .cloned()
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|arg| arg == flag)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("update_sync_server=info,tower_http=info")
        }))
        .init();

    let args: Vec<String> = env::args().collect();

    let mut options = ServerOptions::default();
    if let Some(bind) = flag_value(&args, "--bind") {
        options.bind_addr = bind.parse().context("invalid --bind address")?;
    }
    options.metadata_path = flag_value(&args, "--metadata").map(Into::into);
    options.config_path = flag_value(&args, "--config").map(Into::into);
    options.content_path = flag_value(&args, "--content").map(Into::into);
    options.content_http_root = flag_value(&args, "--content-http-root");

    let server = UpdateServer::new(&options)?;

    if has_flag(&args, "--approve-all") {
        let count = server.approve_all_software();
        info!(count, "startup approval of all software updates");
    }

    info!(addr = %options.bind_addr, version = VERSION, "starting {SERVER_NAME}");
    let listener = tokio::net::TcpListener::bind(options.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", options.bind_addr))?;
    axum::serve(listener, server.router())
        .await
        .context("server error")?;
    Ok(())
}
