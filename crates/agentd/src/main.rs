// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use agentd::config::Config;
use agentd::proto::agent_transport_server::AgentTransportServer;
use agentd::service::AgentTransportService;
use agentd::session::SessionStore;

/// Set up the global tracing subscriber per `--log-format`. Uses
/// `try_init` so it's safe to call more than once (e.g. from tests).
fn init_tracing(config: &Config) {
    use tracing_subscriber::fmt;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.log_level.clone()));

    let result = match config.log_format.as_str() {
        "json" => fmt::fmt().with_env_filter(filter).json().try_init(),
        _ => fmt::fmt().with_env_filter(filter).try_init(),
    };
    drop(result);
}

#[tokio::main]
async fn main() {
    let config = Config::parse();
    init_tracing(&config);

    if let Err(err) = run(config).await {
        error!("fatal: {err:#}");
        std::process::exit(1);
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    config.validate()?;

    let _ = std::fs::remove_file(&config.socket);
    let listener = tokio::net::UnixListener::bind(&config.socket)?;
    let incoming = tokio_stream::wrappers::UnixListenerStream::new(listener);

    let store = Arc::new(SessionStore::new(config.rendezvous.clone()));
    let service = AgentTransportService::new(store);

    info!(socket = %config.socket.display(), "agentd listening");

    tonic::transport::Server::builder()
        .add_service(AgentTransportServer::new(service))
        .serve_with_incoming(incoming)
        .await?;

    Ok(())
}
