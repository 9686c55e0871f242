// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use clap::Parser;

/// Client mediator: accepts local client connections and relays them to
/// the agent transport over its gRPC socket.
#[derive(Debug, Clone, Parser)]
#[command(name = "mediator", version, about)]
pub struct Config {
    /// Unix-domain rendezvous socket path local clients connect to.
    #[arg(long, env = "MEDIATOR_SOCKET")]
    pub socket: PathBuf,

    /// Unix-domain socket path of the agent transport's gRPC service.
    #[arg(long, env = "MEDIATOR_AGENT_SOCKET")]
    pub agent_socket: PathBuf,

    /// Log format (json or text).
    #[arg(long, env = "MEDIATOR_LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "MEDIATOR_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Config {
    /// Validate the configuration after parsing.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !matches!(self.log_format.as_str(), "json" | "text") {
            anyhow::bail!("invalid log format: {}", self.log_format);
        }
        if self.socket == self.agent_socket {
            anyhow::bail!("--socket and --agent-socket must differ");
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
