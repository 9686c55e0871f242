// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use clap::Parser;

/// Agent transport: owns authenticated sessions to the key agent and
/// exposes them to the client mediator over gRPC.
#[derive(Debug, Clone, Parser)]
#[command(name = "agentd", version, about)]
pub struct Config {
    /// Path to the key agent's rendezvous file (port + cookie).
    #[arg(long, env = "AGENTD_RENDEZVOUS")]
    pub rendezvous: PathBuf,

    /// Unix-domain socket path to serve the inter-context gRPC API on.
    #[arg(long, env = "AGENTD_SOCKET")]
    pub socket: PathBuf,

    /// Log format (json or text).
    #[arg(long, env = "AGENTD_LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "AGENTD_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Config {
    /// Validate the configuration after parsing.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !matches!(self.log_format.as_str(), "json" | "text") {
            anyhow::bail!("invalid log format: {}", self.log_format);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
