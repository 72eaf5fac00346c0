//! Headless host bridge binary for stdin/stdout JSON communication.
//!
//! Reads `CommandEnvelope` messages as newline-delimited JSON from stdin,
//! dispatches them to the chat orchestrator, and writes `ResponseEnvelope`
//! and `EventEnvelope` messages to stdout.
//!
//! All tracing/diagnostic output goes to stderr so that stdout remains a
//! clean JSON protocol channel.
//!
//! Configuration is read from `$PARLANCE_CONFIG` if set, otherwise from the
//! default config path when that file exists.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use parlance::host::stdio::run_stdio_bridge;
use parlance::{ChatConfig, Orchestrator, SimulatedProvider};

fn load_config() -> anyhow::Result<ChatConfig> {
    let explicit = std::env::var_os("PARLANCE_CONFIG").map(PathBuf::from);
    let path = match explicit {
        Some(path) => path,
        None => {
            let default = ChatConfig::default_config_path();
            if !default.exists() {
                tracing::info!("no config file found; using defaults");
                return Ok(ChatConfig::default());
            }
            default
        }
    };

    let config = ChatConfig::from_file(&path)
        .with_context(|| format!("failed to load config from {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("invalid config in {}", path.display()))?;
    tracing::info!(path = %path.display(), "loaded config");
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout is reserved for the JSON protocol.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("parlance=info")),
        )
        .init();

    tracing::info!("parlance-host starting");

    let config = load_config()?;
    let provider = Arc::new(SimulatedProvider::new(config.simulation.clone()));
    let orchestrator = Orchestrator::new(provider, config);

    run_stdio_bridge(orchestrator).await.map_err(|e| {
        tracing::error!(error = %e, "parlance-host exited with error");
        anyhow::anyhow!("parlance-host failed: {e}")
    })?;

    tracing::info!("parlance-host shut down cleanly");
    Ok(())
}
