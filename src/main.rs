use flowexchange::config::ExchangeConfig;
use flowexchange::crypto::PrivateKey;
use flowexchange::exchange::ExchangeOrchestratorBuilder;
use flowexchange::server;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

/// Command line options for the exchange service
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Options {
    /// Address to listen on
    #[arg(short = 'l', long = "listen", env = "FLOW_LISTEN_ADDR", default_value = "0.0.0.0:3000")]
    listen: SocketAddr,

    /// PEM file holding the RSA private key
    #[arg(short = 'k', long = "private-key-path", env = "FLOW_PRIVATE_KEY_PATH")]
    private_key_path: Option<PathBuf>,

    /// Directory decrypted attachments are written to
    #[arg(long = "artifact-dir")]
    artifact_dir: Option<PathBuf>,

    /// Check the plaintext digest of decrypted attachments
    #[arg(long = "verify-plaintext-digest")]
    verify_plaintext_digest: bool,
}

/// Inline PEM, used when no key path is given
const PRIVATE_KEY_ENV: &str = "FLOW_PRIVATE_KEY";

fn load_private_key(opts: &Options) -> Result<PrivateKey> {
    if let Some(path) = &opts.private_key_path {
        return PrivateKey::from_pem_file(path).context("Failed to load private key file");
    }

    let pem = std::env::var(PRIVATE_KEY_ENV).with_context(|| {
        format!(
            "No private key: pass --private-key-path or set {}",
            PRIVATE_KEY_ENV
        )
    })?;
    PrivateKey::from_pem(&pem).context("Failed to parse private key")
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let opts = Options::parse();

    let mut config = ExchangeConfig::from_env().context("Invalid configuration")?;
    if let Some(dir) = &opts.artifact_dir {
        config = config.with_artifact_dir(dir.clone());
    }
    if opts.verify_plaintext_digest {
        config = config.with_verify_plaintext_digest(true);
    }

    let private_key = Arc::new(load_private_key(&opts)?);
    info!("loaded private key");

    let orchestrator = ExchangeOrchestratorBuilder::new()
        .with_private_key(private_key)
        .with_config(config)
        .build()
        .context("Failed to build exchange")?;

    let app = server::router(Arc::new(orchestrator));

    let listener = tokio::net::TcpListener::bind(opts.listen)
        .await
        .with_context(|| format!("Failed to bind {}", opts.listen))?;
    info!("listening on http://{}", opts.listen);
    info!("  GET  /health");
    info!("  POST {}", server::EXCHANGE_PATH);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("failed to listen for shutdown signal: {}", e);
    }
}
