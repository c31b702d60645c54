// MIT License - Copyright (c) 2026 Peter Wright
// Door link daemon

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use tokio::signal::unix::{SignalKind, signal};
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

use door_link::{LinkConfig, NetConnector, PeerAddress, supervise};

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "door-link")]
#[command(about = "Keep a monitoring session with a door-status peer over a serial radio link")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long)]
    config: Option<String>,

    /// Peer address, e.g. 14:41:05:05:88:77/1 or tcp://host:port (overrides the config file)
    #[arg(long)]
    peer: Option<String>,

    /// Liveness timeout in seconds (overrides the config file)
    #[arg(long)]
    idle_timeout_secs: Option<u64>,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct Config {
    #[serde(default)]
    link: LinkToml,
}

#[derive(Debug, Deserialize)]
struct LinkToml {
    #[serde(default)]
    peer: Option<String>,
    #[serde(default = "default_connect_timeout")]
    connect_timeout_ms: u64,
    #[serde(default = "default_handshake_timeout")]
    handshake_timeout_ms: u64,
    #[serde(default = "default_idle_timeout")]
    idle_timeout_ms: u64,
    #[serde(default = "default_write_timeout")]
    write_timeout_ms: u64,
    #[serde(default)]
    connect_delay_ms: u64,
    #[serde(default = "default_reconnect_delay")]
    reconnect_delay_ms: u64,
    #[serde(default)]
    max_reconnect_attempts: u32,
    #[serde(default)]
    reconnect_after_session: bool,
}

impl Default for LinkToml {
    fn default() -> Self {
        Self {
            peer: None,
            connect_timeout_ms: default_connect_timeout(),
            handshake_timeout_ms: default_handshake_timeout(),
            idle_timeout_ms: default_idle_timeout(),
            write_timeout_ms: default_write_timeout(),
            connect_delay_ms: 0,
            reconnect_delay_ms: default_reconnect_delay(),
            max_reconnect_attempts: 0,
            reconnect_after_session: false,
        }
    }
}

fn default_connect_timeout() -> u64 {
    10000
}
fn default_handshake_timeout() -> u64 {
    15000
}
fn default_idle_timeout() -> u64 {
    20000
}
fn default_write_timeout() -> u64 {
    5000
}
fn default_reconnect_delay() -> u64 {
    10000
}

fn load_config(path: Option<&str>) -> Result<Config> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {path}"))?;
            toml::from_str(&text).context("Failed to parse config file")
        }
        None => Ok(Config::default()),
    }
}

fn build_link_config(toml: &LinkToml, cli: &Cli) -> Result<LinkConfig> {
    let peer_text = cli
        .peer
        .as_deref()
        .or(toml.peer.as_deref())
        .context("No peer address: set [link].peer in the config file or pass --peer")?;
    let peer: PeerAddress = peer_text.parse()?;

    let idle_timeout = match cli.idle_timeout_secs {
        Some(secs) => Duration::from_secs(secs),
        None => Duration::from_millis(toml.idle_timeout_ms),
    };
    if idle_timeout.is_zero() {
        anyhow::bail!("Idle timeout must be greater than zero");
    }

    Ok(LinkConfig::builder()
        .peer(peer)
        .connect_timeout(Duration::from_millis(toml.connect_timeout_ms))
        .handshake_timeout(Duration::from_millis(toml.handshake_timeout_ms))
        .idle_timeout(idle_timeout)
        .write_timeout(Duration::from_millis(toml.write_timeout_ms))
        .connect_delay(Duration::from_millis(toml.connect_delay_ms))
        .reconnect_delay_ms(toml.reconnect_delay_ms)
        .max_reconnect_attempts(toml.max_reconnect_attempts)
        .reconnect_after_session(toml.reconnect_after_session)
        .build())
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG controls verbosity (e.g. RUST_LOG=debug or RUST_LOG=door_link=trace).
    // Default: info.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    // systemd journal already adds timestamps, so omit them when running under systemd
    if std::env::var_os("JOURNAL_STREAM").is_some() {
        tracing_subscriber::fmt().without_time().with_env_filter(env_filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    let link_config = build_link_config(&config.link, &cli)?;

    let cancel = CancellationToken::new();
    let mut sigterm = signal(SignalKind::terminate())?;
    let stop = cancel.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("Received SIGINT, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
        stop.cancel();
    });

    info!("Monitoring door peer at {}", link_config.peer);
    let write_timeout = link_config.write_timeout;
    let result = supervise(&link_config, &cancel, || NetConnector::new(write_timeout)).await;

    info!("Shutdown complete");
    if let Err(e) = result {
        std::process::exit(e.exit_code());
    }
    Ok(())
}
