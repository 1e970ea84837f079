//! Reference subscriber for the pub/sub client.
//!
//! Loads a TOML config, subscribes to the given channels and logs every
//! message, presence change and status until Ctrl-C.
//!
//! Usage:
//!   pn-hello-subscriber --config client.toml room lobby
//!   pn-hello-subscriber --config client.toml --presence --group ops
//!
//! `RUST_LOG` overrides `[observability].log_level`.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use pn_client::{ClientBuilder, ClientEvent, SubscribeRequest};
use pn_domain::config::{Config, ObservabilityConfig};
use pn_domain::event::Event;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Subscribe and print what arrives.
#[derive(Debug, Parser)]
#[command(name = "pn-hello-subscriber", version, about)]
struct Args {
    /// Path to the client config file.
    #[arg(long, short, default_value = "client.toml")]
    config: PathBuf,
    /// Channel groups to subscribe to.
    #[arg(long = "group")]
    groups: Vec<String>,
    /// Also receive presence events.
    #[arg(long)]
    presence: bool,
    /// Start from this timetoken instead of now.
    #[arg(long)]
    timetoken: Option<u64>,
    /// Channels to subscribe to.
    channels: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = Config::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    init_tracing(&config.observability);

    if args.channels.is_empty() && args.groups.is_empty() {
        anyhow::bail!("nothing to subscribe to: pass channels or --group");
    }

    let client = ClientBuilder::new(config).build().context("starting client")?;
    let mut events = client.events();

    client
        .subscribe(SubscribeRequest {
            channels: args.channels,
            groups: args.groups,
            with_presence: args.presence,
            timetoken: args.timetoken,
        })
        .await
        .context("subscribe")?;

    loop {
        tokio::select! {
            item = events.recv() => match item {
                Some(item) => log_item(item),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted, leaving channels");
                if let Err(status) = client.unsubscribe_all().await {
                    tracing::warn!(%status, "unsubscribe failed");
                }
                break;
            }
        }
    }

    client.invalidate();
    Ok(())
}

fn init_tracing(obs: &ObservabilityConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&obs.log_level));
    if obs.json_logs {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().compact())
            .init();
    }
}

fn log_item(item: ClientEvent) {
    match item {
        ClientEvent::Event(Event::Message(m)) => tracing::info!(
            channel = %m.channel,
            timetoken = m.timetoken,
            publisher = m.publisher.as_deref().unwrap_or("-"),
            payload = %m.payload,
            "message"
        ),
        ClientEvent::Event(Event::Signal(s)) => tracing::info!(
            channel = %s.channel,
            payload = %s.payload,
            "signal"
        ),
        ClientEvent::Event(Event::Presence(p)) => tracing::info!(
            channel = %p.channel,
            action = ?p.action,
            uuid = p.uuid.as_deref().unwrap_or("-"),
            occupancy = p.occupancy.unwrap_or(0),
            "presence"
        ),
        ClientEvent::Event(other) => tracing::info!(channel = other.channel(), "event"),
        ClientEvent::Status(status) if status.is_error => tracing::warn!(
            operation = %status.operation,
            category = %status.category,
            message = %status.message,
            "status"
        ),
        ClientEvent::Status(status) => tracing::info!(
            operation = %status.operation,
            category = %status.category,
            "status"
        ),
    }
}
