//! Presence Beacon
//!
//! Runs next to a game server in the same pod: waits for the server port to
//! open, announces the pod in the registry, and withdraws it on SIGTERM.

use anyhow::Result;
use clap::Parser;
use presence_beacon::{
    bootstrap_with_config, shutdown_requested, BeaconConfig, InstanceIdentity, NatsConnector,
    PresenceBeacon, ReadinessProbe, DEFAULT_ANNOTATIONS_PATH, DEFAULT_LABELS_PATH,
    DEFAULT_NAMESPACE, DEFAULT_REGISTRY_URL,
};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "presence-beacon")]
#[command(about = "Announces this game server in the cluster registry")]
struct Args {
    /// Pod name, used as the registry key
    #[arg(long, env = "POD_NAME")]
    pod_name: String,

    /// Kubernetes namespace of the pod
    #[arg(long, default_value = "default", env = "NAMESPACE")]
    namespace: String,

    /// Headless service giving the pod its DNS name
    #[arg(long, default_value = "", env = "HEADLESS_SERVICE")]
    headless_service: String,

    /// Forwarding secret shared with the proxy
    #[arg(long, env = "PROXY_SECRET", hide_env_values = true)]
    proxy_secret: Option<String>,

    /// Registry URL
    #[arg(long, default_value = DEFAULT_REGISTRY_URL, env = "NATS_URL")]
    nats_url: String,

    /// Registry bucket holding server entries
    #[arg(long, default_value = DEFAULT_NAMESPACE, env = "REGISTRY_BUCKET")]
    bucket: String,

    /// Game server port
    #[arg(short, long, default_value = "25565", env = "SERVER_PORT")]
    port: u16,

    /// Downward API labels file
    #[arg(long, default_value = DEFAULT_LABELS_PATH, env = "LABELS_PATH")]
    labels_path: PathBuf,

    /// Downward API annotations file
    #[arg(long, default_value = DEFAULT_ANNOTATIONS_PATH, env = "ANNOTATIONS_PATH")]
    annotations_path: PathBuf,

    /// Address probed for readiness (defaults to the local server port)
    #[arg(long, env = "READY_PROBE_ADDR")]
    ready_probe_addr: Option<SocketAddr>,

    /// Milliseconds between readiness probes
    #[arg(long, default_value = "500", env = "READY_PROBE_INTERVAL_MS")]
    ready_probe_interval_ms: u64,

    /// Register immediately instead of waiting for the server port
    #[arg(long, env = "SKIP_READY_PROBE")]
    skip_ready_probe: bool,
}

impl Args {
    fn beacon_config(&self) -> BeaconConfig {
        BeaconConfig {
            identity: InstanceIdentity::new(
                self.pod_name.clone(),
                self.namespace.clone(),
                self.headless_service.clone(),
            ),
            registry_url: self.nats_url.clone(),
            bucket: self.bucket.clone(),
            server_port: self.port,
            labels_path: self.labels_path.clone(),
            annotations_path: self.annotations_path.clone(),
            proxy_secret: self.proxy_secret.clone(),
        }
    }

    fn readiness_probe(&self) -> ReadinessProbe {
        if self.skip_ready_probe {
            return ReadinessProbe::Immediate;
        }
        ReadinessProbe::TcpConnect {
            addr: self
                .ready_probe_addr
                .unwrap_or_else(|| SocketAddr::from((Ipv4Addr::LOCALHOST, self.port))),
            interval: Duration::from_millis(self.ready_probe_interval_ms),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("presence_beacon=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .init();

    let args = Args::parse();
    let config = args.beacon_config();

    info!("Starting Presence Beacon");
    info!("  Instance: {}", config.identity.pod_name);
    info!("  Address: {}", config.server_address());
    info!("  Registry: {} (bucket {})", config.registry_url, config.bucket);
    if config.proxy_secret.is_none() {
        warn!("PROXY_SECRET is not set, the proxy will reject forwarded players");
    }

    let connector = NatsConnector::new().with_client_name(config.identity.pod_name.clone());
    let registry = Arc::new(bootstrap_with_config(&connector, &config).await);
    let beacon = PresenceBeacon::new(registry, &config);
    let probe = args.readiness_probe();

    beacon.run(probe.wait(), shutdown_requested()).await;

    info!("Presence Beacon stopped");
    Ok(())
}
