//! Host readiness
//!
//! The ready transition must run once, after the game server has finished
//! starting. Embedded hosts call [`crate::PresenceBeacon::on_ready`]
//! themselves; the sidecar binary waits on a [`ReadinessProbe`] instead.

use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::{debug, info};

/// Default pause between TCP readiness attempts
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_millis(500);

/// How to decide that the host workload is ready
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReadinessProbe {
    /// Ready as soon as the beacon starts
    Immediate,
    /// Ready once `addr` accepts a TCP connection
    TcpConnect { addr: SocketAddr, interval: Duration },
}

impl ReadinessProbe {
    pub fn tcp(addr: SocketAddr) -> Self {
        ReadinessProbe::TcpConnect {
            addr,
            interval: DEFAULT_PROBE_INTERVAL,
        }
    }

    /// Resolve once the host is ready. Never fails; a TCP probe keeps
    /// waiting until the port opens or the caller stops polling.
    pub async fn wait(&self) {
        match self {
            ReadinessProbe::Immediate => {}
            ReadinessProbe::TcpConnect { addr, interval } => {
                let mut attempts: u64 = 0;
                loop {
                    attempts += 1;
                    match TcpStream::connect(addr).await {
                        Ok(_) => {
                            info!("Server port {} is accepting connections", addr);
                            return;
                        }
                        Err(e) => {
                            debug!("Server port {} not ready (attempt {}): {}", addr, attempts, e);
                            tokio::time::sleep(*interval).await;
                        }
                    }
                }
            }
        }
    }
}
