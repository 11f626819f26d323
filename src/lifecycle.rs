//! Presence lifecycle
//!
//! Unregistered -> Registered -> Unregistered
//!
//! The ready transition publishes this instance's record once the game
//! server reports it is up. The shutdown transition deletes the record and
//! always runs, whether or not registration succeeded. Neither transition
//! retries, and neither lets a registry failure reach the caller.

use crate::bootstrap::RegistryHandle;
use crate::config::{BeaconConfig, InstanceIdentity};
use crate::identity::read_key_value_file;
use crate::record::RegistrationRecord;
use bytes::Bytes;
use parking_lot::Mutex;
use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Whether this instance is currently announced
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PresenceState {
    #[default]
    Unregistered,
    Registered,
}

/// Publishes and withdraws this instance's registry entry
pub struct PresenceBeacon {
    registry: Arc<RegistryHandle>,
    identity: InstanceIdentity,
    server_port: u16,
    labels_path: PathBuf,
    annotations_path: PathBuf,
    state: Mutex<PresenceState>,
    ready_fired: AtomicBool,
}

impl PresenceBeacon {
    pub fn new(registry: Arc<RegistryHandle>, config: &BeaconConfig) -> Self {
        Self {
            registry,
            identity: config.identity.clone(),
            server_port: config.server_port,
            labels_path: config.labels_path.clone(),
            annotations_path: config.annotations_path.clone(),
            state: Mutex::new(PresenceState::Unregistered),
            ready_fired: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> PresenceState {
        *self.state.lock()
    }

    pub fn registry_key(&self) -> &str {
        self.identity.registry_key()
    }

    /// Assemble the record from the downward API files and the computed address
    pub fn build_record(&self) -> RegistrationRecord {
        let labels = read_key_value_file(&self.labels_path);
        let annotations = read_key_value_file(&self.annotations_path);
        RegistrationRecord::build(
            labels,
            annotations,
            self.identity.server_address(self.server_port),
        )
    }

    /// Ready transition. Only the first call does anything.
    pub async fn on_ready(&self) -> PresenceState {
        if self.ready_fired.swap(true, Ordering::SeqCst) {
            debug!("Ready transition already attempted, ignoring");
            return self.state();
        }

        info!("Registering server {}", self.registry_key());

        let Some(namespace) = self.registry.namespace() else {
            warn!(
                "Registry unavailable, {} will run unannounced",
                self.registry_key()
            );
            return self.state();
        };

        let record = self.build_record();
        let payload = match record.to_json_bytes() {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Failed to serialize server info: {}", e);
                return self.state();
            }
        };
        let json = String::from_utf8_lossy(&payload).into_owned();

        match namespace.put(self.registry_key(), Bytes::from(payload)).await {
            Ok(revision) => {
                info!(revision, "Published server info to registry: {}", json);
                *self.state.lock() = PresenceState::Registered;
            }
            Err(e) => {
                warn!("Failed to publish server info to registry: {}", e);
            }
        }

        self.state()
    }

    /// Shutdown transition. Deletes the entry if the namespace is available.
    pub async fn on_shutdown(&self) -> PresenceState {
        match self.registry.namespace() {
            Some(namespace) => match namespace.delete(self.registry_key()).await {
                Ok(()) => info!("Deleted server {} from registry", self.registry_key()),
                Err(e) => warn!("Failed to delete server from registry: {}", e),
            },
            None => debug!("Registry unavailable, nothing to withdraw"),
        }

        *self.state.lock() = PresenceState::Unregistered;
        PresenceState::Unregistered
    }

    /// Read back what the registry currently holds for this instance
    pub async fn published_record(&self) -> Option<RegistrationRecord> {
        let namespace = self.registry.namespace()?;
        match namespace.get(self.registry_key()).await {
            Ok(Some(bytes)) => match RegistrationRecord::from_json_slice(&bytes) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!("Registry entry for {} is unreadable: {}", self.registry_key(), e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!("Failed to read registry entry: {}", e);
                None
            }
        }
    }

    /// Drive both transitions.
    ///
    /// Registers once `ready` resolves, then waits for `shutdown` and
    /// deregisters. If `shutdown` resolves first the ready transition is
    /// never attempted, but the deregistration still runs.
    pub async fn run<R, S>(&self, ready: R, shutdown: S) -> PresenceState
    where
        R: Future<Output = ()>,
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        tokio::select! {
            biased;
            _ = &mut shutdown => {
                info!("Shutdown requested before the server became ready");
            }
            _ = ready => {
                self.on_ready().await;
                (&mut shutdown).await;
                info!("Shutdown requested, withdrawing presence");
            }
        }

        self.on_shutdown().await
    }
}
