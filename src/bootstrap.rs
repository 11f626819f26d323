//! Registry client bootstrap
//!
//! Opens every layer of the registry connection once at startup:
//!
//! ```text
//! transport ──┬── durable context
//!             ├── namespace admin ── ensure_namespace()
//!             └── namespace handle
//! ```
//!
//! A layer that cannot be opened is logged and left empty; everything
//! downstream of it becomes a no-op. Bootstrap itself never fails, so the
//! game server starts whether or not the registry is reachable.

use crate::config::BeaconConfig;
use crate::error::BeaconResult;
use crate::provision::{ensure_namespace, ProvisionOutcome};
use crate::registry::{
    DurableContext, Namespace, NamespaceAdmin, RegistryConnector, RegistryLayer,
    RegistryTransport,
};
use futures::future::OptionFuture;
use std::sync::Arc;
use tracing::{info, warn};

/// The opened registry layers. Built once, then shared read-only.
#[derive(Clone, Default)]
pub struct RegistryHandle {
    transport: Option<Arc<dyn RegistryTransport>>,
    durable: Option<DurableContext>,
    admin: Option<Arc<dyn NamespaceAdmin>>,
    namespace: Option<Arc<dyn Namespace>>,
    provisioning: Option<ProvisionOutcome>,
}

impl RegistryHandle {
    /// Handle with no layers, turning every registry operation into a no-op
    pub fn disconnected() -> Self {
        Self::default()
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    pub fn transport(&self) -> Option<&Arc<dyn RegistryTransport>> {
        self.transport.as_ref()
    }

    pub fn durable_context(&self) -> Option<&DurableContext> {
        self.durable.as_ref()
    }

    pub fn namespace_admin(&self) -> Option<&Arc<dyn NamespaceAdmin>> {
        self.admin.as_ref()
    }

    /// Namespace ready for put/delete, if it could be opened
    pub fn namespace(&self) -> Option<&Arc<dyn Namespace>> {
        self.namespace.as_ref()
    }

    pub fn provisioning(&self) -> Option<&ProvisionOutcome> {
        self.provisioning.as_ref()
    }
}

impl std::fmt::Debug for RegistryHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryHandle")
            .field("transport", &self.transport.is_some())
            .field("durable", &self.durable)
            .field("admin", &self.admin.is_some())
            .field("namespace", &self.namespace.as_ref().map(|ns| ns.name().to_string()))
            .field("provisioning", &self.provisioning)
            .finish()
    }
}

/// Keep a successfully opened layer, log and drop a failed one
fn settle<T>(layer: RegistryLayer, opened: BeaconResult<T>) -> Option<T> {
    match opened {
        Ok(value) => {
            info!("Connected to {}", layer);
            Some(value)
        }
        Err(e) => {
            warn!("Failed to open {}: {}", layer, e);
            None
        }
    }
}

/// Connect to the registry at `uri` and prepare namespace `namespace`.
pub async fn bootstrap(
    connector: &dyn RegistryConnector,
    uri: &str,
    namespace: &str,
) -> RegistryHandle {
    let transport = settle(RegistryLayer::Transport, connector.connect(uri).await);

    let durable = OptionFuture::from(transport.as_ref().map(|t| t.durable_context()))
        .await
        .and_then(|opened| settle(RegistryLayer::DurableContext, opened));
    if let Some(account) = &durable {
        info!(
            streams = account.streams,
            consumers = account.consumers,
            memory_bytes = account.memory_bytes,
            storage_bytes = account.storage_bytes,
            "Durable messaging account"
        );
    }

    let admin = OptionFuture::from(transport.as_ref().map(|t| t.namespace_admin()))
        .await
        .and_then(|opened| settle(RegistryLayer::NamespaceAdmin, opened));

    // Only provision when the transport is up; a missing admin alone is logged by the provisioner
    let provisioning = OptionFuture::from(
        transport
            .as_ref()
            .map(|_| ensure_namespace(admin.as_deref(), namespace)),
    )
    .await;

    let namespace_handle = OptionFuture::from(transport.as_ref().map(|t| t.open_namespace(namespace)))
        .await
        .and_then(|opened| settle(RegistryLayer::Namespace, opened));

    if namespace_handle.is_none() {
        warn!(
            "Registry namespace {} unavailable, presence announcements disabled",
            namespace
        );
    }

    RegistryHandle {
        transport,
        durable,
        admin,
        namespace: namespace_handle,
        provisioning,
    }
}

/// Bootstrap from a beacon configuration.
///
/// An invalid configuration is logged and yields a disconnected handle, so a
/// misconfigured pod keeps running without announcing itself.
pub async fn bootstrap_with_config(
    connector: &dyn RegistryConnector,
    config: &BeaconConfig,
) -> RegistryHandle {
    if let Err(e) = config.validate() {
        warn!("{}, running without the registry", e);
        return RegistryHandle::disconnected();
    }
    bootstrap(connector, &config.registry_url, &config.bucket).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InstanceIdentity;
    use crate::registry::{MemoryFaults, MemoryRegistry};

    #[tokio::test]
    async fn test_full_bootstrap_creates_namespace() {
        let registry = MemoryRegistry::new();

        let handle = bootstrap(&registry, "memory://test", "servers").await;

        assert!(handle.is_connected());
        assert!(handle.durable_context().is_some());
        assert!(handle.namespace_admin().is_some());
        assert_eq!(handle.provisioning(), Some(&ProvisionOutcome::Created));
        assert_eq!(handle.namespace().map(|ns| ns.name()), Some("servers"));
    }

    #[tokio::test]
    async fn test_unreachable_registry_yields_empty_handle() {
        let registry = MemoryRegistry::new().with_faults(MemoryFaults {
            refuse_connections: true,
            ..Default::default()
        });

        let handle = bootstrap(&registry, "memory://test", "servers").await;

        assert!(!handle.is_connected());
        assert!(handle.durable_context().is_none());
        assert!(handle.namespace_admin().is_none());
        assert!(handle.namespace().is_none());
        assert!(handle.provisioning().is_none());
        assert_eq!(registry.calls().lists, 0);
    }

    #[tokio::test]
    async fn test_durable_context_failure_does_not_block_namespace() {
        let registry = MemoryRegistry::new().with_faults(MemoryFaults {
            durable_unavailable: true,
            ..Default::default()
        });

        let handle = bootstrap(&registry, "memory://test", "servers").await;

        assert!(handle.durable_context().is_none());
        assert!(handle.namespace_admin().is_some());
        assert!(handle.namespace().is_some());
    }

    #[tokio::test]
    async fn test_admin_failure_with_existing_namespace() {
        let registry = MemoryRegistry::with_namespace("servers").with_faults(MemoryFaults {
            admin_unavailable: true,
            ..Default::default()
        });

        let handle = bootstrap(&registry, "memory://test", "servers").await;

        assert!(handle.namespace_admin().is_none());
        assert_eq!(handle.provisioning(), Some(&ProvisionOutcome::Skipped));
        assert!(handle.namespace().is_some());
    }

    #[tokio::test]
    async fn test_admin_failure_without_namespace() {
        let registry = MemoryRegistry::new().with_faults(MemoryFaults {
            admin_unavailable: true,
            ..Default::default()
        });

        let handle = bootstrap(&registry, "memory://test", "servers").await;

        assert!(handle.is_connected());
        assert!(handle.namespace().is_none());
    }

    #[tokio::test]
    async fn test_existing_namespace_not_recreated() {
        let registry = MemoryRegistry::with_namespace("servers");

        let handle = bootstrap(&registry, "memory://test", "servers").await;

        assert_eq!(handle.provisioning(), Some(&ProvisionOutcome::AlreadyPresent));
        assert_eq!(registry.calls().creates, 0);
        assert!(handle.namespace().is_some());
    }

    #[tokio::test]
    async fn test_empty_pod_name_runs_disconnected() {
        let registry = MemoryRegistry::new();
        let config = BeaconConfig::for_identity(InstanceIdentity::new("", "ns", "svc"));

        let handle = bootstrap_with_config(&registry, &config).await;

        assert!(!handle.is_connected());
        assert!(handle.namespace().is_none());
        assert_eq!(registry.calls().connects, 0);
        assert!(registry.namespace_names().is_empty());
    }

    #[tokio::test]
    async fn test_valid_config_bootstraps_bucket() {
        let registry = MemoryRegistry::new();
        let config = BeaconConfig::for_identity(InstanceIdentity::new("pod-a", "ns", "svc"));

        let handle = bootstrap_with_config(&registry, &config).await;

        assert!(handle.is_connected());
        assert_eq!(handle.namespace().map(|ns| ns.name()), Some("servers"));
    }

    #[test]
    fn test_disconnected_handle() {
        let handle = RegistryHandle::disconnected();
        assert!(!handle.is_connected());
        assert!(handle.namespace().is_none());
        assert!(format!("{:?}", handle).contains("transport: false"));
    }
}
