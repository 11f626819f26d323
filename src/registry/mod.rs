//! Registry client seams
//!
//! The registry is reached in layers, each opened over the transport:
//!
//! ```text
//! RegistryConnector::connect(uri)
//!     └── RegistryTransport
//!           ├── durable_context()   (JetStream availability)
//!           ├── namespace_admin()   (list / create buckets)
//!           └── open_namespace()    (put / get / delete keys)
//! ```
//!
//! `nats` talks to a real NATS server; `memory` keeps everything in process
//! and can fail any layer on demand.

pub mod memory;
pub mod nats;

use crate::error::BeaconResult;
use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;
use std::sync::Arc;

pub use memory::{CallCounts, MemoryFaults, MemoryRegistry};
pub use nats::NatsConnector;

/// Opens the transport to a registry endpoint
#[async_trait]
pub trait RegistryConnector: Send + Sync {
    async fn connect(&self, uri: &str) -> BeaconResult<Arc<dyn RegistryTransport>>;
}

/// An open connection to the registry
#[async_trait]
pub trait RegistryTransport: Send + Sync {
    /// Open the durable messaging context and report what the account holds
    async fn durable_context(&self) -> BeaconResult<DurableContext>;

    /// Open a handle able to list and create namespaces
    async fn namespace_admin(&self) -> BeaconResult<Arc<dyn NamespaceAdmin>>;

    /// Open an existing namespace
    async fn open_namespace(&self, name: &str) -> BeaconResult<Arc<dyn Namespace>>;
}

/// Namespace (bucket) management
#[async_trait]
pub trait NamespaceAdmin: Send + Sync {
    async fn namespace_names(&self) -> BeaconResult<Vec<String>>;

    /// Create a namespace with default settings.
    ///
    /// Returns `BeaconError::NamespaceExists` when the namespace turned out
    /// to exist already, including when another instance created it first.
    async fn create_namespace(&self, name: &str) -> BeaconResult<()>;
}

/// Key-value access to a single namespace
#[async_trait]
pub trait Namespace: Send + Sync {
    fn name(&self) -> &str;

    /// Store `value` under `key`, returning the new revision
    async fn put(&self, key: &str, value: Bytes) -> BeaconResult<u64>;

    /// Current value, `None` if the key was never written or was deleted
    async fn get(&self, key: &str) -> BeaconResult<Option<Bytes>>;

    async fn delete(&self, key: &str) -> BeaconResult<()>;
}

/// Summary of the durable messaging account, captured when the context opens
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DurableContext {
    pub streams: u64,
    pub consumers: u64,
    pub memory_bytes: u64,
    pub storage_bytes: u64,
}

/// Layers of the registry connection, used in log lines
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegistryLayer {
    Transport,
    DurableContext,
    NamespaceAdmin,
    Namespace,
}

impl fmt::Display for RegistryLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RegistryLayer::Transport => "registry transport",
            RegistryLayer::DurableContext => "durable messaging context",
            RegistryLayer::NamespaceAdmin => "namespace management",
            RegistryLayer::Namespace => "registry namespace",
        };
        f.write_str(name)
    }
}
