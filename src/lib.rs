//! Presence beacon for game server instances
//!
//! Announces this pod in a cluster-wide NATS key-value registry once the
//! server is up, and withdraws the announcement on shutdown, so the proxy
//! can discover live backends without polling.
//!
//! ## Module Structure
//!
//! - `config`: instance identity, registry endpoint, file locations
//! - `identity`: downward API `key=value` files
//! - `record`: the registration record stored in the registry
//! - `registry`: registry client seams (NATS and in-process)
//! - `bootstrap`: layered, all-optional registry connection
//! - `provision`: idempotent namespace creation
//! - `lifecycle`: register on ready, deregister on shutdown
//! - `readiness` / `shutdown`: host signals driving the lifecycle
//!
//! Every registry failure is logged and absorbed; the host process keeps
//! serving players whether or not the registry is reachable.

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod identity;
pub mod lifecycle;
pub mod provision;
pub mod readiness;
pub mod record;
pub mod registry;
pub mod shutdown;

pub use bootstrap::{bootstrap, bootstrap_with_config, RegistryHandle};
pub use config::{
    BeaconConfig, InstanceIdentity, DEFAULT_ANNOTATIONS_PATH, DEFAULT_LABELS_PATH,
    DEFAULT_NAMESPACE, DEFAULT_REGISTRY_URL, DEFAULT_SERVER_PORT,
};
pub use error::{BeaconError, BeaconResult};
pub use identity::{parse_key_value_lines, read_key_value_file, Metadata};
pub use lifecycle::{PresenceBeacon, PresenceState};
pub use provision::{ensure_namespace, ProvisionOutcome};
pub use readiness::ReadinessProbe;
pub use record::{RegistrationRecord, SERVER_ADDRESS_ANNOTATION};
pub use registry::{
    DurableContext, MemoryFaults, MemoryRegistry, Namespace, NamespaceAdmin, NatsConnector,
    RegistryConnector, RegistryTransport,
};
pub use shutdown::{shutdown_requested, wait_for_shutdown_signal};
