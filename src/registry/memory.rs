//! In-process registry
//!
//! Behaves like a single registry server shared by every connection made
//! through the same `MemoryRegistry`. Faults can be switched on per layer,
//! and every call is counted so callers can assert what was (not) touched.

use super::{DurableContext, Namespace, NamespaceAdmin, RegistryConnector, RegistryTransport};
use crate::error::{BeaconError, BeaconResult};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Which operations should fail
#[derive(Clone, Debug, Default)]
pub struct MemoryFaults {
    pub refuse_connections: bool,
    pub durable_unavailable: bool,
    pub admin_unavailable: bool,
    pub fail_list: bool,
    pub fail_create: bool,
    /// Another instance creates the namespace between our list and create
    pub lose_create_race: bool,
    pub fail_put: bool,
    pub fail_delete: bool,
}

/// Number of calls made per operation
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub connects: usize,
    pub lists: usize,
    pub creates: usize,
    pub puts: usize,
    pub gets: usize,
    pub deletes: usize,
}

impl CallCounts {
    /// Calls that change registry contents
    pub fn mutating(&self) -> usize {
        self.creates + self.puts + self.deletes
    }
}

#[derive(Default)]
struct Counters {
    connects: AtomicUsize,
    lists: AtomicUsize,
    creates: AtomicUsize,
    puts: AtomicUsize,
    gets: AtomicUsize,
    deletes: AtomicUsize,
}

impl Counters {
    fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::SeqCst);
    }

    fn snapshot(&self) -> CallCounts {
        CallCounts {
            connects: self.connects.load(Ordering::SeqCst),
            lists: self.lists.load(Ordering::SeqCst),
            creates: self.creates.load(Ordering::SeqCst),
            puts: self.puts.load(Ordering::SeqCst),
            gets: self.gets.load(Ordering::SeqCst),
            deletes: self.deletes.load(Ordering::SeqCst),
        }
    }
}

#[derive(Default)]
struct Shared {
    buckets: RwLock<HashMap<String, BTreeMap<String, Bytes>>>,
    faults: RwLock<MemoryFaults>,
    counters: Counters,
    revision: AtomicU64,
}

/// Shared in-process registry
#[derive(Clone, Default)]
pub struct MemoryRegistry {
    shared: Arc<Shared>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry where `name` already exists
    pub fn with_namespace(name: &str) -> Self {
        let registry = Self::new();
        registry
            .shared
            .buckets
            .write()
            .insert(name.to_string(), BTreeMap::new());
        registry
    }

    pub fn with_faults(self, faults: MemoryFaults) -> Self {
        self.set_faults(faults);
        self
    }

    pub fn set_faults(&self, faults: MemoryFaults) {
        *self.shared.faults.write() = faults;
    }

    pub fn calls(&self) -> CallCounts {
        self.shared.counters.snapshot()
    }

    pub fn namespace_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.shared.buckets.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Raw value stored under `key`
    pub fn entry(&self, namespace: &str, key: &str) -> Option<Bytes> {
        self.shared
            .buckets
            .read()
            .get(namespace)
            .and_then(|bucket| bucket.get(key).cloned())
    }

    pub fn keys(&self, namespace: &str) -> Vec<String> {
        self.shared
            .buckets
            .read()
            .get(namespace)
            .map(|bucket| bucket.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn faults(&self) -> MemoryFaults {
        self.shared.faults.read().clone()
    }
}

#[async_trait]
impl RegistryConnector for MemoryRegistry {
    async fn connect(&self, uri: &str) -> BeaconResult<Arc<dyn RegistryTransport>> {
        Counters::bump(&self.shared.counters.connects);
        if self.faults().refuse_connections {
            return Err(BeaconError::Connection(format!(
                "{}: connection refused",
                uri
            )));
        }
        Ok(Arc::new(MemoryTransport {
            registry: self.clone(),
        }))
    }
}

struct MemoryTransport {
    registry: MemoryRegistry,
}

#[async_trait]
impl RegistryTransport for MemoryTransport {
    async fn durable_context(&self) -> BeaconResult<DurableContext> {
        if self.registry.faults().durable_unavailable {
            return Err(BeaconError::DurableContext(
                "jetstream not enabled for account".to_string(),
            ));
        }
        let buckets = self.registry.shared.buckets.read();
        Ok(DurableContext {
            streams: buckets.len() as u64,
            ..DurableContext::default()
        })
    }

    async fn namespace_admin(&self) -> BeaconResult<Arc<dyn NamespaceAdmin>> {
        if self.registry.faults().admin_unavailable {
            return Err(BeaconError::Provisioning(
                "namespace management unavailable".to_string(),
            ));
        }
        Ok(Arc::new(MemoryNamespaceAdmin {
            registry: self.registry.clone(),
        }))
    }

    async fn open_namespace(&self, name: &str) -> BeaconResult<Arc<dyn Namespace>> {
        if !self.registry.shared.buckets.read().contains_key(name) {
            return Err(BeaconError::NamespaceUnavailable {
                name: name.to_string(),
                reason: "bucket not found".to_string(),
            });
        }
        Ok(Arc::new(MemoryNamespace {
            registry: self.registry.clone(),
            name: name.to_string(),
        }))
    }
}

struct MemoryNamespaceAdmin {
    registry: MemoryRegistry,
}

#[async_trait]
impl NamespaceAdmin for MemoryNamespaceAdmin {
    async fn namespace_names(&self) -> BeaconResult<Vec<String>> {
        Counters::bump(&self.registry.shared.counters.lists);
        if self.registry.faults().fail_list {
            return Err(BeaconError::Provisioning(
                "listing buckets timed out".to_string(),
            ));
        }
        Ok(self.registry.namespace_names())
    }

    async fn create_namespace(&self, name: &str) -> BeaconResult<()> {
        Counters::bump(&self.registry.shared.counters.creates);
        let faults = self.registry.faults();
        if faults.fail_create {
            return Err(BeaconError::Provisioning(format!(
                "creating bucket {} rejected",
                name
            )));
        }

        let mut buckets = self.registry.shared.buckets.write();
        if faults.lose_create_race {
            buckets.entry(name.to_string()).or_default();
        }
        if buckets.contains_key(name) {
            return Err(BeaconError::NamespaceExists(name.to_string()));
        }
        buckets.insert(name.to_string(), BTreeMap::new());
        Ok(())
    }
}

struct MemoryNamespace {
    registry: MemoryRegistry,
    name: String,
}

impl MemoryNamespace {
    fn missing(&self) -> BeaconError {
        BeaconError::NamespaceUnavailable {
            name: self.name.clone(),
            reason: "bucket deleted".to_string(),
        }
    }
}

#[async_trait]
impl Namespace for MemoryNamespace {
    fn name(&self) -> &str {
        &self.name
    }

    async fn put(&self, key: &str, value: Bytes) -> BeaconResult<u64> {
        Counters::bump(&self.registry.shared.counters.puts);
        if self.registry.faults().fail_put {
            return Err(BeaconError::Put {
                key: key.to_string(),
                reason: "no responders".to_string(),
            });
        }
        let mut buckets = self.registry.shared.buckets.write();
        let bucket = buckets.get_mut(&self.name).ok_or_else(|| self.missing())?;
        bucket.insert(key.to_string(), value);
        Ok(self.registry.shared.revision.fetch_add(1, Ordering::SeqCst) + 1)
    }

    async fn get(&self, key: &str) -> BeaconResult<Option<Bytes>> {
        Counters::bump(&self.registry.shared.counters.gets);
        let buckets = self.registry.shared.buckets.read();
        let bucket = buckets.get(&self.name).ok_or_else(|| self.missing())?;
        Ok(bucket.get(key).cloned())
    }

    async fn delete(&self, key: &str) -> BeaconResult<()> {
        Counters::bump(&self.registry.shared.counters.deletes);
        if self.registry.faults().fail_delete {
            return Err(BeaconError::Delete {
                key: key.to_string(),
                reason: "no responders".to_string(),
            });
        }
        let mut buckets = self.registry.shared.buckets.write();
        let bucket = buckets.get_mut(&self.name).ok_or_else(|| self.missing())?;
        match bucket.remove(key) {
            Some(_) => Ok(()),
            None => Err(BeaconError::Delete {
                key: key.to_string(),
                reason: "key not found".to_string(),
            }),
        }
    }
}
