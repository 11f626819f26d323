//! NATS JetStream key-value registry
//!
//! Namespaces map to KV buckets, entries to KV keys. Deleting a key leaves a
//! tombstone, which readers observe as an absent entry.
//!
//! JetStream backs each bucket with a stream named `KV_<bucket>`, so buckets
//! are listed by filtering the account's stream names.

use super::{DurableContext, Namespace, NamespaceAdmin, RegistryConnector, RegistryTransport};
use crate::error::{BeaconError, BeaconResult};
use async_nats::jetstream::{self, kv};
use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use std::sync::Arc;
use tracing::debug;

/// Stream name prefix JetStream gives key-value buckets
const KV_STREAM_PREFIX: &str = "KV_";

/// Bucket names behind the given stream names, skipping streams that are not buckets
fn bucket_names<I>(streams: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    streams
        .into_iter()
        .filter_map(|stream| {
            stream
                .strip_prefix(KV_STREAM_PREFIX)
                .filter(|bucket| !bucket.is_empty())
                .map(str::to_string)
        })
        .collect()
}

/// Connects to a NATS server
#[derive(Clone, Debug, Default)]
pub struct NatsConnector {
    /// Client name reported to the server, usually the pod name
    client_name: Option<String>,
}

impl NatsConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = Some(name.into());
        self
    }
}

#[async_trait]
impl RegistryConnector for NatsConnector {
    async fn connect(&self, uri: &str) -> BeaconResult<Arc<dyn RegistryTransport>> {
        let mut options = async_nats::ConnectOptions::new();
        if let Some(name) = &self.client_name {
            options = options.name(name);
        }

        debug!("Connecting to NATS at {}", uri);
        let client = options
            .connect(uri)
            .await
            .map_err(|e| BeaconError::Connection(format!("{}: {}", uri, e)))?;

        Ok(Arc::new(NatsTransport { client }))
    }
}

struct NatsTransport {
    client: async_nats::Client,
}

impl NatsTransport {
    fn jetstream(&self) -> jetstream::Context {
        jetstream::new(self.client.clone())
    }
}

#[async_trait]
impl RegistryTransport for NatsTransport {
    async fn durable_context(&self) -> BeaconResult<DurableContext> {
        let account = self
            .jetstream()
            .query_account()
            .await
            .map_err(|e| BeaconError::DurableContext(e.to_string()))?;

        Ok(DurableContext {
            streams: account.streams as u64,
            consumers: account.consumers as u64,
            memory_bytes: account.memory as u64,
            storage_bytes: account.storage as u64,
        })
    }

    async fn namespace_admin(&self) -> BeaconResult<Arc<dyn NamespaceAdmin>> {
        Ok(Arc::new(NatsNamespaceAdmin {
            context: self.jetstream(),
        }))
    }

    async fn open_namespace(&self, name: &str) -> BeaconResult<Arc<dyn Namespace>> {
        let store = self
            .jetstream()
            .get_key_value(name)
            .await
            .map_err(|e| BeaconError::NamespaceUnavailable {
                name: name.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Arc::new(NatsNamespace {
            name: name.to_string(),
            store,
        }))
    }
}

struct NatsNamespaceAdmin {
    context: jetstream::Context,
}

#[async_trait]
impl NamespaceAdmin for NatsNamespaceAdmin {
    async fn namespace_names(&self) -> BeaconResult<Vec<String>> {
        let streams: Vec<String> = self
            .context
            .stream_names()
            .try_collect()
            .await
            .map_err(|e| BeaconError::Provisioning(format!("listing buckets: {}", e)))?;

        Ok(bucket_names(streams))
    }

    async fn create_namespace(&self, name: &str) -> BeaconResult<()> {
        let config = kv::Config {
            bucket: name.to_string(),
            ..Default::default()
        };

        match self.context.create_key_value(config).await {
            Ok(_) => Ok(()),
            Err(e) => {
                // Another instance may have won the race with a different config.
                // Exercised against MemoryRegistry's lose_create_race only
                if self.context.get_key_value(name).await.is_ok() {
                    debug!("Bucket {} appeared while creating it: {}", name, e);
                    Err(BeaconError::NamespaceExists(name.to_string()))
                } else {
                    Err(BeaconError::Provisioning(format!(
                        "creating bucket {}: {}",
                        name, e
                    )))
                }
            }
        }
    }
}

struct NatsNamespace {
    name: String,
    store: kv::Store,
}

#[async_trait]
impl Namespace for NatsNamespace {
    fn name(&self) -> &str {
        &self.name
    }

    async fn put(&self, key: &str, value: Bytes) -> BeaconResult<u64> {
        self.store
            .put(key, value)
            .await
            .map_err(|e| BeaconError::Put {
                key: key.to_string(),
                reason: e.to_string(),
            })
    }

    async fn get(&self, key: &str) -> BeaconResult<Option<Bytes>> {
        self.store.get(key).await.map_err(|e| BeaconError::Get {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }

    async fn delete(&self, key: &str) -> BeaconResult<()> {
        self.store
            .delete(key)
            .await
            .map_err(|e| BeaconError::Delete {
                key: key.to_string(),
                reason: e.to_string(),
            })
    }
}
