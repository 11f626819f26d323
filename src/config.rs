//! Beacon Configuration
//!
//! Defines where the registry lives, which namespace holds the presence
//! entries, and the identity values the orchestrator injects into the pod:
//! - Instance identity (pod name, cluster namespace, headless service)
//! - Registry endpoint and bucket
//! - Downward API file locations

use crate::error::{BeaconError, BeaconResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Registry endpoint used when nothing else is configured
pub const DEFAULT_REGISTRY_URL: &str = "nats://network-nats:4222";

/// Well-known namespace holding one entry per live server
pub const DEFAULT_NAMESPACE: &str = "servers";

/// Port the game server listens on
pub const DEFAULT_SERVER_PORT: u16 = 25565;

/// Downward API file with the pod's labels
pub const DEFAULT_LABELS_PATH: &str = "/etc/podinfo/labels";

/// Downward API file with the pod's annotations
pub const DEFAULT_ANNOTATIONS_PATH: &str = "/etc/podinfo/annotations";

/// Stable identity of this instance inside the cluster
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InstanceIdentity {
    /// Pod name, also the registry key
    pub pod_name: String,
    /// Kubernetes namespace the pod runs in
    pub namespace: String,
    /// Headless service giving the pod a stable DNS name
    pub headless_service: String,
}

impl InstanceIdentity {
    pub fn new(
        pod_name: impl Into<String>,
        namespace: impl Into<String>,
        headless_service: impl Into<String>,
    ) -> Self {
        Self {
            pod_name: pod_name.into(),
            namespace: namespace.into(),
            headless_service: headless_service.into(),
        }
    }

    /// Key under which this instance is announced
    pub fn registry_key(&self) -> &str {
        &self.pod_name
    }

    /// Cluster-internal address other pods can reach this instance on
    pub fn server_address(&self, port: u16) -> String {
        format!(
            "{}.{}.{}.svc.cluster.local:{}",
            self.pod_name, self.headless_service, self.namespace, port
        )
    }
}

/// Complete beacon configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeaconConfig {
    /// Instance identity
    pub identity: InstanceIdentity,
    /// Registry connection URI
    pub registry_url: String,
    /// Namespace (bucket) holding presence entries
    pub bucket: String,
    /// Port advertised in the server address
    pub server_port: u16,
    /// Labels file
    pub labels_path: PathBuf,
    /// Annotations file
    pub annotations_path: PathBuf,
    /// Forwarding secret shared with the proxy. Only reported, never published.
    #[serde(skip_serializing)]
    pub proxy_secret: Option<String>,
}

impl Default for BeaconConfig {
    fn default() -> Self {
        Self {
            identity: InstanceIdentity::default(),
            registry_url: DEFAULT_REGISTRY_URL.to_string(),
            bucket: DEFAULT_NAMESPACE.to_string(),
            server_port: DEFAULT_SERVER_PORT,
            labels_path: PathBuf::from(DEFAULT_LABELS_PATH),
            annotations_path: PathBuf::from(DEFAULT_ANNOTATIONS_PATH),
            proxy_secret: None,
        }
    }
}

impl BeaconConfig {
    /// Create a config for the given identity with default everything else
    pub fn for_identity(identity: InstanceIdentity) -> Self {
        Self {
            identity,
            ..Self::default()
        }
    }

    /// Address published under the `server/address` annotation
    pub fn server_address(&self) -> String {
        self.identity.server_address(self.server_port)
    }

    /// Reject values that would produce an unusable registry entry
    pub fn validate(&self) -> BeaconResult<()> {
        if self.identity.pod_name.trim().is_empty() {
            return Err(BeaconError::InvalidConfig(
                "instance name (POD_NAME) must not be empty".to_string(),
            ));
        }
        if self.bucket.trim().is_empty() {
            return Err(BeaconError::InvalidConfig(
                "registry bucket must not be empty".to_string(),
            ));
        }
        if self.server_port == 0 {
            return Err(BeaconError::InvalidConfig(
                "server port must not be 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_address_format() {
        let identity = InstanceIdentity::new("lobby-0", "minecraft", "lobby-headless");
        assert_eq!(
            identity.server_address(25565),
            "lobby-0.lobby-headless.minecraft.svc.cluster.local:25565"
        );
        assert_eq!(identity.registry_key(), "lobby-0");
    }

    #[test]
    fn test_default_config() {
        let config = BeaconConfig::default();
        assert_eq!(config.registry_url, "nats://network-nats:4222");
        assert_eq!(config.bucket, "servers");
        assert_eq!(config.server_port, 25565);
        assert_eq!(config.labels_path, PathBuf::from("/etc/podinfo/labels"));
        assert_eq!(
            config.annotations_path,
            PathBuf::from("/etc/podinfo/annotations")
        );
        assert!(config.proxy_secret.is_none());
    }

    #[test]
    fn test_config_server_address_uses_port() {
        let mut config = BeaconConfig::for_identity(InstanceIdentity::new("pod-a", "ns", "svc"));
        config.server_port = 25566;
        assert_eq!(config.server_address(), "pod-a.svc.ns.svc.cluster.local:25566");
    }

    #[test]
    fn test_validate() {
        let config = BeaconConfig::for_identity(InstanceIdentity::new("pod-a", "ns", "svc"));
        assert!(config.validate().is_ok());

        assert!(BeaconConfig::default().validate().is_err());

        let mut no_bucket = config.clone();
        no_bucket.bucket = "  ".to_string();
        assert!(matches!(
            no_bucket.validate(),
            Err(BeaconError::InvalidConfig(_))
        ));

        let mut no_port = config;
        no_port.server_port = 0;
        assert!(no_port.validate().is_err());
    }

    #[test]
    fn test_proxy_secret_not_serialized() {
        let mut config = BeaconConfig::for_identity(InstanceIdentity::new("pod-a", "ns", "svc"));
        config.proxy_secret = Some("hunter2".to_string());

        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("hunter2"));
    }
}
