//! End-to-end presence scenarios
//!
//! Drives bootstrap, provisioning and the lifecycle controller against the
//! in-process registry, the way the sidecar binary drives them against NATS.

use presence_beacon::{
    bootstrap, ensure_namespace, BeaconConfig, InstanceIdentity, MemoryFaults, MemoryRegistry,
    PresenceBeacon, PresenceState, ProvisionOutcome, RegistrationRecord, RegistryConnector,
    RegistryTransport,
};
use std::io::Write;
use std::sync::Arc;
use tempfile::{tempdir, TempDir};

// ============================================================================
// TEST HELPERS
// ============================================================================

/// Config for pod-a whose downward API files live in a fresh (empty) temp dir
fn pod_a_config() -> (BeaconConfig, TempDir) {
    let dir = tempdir().unwrap();
    let mut config = BeaconConfig::for_identity(InstanceIdentity::new("pod-a", "ns", "svc"));
    config.registry_url = "memory://registry".to_string();
    config.labels_path = dir.path().join("labels");
    config.annotations_path = dir.path().join("annotations");
    (config, dir)
}

async fn start_beacon(registry: &MemoryRegistry, config: &BeaconConfig) -> PresenceBeacon {
    let handle = bootstrap(registry, &config.registry_url, &config.bucket).await;
    PresenceBeacon::new(Arc::new(handle), config)
}

// ============================================================================
// SCENARIOS
// ============================================================================

#[tokio::test]
async fn test_publishes_bare_record_when_identity_files_absent() {
    let (config, _dir) = pod_a_config();
    let registry = MemoryRegistry::new();
    let beacon = start_beacon(&registry, &config).await;

    assert_eq!(beacon.on_ready().await, PresenceState::Registered);

    let stored = registry.entry("servers", "pod-a").expect("pod-a published");
    assert_eq!(
        std::str::from_utf8(&stored).unwrap(),
        r#"{"labels":{},"annotations":{"server/address":"pod-a.svc.ns.svc.cluster.local:25565"}}"#
    );
}

#[tokio::test]
async fn test_unreachable_registry_degrades_to_noop() {
    let (config, _dir) = pod_a_config();
    let registry = MemoryRegistry::new().with_faults(MemoryFaults {
        refuse_connections: true,
        ..Default::default()
    });
    let beacon = start_beacon(&registry, &config).await;

    let state = beacon.run(async {}, async {}).await;
    assert_eq!(state, PresenceState::Unregistered);

    assert_eq!(beacon.on_ready().await, PresenceState::Unregistered);
    assert_eq!(beacon.on_shutdown().await, PresenceState::Unregistered);

    let calls = registry.calls();
    assert_eq!(calls.connects, 1);
    assert_eq!(calls.lists, 0);
    assert_eq!(calls.mutating(), 0);
    assert!(registry.namespace_names().is_empty());
}

#[tokio::test]
async fn test_existing_namespace_is_left_alone() {
    let registry = MemoryRegistry::with_namespace("servers");
    let transport = registry.connect("memory://registry").await.unwrap();
    let admin = transport.namespace_admin().await.unwrap();

    let outcome = ensure_namespace(Some(admin.as_ref()), "servers").await;

    assert_eq!(outcome, ProvisionOutcome::AlreadyPresent);
    assert_eq!(registry.calls().lists, 1);
    assert_eq!(registry.calls().mutating(), 0);
    assert_eq!(registry.namespace_names(), vec!["servers"]);
}

#[tokio::test]
async fn test_shutdown_after_publish_removes_entry() {
    let (config, _dir) = pod_a_config();
    let registry = MemoryRegistry::new();
    let beacon = start_beacon(&registry, &config).await;

    beacon.on_ready().await;
    assert!(registry.entry("servers", "pod-a").is_some());

    beacon.on_shutdown().await;
    assert!(registry.entry("servers", "pod-a").is_none());
    assert!(beacon.published_record().await.is_none());
}

// ============================================================================
// MULTI-INSTANCE
// ============================================================================

#[tokio::test]
async fn test_instances_own_only_their_key() {
    let registry = MemoryRegistry::new();
    let dir = tempdir().unwrap();

    let mut labels = std::fs::File::create(dir.path().join("labels")).unwrap();
    writeln!(labels, "app=\"lobby\"").unwrap();

    let mut beacons = Vec::new();
    for pod in ["lobby-0", "lobby-1", "lobby-2"] {
        let mut config =
            BeaconConfig::for_identity(InstanceIdentity::new(pod, "minecraft", "lobby"));
        config.registry_url = "memory://registry".to_string();
        config.labels_path = dir.path().join("labels");
        config.annotations_path = dir.path().join("annotations");
        beacons.push(start_beacon(&registry, &config).await);
    }

    for beacon in &beacons {
        beacon.on_ready().await;
    }
    assert_eq!(registry.keys("servers"), vec!["lobby-0", "lobby-1", "lobby-2"]);
    // First beacon created the bucket, the rest found it
    assert_eq!(registry.calls().creates, 1);

    beacons[1].on_shutdown().await;
    assert_eq!(registry.keys("servers"), vec!["lobby-0", "lobby-2"]);

    let survivor = registry.entry("servers", "lobby-2").unwrap();
    let record = RegistrationRecord::from_json_slice(&survivor).unwrap();
    assert!(record.matches_labels([("app", "lobby")]));
    assert_eq!(
        record.server_address(),
        Some("lobby-2.lobby.minecraft.svc.cluster.local:25565")
    );
}

#[tokio::test]
async fn test_concurrent_startup_provisions_one_namespace() {
    let registry = MemoryRegistry::new();

    let handles = futures::future::join_all(
        (0..8).map(|_| bootstrap(&registry, "memory://registry", "servers")),
    )
    .await;

    assert!(handles.iter().all(|h| h.namespace().is_some()));
    assert_eq!(registry.namespace_names(), vec!["servers"]);
}
