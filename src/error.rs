//! Error types for the presence beacon

use thiserror::Error;

/// Result type for beacon operations
pub type BeaconResult<T> = Result<T, BeaconError>;

/// Errors that can occur while talking to the registry or preparing a record.
///
/// None of these ever escape the lifecycle controller: the bootstrap,
/// provisioner and controller log them and carry on.
#[derive(Error, Debug)]
pub enum BeaconError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Durable messaging unavailable: {0}")]
    DurableContext(String),

    #[error("Namespace {name} unavailable: {reason}")]
    NamespaceUnavailable { name: String, reason: String },

    #[error("Namespace provisioning failed: {0}")]
    Provisioning(String),

    #[error("Namespace already exists: {0}")]
    NamespaceExists(String),

    #[error("Put failed for key {key}: {reason}")]
    Put { key: String, reason: String },

    #[error("Delete failed for key {key}: {reason}")]
    Delete { key: String, reason: String },

    #[error("Read failed for key {key}: {reason}")]
    Get { key: String, reason: String },

    #[error("Identity file error: {0}")]
    IdentityFile(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<std::io::Error> for BeaconError {
    fn from(err: std::io::Error) -> Self {
        BeaconError::IdentityFile(err.to_string())
    }
}

impl From<serde_json::Error> for BeaconError {
    fn from(err: serde_json::Error) -> Self {
        BeaconError::Serialization(err.to_string())
    }
}
