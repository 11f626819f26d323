//! Namespace provisioning
//!
//! Makes sure the presence bucket exists before anyone writes to it. Many
//! instances start at once, so losing the creation race is a success.

use crate::error::BeaconError;
use crate::registry::NamespaceAdmin;
use tracing::{debug, info, warn};

/// What `ensure_namespace` ended up doing
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProvisionOutcome {
    /// No namespace admin available
    Skipped,
    /// Namespace was listed, nothing created
    AlreadyPresent,
    /// This instance created the namespace
    Created,
    /// Creation reported the namespace as existing (another instance won)
    CreatedConcurrently,
    /// Listing or creation failed
    Failed(String),
}

impl ProvisionOutcome {
    /// True if the namespace is known to exist afterwards
    pub fn is_available(&self) -> bool {
        matches!(
            self,
            ProvisionOutcome::AlreadyPresent
                | ProvisionOutcome::Created
                | ProvisionOutcome::CreatedConcurrently
        )
    }
}

/// Create `name` with default settings unless it already exists.
///
/// Never fails: errors are logged and reported through the outcome.
pub async fn ensure_namespace(admin: Option<&dyn NamespaceAdmin>, name: &str) -> ProvisionOutcome {
    let Some(admin) = admin else {
        debug!("No namespace management handle, not provisioning {}", name);
        return ProvisionOutcome::Skipped;
    };

    let existing = match admin.namespace_names().await {
        Ok(names) => names,
        Err(e) => {
            warn!("Failed to list registry namespaces: {}", e);
            return ProvisionOutcome::Failed(e.to_string());
        }
    };

    if existing.iter().any(|existing| existing == name) {
        debug!("Registry namespace {} already exists", name);
        return ProvisionOutcome::AlreadyPresent;
    }

    match admin.create_namespace(name).await {
        Ok(()) => {
            info!("Created registry namespace {}", name);
            ProvisionOutcome::Created
        }
        Err(BeaconError::NamespaceExists(_)) => {
            info!("Registry namespace {} was created concurrently", name);
            ProvisionOutcome::CreatedConcurrently
        }
        Err(e) => {
            warn!("Failed to create registry namespace {}: {}", name, e);
            ProvisionOutcome::Failed(e.to_string())
        }
    }
}
