//! Registration record published for each live server
//!
//! Wire shape: `{"labels": {..}, "annotations": {..}}`. The proxy reads the
//! reachable address from the `server/address` annotation.

use crate::error::{BeaconError, BeaconResult};
use crate::identity::Metadata;
use serde::{Deserialize, Serialize};

/// Annotation holding the address the proxy should dial
pub const SERVER_ADDRESS_ANNOTATION: &str = "server/address";

/// Labels and annotations describing one server instance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationRecord {
    #[serde(default)]
    pub labels: Metadata,
    #[serde(default)]
    pub annotations: Metadata,
}

impl RegistrationRecord {
    /// Build the record for this instance.
    ///
    /// `server/address` is always set to `address`, replacing whatever the
    /// annotations file carried under that key.
    pub fn build(labels: Metadata, mut annotations: Metadata, address: impl Into<String>) -> Self {
        annotations.insert(SERVER_ADDRESS_ANNOTATION.to_string(), address.into());
        Self {
            labels,
            annotations,
        }
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }

    pub fn server_address(&self) -> Option<&str> {
        self.annotation(SERVER_ADDRESS_ANNOTATION)
    }

    /// True if every selector is present in the labels with the same value
    pub fn matches_labels<'a, I>(&self, selectors: I) -> bool
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        selectors
            .into_iter()
            .all(|(key, value)| self.label(key) == Some(value))
    }

    /// Read a boolean annotation. An empty value counts as `false`.
    pub fn annotation_bool(&self, key: &str) -> BeaconResult<Option<bool>> {
        match self.annotation(key) {
            None => Ok(None),
            Some("") | Some("false") => Ok(Some(false)),
            Some("true") => Ok(Some(true)),
            Some(other) => Err(BeaconError::Serialization(format!(
                "annotation {:?} value {:?} is not a valid boolean",
                key, other
            ))),
        }
    }

    /// Read an annotation holding a JSON array of strings. An empty value
    /// counts as an empty list.
    pub fn annotation_list(&self, key: &str) -> BeaconResult<Option<Vec<String>>> {
        match self.annotation(key) {
            None => Ok(None),
            Some("") => Ok(Some(Vec::new())),
            Some(raw) => serde_json::from_str(raw).map(Some).map_err(|e| {
                BeaconError::Serialization(format!(
                    "annotation {:?} value {:?} is not a JSON string list: {}",
                    key, raw, e
                ))
            }),
        }
    }

    /// Serialize to the JSON stored in the registry
    pub fn to_json_bytes(&self) -> BeaconResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parse a registry value
    pub fn from_json_slice(bytes: &[u8]) -> BeaconResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
