//! Conflict detection and resolution.
//!
//! Detection compares whole payloads structurally; there is no per-field
//! merge. Both detection and resolution are pure and infallible.

use crate::error::SyncError;
use crate::item::Payload;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// A divergence between the queued local data and the remote store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    /// Type of the contested resource.
    pub resource_type: String,
    /// Id of the contested resource.
    pub resource_id: String,
    /// Local data.
    pub local_data: Payload,
    /// Remote data.
    pub remote_data: Payload,
    /// Local modification time.
    pub local_timestamp: u64,
    /// Remote modification time.
    pub remote_timestamp: u64,
}

impl Conflict {
    /// Creates a new conflict.
    pub fn new(
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
        local_data: Payload,
        remote_data: Payload,
        local_timestamp: u64,
        remote_timestamp: u64,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            resource_id: resource_id.into(),
            local_data,
            remote_data,
            local_timestamp,
            remote_timestamp,
        }
    }

    /// Returns true if the two sides actually conflict.
    pub fn is_divergent(&self) -> bool {
        has_conflict(
            &self.local_data,
            &self.remote_data,
            self.local_timestamp,
            self.remote_timestamp,
        )
    }

    /// Content hash of the local data.
    pub fn local_hash(&self) -> [u8; 32] {
        content_hash(&self.local_data)
    }

    /// Content hash of the remote data.
    pub fn remote_hash(&self) -> [u8; 32] {
        content_hash(&self.remote_data)
    }
}

/// Returns true if the remote side is strictly newer and its content differs.
pub fn has_conflict(
    local_data: &Payload,
    remote_data: &Payload,
    local_timestamp: u64,
    remote_timestamp: u64,
) -> bool {
    if remote_timestamp <= local_timestamp {
        return false;
    }
    local_data != remote_data
}

/// Resolves `conflict` under `strategy`. `Manual` yields `None`.
pub fn resolve(conflict: &Conflict, strategy: ConflictStrategy) -> Option<Payload> {
    strategy.resolve(conflict)
}

/// SHA-256 over the CBOR encoding of a payload.
pub fn content_hash(payload: &Payload) -> [u8; 32] {
    let mut buf = Vec::new();
    if let Err(e) = ciborium::into_writer(payload, &mut buf) {
        tracing::warn!(error = %e, "payload could not be encoded for hashing");
    }
    Sha256::digest(&buf).into()
}

/// Policy for resolving a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictStrategy {
    /// Local data always wins.
    LocalWins,
    /// Remote data always wins.
    RemoteWins,
    /// The side with the greater timestamp wins; ties favour local.
    #[default]
    LatestWins,
    /// No automatic resolution; a conflict event is published instead.
    Manual,
}

impl ConflictStrategy {
    /// Returns true if this strategy produces data on its own.
    pub fn auto_resolves(&self) -> bool {
        !matches!(self, ConflictStrategy::Manual)
    }

    /// Resolves a conflict according to this strategy.
    pub fn resolve(&self, conflict: &Conflict) -> Option<Payload> {
        match self {
            ConflictStrategy::LocalWins => Some(conflict.local_data.clone()),
            ConflictStrategy::RemoteWins => Some(conflict.remote_data.clone()),
            ConflictStrategy::LatestWins => {
                if conflict.remote_timestamp > conflict.local_timestamp {
                    Some(conflict.remote_data.clone())
                } else {
                    Some(conflict.local_data.clone())
                }
            }
            ConflictStrategy::Manual => None,
        }
    }

    /// Returns the kebab-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictStrategy::LocalWins => "local-wins",
            ConflictStrategy::RemoteWins => "remote-wins",
            ConflictStrategy::LatestWins => "latest-wins",
            ConflictStrategy::Manual => "manual",
        }
    }
}

impl fmt::Display for ConflictStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConflictStrategy {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local-wins" => Ok(ConflictStrategy::LocalWins),
            "remote-wins" => Ok(ConflictStrategy::RemoteWins),
            "latest-wins" => Ok(ConflictStrategy::LatestWins),
            "manual" => Ok(ConflictStrategy::Manual),
            other => Err(SyncError::InvalidStrategy(other.to_string())),
        }
    }
}
