//! Queued mutations and their state machine.

use crate::error::{SyncError, SyncResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Opaque domain data carried by a mutation.
pub type Payload = serde_json::Value;

/// Unique identifier of a queued item.
///
/// Stable for the lifetime of the queue; hosts use it as the idempotency key
/// of the remote write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(Uuid);

impl ItemId {
    /// Creates a new random item id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ItemId {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| SyncError::InvalidItemId(s.to_string()))
    }
}

/// Kind of mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Create a remote resource.
    Create,
    /// Update a remote resource.
    Update,
    /// Delete a remote resource.
    Delete,
}

impl Operation {
    /// Returns the lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Operation::Create),
            "update" => Ok(Operation::Update),
            "delete" => Ok(Operation::Delete),
            other => Err(SyncError::InvalidOperation(other.to_string())),
        }
    }
}

/// Status of an item, and of the queue as a whole when published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// Waiting for an attempt.
    Pending,
    /// An attempt is in flight.
    Syncing,
    /// Acknowledged by the remote store.
    Synced,
    /// Out of attempts; waits for an explicit retry.
    Failed,
    /// Remote state diverged; waits for out-of-band resolution.
    Conflict,
}

impl SyncStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [SyncStatus; 5] = [
        SyncStatus::Pending,
        SyncStatus::Syncing,
        SyncStatus::Synced,
        SyncStatus::Failed,
        SyncStatus::Conflict,
    ];

    /// Returns the lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Pending => "pending",
            SyncStatus::Syncing => "syncing",
            SyncStatus::Synced => "synced",
            SyncStatus::Failed => "failed",
            SyncStatus::Conflict => "conflict",
        }
    }

    /// Returns true if the processor will not touch the item again on its own.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SyncStatus::Synced | SyncStatus::Failed | SyncStatus::Conflict
        )
    }

    /// Returns true if the state machine allows `self -> to`.
    pub fn can_transition_to(&self, to: SyncStatus) -> bool {
        use SyncStatus::*;
        matches!(
            (self, to),
            (Pending, Syncing)
                | (Failed, Syncing)
                | (Syncing, Synced)
                | (Syncing, Conflict)
                | (Syncing, Pending)
                | (Syncing, Failed)
                | (Failed, Pending)
        )
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SyncStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| SyncError::codec(format!("unknown status {s:?}")))
    }
}

/// A single queued mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncItem {
    /// Unique id, assigned at enqueue time.
    pub id: ItemId,
    /// Kind of mutation.
    pub operation: Operation,
    /// Type of the target resource.
    pub resource_type: String,
    /// Id of the target resource.
    pub resource_id: String,
    /// Data snapshot at enqueue time. `None` for deletes.
    ///
    /// Written only when present, so a JSON `null` payload stays `Some(Null)`.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present_payload"
    )]
    pub payload: Option<Payload>,
    /// Enqueue time in milliseconds since the Unix epoch.
    pub enqueued_at: u64,
    /// Number of attempts made.
    pub attempts: u32,
    /// Current status.
    pub status: SyncStatus,
    /// Last failure message.
    pub last_error: Option<String>,
    /// Local version marker.
    pub local_version: Option<u64>,
    /// Remote version marker, as last reported by the host.
    pub remote_version: Option<u64>,
    /// Earliest time (epoch millis) at which the item may be attempted again.
    pub next_attempt_at: Option<u64>,
}

fn present_payload<'de, D>(deserializer: D) -> Result<Option<Payload>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Payload::deserialize(deserializer).map(Some)
}

impl SyncItem {
    /// Creates a new pending item.
    pub fn new(
        operation: Operation,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
        payload: Option<Payload>,
        enqueued_at: u64,
    ) -> Self {
        let payload = match operation {
            Operation::Delete => None,
            _ => payload,
        };
        Self {
            id: ItemId::new(),
            operation,
            resource_type: resource_type.into(),
            resource_id: resource_id.into(),
            payload,
            enqueued_at,
            attempts: 0,
            status: SyncStatus::Pending,
            last_error: None,
            local_version: None,
            remote_version: None,
            next_attempt_at: None,
        }
    }

    /// Sets the local version marker.
    pub fn with_local_version(mut self, version: u64) -> Self {
        self.local_version = Some(version);
        self
    }

    /// Idempotency key for the remote write.
    pub fn idempotency_key(&self) -> String {
        self.id.to_string()
    }

    /// Returns true if a deferred retry delay has not yet elapsed at `now`.
    pub fn is_deferred(&self, now: u64) -> bool {
        self.next_attempt_at.is_some_and(|at| at > now)
    }

    /// Moves the item to `to`, enforcing the state machine.
    pub fn transition(&mut self, to: SyncStatus) -> SyncResult<()> {
        if !self.status.can_transition_to(to) {
            return Err(SyncError::InvalidStateTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item() -> SyncItem {
        SyncItem::new(
            Operation::Create,
            "product",
            "p1",
            Some(json!({"name": "A"})),
            1_000,
        )
    }

    #[test]
    fn new_item_is_pending() {
        let item = item();
        assert_eq!(item.status, SyncStatus::Pending);
        assert_eq!(item.attempts, 0);
        assert!(item.last_error.is_none());
        assert_eq!(item.idempotency_key(), item.id.to_string());
    }

    #[test]
    fn delete_drops_payload() {
        let item = SyncItem::new(Operation::Delete, "product", "p1", Some(json!(1)), 0);
        assert!(item.payload.is_none());
    }

    #[test]
    fn state_machine_transitions() {
        let mut item = item();
        item.transition(SyncStatus::Syncing).unwrap();
        item.transition(SyncStatus::Pending).unwrap();
        item.transition(SyncStatus::Syncing).unwrap();
        item.transition(SyncStatus::Failed).unwrap();
        item.transition(SyncStatus::Pending).unwrap();
        item.transition(SyncStatus::Syncing).unwrap();
        item.transition(SyncStatus::Synced).unwrap();

        let err = item.transition(SyncStatus::Syncing).unwrap_err();
        assert!(matches!(
            err,
            SyncError::InvalidStateTransition {
                from: SyncStatus::Synced,
                to: SyncStatus::Syncing
            }
        ));
    }

    #[test]
    fn conflict_is_terminal() {
        for to in SyncStatus::ALL {
            assert!(!SyncStatus::Conflict.can_transition_to(to));
            assert!(!SyncStatus::Synced.can_transition_to(to));
        }
        assert!(!SyncStatus::Pending.can_transition_to(SyncStatus::Synced));
    }

    #[test]
    fn status_names_roundtrip() {
        for status in SyncStatus::ALL {
            assert_eq!(status.as_str().parse::<SyncStatus>().unwrap(), status);
        }
        assert!("done".parse::<SyncStatus>().is_err());
        assert_eq!("update".parse::<Operation>().unwrap(), Operation::Update);
        assert!("upsert".parse::<Operation>().is_err());
    }

    #[test]
    fn deferral() {
        let mut item = item();
        assert!(!item.is_deferred(0));
        item.next_attempt_at = Some(5_000);
        assert!(item.is_deferred(4_999));
        assert!(!item.is_deferred(5_000));
    }
}
