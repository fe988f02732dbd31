//! Property-based test generators using proptest.
//!
//! Provides strategies for generating mutations, payloads and retry
//! configurations that satisfy the queue's input rules.

use proptest::prelude::*;
use serde_json::{Map, Value};
use std::time::Duration;
use syncq_engine::{ApplyOutcome, ConflictStrategy, Operation, Payload, RetryConfig};

/// A mutation as the host application would enqueue it.
#[derive(Debug, Clone, PartialEq)]
pub struct Mutation {
    /// Operation kind.
    pub operation: Operation,
    /// Resource type.
    pub resource_type: String,
    /// Resource id.
    pub resource_id: String,
    /// Payload; `None` for deletes.
    pub payload: Option<Payload>,
}

impl Mutation {
    /// `(resource_type, resource_id)`.
    pub fn resource_key(&self) -> (String, String) {
        (self.resource_type.clone(), self.resource_id.clone())
    }
}

/// Strategy for generating operations.
pub fn operation_strategy() -> impl Strategy<Value = Operation> {
    prop_oneof![
        Just(Operation::Create),
        Just(Operation::Update),
        Just(Operation::Delete),
    ]
}

/// Strategy for generating resource type names.
pub fn resource_type_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["product", "order", "customer", "invoice"])
        .prop_map(str::to_string)
}

/// Strategy for generating resource ids from a small pool, so that
/// sequences regularly touch the same resource twice.
pub fn resource_id_strategy() -> impl Strategy<Value = String> {
    (0u8..6).prop_map(|n| format!("r{n}"))
}

/// Strategy for generating JSON scalars.
pub fn scalar_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        prop::string::string_regex("[a-zA-Z0-9 ]{0,16}")
            .expect("Invalid regex")
            .prop_map(Value::from),
    ]
}

/// Strategy for generating JSON object payloads, nested up to two levels.
pub fn payload_strategy() -> impl Strategy<Value = Payload> {
    let leaf = scalar_strategy();
    let value = leaf.prop_recursive(2, 16, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            object_of(inner),
        ]
    });
    object_of(value)
}

fn object_of(values: impl Strategy<Value = Value>) -> impl Strategy<Value = Value> {
    prop::collection::btree_map(
        prop::string::string_regex("[a-z_]{1,8}").expect("Invalid regex"),
        values,
        0..5,
    )
    .prop_map(|fields| Value::Object(fields.into_iter().collect::<Map<_, _>>()))
}

/// Strategy for generating a single mutation.
pub fn mutation_strategy() -> impl Strategy<Value = Mutation> {
    (
        operation_strategy(),
        resource_type_strategy(),
        resource_id_strategy(),
        prop_oneof![9 => payload_strategy(), 1 => Just(Value::Null)],
    )
        .prop_map(|(operation, resource_type, resource_id, payload)| Mutation {
            operation,
            resource_type,
            resource_id,
            payload: match operation {
                Operation::Delete => None,
                _ => Some(payload),
            },
        })
}

/// Strategy for generating a sequence of mutations.
pub fn mutation_sequence_strategy(max_len: usize) -> impl Strategy<Value = Vec<Mutation>> {
    prop::collection::vec(mutation_strategy(), 0..max_len)
}

/// Strategy for generating apply outcomes without conflict details.
pub fn outcome_strategy() -> impl Strategy<Value = ApplyOutcome> {
    prop_oneof![
        3 => Just(ApplyOutcome::success()),
        2 => prop::string::string_regex("[a-z ]{1,12}")
            .expect("Invalid regex")
            .prop_map(ApplyOutcome::failure),
        1 => Just(ApplyOutcome::conflict()),
    ]
}

/// Strategy for generating conflict strategies.
pub fn conflict_strategy_strategy() -> impl Strategy<Value = ConflictStrategy> {
    prop_oneof![
        Just(ConflictStrategy::LocalWins),
        Just(ConflictStrategy::RemoteWins),
        Just(ConflictStrategy::LatestWins),
        Just(ConflictStrategy::Manual),
    ]
}

/// Strategy for generating retry configurations with jitter enabled.
pub fn retry_config_strategy() -> impl Strategy<Value = RetryConfig> {
    (1u32..10, 1u64..5_000, 1u64..120_000, 1.0f64..4.0).prop_map(
        |(max_attempts, initial_ms, max_ms, multiplier)| {
            RetryConfig::new(max_attempts)
                .with_initial_delay(Duration::from_millis(initial_ms))
                .with_max_delay(Duration::from_millis(max_ms.max(initial_ms)))
                .with_backoff_multiplier(multiplier)
        },
    )
}
