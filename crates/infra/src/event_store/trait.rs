use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use shopcat_core::{AggregateId, ExpectedVersion, TenantId};
use std::sync::Arc;

/// An event ready to be appended; the store assigns its sequence number.
///
/// Built from a typed catalog event with [`UncommittedEvent::from_typed`], which
/// serializes the payload and captures type/version/time metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UncommittedEvent {
    pub event_id: Uuid,
    pub tenant_id: TenantId,
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

/// A persisted event.
///
/// `sequence_number` starts at 1 per stream `(tenant_id, aggregate_id)`, has no
/// gaps, and doubles as the aggregate version after that event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub event_id: Uuid,
    pub tenant_id: TenantId,
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,

    pub sequence_number: u64,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

impl StoredEvent {
    pub fn stream_version(&self) -> u64 {
        self.sequence_number
    }

    /// Envelope handed to the bus and the projections.
    pub fn to_envelope(&self) -> shopcat_events::EventEnvelope<JsonValue> {
        shopcat_events::EventEnvelope::new(
            self.event_id,
            self.tenant_id,
            self.aggregate_id,
            self.aggregate_type.clone(),
            self.sequence_number,
            self.payload.clone(),
        )
    }
}

/// Storage-level failures (as opposed to domain failures).
#[derive(Debug, Error)]
pub enum EventStoreError {
    /// The stream moved since it was loaded (a concurrent edit won).
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    #[error("aggregate type mismatch: {0}")]
    AggregateTypeMismatch(String),

    #[error("invalid append: {0}")]
    InvalidAppend(String),

    /// Committed, but handing the events to the bus failed.
    #[error("event publication failed: {0}")]
    Publish(String),
}

/// Append-only, tenant-scoped event store.
///
/// `append`:
/// - rejects batches spanning several tenants, aggregates or aggregate types
/// - checks `expected_version` against the current stream version
/// - assigns `current + 1, current + 2, ...` and persists the batch atomically
///
/// Loads never cross tenants and return events in sequence order; a missing
/// stream loads as empty.
pub trait EventStore: Send + Sync {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;

    fn load_stream(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Every event of one aggregate type for a tenant (projection rebuilds).
    fn load_by_type(
        &self,
        tenant_id: TenantId,
        aggregate_type: &str,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;
}

impl<S> EventStore for Arc<S>
where
    S: EventStore + ?Sized,
{
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).append(events, expected_version)
    }

    fn load_stream(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).load_stream(tenant_id, aggregate_id)
    }

    fn load_by_type(
        &self,
        tenant_id: TenantId,
        aggregate_type: &str,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).load_by_type(tenant_id, aggregate_type)
    }
}

impl UncommittedEvent {
    /// Wrap a typed domain event with its stream metadata.
    pub fn from_typed<E>(
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        event_id: Uuid,
        event: &E,
    ) -> Result<Self, EventStoreError>
    where
        E: shopcat_events::Event + Serialize,
    {
        let payload = serde_json::to_value(event)
            .map_err(|e| EventStoreError::InvalidAppend(format!("payload serialization failed: {e}")))?;

        Ok(Self {
            event_id,
            tenant_id,
            aggregate_id,
            aggregate_type: aggregate_type.into(),
            event_type: event.event_type().to_string(),
            event_version: event.version(),
            occurred_at: event.occurred_at(),
            payload,
        })
    }
}
