//! Command execution pipeline for the catalog aggregates.
//!
//! ```text
//! command
//!   -> load stream (tenant-scoped) and validate it
//!   -> rehydrate the aggregate
//!   -> handle (pure decision)
//!   -> append with ExpectedVersion::Exact(stream version)
//!   -> publish committed envelopes
//! ```
//!
//! Publication happens strictly after a successful append. A command whose
//! decision is "nothing changes" appends and publishes nothing.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use shopcat_core::{Aggregate, AggregateId, DomainError, ExpectedVersion, TenantId};
use shopcat_events::{EventBus, EventEnvelope};

use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

#[derive(Debug, Error)]
pub enum DispatchError {
    /// Stale stream version or duplicate creation.
    #[error("conflict: {0}")]
    Concurrency(String),
    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
    #[error("not found")]
    NotFound,
    /// A historical payload no longer matches the aggregate's event type.
    #[error("failed to deserialize stored event: {0}")]
    Deserialize(String),
    #[error(transparent)]
    Store(EventStoreError),
    /// Events are committed; only the hand-off to the bus failed.
    #[error("publication failed: {0}")]
    Publish(String),
}

impl From<EventStoreError> for DispatchError {
    fn from(value: EventStoreError) -> Self {
        match &value {
            EventStoreError::Concurrency(msg) => DispatchError::Concurrency(msg.clone()),
            EventStoreError::TenantIsolation(msg) => DispatchError::TenantIsolation(msg.clone()),
            _ => DispatchError::Store(value),
        }
    }
}

impl From<DomainError> for DispatchError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => DispatchError::Validation(msg),
            DomainError::InvariantViolation(msg) => DispatchError::InvariantViolation(msg),
            DomainError::Conflict(msg) => DispatchError::Concurrency(msg),
            DomainError::NotFound => DispatchError::NotFound,
            DomainError::InvalidId(msg) => DispatchError::Validation(msg),
        }
    }
}

/// Generic dispatcher over any [`EventStore`] and [`EventBus`].
#[derive(Debug)]
pub struct CommandDispatcher<S, B> {
    store: S,
    bus: B,
}

impl<S, B> CommandDispatcher<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self { store, bus }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }
}

impl<S, B> CommandDispatcher<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Rehydrate an aggregate from its stream without handling anything.
    ///
    /// Returns `None` for an empty stream.
    pub fn load<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        make_aggregate: impl FnOnce(TenantId, AggregateId) -> A,
    ) -> Result<Option<A>, DispatchError>
    where
        A: Aggregate,
        A::Event: DeserializeOwned,
    {
        let history = self.store.load_stream(tenant_id, aggregate_id)?;
        if history.is_empty() {
            return Ok(None);
        }
        validate_loaded_stream(tenant_id, aggregate_id, &history)?;

        let mut aggregate = make_aggregate(tenant_id, aggregate_id);
        apply_history(&mut aggregate, &history)?;
        Ok(Some(aggregate))
    }

    /// Run one command through the pipeline and return the committed events.
    ///
    /// A concurrent writer between load and append surfaces as
    /// `DispatchError::Concurrency`; nothing is retried here.
    pub fn dispatch<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        command: A::Command,
        make_aggregate: impl FnOnce(TenantId, AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: shopcat_events::Event + Serialize + DeserializeOwned,
    {
        let aggregate_type = aggregate_type.into();

        let history = self.store.load_stream(tenant_id, aggregate_id)?;
        validate_loaded_stream(tenant_id, aggregate_id, &history)?;
        let expected = ExpectedVersion::Exact(stream_version(&history));

        let mut aggregate = make_aggregate(tenant_id, aggregate_id);
        apply_history(&mut aggregate, &history)?;

        let decided = aggregate.handle(&command).map_err(|e| {
            tracing::debug!(%tenant_id, %aggregate_id, aggregate_type = %aggregate_type, error = %e, "command rejected");
            DispatchError::from(e)
        })?;
        if decided.is_empty() {
            tracing::debug!(%tenant_id, %aggregate_id, aggregate_type = %aggregate_type, "command produced no events");
            return Ok(vec![]);
        }

        let uncommitted = decided
            .iter()
            .map(|ev| {
                UncommittedEvent::from_typed(
                    tenant_id,
                    aggregate_id,
                    aggregate_type.clone(),
                    Uuid::now_v7(),
                    ev,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        let committed = self.store.append(uncommitted, expected)?;

        for stored in &committed {
            self.bus
                .publish(stored.to_envelope())
                .map_err(|e| DispatchError::Publish(format!("{e:?}")))?;
        }

        tracing::info!(
            %tenant_id,
            %aggregate_id,
            aggregate_type = %aggregate_type,
            events = committed.len(),
            version = stream_version(&committed),
            "command committed"
        );

        Ok(committed)
    }
}

fn stream_version(stream: &[StoredEvent]) -> u64 {
    stream.last().map(|e| e.sequence_number).unwrap_or(0)
}

/// Reject streams a broken backend could hand back: foreign tenants or
/// aggregates, sequence 0, or non-increasing sequence numbers.
fn validate_loaded_stream(
    tenant_id: TenantId,
    aggregate_id: AggregateId,
    stream: &[StoredEvent],
) -> Result<(), DispatchError> {
    let mut last = 0u64;
    for (idx, e) in stream.iter().enumerate() {
        if e.tenant_id != tenant_id {
            return Err(DispatchError::TenantIsolation(format!(
                "loaded stream contains wrong tenant_id at index {idx}"
            )));
        }
        if e.aggregate_id != aggregate_id {
            return Err(DispatchError::TenantIsolation(format!(
                "loaded stream contains wrong aggregate_id at index {idx}"
            )));
        }
        if e.sequence_number <= last {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "non-monotonic sequence_number in loaded stream (last={last}, found={})",
                e.sequence_number
            ))));
        }
        last = e.sequence_number;
    }
    Ok(())
}

fn apply_history<A>(aggregate: &mut A, history: &[StoredEvent]) -> Result<(), DispatchError>
where
    A: Aggregate,
    A::Event: DeserializeOwned,
{
    for stored in history {
        let ev: A::Event = serde_json::from_value(stored.payload.clone())
            .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
        aggregate.apply(&ev);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::Utc;
    use shopcat_catalog::{
        Category, CategoryCommand, CategoryId, CreateCategory, RenameCategory,
    };
    use shopcat_core::AggregateRoot;
    use shopcat_events::InMemoryEventBus;

    use crate::event_store::InMemoryEventStore;

    type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;

    fn dispatcher() -> CommandDispatcher<Arc<InMemoryEventStore>, Bus> {
        CommandDispatcher::new(Arc::new(InMemoryEventStore::new()), Arc::new(InMemoryEventBus::new()))
    }

    fn create(d: &CommandDispatcher<Arc<InMemoryEventStore>, Bus>, tenant_id: TenantId, name: &str) -> CategoryId {
        let category_id = CategoryId::new(AggregateId::new());
        d.dispatch::<Category>(
            tenant_id,
            category_id.0,
            CategoryId::AGGREGATE_TYPE,
            CategoryCommand::CreateCategory(CreateCategory {
                tenant_id,
                category_id,
                name: name.to_string(),
                occurred_at: Utc::now(),
            }),
            |_, id| Category::empty(CategoryId::new(id)),
        )
        .unwrap();
        category_id
    }

    #[test]
    fn dispatch_appends_then_publishes() {
        let d = dispatcher();
        let sub = d.bus().subscribe();
        let tenant_id = TenantId::new();

        let category_id = create(&d, tenant_id, "Shoes");

        let env = sub.try_recv().unwrap();
        assert_eq!(env.aggregate_id(), category_id.0);
        assert_eq!(env.sequence_number(), 1);
        assert_eq!(env.aggregate_type(), CategoryId::AGGREGATE_TYPE);
    }

    #[test]
    fn load_rehydrates_current_state() {
        let d = dispatcher();
        let tenant_id = TenantId::new();
        let category_id = create(&d, tenant_id, "Shoes");

        d.dispatch::<Category>(
            tenant_id,
            category_id.0,
            CategoryId::AGGREGATE_TYPE,
            CategoryCommand::RenameCategory(RenameCategory {
                tenant_id,
                category_id,
                name: "Footwear".to_string(),
                occurred_at: Utc::now(),
            }),
            |_, id| Category::empty(CategoryId::new(id)),
        )
        .unwrap();

        let loaded = d
            .load(tenant_id, category_id.0, |_, id| Category::empty(CategoryId::new(id)))
            .unwrap()
            .unwrap();
        assert_eq!(loaded.name(), "Footwear");
        assert_eq!(loaded.version(), 2);
    }

    #[test]
    fn load_of_unknown_stream_is_none() {
        let d = dispatcher();
        let loaded = d
            .load(TenantId::new(), AggregateId::new(), |_, id| Category::empty(CategoryId::new(id)))
            .unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn domain_errors_are_mapped() {
        let d = dispatcher();
        let tenant_id = TenantId::new();
        let category_id = CategoryId::new(AggregateId::new());

        let err = d
            .dispatch::<Category>(
                tenant_id,
                category_id.0,
                CategoryId::AGGREGATE_TYPE,
                CategoryCommand::CreateCategory(CreateCategory {
                    tenant_id,
                    category_id,
                    name: " ".to_string(),
                    occurred_at: Utc::now(),
                }),
                |_, id| Category::empty(CategoryId::new(id)),
            )
            .unwrap_err();
        assert!(matches!(err, DispatchError::Validation(_)));
        assert!(d.store().load_stream(tenant_id, category_id.0).unwrap().is_empty());
    }

    #[test]
    fn wrong_tenant_sees_nothing_to_rename() {
        let d = dispatcher();
        let category_id = create(&d, TenantId::new(), "Shoes");
        let other = TenantId::new();

        let err = d
            .dispatch::<Category>(
                other,
                category_id.0,
                CategoryId::AGGREGATE_TYPE,
                CategoryCommand::RenameCategory(RenameCategory {
                    tenant_id: other,
                    category_id,
                    name: "Boots".to_string(),
                    occurred_at: Utc::now(),
                }),
                |_, id| Category::empty(CategoryId::new(id)),
            )
            .unwrap_err();
        assert!(matches!(err, DispatchError::NotFound));
    }
}
