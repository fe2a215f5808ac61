use std::collections::HashMap;
use std::sync::RwLock;

use shopcat_core::{AggregateId, ExpectedVersion, TenantId};

use super::r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct StreamKey {
    tenant_id: TenantId,
    aggregate_id: AggregateId,
}

/// In-memory append-only event store for tests, the admin demo and benches.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    streams: RwLock<HashMap<StreamKey, Vec<StoredEvent>>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn current_version(stream: &[StoredEvent]) -> u64 {
        stream.last().map(|e| e.sequence_number).unwrap_or(0)
    }

    fn poisoned() -> EventStoreError {
        EventStoreError::InvalidAppend("lock poisoned".to_string())
    }

    /// Checks that a batch targets exactly one stream; returns that stream.
    fn batch_target(events: &[UncommittedEvent]) -> Result<(StreamKey, &str), EventStoreError> {
        let first = &events[0];
        for (idx, e) in events.iter().enumerate().skip(1) {
            if e.tenant_id != first.tenant_id {
                return Err(EventStoreError::TenantIsolation(format!(
                    "batch contains multiple tenant_ids (index {idx})"
                )));
            }
            if e.aggregate_id != first.aggregate_id {
                return Err(EventStoreError::InvalidAppend(format!(
                    "batch contains multiple aggregate_ids (index {idx})"
                )));
            }
            if e.aggregate_type != first.aggregate_type {
                return Err(EventStoreError::AggregateTypeMismatch(format!(
                    "batch contains multiple aggregate_types (index {idx})"
                )));
            }
        }

        let key = StreamKey {
            tenant_id: first.tenant_id,
            aggregate_id: first.aggregate_id,
        };
        Ok((key, first.aggregate_type.as_str()))
    }
}

impl EventStore for InMemoryEventStore {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        if events.is_empty() {
            return Ok(vec![]);
        }

        let (key, aggregate_type) = Self::batch_target(&events)?;
        let aggregate_type = aggregate_type.to_string();

        let mut streams = self.streams.write().map_err(|_| Self::poisoned())?;
        let stream = streams.entry(key).or_default();
        let current = Self::current_version(stream);

        if !expected_version.matches(current) {
            return Err(EventStoreError::Concurrency(format!(
                "expected {expected_version:?}, found {current}"
            )));
        }

        if let Some(existing) = stream.first() {
            if existing.aggregate_type != aggregate_type {
                return Err(EventStoreError::AggregateTypeMismatch(format!(
                    "stream aggregate_type is '{}', attempted append with '{}'",
                    existing.aggregate_type, aggregate_type
                )));
            }
        }

        let committed: Vec<StoredEvent> = events
            .into_iter()
            .zip(current + 1..)
            .map(|(e, sequence_number)| StoredEvent {
                event_id: e.event_id,
                tenant_id: e.tenant_id,
                aggregate_id: e.aggregate_id,
                aggregate_type: e.aggregate_type,
                sequence_number,
                event_type: e.event_type,
                event_version: e.event_version,
                occurred_at: e.occurred_at,
                payload: e.payload,
            })
            .collect();

        stream.extend(committed.iter().cloned());
        Ok(committed)
    }

    fn load_stream(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let key = StreamKey {
            tenant_id,
            aggregate_id,
        };
        let streams = self.streams.read().map_err(|_| Self::poisoned())?;
        Ok(streams.get(&key).cloned().unwrap_or_default())
    }

    fn load_by_type(
        &self,
        tenant_id: TenantId,
        aggregate_type: &str,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let streams = self.streams.read().map_err(|_| Self::poisoned())?;

        let mut events: Vec<StoredEvent> = streams
            .iter()
            .filter(|(key, stream)| {
                key.tenant_id == tenant_id
                    && stream.first().is_some_and(|e| e.aggregate_type == aggregate_type)
            })
            .flat_map(|(_, stream)| stream.iter().cloned())
            .collect();

        events.sort_by_key(|e| (e.aggregate_id, e.sequence_number));
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    fn event(tenant_id: TenantId, aggregate_id: AggregateId, aggregate_type: &str) -> UncommittedEvent {
        UncommittedEvent {
            event_id: Uuid::now_v7(),
            tenant_id,
            aggregate_id,
            aggregate_type: aggregate_type.to_string(),
            event_type: "catalog.test".to_string(),
            event_version: 1,
            occurred_at: Utc::now(),
            payload: json!({}),
        }
    }

    #[test]
    fn append_assigns_consecutive_sequence_numbers() {
        let store = InMemoryEventStore::new();
        let (t, a) = (TenantId::new(), AggregateId::new());

        let first = store
            .append(vec![event(t, a, "catalog.category"), event(t, a, "catalog.category")], ExpectedVersion::Exact(0))
            .unwrap();
        let second = store
            .append(vec![event(t, a, "catalog.category")], ExpectedVersion::Exact(2))
            .unwrap();

        let seqs: Vec<u64> = first.iter().chain(second.iter()).map(|e| e.sequence_number).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
        assert_eq!(store.load_stream(t, a).unwrap().len(), 3);
    }

    #[test]
    fn stale_expected_version_is_rejected() {
        let store = InMemoryEventStore::new();
        let (t, a) = (TenantId::new(), AggregateId::new());
        store.append(vec![event(t, a, "catalog.category")], ExpectedVersion::Exact(0)).unwrap();

        let err = store
            .append(vec![event(t, a, "catalog.category")], ExpectedVersion::Exact(0))
            .unwrap_err();
        assert!(matches!(err, EventStoreError::Concurrency(_)));
    }

    #[test]
    fn mixed_tenant_batch_is_rejected() {
        let store = InMemoryEventStore::new();
        let a = AggregateId::new();
        let err = store
            .append(
                vec![event(TenantId::new(), a, "catalog.category"), event(TenantId::new(), a, "catalog.category")],
                ExpectedVersion::Any,
            )
            .unwrap_err();
        assert!(matches!(err, EventStoreError::TenantIsolation(_)));
    }

    #[test]
    fn stream_keeps_its_aggregate_type() {
        let store = InMemoryEventStore::new();
        let (t, a) = (TenantId::new(), AggregateId::new());
        store.append(vec![event(t, a, "catalog.category")], ExpectedVersion::Any).unwrap();

        let err = store
            .append(vec![event(t, a, "catalog.shop_product")], ExpectedVersion::Any)
            .unwrap_err();
        assert!(matches!(err, EventStoreError::AggregateTypeMismatch(_)));
    }

    #[test]
    fn streams_are_tenant_isolated() {
        let store = InMemoryEventStore::new();
        let (t, a) = (TenantId::new(), AggregateId::new());
        store.append(vec![event(t, a, "catalog.category")], ExpectedVersion::Any).unwrap();

        assert!(store.load_stream(TenantId::new(), a).unwrap().is_empty());
        assert!(store.load_by_type(TenantId::new(), "catalog.category").unwrap().is_empty());
    }

    #[test]
    fn load_by_type_filters_and_orders() {
        let store = InMemoryEventStore::new();
        let t = TenantId::new();
        let (c1, c2, sp) = (AggregateId::new(), AggregateId::new(), AggregateId::new());
        store.append(vec![event(t, c1, "catalog.category")], ExpectedVersion::Any).unwrap();
        store.append(vec![event(t, sp, "catalog.shop_product")], ExpectedVersion::Any).unwrap();
        store.append(vec![event(t, c2, "catalog.category")], ExpectedVersion::Any).unwrap();
        store.append(vec![event(t, c1, "catalog.category")], ExpectedVersion::Any).unwrap();

        let loaded = store.load_by_type(t, "catalog.category").unwrap();
        assert_eq!(loaded.len(), 3);
        assert!(loaded.iter().all(|e| e.aggregate_type == "catalog.category"));
        let c1_seqs: Vec<u64> = loaded.iter().filter(|e| e.aggregate_id == c1).map(|e| e.sequence_number).collect();
        assert_eq!(c1_seqs, vec![1, 2]);
    }
}
