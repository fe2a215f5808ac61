use serde::Serialize;
use serde_json::Value as JsonValue;

use shopcat_catalog::{CategoryEvent, CategoryId};
use shopcat_core::{AggregateId, TenantId};
use shopcat_events::EventEnvelope;

use crate::projections::cursor::{CursorDecision, ProjectionError, StreamCursors};
use crate::read_model::TenantStore;

/// Queryable category (category list view, form validation).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryReadModel {
    pub category_id: CategoryId,
    pub name: String,
    pub archived: bool,
}

/// Category directory: every category of a tenant with its name and status.
#[derive(Debug)]
pub struct CategoryDirectoryProjection<S>
where
    S: TenantStore<CategoryId, CategoryReadModel>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> CategoryDirectoryProjection<S>
where
    S: TenantStore<CategoryId, CategoryReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, category_id: &CategoryId) -> Option<CategoryReadModel> {
        self.store.get(tenant_id, category_id)
    }

    pub fn list(&self, tenant_id: TenantId) -> Vec<CategoryReadModel> {
        self.store.list(tenant_id)
    }

    /// Last sequence number applied for the stream (0 when none).
    pub fn applied_through(&self, tenant_id: TenantId, aggregate_id: AggregateId) -> u64 {
        self.cursors.last(tenant_id, aggregate_id)
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != CategoryId::AGGREGATE_TYPE {
            return Ok(());
        }

        let tenant_id = envelope.tenant_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        if self.cursors.admit(tenant_id, aggregate_id, seq)? == CursorDecision::Skip {
            tracing::debug!(%tenant_id, %aggregate_id, seq, "category event already applied");
            return Ok(());
        }

        let ev: CategoryEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        if ev.tenant_id() != tenant_id {
            return Err(ProjectionError::TenantIsolation(
                "event tenant_id does not match envelope tenant_id".to_string(),
            ));
        }
        if ev.category_id().0 != aggregate_id {
            return Err(ProjectionError::TenantIsolation(
                "event category_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match ev {
            CategoryEvent::CategoryCreated(e) => {
                self.store.upsert(
                    tenant_id,
                    e.category_id,
                    CategoryReadModel {
                        category_id: e.category_id,
                        name: e.name,
                        archived: false,
                    },
                );
            }
            CategoryEvent::CategoryRenamed(e) => {
                let Some(mut rm) = self.store.get(tenant_id, &e.category_id) else {
                    return Err(ProjectionError::MissingRecord { aggregate_id, seq });
                };
                rm.name = e.name;
                self.store.upsert(tenant_id, e.category_id, rm);
            }
            CategoryEvent::CategoryArchived(e) => {
                let Some(mut rm) = self.store.get(tenant_id, &e.category_id) else {
                    return Err(ProjectionError::MissingRecord { aggregate_id, seq });
                };
                rm.archived = true;
                self.store.upsert(tenant_id, e.category_id, rm);
            }
        }

        self.cursors.advance(tenant_id, aggregate_id, seq);
        Ok(())
    }

    /// Drop the tenant's records and replay the given envelopes.
    pub fn rebuild_from_scratch(
        &self,
        tenant_id: TenantId,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), ProjectionError> {
        self.store.clear_tenant(tenant_id);
        self.cursors.clear_tenant(tenant_id);

        let mut envs: Vec<_> = envelopes.into_iter().collect();
        envs.sort_by_key(|e| (e.aggregate_id(), e.sequence_number()));

        for env in &envs {
            self.apply_envelope(env)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use shopcat_catalog::{CategoryArchived, CategoryCreated, CategoryRenamed};
    use uuid::Uuid;

    use crate::read_model::InMemoryTenantStore;

    type Projection = CategoryDirectoryProjection<InMemoryTenantStore<CategoryId, CategoryReadModel>>;

    fn envelope(tenant_id: TenantId, seq: u64, ev: &CategoryEvent) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            Uuid::now_v7(),
            tenant_id,
            ev.category_id().0,
            CategoryId::AGGREGATE_TYPE,
            seq,
            serde_json::to_value(ev).unwrap(),
        )
    }

    fn history(tenant_id: TenantId, category_id: CategoryId) -> Vec<CategoryEvent> {
        vec![
            CategoryEvent::CategoryCreated(CategoryCreated {
                tenant_id,
                category_id,
                name: "Shoes".to_string(),
                occurred_at: Utc::now(),
            }),
            CategoryEvent::CategoryRenamed(CategoryRenamed {
                tenant_id,
                category_id,
                name: "Footwear".to_string(),
                occurred_at: Utc::now(),
            }),
            CategoryEvent::CategoryArchived(CategoryArchived {
                tenant_id,
                category_id,
                occurred_at: Utc::now(),
            }),
        ]
    }

    #[test]
    fn applies_full_lifecycle() {
        let projection = Projection::new(InMemoryTenantStore::new());
        let tenant_id = TenantId::new();
        let category_id = CategoryId::new(AggregateId::new());

        for (i, ev) in history(tenant_id, category_id).iter().enumerate() {
            projection.apply_envelope(&envelope(tenant_id, i as u64 + 1, ev)).unwrap();
            if i == 1 {
                assert!(!projection.get(tenant_id, &category_id).unwrap().archived);
            }
        }

        let rm = projection.get(tenant_id, &category_id).unwrap();
        assert_eq!(rm.name, "Footwear");
        assert!(rm.archived);
    }

    #[test]
    fn redelivery_is_ignored() {
        let projection = Projection::new(InMemoryTenantStore::new());
        let tenant_id = TenantId::new();
        let category_id = CategoryId::new(AggregateId::new());
        let events = history(tenant_id, category_id);

        let created = envelope(tenant_id, 1, &events[0]);
        let renamed = envelope(tenant_id, 2, &events[1]);
        projection.apply_envelope(&created).unwrap();
        projection.apply_envelope(&renamed).unwrap();
        projection.apply_envelope(&created).unwrap();

        assert_eq!(projection.get(tenant_id, &category_id).unwrap().name, "Footwear");
    }

    #[test]
    fn envelope_tenant_must_match_payload() {
        let projection = Projection::new(InMemoryTenantStore::new());
        let category_id = CategoryId::new(AggregateId::new());
        let events = history(TenantId::new(), category_id);

        let err = projection
            .apply_envelope(&envelope(TenantId::new(), 1, &events[0]))
            .unwrap_err();
        assert!(matches!(err, ProjectionError::TenantIsolation(_)));
    }

    #[test]
    fn rebuild_replays_out_of_order_input() {
        let projection = Projection::new(InMemoryTenantStore::new());
        let tenant_id = TenantId::new();
        let category_id = CategoryId::new(AggregateId::new());
        let mut envs: Vec<_> = history(tenant_id, category_id)
            .iter()
            .enumerate()
            .map(|(i, ev)| envelope(tenant_id, i as u64 + 1, ev))
            .collect();
        envs.reverse();

        projection.rebuild_from_scratch(tenant_id, envs.clone()).unwrap();
        projection.rebuild_from_scratch(tenant_id, envs).unwrap();

        assert_eq!(projection.list(tenant_id).len(), 1);
        assert!(projection.get(tenant_id, &category_id).unwrap().archived);
    }
}
