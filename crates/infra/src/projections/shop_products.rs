use serde::Serialize;
use serde_json::Value as JsonValue;

use shopcat_catalog::{CategoryAssignment, CategoryId, ProductId, ShopProductEvent, ShopProductId};
use shopcat_core::{AggregateId, ShopId, TenantId};
use shopcat_events::EventEnvelope;

use crate::projections::cursor::{CursorDecision, ProjectionError, StreamCursors};
use crate::read_model::TenantStore;

/// Queryable shop product with its current category assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShopProductReadModel {
    pub shop_product_id: ShopProductId,
    pub shop_id: ShopId,
    pub product_id: ProductId,
    pub assignment: CategoryAssignment,
    /// Stream version the record reflects.
    pub version: u64,
}

#[derive(Debug)]
pub struct ShopProductCategoriesProjection<S>
where
    S: TenantStore<ShopProductId, ShopProductReadModel>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> ShopProductCategoriesProjection<S>
where
    S: TenantStore<ShopProductId, ShopProductReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, shop_product_id: &ShopProductId) -> Option<ShopProductReadModel> {
        self.store.get(tenant_id, shop_product_id)
    }

    pub fn list(&self, tenant_id: TenantId) -> Vec<ShopProductReadModel> {
        self.store.list(tenant_id)
    }

    /// Last sequence number applied for the stream (0 when none).
    pub fn applied_through(&self, tenant_id: TenantId, aggregate_id: AggregateId) -> u64 {
        self.cursors.last(tenant_id, aggregate_id)
    }

    pub fn list_for_shop(&self, tenant_id: TenantId, shop_id: ShopId) -> Vec<ShopProductReadModel> {
        self.store
            .list(tenant_id)
            .into_iter()
            .filter(|sp| sp.shop_id == shop_id)
            .collect()
    }

    /// The shop product for a `(shop, product)` pair, if one exists.
    pub fn find(&self, tenant_id: TenantId, shop_id: ShopId, product_id: ProductId) -> Option<ShopProductReadModel> {
        self.store
            .list(tenant_id)
            .into_iter()
            .find(|sp| sp.shop_id == shop_id && sp.product_id == product_id)
    }

    /// Shop products that list `category_id` as a member.
    pub fn in_category(&self, tenant_id: TenantId, category_id: &CategoryId) -> Vec<ShopProductReadModel> {
        self.store
            .list(tenant_id)
            .into_iter()
            .filter(|sp| sp.assignment.contains(category_id))
            .collect()
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != ShopProductId::AGGREGATE_TYPE {
            return Ok(());
        }

        let tenant_id = envelope.tenant_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        if self.cursors.admit(tenant_id, aggregate_id, seq)? == CursorDecision::Skip {
            tracing::debug!(%tenant_id, %aggregate_id, seq, "shop product event already applied");
            return Ok(());
        }

        let ev: ShopProductEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        if ev.tenant_id() != tenant_id {
            return Err(ProjectionError::TenantIsolation(
                "event tenant_id does not match envelope tenant_id".to_string(),
            ));
        }
        if ev.shop_product_id().0 != aggregate_id {
            return Err(ProjectionError::TenantIsolation(
                "event shop_product_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match ev {
            ShopProductEvent::ShopProductCreated(e) => {
                self.store.upsert(
                    tenant_id,
                    e.shop_product_id,
                    ShopProductReadModel {
                        shop_product_id: e.shop_product_id,
                        shop_id: e.shop_id,
                        product_id: e.product_id,
                        assignment: CategoryAssignment::cleared(),
                        version: seq,
                    },
                );
            }
            ShopProductEvent::ShopProductCategoriesAssigned(e) => {
                let Some(mut rm) = self.store.get(tenant_id, &e.shop_product_id) else {
                    return Err(ProjectionError::MissingRecord { aggregate_id, seq });
                };
                rm.assignment = e.assignment;
                rm.version = seq;
                self.store.upsert(tenant_id, e.shop_product_id, rm);
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
