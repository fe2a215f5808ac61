//! In-process wiring of the catalog pipeline for the admin.
//!
//! Committed events are published on the bus for any other consumer. The
//! admin's own read models are caught up from the event store before a write
//! returns, so the next render sees the submission it follows even when other
//! writers (or direct dispatcher use) got in first.
//!
//! Writes through one `AdminServices` are serialized; the `(shop, product)`
//! uniqueness check relies on it and holds only for a single process.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use shopcat_catalog::{
    ArchiveCategory, Category, CategoryCommand, CategoryId, CreateCategory, CreateShopProduct,
    ProductId, RenameCategory, ShopProduct, ShopProductCommand, ShopProductId,
};
use shopcat_core::{Aggregate, AggregateId, DomainError, ShopId, TenantId};
use shopcat_events::{Event, EventEnvelope, InMemoryEventBus};
use shopcat_infra::command_dispatcher::{CommandDispatcher, DispatchError};
use shopcat_infra::config::Settings;
use shopcat_infra::event_store::{EventStore, InMemoryEventStore, StoredEvent};
use shopcat_infra::projections::{
    CategoryDirectoryProjection, CategoryReadModel, ShopProductCategoriesProjection,
    ShopProductReadModel,
};
use shopcat_infra::read_model::InMemoryTenantStore;

use crate::error::AdminError;

pub type AdminBus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;
pub type AdminDispatcher = CommandDispatcher<Arc<InMemoryEventStore>, AdminBus>;
pub type CategoryDirectory =
    CategoryDirectoryProjection<Arc<InMemoryTenantStore<CategoryId, CategoryReadModel>>>;
pub type ShopProductCategories =
    ShopProductCategoriesProjection<Arc<InMemoryTenantStore<ShopProductId, ShopProductReadModel>>>;

#[derive(Debug)]
pub struct AdminServices {
    dispatcher: AdminDispatcher,
    categories: CategoryDirectory,
    shop_products: ShopProductCategories,
    settings: Settings,
    writes: Mutex<()>,
}

/// Proof that the caller holds the admin's write lock.
pub(crate) struct WriteGuard<'a> {
    _guard: MutexGuard<'a, ()>,
}

impl AdminServices {
    pub fn in_memory(settings: Settings) -> Self {
        let store = Arc::new(InMemoryEventStore::new());
        let bus: AdminBus = Arc::new(InMemoryEventBus::new());
        Self {
            dispatcher: CommandDispatcher::new(store, bus),
            categories: CategoryDirectoryProjection::new(Arc::new(InMemoryTenantStore::new())),
            shop_products: ShopProductCategoriesProjection::new(Arc::new(InMemoryTenantStore::new())),
            settings,
            writes: Mutex::new(()),
        }
    }

    pub fn settings(&self) -> Settings {
        self.settings
    }

    pub fn dispatcher(&self) -> &AdminDispatcher {
        &self.dispatcher
    }

    /// Bus carrying every committed envelope.
    pub fn bus(&self) -> &AdminBus {
        self.dispatcher.bus()
    }

    pub fn category_directory(&self) -> &CategoryDirectory {
        &self.categories
    }

    pub fn shop_product_categories(&self) -> &ShopProductCategories {
        &self.shop_products
    }

    pub fn create_category(&self, tenant_id: TenantId, name: &str) -> Result<CategoryId, AdminError> {
        let category_id = CategoryId::new(AggregateId::new());
        self.run_category(
            tenant_id,
            category_id,
            CategoryCommand::CreateCategory(CreateCategory {
                tenant_id,
                category_id,
                name: name.to_string(),
                occurred_at: Utc::now(),
            }),
        )?;
        Ok(category_id)
    }

    pub fn rename_category(&self, tenant_id: TenantId, category_id: CategoryId, name: &str) -> Result<(), AdminError> {
        self.run_category(
            tenant_id,
            category_id,
            CategoryCommand::RenameCategory(RenameCategory {
                tenant_id,
                category_id,
                name: name.to_string(),
                occurred_at: Utc::now(),
            }),
        )
    }

    pub fn archive_category(&self, tenant_id: TenantId, category_id: CategoryId) -> Result<(), AdminError> {
        self.run_category(
            tenant_id,
            category_id,
            CategoryCommand::ArchiveCategory(ArchiveCategory {
                tenant_id,
                category_id,
                occurred_at: Utc::now(),
            }),
        )
    }

    /// Make `product_id` available in `shop_id`.
    ///
    /// A product has at most one shop product per shop.
    pub fn create_shop_product(
        &self,
        tenant_id: TenantId,
        shop_id: ShopId,
        product_id: ProductId,
    ) -> Result<ShopProductId, AdminError> {
        let writes = self.lock_writes();
        if let Some(existing) = self.shop_products.find(tenant_id, shop_id, product_id) {
            return Err(AdminError::AlreadyExists(format!(
                "product {product_id} already has shop product {} in shop {shop_id}",
                existing.shop_product_id
            )));
        }

        let shop_product_id = ShopProductId::new(AggregateId::new());
        self.commit::<ShopProduct>(
            &writes,
            tenant_id,
            shop_product_id.0,
            ShopProductId::AGGREGATE_TYPE,
            ShopProductCommand::CreateShopProduct(CreateShopProduct {
                tenant_id,
                shop_product_id,
                shop_id,
                product_id,
                occurred_at: Utc::now(),
            }),
            |_, id| ShopProduct::empty(ShopProductId::new(id)),
        )?;
        Ok(shop_product_id)
    }

    pub fn categories(&self, tenant_id: TenantId) -> Vec<CategoryReadModel> {
        self.categories.list(tenant_id)
    }

    /// Shop products of a tenant, optionally narrowed to one shop.
    pub fn shop_products(&self, tenant_id: TenantId, shop_id: Option<ShopId>) -> Vec<ShopProductReadModel> {
        match shop_id {
            Some(shop_id) => self.shop_products.list_for_shop(tenant_id, shop_id),
            None => self.shop_products.list(tenant_id),
        }
    }

    pub fn shop_product(&self, tenant_id: TenantId, shop_product_id: ShopProductId) -> Option<ShopProductReadModel> {
        self.shop_products.get(tenant_id, &shop_product_id)
    }

    /// Rebuild both read models of a tenant from the event store.
    pub fn rebuild(&self, tenant_id: TenantId) -> Result<(), AdminError> {
        let _writes = self.lock_writes();
        let store = self.dispatcher.store();

        let categories = store
            .load_by_type(tenant_id, CategoryId::AGGREGATE_TYPE)
            .map_err(DispatchError::from)?;
        self.categories
            .rebuild_from_scratch(tenant_id, categories.iter().map(StoredEvent::to_envelope))?;

        let shop_products = store
            .load_by_type(tenant_id, ShopProductId::AGGREGATE_TYPE)
            .map_err(DispatchError::from)?;
        self.shop_products
            .rebuild_from_scratch(tenant_id, shop_products.iter().map(StoredEvent::to_envelope))?;

        tracing::info!(%tenant_id, categories = categories.len(), shop_products = shop_products.len(), "read models rebuilt");
        Ok(())
    }

    pub(crate) fn lock_writes(&self) -> WriteGuard<'_> {
        // The guarded value is `()`, so a poisoned lock holds nothing broken.
        WriteGuard {
            _guard: self.writes.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }

    /// Dispatch one command and catch the read models up to its stream.
    ///
    /// The stream is caught up even when the command commits nothing.
    pub(crate) fn commit<A>(
        &self,
        _writes: &WriteGuard<'_>,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        aggregate_type: &'static str,
        command: A::Command,
        make_aggregate: impl FnOnce(TenantId, AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, AdminError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: Event + Serialize + DeserializeOwned,
    {
        let committed = self
            .dispatcher
            .dispatch::<A>(tenant_id, aggregate_id, aggregate_type, command, make_aggregate)?;
        self.catch_up(tenant_id, aggregate_id)?;
        Ok(committed)
    }

    /// Apply whatever the store holds past the read models' cursor for one stream.
    fn catch_up(&self, tenant_id: TenantId, aggregate_id: AggregateId) -> Result<(), AdminError> {
        let applied = self
            .categories
            .applied_through(tenant_id, aggregate_id)
            .max(self.shop_products.applied_through(tenant_id, aggregate_id));

        let stream = self
            .dispatcher
            .store()
            .load_stream(tenant_id, aggregate_id)
            .map_err(DispatchError::from)?;

        let mut caught_up = 0usize;
        for stored in stream.iter().filter(|e| e.sequence_number > applied) {
            let envelope = stored.to_envelope();
            self.categories.apply_envelope(&envelope)?;
            self.shop_products.apply_envelope(&envelope)?;
            caught_up += 1;
        }
        if caught_up > 0 {
            tracing::debug!(%tenant_id, %aggregate_id, applied, caught_up, "read models caught up");
        }
        Ok(())
    }

    fn run_category(&self, tenant_id: TenantId, category_id: CategoryId, command: CategoryCommand) -> Result<(), AdminError> {
        let writes = self.lock_writes();
        self.commit::<Category>(
            &writes,
            tenant_id,
            category_id.0,
            CategoryId::AGGREGATE_TYPE,
            command,
            |_, id| Category::empty(CategoryId::new(id)),
        )?;
        Ok(())
    }
}
