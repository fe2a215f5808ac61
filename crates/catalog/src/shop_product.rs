use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shopcat_core::{Aggregate, AggregateId, AggregateRoot, DomainError, ShopId, TenantId};
use shopcat_events::Event;

use crate::category::CategoryId;
use crate::reconcile::{AssignmentRequest, CategoryAssignment, Reconciliation, ReconciliationConfig, reconcile};

/// Reference to a catalog product. Products themselves live outside this crate;
/// a shop product only needs their identity.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub AggregateId);

impl ProductId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ProductId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Identifier of the per-shop configuration of a product.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShopProductId(pub AggregateId);

impl ShopProductId {
    pub const AGGREGATE_TYPE: &'static str = "catalog.shop_product";

    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ShopProductId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Aggregate root: a product as configured in one shop.
///
/// The `(shop_id, product_id)` pair is unique per tenant. The aggregate cannot
/// see other streams, so uniqueness is checked against the read model before
/// `CreateShopProduct` is dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShopProduct {
    id: ShopProductId,
    tenant_id: Option<TenantId>,
    shop_id: Option<ShopId>,
    product_id: Option<ProductId>,
    assignment: CategoryAssignment,
    version: u64,
    created: bool,
}

impl ShopProduct {
    /// Not-yet-created instance for rehydration.
    pub fn empty(id: ShopProductId) -> Self {
        Self {
            id,
            tenant_id: None,
            shop_id: None,
            product_id: None,
            assignment: CategoryAssignment::cleared(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ShopProductId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn shop_id(&self) -> Option<ShopId> {
        self.shop_id
    }

    pub fn product_id(&self) -> Option<ProductId> {
        self.product_id
    }

    pub fn assignment(&self) -> &CategoryAssignment {
        &self.assignment
    }

    pub fn primary_category(&self) -> Option<CategoryId> {
        self.assignment.primary()
    }

    /// What a submission would do to this product, without deciding anything.
    pub fn preview(&self, request: &AssignmentRequest, config: ReconciliationConfig) -> Reconciliation {
        reconcile(&self.assignment, request, config)
    }
}

impl AggregateRoot for ShopProduct {
    type Id = ShopProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateShopProduct {
    pub tenant_id: TenantId,
    pub shop_product_id: ShopProductId,
    pub shop_id: ShopId,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: replace the category assignment from one edit submission.
///
/// `config` travels with the command so the aggregate never reads process-wide
/// settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignCategories {
    pub tenant_id: TenantId,
    pub shop_product_id: ShopProductId,
    pub request: AssignmentRequest,
    pub config: ReconciliationConfig,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShopProductCommand {
    CreateShopProduct(CreateShopProduct),
    AssignCategories(AssignCategories),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopProductCreated {
    pub tenant_id: TenantId,
    pub shop_product_id: ShopProductId,
    pub shop_id: ShopId,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

/// Full replacement of the assignment; never a delta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopProductCategoriesAssigned {
    pub tenant_id: TenantId,
    pub shop_product_id: ShopProductId,
    pub assignment: CategoryAssignment,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShopProductEvent {
    ShopProductCreated(ShopProductCreated),
    ShopProductCategoriesAssigned(ShopProductCategoriesAssigned),
}

impl ShopProductEvent {
    pub fn tenant_id(&self) -> TenantId {
        match self {
            ShopProductEvent::ShopProductCreated(e) => e.tenant_id,
            ShopProductEvent::ShopProductCategoriesAssigned(e) => e.tenant_id,
        }
    }

    pub fn shop_product_id(&self) -> ShopProductId {
        match self {
            ShopProductEvent::ShopProductCreated(e) => e.shop_product_id,
            ShopProductEvent::ShopProductCategoriesAssigned(e) => e.shop_product_id,
        }
    }
}

impl Event for ShopProductEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ShopProductEvent::ShopProductCreated(_) => "catalog.shop_product.created",
            ShopProductEvent::ShopProductCategoriesAssigned(_) => {
                "catalog.shop_product.categories_assigned"
            }
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ShopProductEvent::ShopProductCreated(e) => e.occurred_at,
            ShopProductEvent::ShopProductCategoriesAssigned(e) => e.occurred_at,
        }
    }
}

impl Aggregate for ShopProduct {
    type Command = ShopProductCommand;
    type Event = ShopProductEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ShopProductEvent::ShopProductCreated(e) => {
                self.id = e.shop_product_id;
                self.tenant_id = Some(e.tenant_id);
                self.shop_id = Some(e.shop_id);
                self.product_id = Some(e.product_id);
                self.assignment = CategoryAssignment::cleared();
                self.created = true;
            }
            ShopProductEvent::ShopProductCategoriesAssigned(e) => {
                self.assignment = e.assignment.clone();
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ShopProductCommand::CreateShopProduct(cmd) => self.handle_create(cmd),
            ShopProductCommand::AssignCategories(cmd) => self.handle_assign(cmd),
        }
    }
}

impl ShopProduct {
    fn handle_create(&self, cmd: &CreateShopProduct) -> Result<Vec<ShopProductEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("shop product already exists"));
        }

        Ok(vec![ShopProductEvent::ShopProductCreated(ShopProductCreated {
            tenant_id: cmd.tenant_id,
            shop_product_id: cmd.shop_product_id,
            shop_id: cmd.shop_id,
            product_id: cmd.product_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_assign(&self, cmd: &AssignCategories) -> Result<Vec<ShopProductEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.tenant_id != Some(cmd.tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        if self.id != cmd.shop_product_id {
            return Err(DomainError::invariant("shop_product_id mismatch"));
        }

        let reconciliation = self.preview(&cmd.request, cmd.config);
        if !reconciliation.changed() {
            return Ok(vec![]);
        }

        Ok(vec![ShopProductEvent::ShopProductCategoriesAssigned(
            ShopProductCategoriesAssigned {
                tenant_id: cmd.tenant_id,
                shop_product_id: cmd.shop_product_id,
                assignment: reconciliation.into_assignment(),
                occurred_at: cmd.occurred_at,
            },
        )])
    }
}
