//! Shop product edit view: render the category fields, accept a submission.

use chrono::Utc;
use serde::Serialize;

use shopcat_catalog::{
    AssignCategories, CategoryAssignment, ProductId, ShopProduct, ShopProductCommand, ShopProductId,
};
use shopcat_core::{AggregateRoot, ShopId, TenantId};

use crate::error::AdminError;
use crate::forms::ShopProductForm;
use crate::services::AdminServices;

/// What the edit screen shows for one shop product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EditPage {
    pub shop_product_id: ShopProductId,
    pub shop_id: ShopId,
    pub product_id: ProductId,
    pub assignment: CategoryAssignment,
    /// Pre-filled form fields.
    pub fields: Vec<(String, String)>,
    pub version: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EditOutcome {
    /// Assignment after the submission.
    pub assignment: CategoryAssignment,
    /// False when the submission matched the stored state and nothing was written.
    pub changed: bool,
    pub version: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct ProductEditView<'a> {
    services: &'a AdminServices,
}

impl<'a> ProductEditView<'a> {
    pub fn new(services: &'a AdminServices) -> Self {
        Self { services }
    }

    pub fn render(&self, tenant_id: TenantId, shop_product_id: ShopProductId) -> Result<EditPage, AdminError> {
        let shop_product = self.load(tenant_id, shop_product_id)?;
        let (shop_id, product_id) = identity(&shop_product)?;
        let assignment = shop_product.assignment().clone();

        Ok(EditPage {
            shop_product_id,
            shop_id,
            product_id,
            fields: ShopProductForm::initial(shop_id, &assignment),
            assignment,
            version: shop_product.version(),
        })
    }

    /// Validate and apply one submission of the edit form.
    ///
    /// The stored assignment is replaced by what the submission describes under
    /// the current settings. Validation failures dispatch nothing.
    pub fn submit(
        &self,
        tenant_id: TenantId,
        shop_product_id: ShopProductId,
        pairs: &[(String, String)],
    ) -> Result<EditOutcome, AdminError> {
        let shop_product = self.load(tenant_id, shop_product_id)?;
        let (shop_id, _) = identity(&shop_product)?;

        let form = ShopProductForm::bind(
            tenant_id,
            shop_id,
            pairs,
            shop_product.assignment(),
            self.services.category_directory(),
        )?;

        let config = self.services.settings().reconciliation();
        let preview = shop_product.preview(form.request(), config);
        tracing::debug!(
            %tenant_id,
            %shop_product_id,
            auto_assign = config.auto_assign_categories,
            added = preview.added().len(),
            removed = preview.removed().len(),
            primary_changed = preview.primary_changed(),
            "category submission reconciled"
        );

        let writes = self.services.lock_writes();
        let committed = self.services.commit::<ShopProduct>(
            &writes,
            tenant_id,
            shop_product_id.0,
            ShopProductId::AGGREGATE_TYPE,
            ShopProductCommand::AssignCategories(AssignCategories {
                tenant_id,
                shop_product_id,
                request: form.into_request(),
                config,
                occurred_at: Utc::now(),
            }),
            |_, id| ShopProduct::empty(ShopProductId::new(id)),
        )?;
        let stored = self.services.shop_product(tenant_id, shop_product_id);
        drop(writes);

        let (assignment, version) = match stored {
            Some(rm) => (rm.assignment, rm.version),
            None => (preview.into_assignment(), shop_product.version()),
        };

        Ok(EditOutcome {
            assignment,
            changed: !committed.is_empty(),
            version,
        })
    }

    fn load(&self, tenant_id: TenantId, shop_product_id: ShopProductId) -> Result<ShopProduct, AdminError> {
        self.services
            .dispatcher()
            .load(tenant_id, shop_product_id.0, |_, id| ShopProduct::empty(ShopProductId::new(id)))?
            .ok_or(AdminError::NotFound("shop product"))
    }
}

fn identity(shop_product: &ShopProduct) -> Result<(ShopId, ProductId), AdminError> {
    match (shop_product.shop_id(), shop_product.product_id()) {
        (Some(shop_id), Some(product_id)) => Ok((shop_id, product_id)),
        _ => Err(AdminError::NotFound("shop product")),
    }
}
