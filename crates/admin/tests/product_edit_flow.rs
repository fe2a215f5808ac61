use std::collections::BTreeSet;

use chrono::Utc;

use shopcat_admin::forms::{CATEGORIES_FIELD, PRIMARY_CATEGORY_FIELD, field_name, form_prefix};
use shopcat_admin::{AdminError, AdminServices, ProductEditView};
use shopcat_catalog::{
    AssignCategories, AssignmentRequest, CategoryId, ProductId, ReconciliationConfig, ShopProduct,
    ShopProductCommand, ShopProductId,
};
use shopcat_core::{AggregateId, ShopId, TenantId};
use shopcat_infra::config::Settings;

struct Harness {
    services: AdminServices,
    tenant_id: TenantId,
    shop_id: ShopId,
    shop_product_id: ShopProductId,
}

impl Harness {
    fn new(auto: bool) -> Self {
        let services = AdminServices::in_memory(Settings {
            auto_shop_product_categories: auto,
        });
        let tenant_id = TenantId::new();
        let shop_id = ShopId::new();
        let shop_product_id = services
            .create_shop_product(tenant_id, shop_id, ProductId::new(AggregateId::new()))
            .expect("failed to create shop product");
        Self {
            services,
            tenant_id,
            shop_id,
            shop_product_id,
        }
    }

    fn category(&self, name: &str) -> CategoryId {
        self.services
            .create_category(self.tenant_id, name)
            .expect("failed to create category")
    }

    /// Post the rendered form back with the category fields replaced,
    /// the way a browser would after the user edits them.
    fn post(&self, primary: Option<CategoryId>, members: &[CategoryId]) -> Result<bool, AdminError> {
        let view = ProductEditView::new(&self.services);
        let page = view.render(self.tenant_id, self.shop_product_id)?;

        let primary_field = field_name(self.shop_id, PRIMARY_CATEGORY_FIELD);
        let categories_field = field_name(self.shop_id, CATEGORIES_FIELD);
        let mut pairs: Vec<(String, String)> = page
            .fields
            .into_iter()
            .filter(|(k, _)| k != &primary_field && k != &categories_field)
            .collect();
        pairs.push((field_name(self.shop_id, "default_price_value"), "12".to_string()));
        pairs.push((primary_field, primary.map(|c| c.to_string()).unwrap_or_default()));
        pairs.extend(members.iter().map(|c| (categories_field.clone(), c.to_string())));

        Ok(view.submit(self.tenant_id, self.shop_product_id, &pairs)?.changed)
    }

    /// Commit an assignment straight through the dispatcher, bypassing the
    /// admin's read models.
    fn assign_directly(&self, primary: Option<CategoryId>, members: &[CategoryId]) {
        self.services
            .dispatcher()
            .dispatch::<ShopProduct>(
                self.tenant_id,
                self.shop_product_id.0,
                ShopProductId::AGGREGATE_TYPE,
                ShopProductCommand::AssignCategories(AssignCategories {
                    tenant_id: self.tenant_id,
                    shop_product_id: self.shop_product_id,
                    request: AssignmentRequest::new(primary, members.iter().copied()),
                    config: ReconciliationConfig::auto_assign(),
                    occurred_at: Utc::now(),
                }),
                |_, id| ShopProduct::empty(ShopProductId::new(id)),
            )
            .expect("failed to dispatch");
    }

    fn version(&self) -> u64 {
        self.services
            .shop_product(self.tenant_id, self.shop_product_id)
            .expect("shop product missing from read model")
            .version
    }

    fn primary(&self) -> Option<CategoryId> {
        self.stored().0
    }

    fn categories(&self) -> BTreeSet<CategoryId> {
        self.stored().1
    }

    fn stored(&self) -> (Option<CategoryId>, BTreeSet<CategoryId>) {
        let rm = self
            .services
            .shop_product(self.tenant_id, self.shop_product_id)
            .expect("shop product missing from read model");
        (rm.assignment.primary(), rm.assignment.categories().clone())
    }
}

fn edit_session(auto: bool) {
    let h = Harness::new(auto);
    let cat = h.category("Shoes");

    assert!(h.categories().is_empty());
    assert_eq!(h.primary(), None);

    // Submitting the untouched form keeps the product uncategorized.
    assert!(!h.post(None, &[]).unwrap());
    assert!(h.categories().is_empty());
    assert_eq!(h.primary(), None);

    h.post(Some(cat), &[]).unwrap();
    if auto {
        assert_eq!(h.categories(), BTreeSet::from([cat]));
    } else {
        assert!(h.categories().is_empty());
    }
    assert_eq!(h.primary(), Some(cat));

    // Empty again.
    h.post(None, &[]).unwrap();
    assert!(h.categories().is_empty());
    assert_eq!(h.primary(), None);

    h.post(None, &[cat]).unwrap();
    assert_eq!(h.categories(), BTreeSet::from([cat]));
    if auto {
        assert_eq!(h.primary(), Some(cat));
    } else {
        assert_eq!(h.primary(), None);
    }

    let cat2 = h.category("Sneakers");
    h.post(None, &[cat, cat2]).unwrap();
    assert_eq!(h.categories(), BTreeSet::from([cat, cat2]));
    if auto {
        assert_eq!(h.primary(), Some(cat));
    } else {
        assert_eq!(h.primary(), None);
    }
}

#[test]
fn product_edit_session_with_auto_categories() {
    edit_session(true);
}

#[test]
fn product_edit_session_without_auto_categories() {
    edit_session(false);
}

#[test]
fn submission_order_decides_auto_primary() {
    let h = Harness::new(true);
    let (a, b) = (h.category("A"), h.category("B"));

    h.post(None, &[b, a]).unwrap();

    assert_eq!(h.primary(), Some(b));
    assert_eq!(h.categories(), BTreeSet::from([a, b]));
}

#[test]
fn rendered_form_round_trips_without_changes() {
    let h = Harness::new(true);
    let (a, b) = (h.category("A"), h.category("B"));
    assert!(h.post(Some(b), &[a]).unwrap());

    let view = ProductEditView::new(&h.services);
    let page = view.render(h.tenant_id, h.shop_product_id).unwrap();
    let outcome = view.submit(h.tenant_id, h.shop_product_id, &page.fields).unwrap();

    assert!(!outcome.changed);
    assert_eq!(outcome.version, page.version);
    assert_eq!(outcome.assignment, page.assignment);
}

#[test]
fn invalid_submission_changes_nothing() {
    let h = Harness::new(true);
    let a = h.category("A");
    h.post(Some(a), &[]).unwrap();

    let unknown = CategoryId::new(AggregateId::new());
    let err = h.post(None, &[unknown]).unwrap_err();

    let errors = match err {
        AdminError::Form(errors) => errors,
        other => panic!("expected form errors, got {other:?}"),
    };
    assert!(errors.contains(&form_prefix(h.shop_id), CATEGORIES_FIELD));
    assert_eq!(h.primary(), Some(a));
    assert_eq!(h.categories(), BTreeSet::from([a]));
}

#[test]
fn archived_category_cannot_be_newly_assigned() {
    let h = Harness::new(true);
    let (a, b) = (h.category("A"), h.category("B"));
    h.post(None, &[a]).unwrap();
    h.services.archive_category(h.tenant_id, a).unwrap();
    h.services.archive_category(h.tenant_id, b).unwrap();

    // Keeping the archived membership is fine; adding another archived one is not.
    assert!(!h.post(Some(a), &[a]).unwrap());
    let err = h.post(Some(a), &[a, b]).unwrap_err();
    assert!(matches!(err, AdminError::Form(_)));
}

#[test]
fn categories_of_another_tenant_are_unknown() {
    let h = Harness::new(true);
    let foreign = h.services.create_category(TenantId::new(), "Elsewhere").unwrap();

    let err = h.post(Some(foreign), &[]).unwrap_err();
    assert!(matches!(err, AdminError::Form(_)));
}

#[test]
fn missing_shop_product_is_not_found() {
    let h = Harness::new(true);
    let view = ProductEditView::new(&h.services);
    let missing = ShopProductId::new(AggregateId::new());

    assert!(matches!(view.render(h.tenant_id, missing), Err(AdminError::NotFound(_))));
    assert!(matches!(
        view.submit(h.tenant_id, missing, &[]),
        Err(AdminError::NotFound(_))
    ));
    // Other tenants cannot see it either.
    assert!(matches!(
        view.render(TenantId::new(), h.shop_product_id),
        Err(AdminError::NotFound(_))
    ));
}

#[test]
fn writes_committed_around_the_admin_are_caught_up() {
    let h = Harness::new(true);
    let (a, b) = (h.category("A"), h.category("B"));

    h.assign_directly(Some(a), &[]);
    assert_eq!(h.primary(), None);
    assert_eq!(h.version(), 1);

    // Resubmitting what the store already holds commits nothing but still
    // brings the read model along.
    assert!(!h.post(Some(a), &[a]).unwrap());
    assert_eq!(h.primary(), Some(a));
    assert_eq!(h.categories(), BTreeSet::from([a]));
    assert_eq!(h.version(), 2);

    h.assign_directly(None, &[b]);
    h.assign_directly(None, &[]);
    assert!(h.post(None, &[a, b]).unwrap());
    assert_eq!(h.primary(), Some(a));
    assert_eq!(h.categories(), BTreeSet::from([a, b]));
    assert_eq!(h.version(), 5);

    // And the next edit goes through as usual.
    assert!(h.post(Some(b), &[]).unwrap());
    assert_eq!(h.categories(), BTreeSet::from([b]));
    assert_eq!(h.version(), 6);
}
