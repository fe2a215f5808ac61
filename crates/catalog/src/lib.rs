//! Catalog domain: categories, shop-scoped products and their category
//! assignment.
//!
//! Everything here is deterministic domain logic (no IO, no storage). The
//! infra crate rehydrates these aggregates from their event streams.

pub mod category;
pub mod reconcile;
pub mod shop_product;

pub use category::{
    ArchiveCategory, Category, CategoryArchived, CategoryCommand, CategoryCreated, CategoryEvent,
    CategoryId, CategoryRenamed, CreateCategory, RenameCategory,
};
pub use reconcile::{
    AssignmentRequest, CategoryAssignment, Reconciliation, ReconciliationConfig, reconcile,
};
pub use shop_product::{
    AssignCategories, CreateShopProduct, ProductId, ShopProduct, ShopProductCategoriesAssigned,
    ShopProductCommand, ShopProductCreated, ShopProductEvent, ShopProductId,
};
