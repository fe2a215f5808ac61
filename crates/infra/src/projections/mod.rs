//! Read model builders for the catalog.
//!
//! Projections consume committed envelopes and are:
//! - rebuildable from the event store
//! - tenant-isolated
//! - idempotent (duplicates are skipped by per-stream cursors)

pub mod categories;
pub mod cursor;
pub mod shop_products;

pub use categories::{CategoryDirectoryProjection, CategoryReadModel};
pub use cursor::{CursorDecision, ProjectionError, StreamCursors};
pub use shop_products::{ShopProductCategoriesProjection, ShopProductReadModel};
