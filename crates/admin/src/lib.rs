//! Admin-side handling of shop product edits.
//!
//! Covers what the product edit screen does with the category part of its
//! form: pre-fill the fields, validate a submission, and push it through the
//! catalog pipeline. HTTP, templating and sessions are left to the host.

pub mod edit;
pub mod error;
pub mod forms;
pub mod services;

pub use edit::{EditOutcome, EditPage, ProductEditView};
pub use error::AdminError;
pub use forms::{CategoryLookup, CategoryStatus, FormErrors, ShopProductForm};
pub use services::AdminServices;
