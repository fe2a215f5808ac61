//! `shopcat-core` — domain building blocks shared by the catalog crates.
//!
//! Pure domain primitives only: identifiers, the domain error model and the
//! aggregate contract. No storage, no IO.

pub mod aggregate;
pub mod error;
pub mod id;
pub mod value_object;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use error::DomainError;
pub use id::{AggregateId, ShopId, TenantId};
pub use value_object::ValueObject;
