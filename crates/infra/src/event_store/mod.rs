//! Append-only event store boundary.
//!
//! Tenant-scoped streams, one per aggregate instance. Only an in-memory
//! backend ships; the trait keeps the dispatcher independent of it.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryEventStore;
pub use r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};
