use chrono::{DateTime, Utc};

/// A domain fact.
///
/// Events are immutable, versioned for schema evolution, and only ever appended.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable type name (e.g. "catalog.shop_product.categories_assigned").
    fn event_type(&self) -> &'static str;

    /// Schema version for this event type.
    fn version(&self) -> u32;

    /// Business time of the fact.
    fn occurred_at(&self) -> DateTime<Utc>;
}
