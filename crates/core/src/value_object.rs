//! Value objects: compared by their attributes, never by identity.

/// Marker trait for immutable domain values.
///
/// Two values with equal attributes are interchangeable. To "change" one, build
/// a new value; a category assignment is replaced wholesale, never patched.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
