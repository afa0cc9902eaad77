//! Value objects: equality by value, not identity.

/// Marker for immutable domain values compared by their attributes
/// (`Money`, a selected food variant, a delivery address).
///
/// Two value objects holding the same data are interchangeable; to "change"
/// one, build a new one.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
