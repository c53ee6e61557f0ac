//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Bucket keys, movement legs and document numbers are compared by their
/// attributes only; two instances with the same fields are interchangeable.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
