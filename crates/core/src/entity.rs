//! Entity trait: identity + continuity across state changes.

/// Catalog records (equipment, locations, suppliers, categories) are entities:
/// they are addressed by id and never embed other entities, only their ids.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;

    /// Human-readable label used in error messages and logs.
    fn label(&self) -> &str;
}
