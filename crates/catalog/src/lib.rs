//! Catalog module: equipment, locations, suppliers and categories.
//!
//! The stock engine does not own catalog CRUD; it only needs existence checks
//! and a few attributes (unit price, names) through the [`Catalog`] trait.

pub mod directory;
pub mod equipment;
pub mod location;
pub mod reference;

pub use directory::{Catalog, InMemoryCatalog};
pub use equipment::Equipment;
pub use location::Location;
pub use reference::{Category, Supplier};
