//! `stockflow-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives shared by the catalog, document
//! and stock crates (no infrastructure concerns).

pub mod aggregate;
pub mod entity;
pub mod error;
pub mod event;
pub mod id;
pub mod value_object;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use event::Event;
pub use id::{AggregateId, CategoryId, EquipmentId, LocationId, SupplierId, UserId};
pub use value_object::ValueObject;
