//! Service boundary: typed operations, explicit result envelope, request DTOs.
//!
//! Transport framing (HTTP, RPC, CLI) is left to the embedding application; every
//! operation here is a plain method on [`app::services::InventoryService`].

pub mod app;
pub mod context;
