//! Service boundary wiring.
//!
//! - `services.rs`: the typed `InventoryService` trait and its engine-backed impl
//! - `dto.rs`: request/response DTOs
//! - `errors.rs`: error kinds carried across the boundary
//! - `envelope.rs`: the `{ model, msg }` result envelope

use std::sync::Arc;

use stockflow_catalog::InMemoryCatalog;
use stockflow_infra::{DocumentWorkflow, EngineConfig, InMemoryGateway};

pub mod dto;
pub mod envelope;
pub mod errors;
pub mod services;

/// Engine service over the in-memory gateway, as used by the demo binary and tests.
pub type InMemoryService = services::EngineService<Arc<InMemoryGateway>, Arc<InMemoryCatalog>>;

/// Wire an in-memory engine around `catalog`.
pub fn build_service(catalog: Arc<InMemoryCatalog>, config: EngineConfig) -> InMemoryService {
    let gateway = Arc::new(InMemoryGateway::new());
    services::EngineService::new(DocumentWorkflow::new(gateway, catalog, config))
}
