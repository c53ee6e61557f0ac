//! Infrastructure layer: persistence gateway, document workflow, configuration.

pub mod config;
pub mod gateway;
pub mod workflow;

#[cfg(test)]
mod integration_tests;

pub use config::{ConfigError, EngineConfig};
pub use gateway::{GatewayError, InMemoryGateway, StockGateway};
pub use workflow::{Approval, DocumentFilter, DocumentWorkflow, LineInput, WorkflowError};
