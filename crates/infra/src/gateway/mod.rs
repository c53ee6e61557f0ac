//! Persistence gateway boundary.
//!
//! The workflow only talks to storage through [`StockGateway`]: document event
//! streams, the movement ledger and the stock view, with one atomic commit that
//! spans all three.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryGateway;
pub use r#trait::{
    CommitReceipt, GatewayError, StockGateway, StoredDocumentEvent, UncommittedDocumentEvent,
    UnitOfWork,
};
