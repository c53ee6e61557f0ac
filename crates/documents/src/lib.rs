//! Documents domain module (approval documents, event-sourced).
//!
//! Receipts, transfers, write-offs and adjustments are drafted, submitted and
//! resolved here as pure, deterministic domain logic. Approval derives the
//! stock movements a document stands for; committing them is the workflow's job.

pub mod document;
pub mod movement;
pub mod number;

pub use document::{
    ActualQuantityRecorded, AddItem, AdjustmentDirection, Approve, CommentChanged,
    CreateDocument, Document, DocumentApproved, DocumentCommand, DocumentCreated,
    DocumentEvent, DocumentId, DocumentItem, DocumentKind, DocumentRejected, DocumentStatus,
    DocumentSubmitted, FulfillmentPolicy, ItemAdded, ItemRemoved, ItemUpdated, Reject,
    RemoveItem, SetActualQuantity, SetComment, Submit, UpdateItem,
};
pub use movement::{Movement, MovementId, MovementReason, NewMovement};
pub use number::DocumentNumber;
