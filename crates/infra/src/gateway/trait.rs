use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use stockflow_core::{EquipmentId, Event, ExpectedVersion, LocationId};
use stockflow_documents::{DocumentId, Movement, NewMovement};
use stockflow_stock::{BucketKey, MovementQuery, StockDivergence, StockSnapshot};

/// A document event ready to be appended (not yet assigned a sequence number).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UncommittedDocumentEvent {
    pub event_id: Uuid,
    pub document_id: DocumentId,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

impl UncommittedDocumentEvent {
    /// Wrap a typed domain event, capturing the metadata needed to read it back.
    pub fn from_typed<E>(document_id: DocumentId, event_id: Uuid, event: &E) -> Result<Self, GatewayError>
    where
        E: Event + Serialize,
    {
        let payload = serde_json::to_value(event)
            .map_err(|e| GatewayError::InvalidCommit(format!("payload serialization failed: {e}")))?;

        Ok(Self {
            event_id,
            document_id,
            event_type: event.event_type().to_string(),
            event_version: event.version(),
            occurred_at: event.occurred_at(),
            payload,
        })
    }
}

/// A persisted document event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredDocumentEvent {
    pub event_id: Uuid,
    pub document_id: DocumentId,

    /// Position in the document stream, starting at 1.
    pub sequence_number: u64,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

/// Everything one workflow step writes, committed as a single unit.
///
/// Approval units carry the `DocumentApproved` event, the planned movements and the
/// bucket versions the validation ran against. Every other step carries events only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitOfWork {
    pub document_id: DocumentId,
    pub expected_version: ExpectedVersion,
    pub events: Vec<UncommittedDocumentEvent>,
    pub movements: Vec<NewMovement>,
    /// `(bucket, version)` pairs that must be unchanged at commit time.
    pub stock_guard: Vec<(BucketKey, u64)>,
}

impl UnitOfWork {
    pub fn events_only(
        document_id: DocumentId,
        expected_version: ExpectedVersion,
        events: Vec<UncommittedDocumentEvent>,
    ) -> Self {
        Self {
            document_id,
            expected_version,
            events,
            movements: Vec::new(),
            stock_guard: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitReceipt {
    pub events: Vec<StoredDocumentEvent>,
    pub movements: Vec<Movement>,
}

/// Persistence gateway failure.
///
/// The two conflict variants are optimistic check failures; the others are opaque
/// infrastructure failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("document stream conflict: {0}")]
    DocumentConflict(String),

    #[error("stock bucket conflict: {0}")]
    StockConflict(String),

    #[error("invalid commit: {0}")]
    InvalidCommit(String),

    #[error("gateway unavailable: {0}")]
    Unavailable(String),
}

/// Persistence boundary of the engine.
///
/// Implementations must make [`StockGateway::commit`] atomic: document events, ledger
/// append and stock update become visible together or not at all, and the document
/// version and every guarded bucket version are checked inside the same scope.
/// Reads are point-in-time consistent.
pub trait StockGateway: Send + Sync {
    /// Full event stream of one document, in sequence order (empty if unknown).
    fn load_document(&self, document_id: DocumentId) -> Result<Vec<StoredDocumentEvent>, GatewayError>;

    /// Every document id, in creation order.
    fn document_ids(&self) -> Result<Vec<DocumentId>, GatewayError>;

    fn stock_snapshot(&self, keys: &[BucketKey]) -> Result<StockSnapshot, GatewayError>;

    fn commit(&self, unit: UnitOfWork) -> Result<CommitReceipt, GatewayError>;

    fn movements(&self, query: &MovementQuery) -> Result<Vec<Movement>, GatewayError>;

    fn current_quantity(&self, equipment_id: EquipmentId, location_id: LocationId) -> Result<i64, GatewayError>;

    fn total_quantity(&self, equipment_id: EquipmentId) -> Result<i128, GatewayError>;

    fn stock_by_location(&self, location_id: LocationId) -> Result<Vec<(EquipmentId, i64)>, GatewayError>;

    fn stock_by_equipment(&self, equipment_id: EquipmentId) -> Result<Vec<(LocationId, i64)>, GatewayError>;

    /// Replay the ledger and report buckets where the maintained view differs.
    fn verify_stock(&self) -> Result<Vec<StockDivergence>, GatewayError>;

    /// Replace the maintained view with a full replay; returns what was corrected.
    fn rebuild_stock(&self) -> Result<Vec<StockDivergence>, GatewayError>;
}

impl<G> StockGateway for Arc<G>
where
    G: StockGateway + ?Sized,
{
    fn load_document(&self, document_id: DocumentId) -> Result<Vec<StoredDocumentEvent>, GatewayError> {
        (**self).load_document(document_id)
    }

    fn document_ids(&self) -> Result<Vec<DocumentId>, GatewayError> {
        (**self).document_ids()
    }

    fn stock_snapshot(&self, keys: &[BucketKey]) -> Result<StockSnapshot, GatewayError> {
        (**self).stock_snapshot(keys)
    }

    fn commit(&self, unit: UnitOfWork) -> Result<CommitReceipt, GatewayError> {
        (**self).commit(unit)
    }

    fn movements(&self, query: &MovementQuery) -> Result<Vec<Movement>, GatewayError> {
        (**self).movements(query)
    }

    fn current_quantity(&self, equipment_id: EquipmentId, location_id: LocationId) -> Result<i64, GatewayError> {
        (**self).current_quantity(equipment_id, location_id)
    }

    fn total_quantity(&self, equipment_id: EquipmentId) -> Result<i128, GatewayError> {
        (**self).total_quantity(equipment_id)
    }

    fn stock_by_location(&self, location_id: LocationId) -> Result<Vec<(EquipmentId, i64)>, GatewayError> {
        (**self).stock_by_location(location_id)
    }

    fn stock_by_equipment(&self, equipment_id: EquipmentId) -> Result<Vec<(LocationId, i64)>, GatewayError> {
        (**self).stock_by_equipment(equipment_id)
    }

    fn verify_stock(&self) -> Result<Vec<StockDivergence>, GatewayError> {
        (**self).verify_stock()
    }

    fn rebuild_stock(&self) -> Result<Vec<StockDivergence>, GatewayError> {
        (**self).rebuild_stock()
    }
}
