use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{info, instrument, warn};

use stockflow_core::{EquipmentId, LocationId};
use stockflow_documents::{DocumentId, Movement};
use stockflow_stock::{
    BucketKey, MovementLedger, MovementQuery, StockAggregator, StockDivergence, StockSnapshot,
};

use super::r#trait::{CommitReceipt, GatewayError, StockGateway, StoredDocumentEvent, UnitOfWork};

#[derive(Debug, Default)]
struct GatewayState {
    streams: HashMap<DocumentId, Vec<StoredDocumentEvent>>,
    creation_order: Vec<DocumentId>,
    ledger: MovementLedger,
    stock: StockAggregator,
}

/// In-memory gateway: document streams, ledger and stock view behind one lock.
///
/// A single write lock spans the whole commit, so checks and writes form one
/// transactional unit. Intended for tests, the demo binary and embedding.
#[derive(Debug, Default)]
pub struct InMemoryGateway {
    state: RwLock<GatewayState>,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, GatewayState>, GatewayError> {
        self.state
            .read()
            .map_err(|_| GatewayError::Unavailable("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, GatewayState>, GatewayError> {
        self.state
            .write()
            .map_err(|_| GatewayError::Unavailable("lock poisoned".to_string()))
    }

    fn stream_version(stream: &[StoredDocumentEvent]) -> u64 {
        stream.last().map(|e| e.sequence_number).unwrap_or(0)
    }

    /// Drop the maintained stock view, as if it had been lost in a crash.
    #[cfg(test)]
    pub(crate) fn discard_stock_view(&self) {
        if let Ok(mut state) = self.state.write() {
            state.stock = StockAggregator::new();
        }
    }
}

impl StockGateway for InMemoryGateway {
    fn load_document(&self, document_id: DocumentId) -> Result<Vec<StoredDocumentEvent>, GatewayError> {
        let state = self.read()?;
        Ok(state.streams.get(&document_id).cloned().unwrap_or_default())
    }

    fn document_ids(&self) -> Result<Vec<DocumentId>, GatewayError> {
        Ok(self.read()?.creation_order.clone())
    }

    fn stock_snapshot(&self, keys: &[BucketKey]) -> Result<StockSnapshot, GatewayError> {
        Ok(self.read()?.stock.snapshot(keys.iter().copied()))
    }

    #[instrument(
        skip(self, unit),
        fields(
            document_id = %unit.document_id,
            event_count = unit.events.len(),
            movement_count = unit.movements.len(),
            expected_version = ?unit.expected_version
        ),
        err
    )]
    fn commit(&self, unit: UnitOfWork) -> Result<CommitReceipt, GatewayError> {
        if unit.events.is_empty() {
            if unit.movements.is_empty() {
                return Ok(CommitReceipt::default());
            }
            return Err(GatewayError::InvalidCommit(
                "movements must be committed together with a document event".to_string(),
            ));
        }
        for (idx, e) in unit.events.iter().enumerate() {
            if e.document_id != unit.document_id {
                return Err(GatewayError::InvalidCommit(format!(
                    "batch contains a foreign document_id (index {idx})"
                )));
            }
        }

        let mut guard = self.write()?;
        let state = &mut *guard;

        // 1) Document stream version.
        let stream = state.streams.get(&unit.document_id).map(Vec::as_slice).unwrap_or(&[]);
        let current = Self::stream_version(stream);
        unit.expected_version
            .check(current)
            .map_err(|e| GatewayError::DocumentConflict(e.to_string()))?;

        // 2) Guarded buckets.
        for (key, expected) in &unit.stock_guard {
            let found = state.stock.bucket(key).version;
            if found != *expected {
                warn!(bucket = %key, expected, found, "stock bucket changed since validation");
                return Err(GatewayError::StockConflict(format!(
                    "bucket {key} moved from version {expected} to {found}"
                )));
            }
        }

        // 3) Stage ledger and stock before writing anything.
        let staged_movements = state
            .ledger
            .stage(unit.movements)
            .map_err(|e| GatewayError::InvalidCommit(e.to_string()))?;
        let staged_stock = state
            .stock
            .stage(&staged_movements)
            .map_err(|e| GatewayError::InvalidCommit(e.to_string()))?;

        // 4) Write.
        let mut next = current + 1;
        let committed_events: Vec<StoredDocumentEvent> = unit
            .events
            .into_iter()
            .map(|e| {
                let stored = StoredDocumentEvent {
                    event_id: e.event_id,
                    document_id: e.document_id,
                    sequence_number: next,
                    event_type: e.event_type,
                    event_version: e.event_version,
                    occurred_at: e.occurred_at,
                    payload: e.payload,
                };
                next += 1;
                stored
            })
            .collect();

        if current == 0 {
            state.creation_order.push(unit.document_id);
        }
        state
            .streams
            .entry(unit.document_id)
            .or_default()
            .extend(committed_events.iter().cloned());
        state
            .ledger
            .append_staged(staged_movements.clone())
            .map_err(|e| GatewayError::InvalidCommit(e.to_string()))?;
        state.stock.apply_staged(staged_stock);

        Ok(CommitReceipt {
            events: committed_events,
            movements: staged_movements,
        })
    }

    fn movements(&self, query: &MovementQuery) -> Result<Vec<Movement>, GatewayError> {
        Ok(self.read()?.ledger.query(query))
    }

    fn current_quantity(&self, equipment_id: EquipmentId, location_id: LocationId) -> Result<i64, GatewayError> {
        Ok(self.read()?.stock.current_quantity(equipment_id, location_id))
    }

    fn total_quantity(&self, equipment_id: EquipmentId) -> Result<i128, GatewayError> {
        Ok(self.read()?.stock.total_quantity(equipment_id))
    }

    fn stock_by_location(&self, location_id: LocationId) -> Result<Vec<(EquipmentId, i64)>, GatewayError> {
        Ok(self.read()?.stock.by_location(location_id))
    }

    fn stock_by_equipment(&self, equipment_id: EquipmentId) -> Result<Vec<(LocationId, i64)>, GatewayError> {
        Ok(self.read()?.stock.by_equipment(equipment_id))
    }

    #[instrument(skip(self), err)]
    fn verify_stock(&self) -> Result<Vec<StockDivergence>, GatewayError> {
        let state = self.read()?;
        let replayed = StockAggregator::replay(state.ledger.iter())
            .map_err(|e| GatewayError::InvalidCommit(format!("ledger replay failed: {e}")))?;
        let divergence = state.stock.diff(&replayed);
        if divergence.is_empty() {
            info!(movements = state.ledger.len(), "stock view matches ledger replay");
        } else {
            warn!(buckets = divergence.len(), "stock view diverges from ledger replay");
        }
        Ok(divergence)
    }

    #[instrument(skip(self), err)]
    fn rebuild_stock(&self) -> Result<Vec<StockDivergence>, GatewayError> {
        let mut state = self.write()?;
        let replayed = StockAggregator::replay(state.ledger.iter())
            .map_err(|e| GatewayError::InvalidCommit(format!("ledger replay failed: {e}")))?;
        let corrected = state.stock.diff(&replayed);
        state.stock = replayed;
        info!(
            movements = state.ledger.len(),
            corrected = corrected.len(),
            "stock view rebuilt from ledger"
        );
        Ok(corrected)
    }
}
