//! Append-only movement ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use stockflow_core::{DomainError, EquipmentId, LocationId};
use stockflow_documents::{DocumentId, Movement, MovementId, NewMovement};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("invalid movement at index {index}: {source}")]
    InvalidMovement { index: usize, source: DomainError },

    #[error("non-contiguous movement id (expected={expected}, found={found})")]
    NonContiguous { expected: u64, found: u64 },
}

/// Filter criteria for ledger queries. Every field is optional; set fields combine
/// with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementQuery {
    pub equipment_id: Option<EquipmentId>,
    /// Matches movements on either side of the location.
    pub location_id: Option<LocationId>,
    pub document_id: Option<DocumentId>,
    /// Inclusive lower bound on `occurred_at`.
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `occurred_at`.
    pub to: Option<DateTime<Utc>>,
}

impl MovementQuery {
    pub fn by_equipment(equipment_id: EquipmentId) -> Self {
        Self {
            equipment_id: Some(equipment_id),
            ..Self::default()
        }
    }

    pub fn by_location(location_id: LocationId) -> Self {
        Self {
            location_id: Some(location_id),
            ..Self::default()
        }
    }

    pub fn by_document(document_id: DocumentId) -> Self {
        Self {
            document_id: Some(document_id),
            ..Self::default()
        }
    }

    pub fn by_date_range(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
            ..Self::default()
        }
    }

    pub fn matches(&self, movement: &Movement) -> bool {
        self.equipment_id.is_none_or(|e| movement.equipment_id == e)
            && self.location_id.is_none_or(|l| movement.touches(l))
            && self.document_id.is_none_or(|d| movement.document_id == d)
            && self.from.is_none_or(|from| movement.occurred_at >= from)
            && self.to.is_none_or(|to| movement.occurred_at < to)
    }
}

/// Ordered, append-only sequence of committed movements.
///
/// Ids are assigned here, start at 1 and never skip. Entries are never mutated or
/// removed; corrections are new movements from later documents.
#[derive(Debug, Clone, Default)]
pub struct MovementLedger {
    entries: Vec<Movement>,
}

impl MovementLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Id of the last committed movement (0 when empty).
    pub fn head(&self) -> u64 {
        self.entries.last().map(|m| m.id.0).unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Movement> {
        self.entries.iter()
    }

    /// Validate a batch and assign ids without touching the ledger.
    ///
    /// The result is only valid for appending while the ledger head is unchanged.
    pub fn stage(&self, batch: Vec<NewMovement>) -> Result<Vec<Movement>, LedgerError> {
        for (index, movement) in batch.iter().enumerate() {
            movement
                .validate()
                .map_err(|source| LedgerError::InvalidMovement { index, source })?;
        }

        let mut next = self.head() + 1;
        Ok(batch
            .into_iter()
            .map(|m| {
                let committed = m.commit(MovementId(next));
                next += 1;
                committed
            })
            .collect())
    }

    /// Append movements produced by [`MovementLedger::stage`].
    pub fn append_staged(&mut self, staged: Vec<Movement>) -> Result<(), LedgerError> {
        let mut expected = self.head() + 1;
        for m in &staged {
            if m.id.0 != expected {
                return Err(LedgerError::NonContiguous {
                    expected,
                    found: m.id.0,
                });
            }
            expected += 1;
        }
        self.entries.extend(staged);
        Ok(())
    }

    /// Append a batch, all-or-nothing.
    pub fn append(&mut self, batch: Vec<NewMovement>) -> Result<Vec<Movement>, LedgerError> {
        let staged = self.stage(batch)?;
        self.append_staged(staged.clone())?;
        Ok(staged)
    }

    /// Matching movements in ledger order.
    pub fn query(&self, query: &MovementQuery) -> Vec<Movement> {
        self.entries
            .iter()
            .filter(|m| query.matches(m))
            .cloned()
            .collect()
    }

    pub fn query_by_equipment(&self, equipment_id: EquipmentId) -> Vec<Movement> {
        self.query(&MovementQuery::by_equipment(equipment_id))
    }

    pub fn query_by_location(&self, location_id: LocationId) -> Vec<Movement> {
        self.query(&MovementQuery::by_location(location_id))
    }

    pub fn query_by_date_range(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<Movement> {
        self.query(&MovementQuery::by_date_range(from, to))
    }
}
