//! Movement records: the immutable facts the stock ledger is made of.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockflow_core::{DomainError, EquipmentId, LocationId, UserId};

use crate::document::{DocumentId, DocumentKind};

/// Ledger-assigned movement identifier (1-based, strictly increasing, gap-free).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MovementId(pub u64);

impl core::fmt::Display for MovementId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementReason {
    Receipt,
    Transfer,
    WriteOff,
    Adjustment,
}

impl From<DocumentKind> for MovementReason {
    fn from(kind: DocumentKind) -> Self {
        match kind {
            DocumentKind::Receipt => MovementReason::Receipt,
            DocumentKind::Transfer => MovementReason::Transfer,
            DocumentKind::WriteOff => MovementReason::WriteOff,
            DocumentKind::Adjustment => MovementReason::Adjustment,
        }
    }
}

/// A movement that has been planned but not yet written to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMovement {
    pub equipment_id: EquipmentId,
    /// `None` means stock enters from outside the system.
    pub from_location_id: Option<LocationId>,
    /// `None` means stock leaves the system.
    pub to_location_id: Option<LocationId>,
    pub quantity: i64,
    pub reason: MovementReason,
    pub document_id: DocumentId,
    pub occurred_at: DateTime<Utc>,
    pub recorded_by: UserId,
}

impl NewMovement {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.quantity <= 0 {
            return Err(DomainError::validation(format!(
                "movement quantity must be positive (got {})",
                self.quantity
            )));
        }
        match (self.from_location_id, self.to_location_id) {
            (None, None) => Err(DomainError::validation(
                "movement needs a source or a destination",
            )),
            (Some(from), Some(to)) if from == to => Err(DomainError::validation(
                "movement source and destination must differ",
            )),
            _ => Ok(()),
        }
    }

    /// Freeze into a ledger record under `id`.
    pub fn commit(self, id: MovementId) -> Movement {
        Movement {
            id,
            equipment_id: self.equipment_id,
            from_location_id: self.from_location_id,
            to_location_id: self.to_location_id,
            quantity: self.quantity,
            reason: self.reason,
            document_id: self.document_id,
            occurred_at: self.occurred_at,
            recorded_by: self.recorded_by,
        }
    }
}

/// A committed ledger record. Never updated, never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movement {
    pub id: MovementId,
    pub equipment_id: EquipmentId,
    pub from_location_id: Option<LocationId>,
    pub to_location_id: Option<LocationId>,
    pub quantity: i64,
    pub reason: MovementReason,
    pub document_id: DocumentId,
    pub occurred_at: DateTime<Utc>,
    pub recorded_by: UserId,
}

impl Movement {
    pub fn touches(&self, location_id: LocationId) -> bool {
        self.from_location_id == Some(location_id) || self.to_location_id == Some(location_id)
    }
}
