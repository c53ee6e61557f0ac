use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use stockflow_core::{EquipmentId, LocationId};
use stockflow_documents::{
    AdjustmentDirection, Document, DocumentId, DocumentKind, DocumentStatus, Movement,
};
use stockflow_infra::{Approval, DocumentFilter, LineInput};
use stockflow_stock::MovementQuery;

// -------------------------
// Request DTOs
// -------------------------

/// The number is assigned by the service; the creator comes from the caller context.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateDocumentRequest {
    pub kind: DocumentKind,
    pub location_id: LocationId,
    #[serde(default)]
    pub source_location_id: Option<LocationId>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddItemRequest {
    pub equipment_id: EquipmentId,
    pub planned_quantity: i64,
    #[serde(default)]
    pub unit_price: Option<u64>,
    #[serde(default)]
    pub direction: Option<AdjustmentDirection>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateItemRequest {
    pub planned_quantity: Option<i64>,
    pub unit_price: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetActualQuantityRequest {
    pub actual_quantity: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetCommentRequest {
    pub comment: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RejectRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ListDocumentsRequest {
    pub status: Option<DocumentStatus>,
    pub kind: Option<DocumentKind>,
}

/// Every field is optional; unset fields do not filter.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct MovementQueryRequest {
    pub equipment_id: Option<EquipmentId>,
    pub location_id: Option<LocationId>,
    pub document_id: Option<DocumentId>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl From<AddItemRequest> for LineInput {
    fn from(req: AddItemRequest) -> Self {
        LineInput {
            equipment_id: req.equipment_id,
            planned_quantity: req.planned_quantity,
            unit_price: req.unit_price,
            direction: req.direction,
        }
    }
}

impl From<ListDocumentsRequest> for DocumentFilter {
    fn from(req: ListDocumentsRequest) -> Self {
        DocumentFilter {
            status: req.status,
            kind: req.kind,
        }
    }
}

impl From<MovementQueryRequest> for MovementQuery {
    fn from(req: MovementQueryRequest) -> Self {
        MovementQuery {
            equipment_id: req.equipment_id,
            location_id: req.location_id,
            document_id: req.document_id,
            from: req.from,
            to: req.to,
        }
    }
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApprovalView {
    pub document: Document,
    pub movements: Vec<Movement>,
}

impl From<Approval> for ApprovalView {
    fn from(approval: Approval) -> Self {
        ApprovalView {
            document: approval.document,
            movements: approval.movements,
        }
    }
}

/// Quantity of one equipment item at one location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevel {
    pub equipment_id: EquipmentId,
    pub location_id: LocationId,
    pub quantity: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquipmentTotal {
    pub equipment_id: EquipmentId,
    /// Summed over locations, so wider than a single bucket.
    pub quantity: i128,
}

/// Where an item currently sits; `None` if it was never placed anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquipmentPlacement {
    pub equipment_id: EquipmentId,
    pub location_id: Option<LocationId>,
}

pub fn levels_at_location(location_id: LocationId, rows: Vec<(EquipmentId, i64)>) -> Vec<StockLevel> {
    rows.into_iter()
        .map(|(equipment_id, quantity)| StockLevel {
            equipment_id,
            location_id,
            quantity,
        })
        .collect()
}

pub fn levels_of_equipment(equipment_id: EquipmentId, rows: Vec<(LocationId, i64)>) -> Vec<StockLevel> {
    rows.into_iter()
        .map(|(location_id, quantity)| StockLevel {
            equipment_id,
            location_id,
            quantity,
        })
        .collect()
}
