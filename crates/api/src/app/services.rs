use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{Datelike, Utc};
use tracing::instrument;

use stockflow_catalog::{Catalog, Equipment};
use stockflow_core::{AggregateId, EquipmentId, LocationId, SupplierId};
use stockflow_documents::{
    Approve, CreateDocument, Document, DocumentId, DocumentKind, DocumentNumber, Movement, Reject,
    RemoveItem,
    SetActualQuantity, SetComment, Submit, UpdateItem,
};
use stockflow_infra::{DocumentFilter, DocumentWorkflow, StockGateway};
use stockflow_stock::StockDivergence;

use crate::app::dto::{
    self, AddItemRequest, ApprovalView, CreateDocumentRequest, EquipmentPlacement, EquipmentTotal,
    ListDocumentsRequest, MovementQueryRequest, RejectRequest, SetActualQuantityRequest,
    SetCommentRequest, StockLevel, UpdateItemRequest,
};
use crate::app::errors::{ErrorKind, ServiceError, ServiceResult};
use crate::context::CallerContext;

/// Every operation the engine exposes, independent of transport.
pub trait InventoryService: Send + Sync {
    fn create_document(&self, ctx: &CallerContext, req: CreateDocumentRequest) -> ServiceResult<Document>;
    fn add_item(&self, ctx: &CallerContext, document_id: DocumentId, req: AddItemRequest) -> ServiceResult<Document>;
    fn update_item(
        &self,
        ctx: &CallerContext,
        document_id: DocumentId,
        line_no: u32,
        req: UpdateItemRequest,
    ) -> ServiceResult<Document>;
    fn remove_item(&self, ctx: &CallerContext, document_id: DocumentId, line_no: u32) -> ServiceResult<Document>;
    fn set_actual_quantity(
        &self,
        ctx: &CallerContext,
        document_id: DocumentId,
        line_no: u32,
        req: SetActualQuantityRequest,
    ) -> ServiceResult<Document>;
    fn set_comment(&self, ctx: &CallerContext, document_id: DocumentId, req: SetCommentRequest) -> ServiceResult<Document>;
    fn submit(&self, ctx: &CallerContext, document_id: DocumentId) -> ServiceResult<Document>;
    fn approve(&self, ctx: &CallerContext, document_id: DocumentId) -> ServiceResult<ApprovalView>;
    fn reject(&self, ctx: &CallerContext, document_id: DocumentId, req: RejectRequest) -> ServiceResult<Document>;

    fn get_document(&self, document_id: DocumentId) -> ServiceResult<Document>;
    fn list_documents(&self, req: ListDocumentsRequest) -> ServiceResult<Vec<Document>>;

    fn query_movements(&self, req: MovementQueryRequest) -> ServiceResult<Vec<Movement>>;
    fn current_quantity(&self, equipment_id: EquipmentId, location_id: LocationId) -> ServiceResult<StockLevel>;
    fn total_quantity(&self, equipment_id: EquipmentId) -> ServiceResult<EquipmentTotal>;
    fn stock_by_location(&self, location_id: LocationId) -> ServiceResult<Vec<StockLevel>>;
    fn stock_by_equipment(&self, equipment_id: EquipmentId) -> ServiceResult<Vec<StockLevel>>;
    fn current_location(&self, equipment_id: EquipmentId) -> ServiceResult<EquipmentPlacement>;
    fn equipment_by_supplier(&self, supplier_id: SupplierId) -> ServiceResult<Vec<Equipment>>;

    fn verify_stock(&self) -> ServiceResult<Vec<StockDivergence>>;
    fn rebuild_stock(&self) -> ServiceResult<Vec<StockDivergence>>;
}

/// [`InventoryService`] backed by a [`DocumentWorkflow`].
///
/// Assigns document ids, numbers and timestamps; everything else is delegated.
#[derive(Debug)]
pub struct EngineService<G, C> {
    workflow: DocumentWorkflow<G, C>,
    // Last sequence issued per (kind, year). A key is seeded from stored
    // documents the first time it is seen; after that numbers only come from here.
    numbering: Mutex<HashMap<(DocumentKind, i32), u32>>,
}

impl<G, C> EngineService<G, C> {
    pub fn new(workflow: DocumentWorkflow<G, C>) -> Self {
        Self {
            workflow,
            numbering: Mutex::new(HashMap::new()),
        }
    }

    pub fn workflow(&self) -> &DocumentWorkflow<G, C> {
        &self.workflow
    }
}

impl<G, C> InventoryService for EngineService<G, C>
where
    G: StockGateway,
    C: Catalog,
{
    #[instrument(skip(self, ctx, req), fields(kind = %req.kind, created_by = %ctx.user_id()), err)]
    fn create_document(&self, ctx: &CallerContext, req: CreateDocumentRequest) -> ServiceResult<Document> {
        let now = Utc::now();
        let year = req.date.unwrap_or_else(|| now.date_naive()).year();

        let mut issued = self
            .numbering
            .lock()
            .map_err(|_| ServiceError::new(ErrorKind::Infrastructure, "numbering lock poisoned"))?;

        let number = match issued.get(&(req.kind, year)) {
            Some(last) => DocumentNumber {
                kind: req.kind,
                year,
                sequence: last.checked_add(1).ok_or_else(|| {
                    ServiceError::new(
                        ErrorKind::Validation,
                        format!("document numbers for {} in {year} are exhausted", req.kind),
                    )
                })?,
            },
            None => {
                let existing = self.workflow.list_documents(DocumentFilter {
                    kind: Some(req.kind),
                    status: None,
                })?;
                DocumentNumber::next(req.kind, year, existing.iter().map(Document::number))
            }
        };

        let document = self.workflow.create_document(CreateDocument {
            document_id: DocumentId::new(AggregateId::new()),
            kind: req.kind,
            number: number.to_string(),
            location_id: req.location_id,
            source_location_id: req.source_location_id,
            created_by: ctx.user_id(),
            date: req.date,
            comment: req.comment,
            fulfillment: self.workflow.config().fulfillment_policy,
            occurred_at: now,
        })?;
        issued.insert((req.kind, year), number.sequence);
        Ok(document)
    }

    fn add_item(&self, _ctx: &CallerContext, document_id: DocumentId, req: AddItemRequest) -> ServiceResult<Document> {
        Ok(self.workflow.add_item(document_id, req.into(), Utc::now())?)
    }

    fn update_item(
        &self,
        _ctx: &CallerContext,
        document_id: DocumentId,
        line_no: u32,
        req: UpdateItemRequest,
    ) -> ServiceResult<Document> {
        Ok(self.workflow.update_item(UpdateItem {
            document_id,
            line_no,
            planned_quantity: req.planned_quantity,
            unit_price: req.unit_price,
            occurred_at: Utc::now(),
        })?)
    }

    fn remove_item(&self, _ctx: &CallerContext, document_id: DocumentId, line_no: u32) -> ServiceResult<Document> {
        Ok(self.workflow.remove_item(RemoveItem {
            document_id,
            line_no,
            occurred_at: Utc::now(),
        })?)
    }

    fn set_actual_quantity(
        &self,
        _ctx: &CallerContext,
        document_id: DocumentId,
        line_no: u32,
        req: SetActualQuantityRequest,
    ) -> ServiceResult<Document> {
        Ok(self.workflow.set_actual_quantity(SetActualQuantity {
            document_id,
            line_no,
            actual_quantity: req.actual_quantity,
            occurred_at: Utc::now(),
        })?)
    }

    fn set_comment(&self, _ctx: &CallerContext, document_id: DocumentId, req: SetCommentRequest) -> ServiceResult<Document> {
        Ok(self.workflow.set_comment(SetComment {
            document_id,
            comment: req.comment,
            occurred_at: Utc::now(),
        })?)
    }

    fn submit(&self, ctx: &CallerContext, document_id: DocumentId) -> ServiceResult<Document> {
        Ok(self.workflow.submit(Submit {
            document_id,
            submitted_by: ctx.user_id(),
            occurred_at: Utc::now(),
        })?)
    }

    fn approve(&self, ctx: &CallerContext, document_id: DocumentId) -> ServiceResult<ApprovalView> {
        let approval = self.workflow.approve(Approve {
            document_id,
            approver: ctx.user_id(),
            occurred_at: Utc::now(),
        })?;
        Ok(approval.into())
    }

    fn reject(&self, ctx: &CallerContext, document_id: DocumentId, req: RejectRequest) -> ServiceResult<Document> {
        Ok(self.workflow.reject(Reject {
            document_id,
            approver: ctx.user_id(),
            reason: req.reason,
            occurred_at: Utc::now(),
        })?)
    }

    fn get_document(&self, document_id: DocumentId) -> ServiceResult<Document> {
        Ok(self.workflow.get_document(document_id)?)
    }

    fn list_documents(&self, req: ListDocumentsRequest) -> ServiceResult<Vec<Document>> {
        Ok(self.workflow.list_documents(req.into())?)
    }

    fn query_movements(&self, req: MovementQueryRequest) -> ServiceResult<Vec<Movement>> {
        Ok(self.workflow.movements(&req.into())?)
    }

    fn current_quantity(&self, equipment_id: EquipmentId, location_id: LocationId) -> ServiceResult<StockLevel> {
        let quantity = self.workflow.current_quantity(equipment_id, location_id)?;
        Ok(StockLevel {
            equipment_id,
            location_id,
            quantity,
        })
    }

    fn total_quantity(&self, equipment_id: EquipmentId) -> ServiceResult<EquipmentTotal> {
        let quantity = self.workflow.total_quantity(equipment_id)?;
        Ok(EquipmentTotal {
            equipment_id,
            quantity,
        })
    }

    fn stock_by_location(&self, location_id: LocationId) -> ServiceResult<Vec<StockLevel>> {
        let rows = self.workflow.stock_by_location(location_id)?;
        Ok(dto::levels_at_location(location_id, rows))
    }

    fn stock_by_equipment(&self, equipment_id: EquipmentId) -> ServiceResult<Vec<StockLevel>> {
        let rows = self.workflow.stock_by_equipment(equipment_id)?;
        Ok(dto::levels_of_equipment(equipment_id, rows))
    }

    fn current_location(&self, equipment_id: EquipmentId) -> ServiceResult<EquipmentPlacement> {
        let location_id = self.workflow.current_location(equipment_id)?;
        Ok(EquipmentPlacement {
            equipment_id,
            location_id,
        })
    }

    fn equipment_by_supplier(&self, supplier_id: SupplierId) -> ServiceResult<Vec<Equipment>> {
        Ok(self.workflow.equipment_by_supplier(supplier_id)?)
    }

    fn verify_stock(&self) -> ServiceResult<Vec<StockDivergence>> {
        Ok(self.workflow.verify_stock()?)
    }

    fn rebuild_stock(&self) -> ServiceResult<Vec<StockDivergence>> {
        Ok(self.workflow.rebuild_stock()?)
    }
}
