//! Document workflow engine (application-level orchestration).
//!
//! Every document operation follows the same pipeline:
//!
//! ```text
//! Command
//!   ↓
//! 1. Load the document stream from the gateway
//!   ↓
//! 2. Rehydrate the aggregate
//!   ↓
//! 3. Handle the command (pure, produces events)
//!   ↓
//! 4. Commit events with an optimistic check on the stream version
//! ```
//!
//! `Approve` extends step 3 with movement planning, a stock snapshot and the
//! consistency checks, and commits the movements in the same unit of work. The
//! unit is guarded by the versions of every touched bucket, so two approvals
//! racing for one bucket cannot both pass against a stale snapshot.
//!
//! A lost per-document race is retried by reloading (up to
//! `EngineConfig::document_retry_limit`); the reloaded state machine then reports
//! the illegal transition. A lost bucket race is returned as a conflict.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use stockflow_catalog::{Catalog, Equipment};
use stockflow_core::{
    Aggregate, AggregateRoot, DomainError, Entity, EquipmentId, ExpectedVersion, LocationId,
    SupplierId,
};
use stockflow_documents::{
    AddItem, AdjustmentDirection, Approve, CreateDocument, Document, DocumentCommand,
    DocumentEvent, DocumentId, DocumentKind, DocumentStatus, Movement, Reject, RemoveItem,
    SetActualQuantity, SetComment, Submit, UpdateItem,
};
use stockflow_stock::{MovementQuery, StockDivergence, touched_buckets, validate_approval};

use crate::config::EngineConfig;
use crate::gateway::{
    GatewayError, StockGateway, StoredDocumentEvent, UncommittedDocumentEvent, UnitOfWork,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    /// Malformed input (deterministic).
    #[error("validation failed: {0}")]
    Validation(String),
    /// Illegal lifecycle transition.
    #[error("illegal state transition: {0}")]
    State(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error(
        "insufficient stock for equipment {equipment_id} at location {location_id}: available {available}, requested {requested}"
    )]
    InsufficientStock {
        equipment_id: EquipmentId,
        location_id: LocationId,
        available: i64,
        requested: i64,
    },
    /// A competing write invalidated the snapshot; the caller may retry.
    #[error("concurrency conflict: {0}")]
    ConcurrencyConflict(String),
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
    /// A stored payload could not be read back as a document event.
    #[error("failed to deserialize document event: {0}")]
    Deserialize(String),
    /// Opaque infrastructure failure.
    #[error(transparent)]
    Gateway(GatewayError),
}

impl WorkflowError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, WorkflowError::ConcurrencyConflict(_))
    }
}

impl From<DomainError> for WorkflowError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => WorkflowError::Validation(msg),
            DomainError::State(msg) => WorkflowError::State(msg),
            DomainError::NotFound(msg) => WorkflowError::NotFound(msg),
            DomainError::InsufficientStock {
                equipment_id,
                location_id,
                available,
                requested,
            } => WorkflowError::InsufficientStock {
                equipment_id,
                location_id,
                available,
                requested,
            },
            DomainError::ConcurrencyConflict(msg) => WorkflowError::ConcurrencyConflict(msg),
            DomainError::InvariantViolation(msg) => WorkflowError::InvariantViolation(msg),
            DomainError::InvalidId(msg) => WorkflowError::Validation(msg),
        }
    }
}

impl From<GatewayError> for WorkflowError {
    fn from(value: GatewayError) -> Self {
        match value {
            GatewayError::DocumentConflict(msg) | GatewayError::StockConflict(msg) => {
                WorkflowError::ConcurrencyConflict(msg)
            }
            other => WorkflowError::Gateway(other),
        }
    }
}

/// A line to add to a draft. Without `unit_price` the catalog price is captured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineInput {
    pub equipment_id: EquipmentId,
    pub planned_quantity: i64,
    pub unit_price: Option<u64>,
    pub direction: Option<AdjustmentDirection>,
}

/// Optional filters for [`DocumentWorkflow::list_documents`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DocumentFilter {
    pub status: Option<DocumentStatus>,
    pub kind: Option<DocumentKind>,
}

impl DocumentFilter {
    fn matches(&self, document: &Document) -> bool {
        self.status.is_none_or(|s| document.status() == s)
            && self.kind.is_none_or(|k| document.kind() == k)
    }
}

/// What a successful approval wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Approval {
    pub document: Document,
    pub movements: Vec<Movement>,
}

/// Outcome of one decide-and-commit attempt.
enum Attempt<T> {
    Done(T),
    Retry(String),
}

#[derive(Debug)]
pub struct DocumentWorkflow<G, C> {
    gateway: G,
    catalog: C,
    config: EngineConfig,
}

impl<G, C> DocumentWorkflow<G, C> {
    pub fn new(gateway: G, catalog: C, config: EngineConfig) -> Self {
        Self {
            gateway,
            catalog,
            config,
        }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

impl<G, C> DocumentWorkflow<G, C>
where
    G: StockGateway,
    C: Catalog,
{
    /// Create a draft. The configured fulfillment policy replaces the one on `cmd`.
    #[instrument(skip(self, cmd), fields(document_id = %cmd.document_id, kind = %cmd.kind), err)]
    pub fn create_document(&self, cmd: CreateDocument) -> Result<Document, WorkflowError> {
        self.catalog.require_location(cmd.location_id)?;
        if let Some(source) = cmd.source_location_id {
            self.catalog.require_location(source)?;
        }

        let cmd = CreateDocument {
            fulfillment: self.config.fulfillment_policy,
            ..cmd
        };
        let document = self.execute(DocumentCommand::CreateDocument(cmd))?;
        info!(number = document.number(), "document created");
        Ok(document)
    }

    #[instrument(skip(self, line), fields(equipment_id = %line.equipment_id), err)]
    pub fn add_item(
        &self,
        document_id: DocumentId,
        line: LineInput,
        occurred_at: DateTime<Utc>,
    ) -> Result<Document, WorkflowError> {
        let equipment = self.catalog.require_equipment(line.equipment_id)?;
        let unit_price = line.unit_price.unwrap_or(equipment.unit_price);
        debug!(equipment = equipment.label(), unit_price, "adding line");

        self.execute(DocumentCommand::AddItem(AddItem {
            document_id,
            equipment_id: line.equipment_id,
            planned_quantity: line.planned_quantity,
            unit_price,
            direction: line.direction,
            occurred_at,
        }))
    }

    pub fn update_item(&self, cmd: UpdateItem) -> Result<Document, WorkflowError> {
        self.execute(DocumentCommand::UpdateItem(cmd))
    }

    pub fn remove_item(&self, cmd: RemoveItem) -> Result<Document, WorkflowError> {
        self.execute(DocumentCommand::RemoveItem(cmd))
    }

    pub fn set_actual_quantity(&self, cmd: SetActualQuantity) -> Result<Document, WorkflowError> {
        self.execute(DocumentCommand::SetActualQuantity(cmd))
    }

    pub fn set_comment(&self, cmd: SetComment) -> Result<Document, WorkflowError> {
        self.execute(DocumentCommand::SetComment(cmd))
    }

    #[instrument(skip(self, cmd), fields(document_id = %cmd.document_id), err)]
    pub fn submit(&self, cmd: Submit) -> Result<Document, WorkflowError> {
        let document = self.execute(DocumentCommand::Submit(cmd))?;
        info!(number = document.number(), items = document.items().len(), "document submitted");
        Ok(document)
    }

    #[instrument(skip(self, cmd), fields(document_id = %cmd.document_id), err)]
    pub fn reject(&self, cmd: Reject) -> Result<Document, WorkflowError> {
        let document = self.execute(DocumentCommand::Reject(cmd))?;
        info!(number = document.number(), "document rejected");
        Ok(document)
    }

    /// Approve a pending document and commit its movements atomically.
    ///
    /// On any error nothing is written and the document stays pending.
    #[instrument(skip(self, cmd), fields(document_id = %cmd.document_id, approver = %cmd.approver), err)]
    pub fn approve(&self, cmd: Approve) -> Result<Approval, WorkflowError> {
        let approval = self.with_retries(cmd.document_id, || self.try_approve(&cmd))?;
        info!(
            number = approval.document.number(),
            movements = approval.movements.len(),
            "document approved"
        );
        Ok(approval)
    }

    pub fn get_document(&self, document_id: DocumentId) -> Result<Document, WorkflowError> {
        let (document, _) = self.load(document_id)?;
        if !document.is_created() {
            return Err(WorkflowError::NotFound(format!("document {document_id}")));
        }
        Ok(document)
    }

    /// Documents in creation order.
    pub fn list_documents(&self, filter: DocumentFilter) -> Result<Vec<Document>, WorkflowError> {
        let mut documents = Vec::new();
        for id in self.gateway.document_ids()? {
            let (document, _) = self.load(id)?;
            if document.is_created() && filter.matches(&document) {
                documents.push(document);
            }
        }
        Ok(documents)
    }

    pub fn movements(&self, query: &MovementQuery) -> Result<Vec<Movement>, WorkflowError> {
        Ok(self.gateway.movements(query)?)
    }

    pub fn current_quantity(&self, equipment_id: EquipmentId, location_id: LocationId) -> Result<i64, WorkflowError> {
        Ok(self.gateway.current_quantity(equipment_id, location_id)?)
    }

    pub fn total_quantity(&self, equipment_id: EquipmentId) -> Result<i128, WorkflowError> {
        Ok(self.gateway.total_quantity(equipment_id)?)
    }

    /// Where an item was last moved to, as recorded by the ledger.
    ///
    /// Falls back to the catalog's registered location until a movement with a
    /// destination exists; write-offs do not change it.
    pub fn current_location(&self, equipment_id: EquipmentId) -> Result<Option<LocationId>, WorkflowError> {
        let equipment = self.catalog.require_equipment(equipment_id)?;
        let movements = self.gateway.movements(&MovementQuery::by_equipment(equipment_id))?;
        Ok(movements
            .iter()
            .rev()
            .find_map(|m| m.to_location_id)
            .or(equipment.location_id))
    }

    pub fn stock_by_location(&self, location_id: LocationId) -> Result<Vec<(EquipmentId, i64)>, WorkflowError> {
        self.catalog.require_location(location_id)?;
        Ok(self.gateway.stock_by_location(location_id)?)
    }

    pub fn stock_by_equipment(&self, equipment_id: EquipmentId) -> Result<Vec<(LocationId, i64)>, WorkflowError> {
        self.catalog.require_equipment(equipment_id)?;
        Ok(self.gateway.stock_by_equipment(equipment_id)?)
    }

    pub fn equipment_by_supplier(&self, supplier_id: SupplierId) -> Result<Vec<Equipment>, WorkflowError> {
        if self.catalog.supplier(supplier_id).is_none() {
            return Err(WorkflowError::NotFound(format!("supplier {supplier_id}")));
        }
        Ok(self.catalog.equipment_by_supplier(supplier_id))
    }

    pub fn verify_stock(&self) -> Result<Vec<StockDivergence>, WorkflowError> {
        Ok(self.gateway.verify_stock()?)
    }

    pub fn rebuild_stock(&self) -> Result<Vec<StockDivergence>, WorkflowError> {
        Ok(self.gateway.rebuild_stock()?)
    }

    /// Run a non-approval command through the load/handle/commit pipeline.
    #[instrument(skip(self, command), fields(command = command.name(), document_id = %command.document_id()))]
    fn execute(&self, command: DocumentCommand) -> Result<Document, WorkflowError> {
        let document_id = command.document_id();
        self.with_retries(document_id, || self.try_execute(&command))
    }

    fn with_retries<T>(
        &self,
        document_id: DocumentId,
        mut attempt: impl FnMut() -> Result<Attempt<T>, WorkflowError>,
    ) -> Result<T, WorkflowError> {
        let mut tries = 0u32;
        loop {
            match attempt()? {
                Attempt::Done(value) => return Ok(value),
                Attempt::Retry(reason) if tries < self.config.document_retry_limit => {
                    tries += 1;
                    debug!(%document_id, attempt = tries, %reason, "document changed concurrently, reloading");
                }
                Attempt::Retry(reason) => {
                    warn!(%document_id, attempts = tries + 1, "document retry limit reached");
                    return Err(WorkflowError::State(format!(
                        "document {document_id} kept changing during the operation ({reason})"
                    )));
                }
            }
        }
    }

    fn try_execute(&self, command: &DocumentCommand) -> Result<Attempt<Document>, WorkflowError> {
        let document_id = command.document_id();
        let (mut document, expected) = self.load(document_id)?;

        let decided = document.handle(command)?;
        if decided.is_empty() {
            return Ok(Attempt::Done(document));
        }

        let unit = UnitOfWork::events_only(document_id, expected, encode(&decided)?);
        match self.gateway.commit(unit) {
            Ok(_) => {
                for event in &decided {
                    document.apply(event);
                }
                Ok(Attempt::Done(document))
            }
            Err(GatewayError::DocumentConflict(reason)) => Ok(Attempt::Retry(reason)),
            Err(other) => Err(other.into()),
        }
    }

    fn try_approve(&self, cmd: &Approve) -> Result<Attempt<Approval>, WorkflowError> {
        let (mut document, expected) = self.load(cmd.document_id)?;

        let decided = document.handle(&DocumentCommand::Approve(cmd.clone()))?;
        let plan = document.plan_movements(cmd.approver, cmd.occurred_at)?;

        let keys = touched_buckets(&plan);
        let snapshot = self.gateway.stock_snapshot(&keys)?;
        if let Err(err) = validate_approval(&self.catalog, &document, &plan, &snapshot) {
            warn!(document_id = %cmd.document_id, error = %err, "approval refused by consistency checks");
            return Err(err.into());
        }

        let unit = UnitOfWork {
            document_id: cmd.document_id,
            expected_version: expected,
            events: encode(&decided)?,
            movements: plan,
            stock_guard: snapshot.guard(),
        };

        match self.gateway.commit(unit) {
            Ok(receipt) => {
                for event in &decided {
                    document.apply(event);
                }
                Ok(Attempt::Done(Approval {
                    document,
                    movements: receipt.movements,
                }))
            }
            Err(GatewayError::DocumentConflict(reason)) => Ok(Attempt::Retry(reason)),
            Err(GatewayError::StockConflict(reason)) => {
                warn!(document_id = %cmd.document_id, %reason, "approval lost a stock race");
                Err(WorkflowError::ConcurrencyConflict(reason))
            }
            Err(other) => Err(other.into()),
        }
    }

    /// Rehydrate a document and return the version its next commit must expect.
    fn load(&self, document_id: DocumentId) -> Result<(Document, ExpectedVersion), WorkflowError> {
        let history = self.gateway.load_document(document_id)?;
        validate_loaded_stream(document_id, &history)?;

        let mut document = Document::empty(document_id);
        for stored in history {
            let event: DocumentEvent = serde_json::from_value(stored.payload)
                .map_err(|e| WorkflowError::Deserialize(e.to_string()))?;
            if event.document_id() != document_id {
                return Err(WorkflowError::InvariantViolation(format!(
                    "payload of event {} belongs to document {}",
                    stored.sequence_number,
                    event.document_id()
                )));
            }
            document.apply(&event);
        }

        let expected = ExpectedVersion::Exact(document.version());
        Ok((document, expected))
    }
}

fn encode(events: &[DocumentEvent]) -> Result<Vec<UncommittedDocumentEvent>, WorkflowError> {
    events
        .iter()
        .map(|ev| UncommittedDocumentEvent::from_typed(ev.document_id(), Uuid::now_v7(), ev))
        .collect::<Result<Vec<_>, _>>()
        .map_err(WorkflowError::from)
}

fn validate_loaded_stream(document_id: DocumentId, stream: &[StoredDocumentEvent]) -> Result<(), WorkflowError> {
    let mut last = 0u64;
    for (idx, e) in stream.iter().enumerate() {
        if e.document_id != document_id {
            return Err(WorkflowError::InvariantViolation(format!(
                "loaded stream contains a foreign document_id at index {idx}"
            )));
        }
        if e.sequence_number != last + 1 {
            return Err(WorkflowError::InvariantViolation(format!(
                "non-contiguous sequence_number in loaded stream (last={last}, found={})",
                e.sequence_number
            )));
        }
        last = e.sequence_number;
    }
    Ok(())
}
