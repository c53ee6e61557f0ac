use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use stockflow_core::{
    Aggregate, AggregateId, AggregateRoot, DomainError, EquipmentId, Event, LocationId, UserId,
};

use crate::movement::{MovementReason, NewMovement};

/// Document identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub AggregateId);

impl DocumentId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// What a document does to stock once approved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    /// Stock arrives at the document location.
    Receipt,
    /// Stock moves from the source location to the document location.
    Transfer,
    /// Stock leaves the document location for good.
    WriteOff,
    /// Signed correction at the document location, per line direction.
    Adjustment,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Receipt => "receipt",
            DocumentKind::Transfer => "transfer",
            DocumentKind::WriteOff => "write_off",
            DocumentKind::Adjustment => "adjustment",
        }
    }
}

impl core::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Document status lifecycle: draft -> pending -> approved | rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Draft,
    Pending,
    Approved,
    Rejected,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Draft => "draft",
            DocumentStatus::Pending => "pending",
            DocumentStatus::Approved => "approved",
            DocumentStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DocumentStatus::Approved | DocumentStatus::Rejected)
    }
}

impl core::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sign of an adjustment line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdjustmentDirection {
    Increase,
    Decrease,
}

/// How the actual (fulfilled) quantity of a line may relate to the planned one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FulfillmentPolicy {
    /// `1 <= actual <= planned`.
    #[default]
    Strict,
    /// `actual >= 1`; over-fulfillment is accepted as-is.
    Lenient,
}

impl FulfillmentPolicy {
    fn check(self, line_no: u32, planned: i64, actual: i64) -> Result<(), DomainError> {
        if actual <= 0 {
            return Err(DomainError::validation(format!(
                "actual quantity must be positive (line {line_no})"
            )));
        }
        if self == FulfillmentPolicy::Strict && actual > planned {
            return Err(DomainError::validation(format!(
                "actual quantity {actual} exceeds planned quantity {planned} (line {line_no})"
            )));
        }
        Ok(())
    }
}

/// One equipment line of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentItem {
    pub line_no: u32,
    pub equipment_id: EquipmentId,
    pub planned_quantity: i64,
    /// Real-world fulfillment, settable while the document is a draft.
    pub actual_quantity: Option<i64>,
    /// Unit price captured when the line was added (smallest currency unit).
    pub unit_price: u64,
    /// Only present on adjustment documents.
    pub direction: Option<AdjustmentDirection>,
}

impl DocumentItem {
    /// Quantity that moves on approval: actual when recorded, planned otherwise.
    pub fn effective_quantity(&self) -> i64 {
        self.actual_quantity.unwrap_or(self.planned_quantity)
    }

    pub fn total_price(&self) -> u64 {
        self.unit_price
            .saturating_mul(u64::try_from(self.effective_quantity()).unwrap_or(0))
    }
}

/// Aggregate root: Document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Document {
    id: DocumentId,
    kind: DocumentKind,
    number: String,
    status: DocumentStatus,
    date: Option<NaiveDate>,
    created_by: Option<UserId>,
    approved_by: Option<UserId>,
    rejected_by: Option<UserId>,
    rejection_reason: Option<String>,
    resolved_at: Option<DateTime<Utc>>,
    location_id: Option<LocationId>,
    source_location_id: Option<LocationId>,
    items: Vec<DocumentItem>,
    comment: String,
    fulfillment: FulfillmentPolicy,
    version: u64,
    #[serde(skip)]
    created: bool,
}

impl Document {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: DocumentId) -> Self {
        Self {
            id,
            kind: DocumentKind::Receipt,
            number: String::new(),
            status: DocumentStatus::Draft,
            date: None,
            created_by: None,
            approved_by: None,
            rejected_by: None,
            rejection_reason: None,
            resolved_at: None,
            location_id: None,
            source_location_id: None,
            items: Vec::new(),
            comment: String::new(),
            fulfillment: FulfillmentPolicy::Strict,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> DocumentId {
        self.id
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    pub fn number(&self) -> &str {
        &self.number
    }

    pub fn status(&self) -> DocumentStatus {
        self.status
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }

    pub fn created_by(&self) -> Option<UserId> {
        self.created_by
    }

    pub fn approved_by(&self) -> Option<UserId> {
        self.approved_by
    }

    pub fn rejected_by(&self) -> Option<UserId> {
        self.rejected_by
    }

    pub fn rejection_reason(&self) -> Option<&str> {
        self.rejection_reason.as_deref()
    }

    pub fn resolved_at(&self) -> Option<DateTime<Utc>> {
        self.resolved_at
    }

    /// The document's own location (the receiving side of transfers).
    pub fn location_id(&self) -> Option<LocationId> {
        self.location_id
    }

    pub fn source_location_id(&self) -> Option<LocationId> {
        self.source_location_id
    }

    /// Every location the document touches, source first.
    pub fn locations(&self) -> Vec<LocationId> {
        self.source_location_id
            .into_iter()
            .chain(self.location_id)
            .collect()
    }

    pub fn items(&self) -> &[DocumentItem] {
        &self.items
    }

    pub fn item(&self, line_no: u32) -> Option<&DocumentItem> {
        self.items.iter().find(|i| i.line_no == line_no)
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn fulfillment(&self) -> FulfillmentPolicy {
        self.fulfillment
    }

    pub fn total_value(&self) -> u64 {
        self.items
            .iter()
            .fold(0u64, |acc, i| acc.saturating_add(i.total_price()))
    }

    /// Derive the movements this document stands for.
    ///
    /// Only meaningful while the document awaits approval; the returned batch is
    /// what the workflow validates and commits together with `DocumentApproved`.
    pub fn plan_movements(
        &self,
        recorded_by: UserId,
        occurred_at: DateTime<Utc>,
    ) -> Result<Vec<NewMovement>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found(format!("document {}", self.id)));
        }
        if self.status != DocumentStatus::Pending {
            return Err(DomainError::state(format!(
                "movements are only derived for pending documents (status: {})",
                self.status
            )));
        }
        let location = self
            .location_id
            .ok_or_else(|| DomainError::invariant("document has no location"))?;

        self.items
            .iter()
            .map(|item| -> Result<NewMovement, DomainError> {
                let (from, to) = match self.kind {
                    DocumentKind::Receipt => (None, Some(location)),
                    DocumentKind::WriteOff => (Some(location), None),
                    DocumentKind::Transfer => {
                        let source = self.source_location_id.ok_or_else(|| {
                            DomainError::invariant("transfer document has no source location")
                        })?;
                        (Some(source), Some(location))
                    }
                    DocumentKind::Adjustment => match item.direction {
                        Some(AdjustmentDirection::Increase) => (None, Some(location)),
                        Some(AdjustmentDirection::Decrease) => (Some(location), None),
                        None => {
                            return Err(DomainError::invariant(format!(
                                "adjustment line {} has no direction",
                                item.line_no
                            )));
                        }
                    },
                };

                Ok(NewMovement {
                    equipment_id: item.equipment_id,
                    from_location_id: from,
                    to_location_id: to,
                    quantity: item.effective_quantity(),
                    reason: MovementReason::from(self.kind),
                    document_id: self.id,
                    occurred_at,
                    recorded_by,
                })
            })
            .collect()
    }
}

impl AggregateRoot for Document {
    type Id = DocumentId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateDocument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateDocument {
    pub document_id: DocumentId,
    pub kind: DocumentKind,
    pub number: String,
    pub location_id: LocationId,
    /// Required for transfers, rejected for every other kind.
    pub source_location_id: Option<LocationId>,
    pub created_by: UserId,
    /// Defaults to the day of `occurred_at`.
    pub date: Option<NaiveDate>,
    pub comment: String,
    pub fulfillment: FulfillmentPolicy,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddItem (draft only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddItem {
    pub document_id: DocumentId,
    pub equipment_id: EquipmentId,
    pub planned_quantity: i64,
    pub unit_price: u64,
    pub direction: Option<AdjustmentDirection>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateItem (draft only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateItem {
    pub document_id: DocumentId,
    pub line_no: u32,
    pub planned_quantity: Option<i64>,
    pub unit_price: Option<u64>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RemoveItem (draft only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveItem {
    pub document_id: DocumentId,
    pub line_no: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SetActualQuantity (draft only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetActualQuantity {
    pub document_id: DocumentId,
    pub line_no: u32,
    pub actual_quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SetComment (draft only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetComment {
    pub document_id: DocumentId,
    pub comment: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Submit (draft -> pending).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submit {
    pub document_id: DocumentId,
    pub submitted_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Approve (pending -> approved).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approve {
    pub document_id: DocumentId,
    pub approver: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Reject (pending -> rejected).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reject {
    pub document_id: DocumentId,
    pub approver: UserId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentCommand {
    CreateDocument(CreateDocument),
    AddItem(AddItem),
    UpdateItem(UpdateItem),
    RemoveItem(RemoveItem),
    SetActualQuantity(SetActualQuantity),
    SetComment(SetComment),
    Submit(Submit),
    Approve(Approve),
    Reject(Reject),
}

impl DocumentCommand {
    pub fn document_id(&self) -> DocumentId {
        match self {
            DocumentCommand::CreateDocument(c) => c.document_id,
            DocumentCommand::AddItem(c) => c.document_id,
            DocumentCommand::UpdateItem(c) => c.document_id,
            DocumentCommand::RemoveItem(c) => c.document_id,
            DocumentCommand::SetActualQuantity(c) => c.document_id,
            DocumentCommand::SetComment(c) => c.document_id,
            DocumentCommand::Submit(c) => c.document_id,
            DocumentCommand::Approve(c) => c.document_id,
            DocumentCommand::Reject(c) => c.document_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DocumentCommand::CreateDocument(_) => "create_document",
            DocumentCommand::AddItem(_) => "add_item",
            DocumentCommand::UpdateItem(_) => "update_item",
            DocumentCommand::RemoveItem(_) => "remove_item",
            DocumentCommand::SetActualQuantity(_) => "set_actual_quantity",
            DocumentCommand::SetComment(_) => "set_comment",
            DocumentCommand::Submit(_) => "submit",
            DocumentCommand::Approve(_) => "approve",
            DocumentCommand::Reject(_) => "reject",
        }
    }
}

/// Event: DocumentCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentCreated {
    pub document_id: DocumentId,
    pub kind: DocumentKind,
    pub number: String,
    pub location_id: LocationId,
    pub source_location_id: Option<LocationId>,
    pub created_by: UserId,
    pub date: NaiveDate,
    pub comment: String,
    pub fulfillment: FulfillmentPolicy,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemAdded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemAdded {
    pub document_id: DocumentId,
    pub item: DocumentItem,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemUpdated (carries the resulting values).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemUpdated {
    pub document_id: DocumentId,
    pub line_no: u32,
    pub planned_quantity: i64,
    pub unit_price: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemRemoved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRemoved {
    pub document_id: DocumentId,
    pub line_no: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ActualQuantityRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActualQuantityRecorded {
    pub document_id: DocumentId,
    pub line_no: u32,
    pub actual_quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CommentChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentChanged {
    pub document_id: DocumentId,
    pub comment: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DocumentSubmitted. Content is frozen from here on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSubmitted {
    pub document_id: DocumentId,
    pub submitted_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DocumentApproved.
///
/// Only ever persisted in the same unit of work as the movements the document
/// stands for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentApproved {
    pub document_id: DocumentId,
    pub approved_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DocumentRejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRejected {
    pub document_id: DocumentId,
    pub rejected_by: UserId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentEvent {
    DocumentCreated(DocumentCreated),
    ItemAdded(ItemAdded),
    ItemUpdated(ItemUpdated),
    ItemRemoved(ItemRemoved),
    ActualQuantityRecorded(ActualQuantityRecorded),
    CommentChanged(CommentChanged),
    DocumentSubmitted(DocumentSubmitted),
    DocumentApproved(DocumentApproved),
    DocumentRejected(DocumentRejected),
}

impl DocumentEvent {
    pub fn document_id(&self) -> DocumentId {
        match self {
            DocumentEvent::DocumentCreated(e) => e.document_id,
            DocumentEvent::ItemAdded(e) => e.document_id,
            DocumentEvent::ItemUpdated(e) => e.document_id,
            DocumentEvent::ItemRemoved(e) => e.document_id,
            DocumentEvent::ActualQuantityRecorded(e) => e.document_id,
            DocumentEvent::CommentChanged(e) => e.document_id,
            DocumentEvent::DocumentSubmitted(e) => e.document_id,
            DocumentEvent::DocumentApproved(e) => e.document_id,
            DocumentEvent::DocumentRejected(e) => e.document_id,
        }
    }
}

impl Event for DocumentEvent {
    fn event_type(&self) -> &'static str {
        match self {
            DocumentEvent::DocumentCreated(_) => "documents.document.created",
            DocumentEvent::ItemAdded(_) => "documents.document.item_added",
            DocumentEvent::ItemUpdated(_) => "documents.document.item_updated",
            DocumentEvent::ItemRemoved(_) => "documents.document.item_removed",
            DocumentEvent::ActualQuantityRecorded(_) => "documents.document.actual_quantity_recorded",
            DocumentEvent::CommentChanged(_) => "documents.document.comment_changed",
            DocumentEvent::DocumentSubmitted(_) => "documents.document.submitted",
            DocumentEvent::DocumentApproved(_) => "documents.document.approved",
            DocumentEvent::DocumentRejected(_) => "documents.document.rejected",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            DocumentEvent::DocumentCreated(e) => e.occurred_at,
            DocumentEvent::ItemAdded(e) => e.occurred_at,
            DocumentEvent::ItemUpdated(e) => e.occurred_at,
            DocumentEvent::ItemRemoved(e) => e.occurred_at,
            DocumentEvent::ActualQuantityRecorded(e) => e.occurred_at,
            DocumentEvent::CommentChanged(e) => e.occurred_at,
            DocumentEvent::DocumentSubmitted(e) => e.occurred_at,
            DocumentEvent::DocumentApproved(e) => e.occurred_at,
            DocumentEvent::DocumentRejected(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Document {
    type Command = DocumentCommand;
    type Event = DocumentEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            DocumentEvent::DocumentCreated(e) => {
                self.id = e.document_id;
                self.kind = e.kind;
                self.number = e.number.clone();
                self.status = DocumentStatus::Draft;
                self.date = Some(e.date);
                self.created_by = Some(e.created_by);
                self.location_id = Some(e.location_id);
                self.source_location_id = e.source_location_id;
                self.comment = e.comment.clone();
                self.fulfillment = e.fulfillment;
                self.items.clear();
                self.created = true;
            }
            DocumentEvent::ItemAdded(e) => {
                self.items.push(e.item.clone());
            }
            DocumentEvent::ItemUpdated(e) => {
                if let Some(item) = self.items.iter_mut().find(|i| i.line_no == e.line_no) {
                    item.planned_quantity = e.planned_quantity;
                    item.unit_price = e.unit_price;
                }
            }
            DocumentEvent::ItemRemoved(e) => {
                self.items.retain(|i| i.line_no != e.line_no);
            }
            DocumentEvent::ActualQuantityRecorded(e) => {
                if let Some(item) = self.items.iter_mut().find(|i| i.line_no == e.line_no) {
                    item.actual_quantity = Some(e.actual_quantity);
                }
            }
            DocumentEvent::CommentChanged(e) => {
                self.comment = e.comment.clone();
            }
            DocumentEvent::DocumentSubmitted(_) => {
                self.status = DocumentStatus::Pending;
            }
            DocumentEvent::DocumentApproved(e) => {
                self.status = DocumentStatus::Approved;
                self.approved_by = Some(e.approved_by);
                self.resolved_at = Some(e.occurred_at);
            }
            DocumentEvent::DocumentRejected(e) => {
                self.status = DocumentStatus::Rejected;
                self.rejected_by = Some(e.rejected_by);
                self.rejection_reason = e.reason.clone();
                self.resolved_at = Some(e.occurred_at);
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            DocumentCommand::CreateDocument(cmd) => self.handle_create(cmd),
            DocumentCommand::AddItem(cmd) => self.handle_add_item(cmd),
            DocumentCommand::UpdateItem(cmd) => self.handle_update_item(cmd),
            DocumentCommand::RemoveItem(cmd) => self.handle_remove_item(cmd),
            DocumentCommand::SetActualQuantity(cmd) => self.handle_set_actual(cmd),
            DocumentCommand::SetComment(cmd) => self.handle_set_comment(cmd),
            DocumentCommand::Submit(cmd) => self.handle_submit(cmd),
            DocumentCommand::Approve(cmd) => self.handle_approve(cmd),
            DocumentCommand::Reject(cmd) => self.handle_reject(cmd),
        }
    }
}

impl Document {
    fn ensure_exists(&self, document_id: DocumentId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found(format!("document {document_id}")));
        }
        if self.id != document_id {
            return Err(DomainError::invariant("document_id mismatch"));
        }
        Ok(())
    }

    fn ensure_draft(&self, document_id: DocumentId, action: &str) -> Result<(), DomainError> {
        self.ensure_exists(document_id)?;
        if self.status != DocumentStatus::Draft {
            return Err(DomainError::state(format!(
                "cannot {action}: document {} is {}, only drafts can be edited",
                self.number, self.status
            )));
        }
        Ok(())
    }

    fn ensure_pending(&self, document_id: DocumentId, action: &str) -> Result<(), DomainError> {
        self.ensure_exists(document_id)?;
        if self.status.is_terminal() {
            return Err(DomainError::state(format!(
                "cannot {action}: document {} was already {}",
                self.number, self.status
            )));
        }
        if self.status != DocumentStatus::Pending {
            return Err(DomainError::state(format!(
                "cannot {action}: document {} is {}, only pending documents can be resolved",
                self.number, self.status
            )));
        }
        Ok(())
    }

    fn existing_item(&self, line_no: u32) -> Result<&DocumentItem, DomainError> {
        self.item(line_no).ok_or_else(|| {
            DomainError::not_found(format!("line {line_no} of document {}", self.number))
        })
    }

    fn check_line_shape(&self, item: &DocumentItem) -> Result<(), DomainError> {
        if item.planned_quantity <= 0 {
            return Err(DomainError::validation(format!(
                "planned quantity must be positive (line {})",
                item.line_no
            )));
        }
        if let Some(actual) = item.actual_quantity {
            self.fulfillment
                .check(item.line_no, item.planned_quantity, actual)?;
        }
        match (self.kind, item.direction) {
            (DocumentKind::Adjustment, None) => Err(DomainError::validation(format!(
                "adjustment lines need a direction (line {})",
                item.line_no
            ))),
            (DocumentKind::Adjustment, Some(_)) | (_, None) => Ok(()),
            (kind, Some(_)) => Err(DomainError::validation(format!(
                "only adjustment lines carry a direction ({kind} line {})",
                item.line_no
            ))),
        }
    }

    fn handle_create(&self, cmd: &CreateDocument) -> Result<Vec<DocumentEvent>, DomainError> {
        if self.created {
            return Err(DomainError::validation(format!(
                "document {} already exists",
                cmd.document_id
            )));
        }
        if cmd.number.trim().is_empty() {
            return Err(DomainError::validation("document number cannot be empty"));
        }

        match (cmd.kind, cmd.source_location_id) {
            (DocumentKind::Transfer, None) => {
                return Err(DomainError::validation(
                    "transfer documents need a source location",
                ));
            }
            (DocumentKind::Transfer, Some(source)) if source == cmd.location_id => {
                return Err(DomainError::validation(
                    "source and destination of a transfer must differ",
                ));
            }
            (DocumentKind::Transfer, Some(_)) | (_, None) => {}
            (kind, Some(_)) => {
                return Err(DomainError::validation(format!(
                    "{kind} documents do not take a source location"
                )));
            }
        }

        Ok(vec![DocumentEvent::DocumentCreated(DocumentCreated {
            document_id: cmd.document_id,
            kind: cmd.kind,
            number: cmd.number.trim().to_string(),
            location_id: cmd.location_id,
            source_location_id: cmd.source_location_id,
            created_by: cmd.created_by,
            date: cmd.date.unwrap_or_else(|| cmd.occurred_at.date_naive()),
            comment: cmd.comment.clone(),
            fulfillment: cmd.fulfillment,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_add_item(&self, cmd: &AddItem) -> Result<Vec<DocumentEvent>, DomainError> {
        self.ensure_draft(cmd.document_id, "add item")?;

        let line_no = self.items.iter().map(|i| i.line_no).max().unwrap_or(0) + 1;
        let item = DocumentItem {
            line_no,
            equipment_id: cmd.equipment_id,
            planned_quantity: cmd.planned_quantity,
            actual_quantity: None,
            unit_price: cmd.unit_price,
            direction: cmd.direction,
        };
        self.check_line_shape(&item)?;

        Ok(vec![DocumentEvent::ItemAdded(ItemAdded {
            document_id: cmd.document_id,
            item,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update_item(&self, cmd: &UpdateItem) -> Result<Vec<DocumentEvent>, DomainError> {
        self.ensure_draft(cmd.document_id, "update item")?;
        let current = self.existing_item(cmd.line_no)?;

        if cmd.planned_quantity.is_none() && cmd.unit_price.is_none() {
            return Err(DomainError::validation("nothing to update"));
        }

        let mut updated = current.clone();
        if let Some(planned) = cmd.planned_quantity {
            updated.planned_quantity = planned;
        }
        if let Some(price) = cmd.unit_price {
            updated.unit_price = price;
        }
        self.check_line_shape(&updated)?;

        Ok(vec![DocumentEvent::ItemUpdated(ItemUpdated {
            document_id: cmd.document_id,
            line_no: cmd.line_no,
            planned_quantity: updated.planned_quantity,
            unit_price: updated.unit_price,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_remove_item(&self, cmd: &RemoveItem) -> Result<Vec<DocumentEvent>, DomainError> {
        self.ensure_draft(cmd.document_id, "remove item")?;
        self.existing_item(cmd.line_no)?;

        Ok(vec![DocumentEvent::ItemRemoved(ItemRemoved {
            document_id: cmd.document_id,
            line_no: cmd.line_no,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_set_actual(
        &self,
        cmd: &SetActualQuantity,
    ) -> Result<Vec<DocumentEvent>, DomainError> {
        self.ensure_draft(cmd.document_id, "set actual quantity")?;
        let item = self.existing_item(cmd.line_no)?;
        self.fulfillment
            .check(cmd.line_no, item.planned_quantity, cmd.actual_quantity)?;

        Ok(vec![DocumentEvent::ActualQuantityRecorded(
            ActualQuantityRecorded {
                document_id: cmd.document_id,
                line_no: cmd.line_no,
                actual_quantity: cmd.actual_quantity,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_set_comment(&self, cmd: &SetComment) -> Result<Vec<DocumentEvent>, DomainError> {
        self.ensure_draft(cmd.document_id, "change comment")?;

        Ok(vec![DocumentEvent::CommentChanged(CommentChanged {
            document_id: cmd.document_id,
            comment: cmd.comment.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_submit(&self, cmd: &Submit) -> Result<Vec<DocumentEvent>, DomainError> {
        self.ensure_exists(cmd.document_id)?;
        if self.status != DocumentStatus::Draft {
            return Err(DomainError::state(format!(
                "cannot submit: document {} is {}, only drafts can be submitted",
                self.number, self.status
            )));
        }

        if self.items.is_empty() {
            return Err(DomainError::validation(
                "cannot submit a document without items",
            ));
        }
        for item in &self.items {
            self.check_line_shape(item)?;
        }

        Ok(vec![DocumentEvent::DocumentSubmitted(DocumentSubmitted {
            document_id: cmd.document_id,
            submitted_by: cmd.submitted_by,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_approve(&self, cmd: &Approve) -> Result<Vec<DocumentEvent>, DomainError> {
        self.ensure_pending(cmd.document_id, "approve")?;

        Ok(vec![DocumentEvent::DocumentApproved(DocumentApproved {
            document_id: cmd.document_id,
            approved_by: cmd.approver,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reject(&self, cmd: &Reject) -> Result<Vec<DocumentEvent>, DomainError> {
        self.ensure_pending(cmd.document_id, "reject")?;

        let reason = cmd
            .reason
            .as_ref()
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());

        Ok(vec![DocumentEvent::DocumentRejected(DocumentRejected {
            document_id: cmd.document_id,
            rejected_by: cmd.approver,
            reason,
            occurred_at: cmd.occurred_at,
        })])
    }
}
