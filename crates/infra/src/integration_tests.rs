//! Integration tests for the full approval pipeline.
//!
//! Tests: Command → Workflow → Validator → Gateway (ledger + stock) → Reads
//!
//! Verifies:
//! - Approvals move stock exactly once and atomically
//! - Failed approvals leave document, ledger and stock untouched
//! - Concurrent approvals drawing from one bucket cannot both succeed
//! - The maintained stock view always equals a full ledger replay

use std::sync::{Arc, Barrier};

use chrono::{Duration, Utc};

use stockflow_catalog::{Equipment, InMemoryCatalog, Location};
use stockflow_core::{AggregateId, EquipmentId, LocationId, UserId};
use stockflow_documents::{
    AdjustmentDirection, Approve, CreateDocument, DocumentId, DocumentKind, DocumentStatus,
    FulfillmentPolicy, Movement, Reject, SetActualQuantity, Submit,
};
use stockflow_stock::{BucketKey, MovementQuery, StockDivergence, StockSnapshot};

use crate::config::EngineConfig;
use crate::gateway::{
    CommitReceipt, GatewayError, InMemoryGateway, StockGateway, StoredDocumentEvent, UnitOfWork,
};
use crate::workflow::{Approval, DocumentWorkflow, LineInput, WorkflowError};

type Workflow<G = Arc<InMemoryGateway>> = DocumentWorkflow<G, Arc<InMemoryCatalog>>;

struct Fixture {
    gateway: Arc<InMemoryGateway>,
    catalog: Arc<InMemoryCatalog>,
    workflow: Workflow,
    x: EquipmentId,
    loc_a: LocationId,
    loc_b: LocationId,
}

fn fixture() -> Fixture {
    let catalog = Arc::new(InMemoryCatalog::new());
    let a = Location::new(LocationId::new(), "Warehouse A");
    let b = Location::new(LocationId::new(), "Warehouse B");
    let (loc_a, loc_b) = (a.id, b.id);
    catalog.upsert_location(a).unwrap();
    catalog.upsert_location(b).unwrap();

    let x = Equipment::new(EquipmentId::new(), "Projector", "SN-100").with_unit_price(40_000);
    let x_id = x.id;
    catalog.upsert_equipment(x).unwrap();

    let gateway = Arc::new(InMemoryGateway::new());
    let workflow = DocumentWorkflow::new(gateway.clone(), catalog.clone(), EngineConfig::default());

    Fixture {
        gateway,
        catalog,
        workflow,
        x: x_id,
        loc_a,
        loc_b,
    }
}

fn create<G: StockGateway>(
    workflow: &Workflow<G>,
    kind: DocumentKind,
    location_id: LocationId,
    source_location_id: Option<LocationId>,
) -> DocumentId {
    let document_id = DocumentId::new(AggregateId::new());
    workflow
        .create_document(CreateDocument {
            document_id,
            kind,
            number: format!("{}-test", kind.as_str()),
            location_id,
            source_location_id,
            created_by: UserId::new(),
            date: None,
            comment: String::new(),
            fulfillment: FulfillmentPolicy::Strict,
            occurred_at: Utc::now(),
        })
        .unwrap();
    document_id
}

fn add<G: StockGateway>(
    workflow: &Workflow<G>,
    document_id: DocumentId,
    equipment_id: EquipmentId,
    quantity: i64,
    direction: Option<AdjustmentDirection>,
) {
    workflow
        .add_item(
            document_id,
            LineInput {
                equipment_id,
                planned_quantity: quantity,
                unit_price: None,
                direction,
            },
            Utc::now(),
        )
        .unwrap();
}

fn submit<G: StockGateway>(workflow: &Workflow<G>, document_id: DocumentId) {
    workflow
        .submit(Submit {
            document_id,
            submitted_by: UserId::new(),
            occurred_at: Utc::now(),
        })
        .unwrap();
}

fn approve<G: StockGateway>(workflow: &Workflow<G>, document_id: DocumentId) -> Result<Approval, WorkflowError> {
    workflow.approve(Approve {
        document_id,
        approver: UserId::new(),
        occurred_at: Utc::now(),
    })
}

/// Pending single-line document.
fn pending<G: StockGateway>(
    workflow: &Workflow<G>,
    kind: DocumentKind,
    location_id: LocationId,
    source_location_id: Option<LocationId>,
    equipment_id: EquipmentId,
    quantity: i64,
) -> DocumentId {
    let id = create(workflow, kind, location_id, source_location_id);
    let direction = (kind == DocumentKind::Adjustment).then_some(AdjustmentDirection::Increase);
    add(workflow, id, equipment_id, quantity, direction);
    submit(workflow, id);
    id
}

/// Bring `location_id` to `quantity` units of `equipment_id` via an approved receipt.
fn stock_up(f: &Fixture, location_id: LocationId, quantity: i64) {
    let id = pending(&f.workflow, DocumentKind::Receipt, location_id, None, f.x, quantity);
    approve(&f.workflow, id).unwrap();
}

fn ledger_len(f: &Fixture) -> usize {
    f.workflow.movements(&MovementQuery::default()).unwrap().len()
}

fn qty(f: &Fixture, location_id: LocationId) -> i64 {
    f.workflow.current_quantity(f.x, location_id).unwrap()
}

fn assert_view_matches_replay(f: &Fixture) {
    assert_eq!(f.workflow.verify_stock().unwrap(), Vec::<StockDivergence>::new());
}

#[test]
fn scenario_a_transfer_moves_stock_between_locations() {
    let f = fixture();
    stock_up(&f, f.loc_a, 10);
    let before = ledger_len(&f);

    let id = pending(&f.workflow, DocumentKind::Transfer, f.loc_b, Some(f.loc_a), f.x, 5);
    let approval = approve(&f.workflow, id).unwrap();

    assert_eq!(approval.document.status(), DocumentStatus::Approved);
    assert!(approval.document.approved_by().is_some());
    assert!(approval.document.resolved_at().is_some());
    assert_eq!(qty(&f, f.loc_a), 5);
    assert_eq!(qty(&f, f.loc_b), 5);
    assert_eq!(ledger_len(&f), before + 1);

    let recorded = f.workflow.movements(&MovementQuery::by_document(id)).unwrap();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].from_location_id, Some(f.loc_a));
    assert_eq!(recorded[0].to_location_id, Some(f.loc_b));
    assert_eq!(recorded[0].quantity, 5);
    assert_eq!(recorded, approval.movements);
    assert_view_matches_replay(&f);
}

#[test]
fn scenario_b_insufficient_stock_leaves_everything_untouched() {
    let f = fixture();
    stock_up(&f, f.loc_a, 5);
    let before = ledger_len(&f);

    let id = pending(&f.workflow, DocumentKind::Transfer, f.loc_b, Some(f.loc_a), f.x, 20);
    let err = approve(&f.workflow, id).unwrap_err();

    match err {
        WorkflowError::InsufficientStock {
            available,
            requested,
            location_id,
            equipment_id,
        } => {
            assert_eq!((available, requested), (5, 20));
            assert_eq!(location_id, f.loc_a);
            assert_eq!(equipment_id, f.x);
        }
        other => panic!("expected InsufficientStock, got {other:?}"),
    }
    assert_eq!(qty(&f, f.loc_a), 5);
    assert_eq!(qty(&f, f.loc_b), 0);
    assert_eq!(ledger_len(&f), before);
    assert_eq!(f.workflow.get_document(id).unwrap().status(), DocumentStatus::Pending);
}

#[test]
fn scenario_c_rejection_is_terminal_and_moves_nothing() {
    let f = fixture();
    stock_up(&f, f.loc_a, 10);
    let before = ledger_len(&f);

    let id = pending(&f.workflow, DocumentKind::Transfer, f.loc_b, Some(f.loc_a), f.x, 4);
    let rejected = f
        .workflow
        .reject(Reject {
            document_id: id,
            approver: UserId::new(),
            reason: Some("wrong warehouse".to_string()),
            occurred_at: Utc::now(),
        })
        .unwrap();

    assert_eq!(rejected.status(), DocumentStatus::Rejected);
    assert!(rejected.approved_by().is_none());
    assert_eq!(qty(&f, f.loc_a), 10);
    assert_eq!(ledger_len(&f), before);
    assert!(f.workflow.movements(&MovementQuery::by_document(id)).unwrap().is_empty());

    let err = approve(&f.workflow, id).unwrap_err();
    assert!(matches!(err, WorkflowError::State(_)));
    assert_eq!(ledger_len(&f), before);
}

#[test]
fn scenario_d_write_off_has_no_destination() {
    let f = fixture();
    stock_up(&f, f.loc_a, 5);

    let id = pending(&f.workflow, DocumentKind::WriteOff, f.loc_a, None, f.x, 3);
    let approval = approve(&f.workflow, id).unwrap();

    assert_eq!(qty(&f, f.loc_a), 2);
    assert_eq!(approval.movements.len(), 1);
    assert_eq!(approval.movements[0].to_location_id, None);
    assert_eq!(approval.movements[0].from_location_id, Some(f.loc_a));
    assert_eq!(f.workflow.total_quantity(f.x).unwrap(), 2);
}

/// Gateway that holds every approval commit until two of them have arrived, so
/// both approvals validate against the same snapshot before either commits.
struct RendezvousGateway {
    inner: Arc<InMemoryGateway>,
    barrier: Barrier,
}

impl StockGateway for RendezvousGateway {
    fn load_document(&self, document_id: DocumentId) -> Result<Vec<StoredDocumentEvent>, GatewayError> {
        self.inner.load_document(document_id)
    }

    fn document_ids(&self) -> Result<Vec<DocumentId>, GatewayError> {
        self.inner.document_ids()
    }

    fn stock_snapshot(&self, keys: &[BucketKey]) -> Result<StockSnapshot, GatewayError> {
        self.inner.stock_snapshot(keys)
    }

    fn commit(&self, unit: UnitOfWork) -> Result<CommitReceipt, GatewayError> {
        if !unit.movements.is_empty() {
            self.barrier.wait();
        }
        self.inner.commit(unit)
    }

    fn movements(&self, query: &MovementQuery) -> Result<Vec<Movement>, GatewayError> {
        self.inner.movements(query)
    }

    fn current_quantity(&self, equipment_id: EquipmentId, location_id: LocationId) -> Result<i64, GatewayError> {
        self.inner.current_quantity(equipment_id, location_id)
    }

    fn total_quantity(&self, equipment_id: EquipmentId) -> Result<i128, GatewayError> {
        self.inner.total_quantity(equipment_id)
    }

    fn stock_by_location(&self, location_id: LocationId) -> Result<Vec<(EquipmentId, i64)>, GatewayError> {
        self.inner.stock_by_location(location_id)
    }

    fn stock_by_equipment(&self, equipment_id: EquipmentId) -> Result<Vec<(LocationId, i64)>, GatewayError> {
        self.inner.stock_by_equipment(equipment_id)
    }

    fn verify_stock(&self) -> Result<Vec<StockDivergence>, GatewayError> {
        self.inner.verify_stock()
    }

    fn rebuild_stock(&self) -> Result<Vec<StockDivergence>, GatewayError> {
        self.inner.rebuild_stock()
    }
}

#[test]
fn scenario_e_concurrent_approvals_on_one_bucket_have_one_winner() {
    let f = fixture();
    stock_up(&f, f.loc_a, 10);
    let first = pending(&f.workflow, DocumentKind::Transfer, f.loc_b, Some(f.loc_a), f.x, 6);
    let second = pending(&f.workflow, DocumentKind::Transfer, f.loc_b, Some(f.loc_a), f.x, 6);
    let before = ledger_len(&f);

    let racing: Workflow<RendezvousGateway> = DocumentWorkflow::new(
        RendezvousGateway {
            inner: f.gateway.clone(),
            barrier: Barrier::new(2),
        },
        f.catalog.clone(),
        EngineConfig::default(),
    );

    let (r1, r2) = std::thread::scope(|s| {
        let h1 = s.spawn(|| approve(&racing, first));
        let h2 = s.spawn(|| approve(&racing, second));
        (h1.join().unwrap(), h2.join().unwrap())
    });

    let (winner, loser) = match (&r1, &r2) {
        (Ok(_), Err(e)) => (first, (second, e.clone())),
        (Err(e), Ok(_)) => (second, (first, e.clone())),
        other => panic!("expected exactly one winner, got {other:?}"),
    };
    assert!(matches!(loser.1, WorkflowError::ConcurrencyConflict(_)));
    assert!(loser.1.is_retryable());

    assert_eq!(qty(&f, f.loc_a), 4);
    assert_eq!(qty(&f, f.loc_b), 6);
    assert_eq!(ledger_len(&f), before + 1);
    assert_eq!(f.workflow.get_document(winner).unwrap().status(), DocumentStatus::Approved);
    assert_eq!(f.workflow.get_document(loser.0).unwrap().status(), DocumentStatus::Pending);

    // A caller retrying the loser now sees the real shortfall.
    let retry = approve(&f.workflow, loser.0).unwrap_err();
    assert!(matches!(retry, WorkflowError::InsufficientStock { available: 4, requested: 6, .. }));
    assert_view_matches_replay(&f);
}

#[test]
fn approving_twice_fails_and_leaves_ledger_unchanged() {
    let f = fixture();
    let id = pending(&f.workflow, DocumentKind::Receipt, f.loc_a, None, f.x, 3);
    approve(&f.workflow, id).unwrap();
    let after_first = ledger_len(&f);

    let err = approve(&f.workflow, id).unwrap_err();
    assert!(matches!(err, WorkflowError::State(_)));
    assert_eq!(ledger_len(&f), after_first);
    assert_eq!(qty(&f, f.loc_a), 3);
}

#[test]
fn approved_document_rejects_edits_and_rejection() {
    let f = fixture();
    let id = pending(&f.workflow, DocumentKind::Receipt, f.loc_a, None, f.x, 3);
    approve(&f.workflow, id).unwrap();

    let err = f
        .workflow
        .reject(Reject {
            document_id: id,
            approver: UserId::new(),
            reason: None,
            occurred_at: Utc::now(),
        })
        .unwrap_err();
    assert!(matches!(err, WorkflowError::State(_)));

    let err = f
        .workflow
        .set_actual_quantity(SetActualQuantity {
            document_id: id,
            line_no: 1,
            actual_quantity: 1,
            occurred_at: Utc::now(),
        })
        .unwrap_err();
    assert!(matches!(err, WorkflowError::State(_)));
}

#[test]
fn actual_quantity_drives_the_movement() {
    let f = fixture();
    let id = create(&f.workflow, DocumentKind::Receipt, f.loc_a, None);
    add(&f.workflow, id, f.x, 10, None);
    f.workflow
        .set_actual_quantity(SetActualQuantity {
            document_id: id,
            line_no: 1,
            actual_quantity: 7,
            occurred_at: Utc::now(),
        })
        .unwrap();
    submit(&f.workflow, id);

    let approval = approve(&f.workflow, id).unwrap();
    assert_eq!(approval.movements[0].quantity, 7);
    assert_eq!(qty(&f, f.loc_a), 7);
}

#[test]
fn multi_line_approval_is_all_or_nothing() {
    let f = fixture();
    let y = Equipment::new(EquipmentId::new(), "Tripod", "SN-200");
    let y_id = y.id;
    f.catalog.upsert_equipment(y).unwrap();
    stock_up(&f, f.loc_a, 10);
    let before = ledger_len(&f);

    // First line is covered, second is not: nothing may move.
    let id = create(&f.workflow, DocumentKind::Transfer, f.loc_b, Some(f.loc_a));
    add(&f.workflow, id, f.x, 4, None);
    add(&f.workflow, id, y_id, 1, None);
    submit(&f.workflow, id);

    let err = approve(&f.workflow, id).unwrap_err();
    assert!(matches!(err, WorkflowError::InsufficientStock { .. }));
    assert_eq!(qty(&f, f.loc_a), 10);
    assert_eq!(ledger_len(&f), before);
}

#[test]
fn adjustments_correct_stock_in_both_directions() {
    let f = fixture();
    stock_up(&f, f.loc_a, 5);

    let id = create(&f.workflow, DocumentKind::Adjustment, f.loc_a, None);
    add(&f.workflow, id, f.x, 2, Some(AdjustmentDirection::Decrease));
    submit(&f.workflow, id);
    approve(&f.workflow, id).unwrap();
    assert_eq!(qty(&f, f.loc_a), 3);

    let id = pending(&f.workflow, DocumentKind::Adjustment, f.loc_a, None, f.x, 4);
    approve(&f.workflow, id).unwrap();
    assert_eq!(qty(&f, f.loc_a), 7);

    let id = create(&f.workflow, DocumentKind::Adjustment, f.loc_a, None);
    add(&f.workflow, id, f.x, 8, Some(AdjustmentDirection::Decrease));
    submit(&f.workflow, id);
    assert!(matches!(
        approve(&f.workflow, id).unwrap_err(),
        WorkflowError::InsufficientStock { .. }
    ));
}

#[test]
fn removed_catalog_reference_is_caught_at_approval() {
    let f = fixture();
    let other = Location::new(LocationId::new(), "Annex");
    let other_id = other.id;
    f.catalog.upsert_location(other).unwrap();

    let id = pending(&f.workflow, DocumentKind::Receipt, other_id, None, f.x, 1);

    // Approve through a catalog that no longer knows the location.
    let shrunk = Arc::new(InMemoryCatalog::new());
    shrunk.upsert_location(Location::new(f.loc_a, "Warehouse A")).unwrap();
    shrunk
        .upsert_equipment(Equipment::new(f.x, "Projector", "SN-100"))
        .unwrap();
    let workflow = DocumentWorkflow::new(f.gateway.clone(), shrunk, EngineConfig::default());

    let err = approve(&workflow, id).unwrap_err();
    assert!(matches!(err, WorkflowError::NotFound(_)));
    assert_eq!(ledger_len(&f), 0);
}

#[test]
fn stock_reads_and_movement_queries() {
    let f = fixture();
    stock_up(&f, f.loc_a, 10);
    let t_mid = Utc::now();
    let id = pending(&f.workflow, DocumentKind::Transfer, f.loc_b, Some(f.loc_a), f.x, 3);
    approve(&f.workflow, id).unwrap();

    assert_eq!(f.workflow.stock_by_location(f.loc_a).unwrap(), vec![(f.x, 7)]);
    assert_eq!(f.workflow.stock_by_location(f.loc_b).unwrap(), vec![(f.x, 3)]);
    let mut by_equipment = f.workflow.stock_by_equipment(f.x).unwrap();
    by_equipment.sort_by_key(|(_, q)| *q);
    assert_eq!(by_equipment, vec![(f.loc_b, 3), (f.loc_a, 7)]);
    assert_eq!(f.workflow.total_quantity(f.x).unwrap(), 10);

    assert_eq!(f.workflow.movements(&MovementQuery::by_equipment(f.x)).unwrap().len(), 2);
    assert_eq!(f.workflow.movements(&MovementQuery::by_location(f.loc_b)).unwrap().len(), 1);
    let later = f
        .workflow
        .movements(&MovementQuery::by_date_range(t_mid, Utc::now() + Duration::seconds(1)))
        .unwrap();
    assert_eq!(later.len(), 1);
    assert_eq!(later[0].document_id, id);

    assert!(matches!(
        f.workflow.stock_by_location(LocationId::new()).unwrap_err(),
        WorkflowError::NotFound(_)
    ));
}

#[test]
fn lost_stock_view_is_detected_and_rebuilt_from_ledger() {
    let f = fixture();
    stock_up(&f, f.loc_a, 10);
    let id = pending(&f.workflow, DocumentKind::Transfer, f.loc_b, Some(f.loc_a), f.x, 4);
    approve(&f.workflow, id).unwrap();
    assert_view_matches_replay(&f);

    f.gateway.discard_stock_view();
    let divergence = f.workflow.verify_stock().unwrap();
    assert_eq!(divergence.len(), 2);
    assert!(divergence.iter().all(|d| d.incremental == 0));

    let corrected = f.workflow.rebuild_stock().unwrap();
    assert_eq!(corrected, divergence);
    assert_eq!(qty(&f, f.loc_a), 6);
    assert_eq!(qty(&f, f.loc_b), 4);
    assert_view_matches_replay(&f);

    // Approvals keep working on the rebuilt view.
    let id = pending(&f.workflow, DocumentKind::WriteOff, f.loc_a, None, f.x, 6);
    approve(&f.workflow, id).unwrap();
    assert_eq!(qty(&f, f.loc_a), 0);
    assert_view_matches_replay(&f);
}

#[test]
fn lenient_policy_allows_over_fulfillment() {
    let f = fixture();
    let config = EngineConfig {
        fulfillment_policy: FulfillmentPolicy::Lenient,
        ..EngineConfig::default()
    };
    let workflow = DocumentWorkflow::new(f.gateway.clone(), f.catalog.clone(), config);

    let id = create(&workflow, DocumentKind::Receipt, f.loc_a, None);
    add(&workflow, id, f.x, 2, None);
    workflow
        .set_actual_quantity(SetActualQuantity {
            document_id: id,
            line_no: 1,
            actual_quantity: 3,
            occurred_at: Utc::now(),
        })
        .unwrap();
    submit(&workflow, id);
    approve(&workflow, id).unwrap();
    assert_eq!(qty(&f, f.loc_a), 3);
}

#[test]
fn receipt_that_would_overflow_a_bucket_is_refused_and_store_stays_usable() {
    let f = fixture();
    stock_up(&f, f.loc_a, i64::MAX);
    let id = pending(&f.workflow, DocumentKind::Receipt, f.loc_a, None, f.x, 1);

    match approve(&f.workflow, id).unwrap_err() {
        WorkflowError::Validation(msg) => assert!(msg.contains("maximum"), "{msg}"),
        other => panic!("expected validation error, got {other:?}"),
    }

    assert_eq!(qty(&f, f.loc_a), i64::MAX);
    assert_eq!(ledger_len(&f), 1);
    assert_eq!(f.workflow.get_document(id).unwrap().status(), DocumentStatus::Pending);
    assert_view_matches_replay(&f);
}

/// Gateway whose snapshots never see existing stock, so the validator passes
/// plans that only the commit-time staging can refuse.
struct StaleSnapshotGateway {
    inner: Arc<InMemoryGateway>,
}

impl StockGateway for StaleSnapshotGateway {
    fn load_document(&self, document_id: DocumentId) -> Result<Vec<StoredDocumentEvent>, GatewayError> {
        self.inner.load_document(document_id)
    }

    fn document_ids(&self) -> Result<Vec<DocumentId>, GatewayError> {
        self.inner.document_ids()
    }

    fn stock_snapshot(&self, _keys: &[BucketKey]) -> Result<StockSnapshot, GatewayError> {
        Ok(StockSnapshot::default())
    }

    fn commit(&self, unit: UnitOfWork) -> Result<CommitReceipt, GatewayError> {
        self.inner.commit(unit)
    }

    fn movements(&self, query: &MovementQuery) -> Result<Vec<Movement>, GatewayError> {
        self.inner.movements(query)
    }

    fn current_quantity(&self, equipment_id: EquipmentId, location_id: LocationId) -> Result<i64, GatewayError> {
        self.inner.current_quantity(equipment_id, location_id)
    }

    fn total_quantity(&self, equipment_id: EquipmentId) -> Result<i128, GatewayError> {
        self.inner.total_quantity(equipment_id)
    }

    fn stock_by_location(&self, location_id: LocationId) -> Result<Vec<(EquipmentId, i64)>, GatewayError> {
        self.inner.stock_by_location(location_id)
    }

    fn stock_by_equipment(&self, equipment_id: EquipmentId) -> Result<Vec<(LocationId, i64)>, GatewayError> {
        self.inner.stock_by_equipment(equipment_id)
    }

    fn verify_stock(&self) -> Result<Vec<StockDivergence>, GatewayError> {
        self.inner.verify_stock()
    }

    fn rebuild_stock(&self) -> Result<Vec<StockDivergence>, GatewayError> {
        self.inner.rebuild_stock()
    }
}

#[test]
fn overflow_caught_at_commit_leaves_gateway_unpoisoned() {
    let f = fixture();
    stock_up(&f, f.loc_a, i64::MAX);
    let stale: Workflow<StaleSnapshotGateway> = DocumentWorkflow::new(
        StaleSnapshotGateway {
            inner: f.gateway.clone(),
        },
        f.catalog.clone(),
        EngineConfig::default(),
    );
    let id = pending(&stale, DocumentKind::Receipt, f.loc_a, None, f.x, 1);

    match approve(&stale, id).unwrap_err() {
        WorkflowError::Gateway(GatewayError::InvalidCommit(msg)) => {
            assert!(msg.contains("overflow"), "{msg}")
        }
        other => panic!("expected invalid commit, got {other:?}"),
    }

    // Reads and writes still go through the same lock.
    assert_eq!(qty(&f, f.loc_a), i64::MAX);
    assert_eq!(f.workflow.get_document(id).unwrap().status(), DocumentStatus::Pending);
    stock_up(&f, f.loc_b, 1);
    assert_eq!(f.workflow.total_quantity(f.x).unwrap(), i128::from(i64::MAX) + 1);
    assert_view_matches_replay(&f);
}

#[test]
fn current_location_follows_the_latest_destination() {
    let f = fixture();
    assert_eq!(f.workflow.current_location(f.x).unwrap(), None);

    stock_up(&f, f.loc_a, 5);
    assert_eq!(f.workflow.current_location(f.x).unwrap(), Some(f.loc_a));

    let id = pending(&f.workflow, DocumentKind::Transfer, f.loc_b, Some(f.loc_a), f.x, 2);
    approve(&f.workflow, id).unwrap();
    assert_eq!(f.workflow.current_location(f.x).unwrap(), Some(f.loc_b));

    let id = pending(&f.workflow, DocumentKind::WriteOff, f.loc_b, None, f.x, 2);
    approve(&f.workflow, id).unwrap();
    assert_eq!(f.workflow.current_location(f.x).unwrap(), Some(f.loc_b));

    let registered = Equipment::new(EquipmentId::new(), "Screen", "SN-200").with_location(f.loc_a);
    let registered_id = registered.id;
    f.catalog.upsert_equipment(registered).unwrap();
    assert_eq!(f.workflow.current_location(registered_id).unwrap(), Some(f.loc_a));

    assert!(matches!(
        f.workflow.current_location(EquipmentId::new()).unwrap_err(),
        WorkflowError::NotFound(_)
    ));
}
