//! Pre-commit checks for document approval.
//!
//! Pure: nothing here mutates state. The workflow runs [`validate_approval`]
//! against a snapshot taken from the same gateway state the commit is guarded on.

use std::collections::{BTreeSet, HashMap};

use stockflow_catalog::Catalog;
use stockflow_core::{DomainError, DomainResult};
use stockflow_documents::{Document, NewMovement};

use crate::aggregator::{BucketKey, StockSnapshot};

/// Every bucket a movement plan reads or writes, ordered.
pub fn touched_buckets(plan: &[NewMovement]) -> Vec<BucketKey> {
    plan.iter()
        .flat_map(|m| {
            m.from_location_id
                .into_iter()
                .chain(m.to_location_id)
                .map(move |l| BucketKey::new(m.equipment_id, l))
        })
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Check a document and its movement plan before anything is written.
///
/// In order: referenced locations and equipment exist, lines and movements are
/// well-formed, and every outgoing leg is covered by the snapshot. Outgoing legs
/// that share a bucket are summed in line order. Returns the first violation.
pub fn validate_approval<C>(
    catalog: &C,
    document: &Document,
    plan: &[NewMovement],
    snapshot: &StockSnapshot,
) -> DomainResult<()>
where
    C: Catalog + ?Sized,
{
    for location_id in document.locations() {
        catalog.require_location(location_id)?;
    }
    for item in document.items() {
        catalog.require_equipment(item.equipment_id)?;
    }

    if document.items().is_empty() {
        return Err(DomainError::validation("document has no items"));
    }
    for item in document.items() {
        if item.planned_quantity <= 0 {
            return Err(DomainError::validation(format!(
                "planned quantity must be positive (line {})",
                item.line_no
            )));
        }
    }
    if plan.len() != document.items().len() {
        return Err(DomainError::invariant(format!(
            "movement plan has {} entries for {} lines",
            plan.len(),
            document.items().len()
        )));
    }
    for movement in plan {
        movement.validate()?;
    }

    let mut drawn: HashMap<BucketKey, i64> = HashMap::new();
    let mut received: HashMap<BucketKey, i64> = HashMap::new();
    for movement in plan {
        if let Some(source) = movement.from_location_id {
            let key = BucketKey::new(movement.equipment_id, source);
            let requested = drawn.entry(key).or_insert(0);
            *requested = requested
                .checked_add(movement.quantity)
                .ok_or_else(|| overflow(key))?;

            let available = snapshot.quantity(&key);
            if *requested > available {
                return Err(DomainError::InsufficientStock {
                    equipment_id: key.equipment_id,
                    location_id: key.location_id,
                    available,
                    requested: *requested,
                });
            }
        }

        if let Some(target) = movement.to_location_id {
            let key = BucketKey::new(movement.equipment_id, target);
            let incoming = received.entry(key).or_insert(0);
            *incoming = incoming
                .checked_add(movement.quantity)
                .filter(|total| snapshot.quantity(&key).checked_add(*total).is_some())
                .ok_or_else(|| overflow(key))?;
        }
    }

    Ok(())
}

fn overflow(key: BucketKey) -> DomainError {
    DomainError::validation(format!("quantity at {key} would exceed the supported maximum"))
}
