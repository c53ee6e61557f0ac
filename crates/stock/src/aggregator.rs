//! Stock aggregator: current quantity per (equipment, location) bucket.
//!
//! The view is disposable. It is maintained incrementally alongside every ledger
//! append and can always be rebuilt by replaying the ledger from empty; both paths
//! go through the same [`StockAggregator::stage`] so they cannot drift apart.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use stockflow_core::{EquipmentId, LocationId, ValueObject};
use stockflow_documents::Movement;

/// The (equipment, location) pair whose quantity is tracked.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BucketKey {
    pub equipment_id: EquipmentId,
    pub location_id: LocationId,
}

impl ValueObject for BucketKey {}

impl BucketKey {
    pub fn new(equipment_id: EquipmentId, location_id: LocationId) -> Self {
        Self {
            equipment_id,
            location_id,
        }
    }
}

impl core::fmt::Display for BucketKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}@{}", self.equipment_id, self.location_id)
    }
}

/// Quantity plus the number of movements that have touched the bucket.
///
/// `version` is what optimistic approval commits check against.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    pub quantity: i64,
    pub version: u64,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StockError {
    #[error("bucket {key} would go negative ({quantity})")]
    NegativeStock { key: BucketKey, quantity: i64 },

    #[error("non-monotonic movement id (last={last}, found={found})")]
    NonMonotonic { last: u64, found: u64 },

    #[error("bucket {key} quantity would overflow")]
    Overflow { key: BucketKey },
}

/// Bucket updates computed from a batch, not yet applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedStock {
    updates: HashMap<BucketKey, Bucket>,
    applied_through: u64,
}

/// Point-in-time copy of a set of buckets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StockSnapshot {
    buckets: HashMap<BucketKey, Bucket>,
}

impl StockSnapshot {
    pub fn bucket(&self, key: &BucketKey) -> Bucket {
        self.buckets.get(key).copied().unwrap_or_default()
    }

    pub fn quantity(&self, key: &BucketKey) -> i64 {
        self.bucket(key).quantity
    }

    /// `(bucket, version)` pairs a commit must still find unchanged.
    pub fn guard(&self) -> Vec<(BucketKey, u64)> {
        let mut guard: Vec<_> = self
            .buckets
            .iter()
            .map(|(k, b)| (*k, b.version))
            .collect();
        guard.sort_by_key(|(k, _)| *k);
        guard
    }
}

/// Incremental and replayed views disagreeing on one bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockDivergence {
    pub key: BucketKey,
    pub incremental: i64,
    pub replayed: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StockAggregator {
    buckets: HashMap<BucketKey, Bucket>,
    applied_through: u64,
}

impl StockAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from scratch by replaying movements in ledger order.
    pub fn replay<'a>(movements: impl IntoIterator<Item = &'a Movement>) -> Result<Self, StockError> {
        let movements: Vec<Movement> = movements.into_iter().cloned().collect();
        let mut aggregator = Self::new();
        aggregator.apply(&movements)?;
        Ok(aggregator)
    }

    /// Id of the last movement folded into the view.
    pub fn applied_through(&self) -> u64 {
        self.applied_through
    }

    /// Compute the effect of a batch without applying it.
    ///
    /// Movements at or below the cursor were already applied and are skipped; after
    /// that ids must increase by exactly one. Fails if any bucket would go negative
    /// or leave the `i64` range.
    pub fn stage(&self, movements: &[Movement]) -> Result<StagedStock, StockError> {
        let mut updates: HashMap<BucketKey, Bucket> = HashMap::new();
        let mut last = self.applied_through;

        for m in movements {
            if m.id.0 <= self.applied_through {
                // Already folded in; replays are harmless.
                continue;
            }
            if m.id.0 != last + 1 {
                return Err(StockError::NonMonotonic {
                    last,
                    found: m.id.0,
                });
            }

            let legs = m
                .from_location_id
                .map(|l| (l, -m.quantity))
                .into_iter()
                .chain(m.to_location_id.map(|l| (l, m.quantity)));
            for (location_id, delta) in legs {
                let key = BucketKey::new(m.equipment_id, location_id);
                let bucket = updates.entry(key).or_insert_with(|| self.bucket(&key));
                bucket.quantity = bucket
                    .quantity
                    .checked_add(delta)
                    .ok_or(StockError::Overflow { key })?;
                bucket.version += 1;
            }
            last = m.id.0;
        }

        let mut negative: Vec<_> = updates
            .iter()
            .filter(|(_, b)| b.quantity < 0)
            .map(|(k, b)| (*k, b.quantity))
            .collect();
        negative.sort_by_key(|(k, _)| *k);
        if let Some((key, quantity)) = negative.into_iter().next() {
            return Err(StockError::NegativeStock { key, quantity });
        }

        Ok(StagedStock {
            updates,
            applied_through: last,
        })
    }

    pub fn apply_staged(&mut self, staged: StagedStock) {
        self.buckets.extend(staged.updates);
        self.applied_through = self.applied_through.max(staged.applied_through);
    }

    pub fn apply(&mut self, movements: &[Movement]) -> Result<(), StockError> {
        let staged = self.stage(movements)?;
        self.apply_staged(staged);
        Ok(())
    }

    pub fn bucket(&self, key: &BucketKey) -> Bucket {
        self.buckets.get(key).copied().unwrap_or_default()
    }

    pub fn current_quantity(&self, equipment_id: EquipmentId, location_id: LocationId) -> i64 {
        self.bucket(&BucketKey::new(equipment_id, location_id)).quantity
    }

    /// Sum over every location. Widened: each bucket fits in `i64`, the sum may not.
    pub fn total_quantity(&self, equipment_id: EquipmentId) -> i128 {
        self.buckets
            .iter()
            .filter(|(k, _)| k.equipment_id == equipment_id)
            .map(|(_, b)| i128::from(b.quantity))
            .sum()
    }

    /// Non-empty buckets at one location, ordered by equipment id.
    pub fn by_location(&self, location_id: LocationId) -> Vec<(EquipmentId, i64)> {
        let mut rows: Vec<_> = self
            .buckets
            .iter()
            .filter(|(k, b)| k.location_id == location_id && b.quantity != 0)
            .map(|(k, b)| (k.equipment_id, b.quantity))
            .collect();
        rows.sort_by_key(|(e, _)| *e);
        rows
    }

    /// Non-empty buckets of one equipment, ordered by location id.
    pub fn by_equipment(&self, equipment_id: EquipmentId) -> Vec<(LocationId, i64)> {
        let mut rows: Vec<_> = self
            .buckets
            .iter()
            .filter(|(k, b)| k.equipment_id == equipment_id && b.quantity != 0)
            .map(|(k, b)| (k.location_id, b.quantity))
            .collect();
        rows.sort_by_key(|(l, _)| *l);
        rows
    }

    pub fn snapshot(&self, keys: impl IntoIterator<Item = BucketKey>) -> StockSnapshot {
        StockSnapshot {
            buckets: keys.into_iter().map(|k| (k, self.bucket(&k))).collect(),
        }
    }

    /// Buckets whose quantity differs from `replayed`, ordered by key.
    pub fn diff(&self, replayed: &StockAggregator) -> Vec<StockDivergence> {
        let keys: BTreeSet<BucketKey> = self
            .buckets
            .keys()
            .chain(replayed.buckets.keys())
            .copied()
            .collect();

        keys.into_iter()
            .filter_map(|key| {
                let incremental = self.bucket(&key).quantity;
                let replayed = replayed.bucket(&key).quantity;
                (incremental != replayed).then_some(StockDivergence {
                    key,
                    incremental,
                    replayed,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use proptest::prelude::*;
    use stockflow_core::{AggregateId, UserId};
    use stockflow_documents::{DocumentId, MovementId, MovementReason};

    fn movement(
        id: u64,
        equipment_id: EquipmentId,
        from: Option<LocationId>,
        to: Option<LocationId>,
        quantity: i64,
    ) -> Movement {
        Movement {
            id: MovementId(id),
            equipment_id,
            from_location_id: from,
            to_location_id: to,
            quantity,
            reason: MovementReason::Transfer,
            document_id: DocumentId::new(AggregateId::new()),
            occurred_at: Utc::now(),
            recorded_by: UserId::new(),
        }
    }

    #[test]
    fn transfer_moves_quantity_between_buckets() {
        let x = EquipmentId::new();
        let a = LocationId::new();
        let b = LocationId::new();
        let mut stock = StockAggregator::new();

        stock
            .apply(&[
                movement(1, x, None, Some(a), 10),
                movement(2, x, Some(a), Some(b), 5),
            ])
            .unwrap();

        assert_eq!(stock.current_quantity(x, a), 5);
        assert_eq!(stock.current_quantity(x, b), 5);
        assert_eq!(stock.total_quantity(x), 10);
        assert_eq!(stock.bucket(&BucketKey::new(x, a)).version, 2);
        assert_eq!(stock.bucket(&BucketKey::new(x, b)).version, 1);
        assert_eq!(stock.applied_through(), 2);
    }

    #[test]
    fn negative_bucket_rejects_whole_batch() {
        let x = EquipmentId::new();
        let a = LocationId::new();
        let mut stock = StockAggregator::new();
        stock.apply(&[movement(1, x, None, Some(a), 3)]).unwrap();

        let err = stock
            .apply(&[
                movement(2, x, Some(a), None, 2),
                movement(3, x, Some(a), None, 2),
            ])
            .unwrap_err();
        assert_eq!(
            err,
            StockError::NegativeStock {
                key: BucketKey::new(x, a),
                quantity: -1
            }
        );
        assert_eq!(stock.current_quantity(x, a), 3);
        assert_eq!(stock.applied_through(), 1);
    }

    #[test]
    fn overflowing_bucket_rejects_batch_instead_of_wrapping() {
        let x = EquipmentId::new();
        let a = LocationId::new();
        let b = LocationId::new();
        let mut stock = StockAggregator::new();
        stock
            .apply(&[
                movement(1, x, None, Some(a), i64::MAX),
                movement(2, x, None, Some(b), i64::MAX),
            ])
            .unwrap();

        let err = stock.stage(&[movement(3, x, None, Some(a), 1)]).unwrap_err();
        assert_eq!(err, StockError::Overflow { key: BucketKey::new(x, a) });
        assert_eq!(stock.current_quantity(x, a), i64::MAX);
        assert_eq!(stock.applied_through(), 2);
        assert_eq!(stock.total_quantity(x), 2 * i128::from(i64::MAX));
    }

    #[test]
    fn duplicates_are_ignored_and_gaps_refused() {
        let x = EquipmentId::new();
        let a = LocationId::new();
        let first = movement(1, x, None, Some(a), 4);
        let mut stock = StockAggregator::new();
        stock.apply(std::slice::from_ref(&first)).unwrap();
        stock.apply(std::slice::from_ref(&first)).unwrap();
        assert_eq!(stock.current_quantity(x, a), 4);

        let err = stock.apply(&[movement(3, x, None, Some(a), 1)]).unwrap_err();
        assert_eq!(err, StockError::NonMonotonic { last: 1, found: 3 });
    }

    #[test]
    fn listings_skip_empty_buckets() {
        let x = EquipmentId::new();
        let a = LocationId::new();
        let b = LocationId::new();
        let mut stock = StockAggregator::new();
        stock
            .apply(&[
                movement(1, x, None, Some(a), 2),
                movement(2, x, Some(a), Some(b), 2),
            ])
            .unwrap();

        assert!(stock.by_location(a).is_empty());
        assert_eq!(stock.by_location(b), vec![(x, 2)]);
        assert_eq!(stock.by_equipment(x), vec![(b, 2)]);
    }

    #[test]
    fn snapshot_guard_carries_versions_of_unseen_buckets_as_zero() {
        let x = EquipmentId::new();
        let a = LocationId::new();
        let stock = StockAggregator::new();
        let key = BucketKey::new(x, a);
        let snapshot = stock.snapshot([key]);
        assert_eq!(snapshot.quantity(&key), 0);
        assert_eq!(snapshot.guard(), vec![(key, 0)]);
    }

    #[test]
    fn diff_reports_diverging_buckets() {
        let x = EquipmentId::new();
        let a = LocationId::new();
        let ledger = vec![movement(1, x, None, Some(a), 7)];
        let replayed = StockAggregator::replay(&ledger).unwrap();

        let corrupted = StockAggregator::new();
        let divergence = corrupted.diff(&replayed);
        assert_eq!(
            divergence,
            vec![StockDivergence {
                key: BucketKey::new(x, a),
                incremental: 0,
                replayed: 7
            }]
        );
        assert!(replayed.diff(&replayed.clone()).is_empty());
    }

    /// One step of a random history: (equipment, from, to, quantity) as indexes
    /// into small pools so buckets collide often.
    fn step() -> impl Strategy<Value = (usize, Option<usize>, Option<usize>, i64)> {
        (
            0usize..3,
            prop::option::of(0usize..3),
            prop::option::of(0usize..3),
            1i64..20,
        )
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: applying accepted batches one by one gives the same view as a
        /// full replay of the resulting history, and no bucket is ever negative.
        #[test]
        fn incremental_view_matches_replay(
            batches in prop::collection::vec(prop::collection::vec(step(), 1..4), 1..30)
        ) {
            let equipment: Vec<_> = (0..3).map(|_| EquipmentId::new()).collect();
            let locations: Vec<_> = (0..3).map(|_| LocationId::new()).collect();

            let mut stock = StockAggregator::new();
            let mut history: Vec<Movement> = Vec::new();

            for batch in batches {
                let mut next = history.len() as u64 + 1;
                let movements: Vec<Movement> = batch
                    .into_iter()
                    .filter(|(_, from, to, _)| from.is_some() || to.is_some())
                    .filter(|(_, from, to, _)| from.is_none() || from != to)
                    .map(|(e, from, to, q)| {
                        let m = movement(
                            next,
                            equipment[e],
                            from.map(|i| locations[i]),
                            to.map(|i| locations[i]),
                            q,
                        );
                        next += 1;
                        m
                    })
                    .collect();

                let before = stock.clone();
                match stock.apply(&movements) {
                    Ok(()) => history.extend(movements),
                    Err(StockError::NegativeStock { .. }) => prop_assert_eq!(&stock, &before),
                    Err(other) => prop_assert!(false, "unexpected error {other:?}"),
                }

                let replayed = StockAggregator::replay(&history).unwrap();
                prop_assert!(stock.diff(&replayed).is_empty());
                for e in &equipment {
                    for l in &locations {
                        prop_assert!(stock.current_quantity(*e, *l) >= 0);
                    }
                }
            }
        }
    }
}
