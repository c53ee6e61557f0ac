//! Stock module: the movement ledger, the per-bucket stock view derived from it,
//! and the pre-commit consistency checks for approvals.

pub mod aggregator;
pub mod ledger;
pub mod validator;

pub use aggregator::{
    Bucket, BucketKey, StagedStock, StockAggregator, StockDivergence, StockError, StockSnapshot,
};
pub use ledger::{LedgerError, MovementLedger, MovementQuery};
pub use validator::{touched_buckets, validate_approval};
