//! Working-set persistence.
//!
//! # Responsibility
//! - Persist scraped and annotated records as a flat, permalink-keyed table.
//! - Merge re-scraped data without losing previously derived annotations.
//!
//! # Invariants
//! - Exactly one record per permalink after a deduplicating save.
//! - Writes are atomic: readers see the old file or the new file, never a mix.

mod working_set;

pub use working_set::{StoreError, StoreResult, WorkingSetStore, REQUIRED_COLUMNS};
