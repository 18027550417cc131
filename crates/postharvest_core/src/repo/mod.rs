//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Isolate SQLite query details from pipeline orchestration.
//!
//! # Invariants
//! - Each repository call acquires and releases its own connection.
//! - Duplicate ledger inserts are absorbed, never reported as errors.

pub mod ledger_repo;
