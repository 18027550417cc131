//! Domain records flowing through the extraction-and-reconciliation pipeline.
//!
//! # Responsibility
//! - Define the scraped item shape and its persisted, annotated superset.
//! - Define ledger entry and statistics shapes shared by stores and CLI.
//!
//! # Invariants
//! - Every record is identified by its absolute `permalink`.
//! - Annotation fields are derived; scraping never fills them.

pub mod item;
