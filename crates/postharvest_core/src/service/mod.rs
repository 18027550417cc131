//! Use-case services.
//!
//! # Responsibility
//! - Orchestrate extraction, stores, annotation and delivery into runs.
//! - Keep the CLI free of storage and browser details.

pub mod pipeline;

pub use pipeline::{AnnotationReport, Pipeline};
