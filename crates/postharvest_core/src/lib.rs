//! Core of postharvest: listing extraction, working-set and ledger stores,
//! annotation, delivery and the pipeline that sequences them.

pub mod annotate;
pub mod config;
pub mod db;
pub mod deliver;
pub mod extract;
pub mod logging;
pub mod model;
pub mod render;
pub mod repo;
pub mod schedule;
pub mod service;
pub mod store;

pub use config::{AppConfig, ConfigError, ConfigResult};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::item::{
    LedgerEntry, LedgerStats, RawItem, WorkingSetRecord, WorkingSetStats, UNKNOWN_CATEGORY,
};
pub use repo::ledger_repo::{CompletionLedger, LedgerError, LedgerResult, SqliteCompletionLedger};
pub use service::{AnnotationReport, Pipeline};
pub use store::{StoreError, StoreResult, WorkingSetStore};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
