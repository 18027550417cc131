//! Connection bootstrap utilities for SQLite.
//!
//! # Responsibility
//! - Open file or in-memory SQLite connections.
//! - Create the ledger schema before returning a usable connection.
//!
//! # Invariants
//! - Returned connections carry the `processed` table and its index.
//! - The parent directory of a file database exists after a successful open.
//! - A ledger file written without a version stamp (user_version 0) is
//!   adopted in place; its rows are kept.

use super::{DbError, DbResult};
use log::{debug, error};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

/// Ledger schema version stamped into `PRAGMA user_version`.
pub const SCHEMA_VERSION: u32 = 1;

const LEDGER_SCHEMA: &str = include_str!("ledger_schema.sql");

/// Opens a SQLite database file and ensures the ledger schema exists.
///
/// Connections are short-lived: callers open one per unit of work and drop
/// it when the unit finishes, so logging stays at `debug` level.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    let path = path.as_ref();
    let started_at = Instant::now();

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut conn = match Connection::open(path) {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode=file path={} duration_ms={} error_code=db_open_failed error={}",
                path.display(),
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
    };

    match bootstrap_connection(&mut conn) {
        Ok(()) => {
            debug!(
                "event=db_open module=db status=ok mode=file duration_ms={}",
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode=file path={} duration_ms={} error_code=db_bootstrap_failed error={}",
                path.display(),
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

/// Opens an in-memory SQLite database with the ledger schema.
pub fn open_db_in_memory() -> DbResult<Connection> {
    let mut conn = Connection::open_in_memory()?;
    bootstrap_connection(&mut conn)?;
    Ok(conn)
}

fn bootstrap_connection(conn: &mut Connection) -> DbResult<()> {
    conn.busy_timeout(Duration::from_secs(5))?;

    let db_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    match db_version {
        SCHEMA_VERSION => Ok(()),
        0 => {
            let tx = conn.transaction()?;
            tx.execute_batch(LEDGER_SCHEMA)?;
            tx.execute_batch(&format!("PRAGMA user_version = {SCHEMA_VERSION};"))?;
            tx.commit()?;
            debug!(
                "event=db_schema module=db status=ok action=create version={}",
                SCHEMA_VERSION
            );
            Ok(())
        }
        newer => Err(DbError::UnsupportedSchemaVersion {
            db_version: newer,
            supported: SCHEMA_VERSION,
        }),
    }
}
