//! Completion ledger contracts and SQLite implementation.
//!
//! # Responsibility
//! - Record, exactly once, that a permalink has been fully annotated.
//! - Answer "already completed?" independently of the mutable working set.
//!
//! # Invariants
//! - `permalink` uniqueness is enforced by the schema (`UNIQUE`), and writes
//!   use insert-if-absent semantics.
//! - Entries are never updated or deleted by this module.
//! - Permalinks are compared after trimming surrounding whitespace.
//! - No connection outlives a single call.

use crate::db::{open_db, DbError};
use crate::model::item::{LedgerEntry, LedgerStats};
use log::{debug, info};
use rusqlite::{params, Connection};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Ledger persistence error.
#[derive(Debug)]
pub enum LedgerError {
    Db(DbError),
    InvalidPermalink(String),
}

impl Display for LedgerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidPermalink(value) => write!(f, "invalid permalink `{value}`"),
        }
    }
}

impl Error for LedgerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::InvalidPermalink(_) => None,
        }
    }
}

impl From<DbError> for LedgerError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for LedgerError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Repository interface for the append-only completion ledger.
pub trait CompletionLedger {
    fn is_completed(&self, permalink: &str) -> LedgerResult<bool>;
    /// Returns `true` only when this call inserted the entry.
    fn mark_completed(&self, permalink: &str) -> LedgerResult<bool>;
    fn completed_permalinks(&self) -> LedgerResult<HashSet<String>>;
    fn statistics(&self) -> LedgerResult<LedgerStats>;

    /// Filters out completed permalinks, keeping input order.
    fn unprocessed(&self, permalinks: &[String]) -> LedgerResult<Vec<String>> {
        let completed = self.completed_permalinks()?;
        let pending: Vec<String> = permalinks
            .iter()
            .filter(|permalink| !completed.contains(ledger_key(permalink)))
            .cloned()
            .collect();

        info!(
            "event=ledger_filter module=ledger status=ok input={} pending={} completed={}",
            permalinks.len(),
            pending.len(),
            permalinks.len() - pending.len()
        );
        Ok(pending)
    }
}

/// SQLite-backed ledger that opens a connection per operation.
#[derive(Debug, Clone)]
pub struct SqliteCompletionLedger {
    db_path: PathBuf,
}

impl SqliteCompletionLedger {
    /// Creates the ledger and applies the schema once, so a broken path
    /// fails at startup instead of mid-run.
    pub fn open(db_path: impl AsRef<Path>) -> LedgerResult<Self> {
        let ledger = Self {
            db_path: db_path.as_ref().to_path_buf(),
        };
        drop(ledger.connect()?);
        info!(
            "event=ledger_open module=ledger status=ok path={}",
            ledger.db_path.display()
        );
        Ok(ledger)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Completion counts grouped by UTC day, newest day first.
    pub fn completions_by_day(&self) -> LedgerResult<Vec<(String, u64)>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT DATE(completed_at) AS day, COUNT(*) AS total
             FROM processed
             GROUP BY DATE(completed_at)
             ORDER BY day DESC;",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut days = Vec::new();
        for row in rows {
            let (day, total) = row?;
            days.push((day, non_negative(total)));
        }
        Ok(days)
    }

    /// Most recent entries, newest first.
    pub fn recent(&self, limit: u32) -> LedgerResult<Vec<LedgerEntry>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT id, permalink, completed_at, created_at
             FROM processed
             ORDER BY completed_at DESC, id DESC
             LIMIT ?1;",
        )?;
        let rows = stmt.query_map([i64::from(limit)], |row| {
            Ok(LedgerEntry {
                id: row.get(0)?,
                permalink: row.get(1)?,
                completed_at: row.get(2)?,
                created_at: row.get(3)?,
            })
        })?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    /// `CREATE` statements stored in `sqlite_master`, tables before indexes.
    pub fn schema(&self) -> LedgerResult<Vec<String>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT sql FROM sqlite_master
             WHERE sql IS NOT NULL AND type IN ('table', 'index')
             ORDER BY CASE type WHEN 'table' THEN 0 ELSE 1 END, name;",
        )?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut statements = Vec::new();
        for row in rows {
            statements.push(row?);
        }
        Ok(statements)
    }

    fn connect(&self) -> LedgerResult<Connection> {
        Ok(open_db(&self.db_path)?)
    }
}

impl CompletionLedger for SqliteCompletionLedger {
    fn is_completed(&self, permalink: &str) -> LedgerResult<bool> {
        let permalink = ledger_key(permalink);
        if permalink.is_empty() {
            return Ok(false);
        }
        let conn = self.connect()?;
        let exists: i64 = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM processed WHERE permalink = ?1 LIMIT 1);",
            [permalink],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn mark_completed(&self, permalink: &str) -> LedgerResult<bool> {
        let permalink = ledger_key(permalink);
        if permalink.is_empty() {
            return Err(LedgerError::InvalidPermalink(permalink.to_string()));
        }

        let conn = self.connect()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO processed (permalink) VALUES (?1);",
            params![permalink],
        )?;

        if inserted > 0 {
            debug!(
                "event=ledger_mark module=ledger status=ok permalink={}",
                permalink
            );
        } else {
            debug!(
                "event=ledger_mark module=ledger status=skip reason=already_completed permalink={}",
                permalink
            );
        }
        Ok(inserted > 0)
    }

    fn completed_permalinks(&self) -> LedgerResult<HashSet<String>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT permalink FROM processed;")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut permalinks = HashSet::new();
        for row in rows {
            permalinks.insert(row?);
        }
        debug!(
            "event=ledger_load module=ledger status=ok count={}",
            permalinks.len()
        );
        Ok(permalinks)
    }

    fn statistics(&self) -> LedgerResult<LedgerStats> {
        let conn = self.connect()?;
        let total: i64 = conn.query_row("SELECT COUNT(*) FROM processed;", [], |row| row.get(0))?;
        let today: i64 = conn.query_row(
            "SELECT COUNT(*) FROM processed WHERE DATE(completed_at) = DATE('now');",
            [],
            |row| row.get(0),
        )?;

        Ok(LedgerStats {
            total_completed: non_negative(total),
            completed_today: non_negative(today),
        })
    }
}

/// Stored form of a permalink.
fn ledger_key(permalink: &str) -> &str {
    permalink.trim()
}

fn non_negative(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}
