//! Item, working-set record and ledger entry models.
//!
//! # Invariants
//! - `permalink` is the natural key; uniqueness is enforced by the stores,
//!   not by these types.
//! - `RawItem` values are never mutated after extraction; a later pass
//!   produces a new value for the same permalink.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Category assigned when neither the card nor the item page yields one.
pub const UNKNOWN_CATEGORY: &str = "Unknown";

/// One discovered content entry from a listing pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawItem {
    pub category: String,
    pub title: String,
    /// Absolute URL, or empty when no image could be resolved.
    pub cover_image_url: String,
    pub permalink: String,
}

/// Persisted working-set row: a raw item plus derived annotation fields.
///
/// Column order here is the CSV column order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WorkingSetRecord {
    pub category: String,
    pub title: String,
    pub cover_image_url: String,
    pub permalink: String,
    /// Older working-set files may lack this column.
    #[serde(default)]
    pub annotation_text: String,
    #[serde(default)]
    pub annotation_timestamp: String,
}

impl WorkingSetRecord {
    /// Returns whether the record carries a non-blank annotation.
    pub fn has_annotation(&self) -> bool {
        !is_blank(&self.annotation_text)
    }

    /// Overwrites fields with the non-blank fields of `incoming`.
    ///
    /// Blank incoming fields leave the current value untouched, so a partial
    /// record can refresh scraped columns without clearing annotations.
    pub fn merge_from(&mut self, incoming: &WorkingSetRecord) {
        overwrite_if_present(&mut self.category, &incoming.category);
        overwrite_if_present(&mut self.title, &incoming.title);
        overwrite_if_present(&mut self.cover_image_url, &incoming.cover_image_url);
        overwrite_if_present(&mut self.permalink, &incoming.permalink);
        overwrite_if_present(&mut self.annotation_text, &incoming.annotation_text);
        overwrite_if_present(
            &mut self.annotation_timestamp,
            &incoming.annotation_timestamp,
        );
    }
}

impl From<RawItem> for WorkingSetRecord {
    fn from(item: RawItem) -> Self {
        Self {
            category: item.category,
            title: item.title,
            cover_image_url: item.cover_image_url,
            permalink: item.permalink,
            annotation_text: String::new(),
            annotation_timestamp: String::new(),
        }
    }
}

/// Derived working-set counters; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WorkingSetStats {
    pub total: usize,
    pub with_annotation: usize,
    pub without_annotation: usize,
    pub by_category: BTreeMap<String, usize>,
}

/// One row of the completion ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub id: i64,
    pub permalink: String,
    /// SQLite `CURRENT_TIMESTAMP` text (`YYYY-MM-DD HH:MM:SS`, UTC).
    pub completed_at: String,
    pub created_at: String,
}

/// Ledger counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LedgerStats {
    pub total_completed: u64,
    pub completed_today: u64,
}

/// Returns whether text is empty after trimming.
pub fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

fn overwrite_if_present(target: &mut String, incoming: &str) {
    if !is_blank(incoming) {
        *target = incoming.to_string();
    }
}
