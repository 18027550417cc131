//! CSV-backed working-set store with write-preserving merge.

use crate::model::item::{is_blank, WorkingSetRecord, WorkingSetStats};
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Scraped columns every working-set file must carry.
pub const REQUIRED_COLUMNS: &[&str] = &["category", "title", "cover_image_url", "permalink"];

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    Csv(csv::Error),
    /// The configured path exists but is not a regular file.
    NotAFile(PathBuf),
    NothingToSave,
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "working-set io error: {err}"),
            Self::Csv(err) => write!(f, "working-set format error: {err}"),
            Self::NotAFile(path) => {
                write!(f, "working-set path is not a regular file: {}", path.display())
            }
            Self::NothingToSave => write!(f, "no records to save"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Csv(err) => Some(err),
            Self::NotAFile(_) | Self::NothingToSave => None,
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<csv::Error> for StoreError {
    fn from(value: csv::Error) -> Self {
        Self::Csv(value)
    }
}

/// Working-set table stored as one CSV file with a header row.
#[derive(Debug, Clone)]
pub struct WorkingSetStore {
    path: PathBuf,
}

impl WorkingSetStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads all records. A missing file is an empty working set.
    pub fn load(&self) -> StoreResult<Vec<WorkingSetRecord>> {
        if !self.path.exists() {
            warn!(
                "event=working_set_load module=store status=skip reason=missing path={}",
                self.path.display()
            );
            return Ok(Vec::new());
        }
        if !self.path.is_file() {
            error!(
                "event=working_set_load module=store status=error error_code=not_a_file path={}",
                self.path.display()
            );
            return Err(StoreError::NotAFile(self.path.clone()));
        }

        let mut reader = csv::Reader::from_path(&self.path)?;
        let mut records = Vec::new();
        for row in reader.deserialize::<WorkingSetRecord>() {
            records.push(row?);
        }

        debug!(
            "event=working_set_load module=store status=ok count={}",
            records.len()
        );
        Ok(records)
    }

    /// Saves `records`, preserving persisted annotations for blank incoming
    /// annotation fields, optionally collapsing duplicates (last one wins).
    ///
    /// Returns the number of rows written.
    pub fn save(&self, records: Vec<WorkingSetRecord>, deduplicate: bool) -> StoreResult<usize> {
        if records.is_empty() {
            warn!("event=working_set_save module=store status=skip reason=empty_input");
            return Err(StoreError::NothingToSave);
        }
        if self.path.exists() && !self.path.is_file() {
            return Err(StoreError::NotAFile(self.path.clone()));
        }

        let mut records = records;
        if self.path.is_file() {
            // An unreadable file is never overwritten.
            let prior = self.load().map_err(|err| {
                error!(
                    "event=working_set_preserve module=store status=error error={}",
                    err
                );
                err
            })?;
            preserve_annotations(&mut records, &prior);
        }

        if deduplicate {
            let before = records.len();
            records = keep_last_per_permalink(records);
            let removed = before - records.len();
            if removed > 0 {
                info!(
                    "event=working_set_dedup module=store status=ok removed={}",
                    removed
                );
            }
        }

        self.write_atomically(&records)?;
        info!(
            "event=working_set_save module=store status=ok count={} path={}",
            records.len(),
            self.path.display()
        );
        Ok(records.len())
    }

    /// Merges `records` into the persisted set by permalink, appending new
    /// ones, then saves the combined set.
    pub fn update(&self, records: &[WorkingSetRecord]) -> StoreResult<usize> {
        let mut existing = self.load()?;
        let index: HashMap<String, usize> = existing
            .iter()
            .enumerate()
            .map(|(idx, record)| (record.permalink.clone(), idx))
            .collect();

        let mut updated = 0usize;
        for record in records {
            match index.get(&record.permalink) {
                Some(&idx) => {
                    existing[idx].merge_from(record);
                    updated += 1;
                }
                None => existing.push(record.clone()),
            }
        }

        info!(
            "event=working_set_update module=store status=ok updated={} appended={}",
            updated,
            records.len() - updated
        );
        self.save(existing, true)
    }

    /// Records whose annotation is empty or whitespace-only.
    pub fn records_missing_annotation(&self) -> StoreResult<Vec<WorkingSetRecord>> {
        let records = self.load()?;
        let total = records.len();
        let missing: Vec<WorkingSetRecord> = records
            .into_iter()
            .filter(|record| !record.has_annotation())
            .collect();

        info!(
            "event=working_set_missing module=store status=ok missing={} total={}",
            missing.len(),
            total
        );
        Ok(missing)
    }

    /// Derived counters over the persisted records.
    pub fn statistics(&self) -> StoreResult<WorkingSetStats> {
        let records = self.load()?;
        let mut stats = WorkingSetStats {
            total: records.len(),
            ..WorkingSetStats::default()
        };
        for record in &records {
            if record.has_annotation() {
                stats.with_annotation += 1;
            }
            *stats.by_category.entry(record.category.clone()).or_insert(0) += 1;
        }
        stats.without_annotation = stats.total - stats.with_annotation;
        Ok(stats)
    }

    /// Checks that the file exists and its header carries every required
    /// scraped column. Returns the missing column names.
    pub fn validate_structure(&self) -> StoreResult<Vec<String>> {
        if !self.path.is_file() {
            return Err(StoreError::NotAFile(self.path.clone()));
        }
        let mut reader = csv::Reader::from_path(&self.path)?;
        let headers = reader.headers()?;
        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|column| !headers.iter().any(|header| header == **column))
            .map(|column| column.to_string())
            .collect();

        if missing.is_empty() {
            info!("event=working_set_validate module=store status=ok");
        } else {
            error!(
                "event=working_set_validate module=store status=error missing={}",
                missing.join(",")
            );
        }
        Ok(missing)
    }

    fn write_atomically(&self, records: &[WorkingSetRecord]) -> StoreResult<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let temp = NamedTempFile::new_in(&dir)?;
        let mut writer = csv::Writer::from_writer(temp);
        for record in records {
            writer.serialize(record)?;
        }
        let mut temp = writer
            .into_inner()
            .map_err(|err| StoreError::Io(err.into_error()))?;
        temp.flush()?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path)
            .map_err(|err| StoreError::Io(err.error))?;
        Ok(())
    }
}

/// Copies prior annotation fields into incoming records whose own fields are
/// blank. The first prior row per permalink is authoritative.
fn preserve_annotations(records: &mut [WorkingSetRecord], prior: &[WorkingSetRecord]) {
    let mut prior_by_permalink: HashMap<&str, &WorkingSetRecord> = HashMap::new();
    for record in prior {
        prior_by_permalink
            .entry(record.permalink.as_str())
            .or_insert(record);
    }

    let mut preserved = 0usize;
    for record in records.iter_mut() {
        let Some(previous) = prior_by_permalink.get(record.permalink.as_str()) else {
            continue;
        };
        if is_blank(&record.annotation_text) && !is_blank(&previous.annotation_text) {
            record.annotation_text = previous.annotation_text.clone();
            preserved += 1;
        }
        if is_blank(&record.annotation_timestamp) && !is_blank(&previous.annotation_timestamp) {
            record.annotation_timestamp = previous.annotation_timestamp.clone();
        }
    }

    if preserved > 0 {
        debug!(
            "event=working_set_preserve module=store status=ok preserved={}",
            preserved
        );
    }
}

/// Keeps the last occurrence of each permalink, in the order those last
/// occurrences appear.
fn keep_last_per_permalink(records: Vec<WorkingSetRecord>) -> Vec<WorkingSetRecord> {
    let mut last_index: HashMap<String, usize> = HashMap::new();
    for (idx, record) in records.iter().enumerate() {
        last_index.insert(record.permalink.clone(), idx);
    }

    records
        .into_iter()
        .enumerate()
        .filter(|(idx, record)| last_index.get(&record.permalink) == Some(idx))
        .map(|(_, record)| record)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{keep_last_per_permalink, preserve_annotations};
    use crate::model::item::WorkingSetRecord;

    fn record(permalink: &str, title: &str, annotation: &str) -> WorkingSetRecord {
        WorkingSetRecord {
            category: "Product".to_string(),
            title: title.to_string(),
            cover_image_url: String::new(),
            permalink: permalink.to_string(),
            annotation_text: annotation.to_string(),
            annotation_timestamp: String::new(),
        }
    }

    #[test]
    fn keep_last_per_permalink_keeps_order_of_last_occurrences() {
        let records = vec![
            record("a", "first a", ""),
            record("b", "only b", ""),
            record("a", "second a", ""),
        ];

        let kept = keep_last_per_permalink(records);

        let titles: Vec<&str> = kept.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["only b", "second a"]);
    }

    #[test]
    fn preserve_annotations_uses_first_prior_row_and_skips_filled_incoming() {
        let prior = vec![record("a", "a", "first"), record("a", "a", "second")];
        let mut incoming = vec![record("a", "a", "   "), record("b", "b", "")];

        preserve_annotations(&mut incoming, &prior);

        assert_eq!(incoming[0].annotation_text, "first");
        assert_eq!(incoming[1].annotation_text, "");

        let mut explicit = vec![record("a", "a", "override")];
        preserve_annotations(&mut explicit, &prior);
        assert_eq!(explicit[0].annotation_text, "override");
    }
}
