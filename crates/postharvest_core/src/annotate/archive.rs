//! JSON archive of every accepted annotation.
//!
//! The file holds one array; entries are only ever appended.

use super::AnnotateResult;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveEntry {
    pub title: String,
    pub permalink: String,
    pub annotated_at: String,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct AnnotationArchive {
    path: PathBuf,
}

impl AnnotationArchive {
    /// Opens the archive at `path`, writing an empty array if it is missing.
    pub fn open(path: impl AsRef<Path>) -> AnnotateResult<Self> {
        let archive = Self {
            path: path.as_ref().to_path_buf(),
        };
        if !archive.path.exists() {
            archive.write_all(&[])?;
            info!(
                "event=archive_create module=annotate status=ok path={}",
                archive.path.display()
            );
        }
        Ok(archive)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> AnnotateResult<Vec<ArchiveEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let raw = std::fs::read_to_string(&self.path)?;
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        let entries: Vec<ArchiveEntry> = serde_json::from_str(&raw)?;
        debug!(
            "event=archive_load module=annotate status=ok entries={}",
            entries.len()
        );
        Ok(entries)
    }

    pub fn append(&self, entry: ArchiveEntry) -> AnnotateResult<()> {
        let mut entries = self.load()?;
        entries.push(entry);
        self.write_all(&entries)
    }

    pub fn annotated_permalinks(&self) -> AnnotateResult<HashSet<String>> {
        Ok(self
            .load()?
            .into_iter()
            .map(|entry| entry.permalink)
            .filter(|permalink| !permalink.trim().is_empty())
            .collect())
    }

    fn write_all(&self, entries: &[ArchiveEntry]) -> AnnotateResult<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let mut staged = NamedTempFile::new_in(&dir)?;
        serde_json::to_writer_pretty(&mut staged, entries)?;
        staged.write_all(b"\n")?;
        staged.as_file().sync_all()?;
        staged
            .persist(&self.path)
            .map_err(|err| err.error)?;
        Ok(())
    }
}
