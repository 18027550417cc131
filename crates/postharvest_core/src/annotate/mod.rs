//! Annotation of working-set records through a text-completion service.
//!
//! # Responsibility
//! - Define the [`Annotator`] seam the pipeline calls per permalink.
//! - Own the rules a generated annotation must satisfy before it is stored.

pub mod archive;
pub mod openai;

use chrono::{DateTime, Local};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub use archive::{AnnotationArchive, ArchiveEntry};
pub use openai::OpenAiAnnotator;

/// Prefix placed before every stored annotation text.
pub const SEPARATOR: &str = "\n--------------------------------------------------\n";
/// Local-time format of `annotation_timestamp`.
pub const TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M";

pub type AnnotateResult<T> = Result<T, AnnotateError>;

#[derive(Debug)]
pub enum AnnotateError {
    Http(reqwest::Error),
    Api { status: u16, body: String },
    EmptyResponse,
    MissingApiKey,
    Rejected(String),
    Io(std::io::Error),
    Json(serde_json::Error),
}

impl Display for AnnotateError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http(err) => write!(f, "completion request failed: {err}"),
            Self::Api { status, body } => {
                write!(f, "completion service returned {status}: {body}")
            }
            Self::EmptyResponse => write!(f, "completion response carried no text"),
            Self::MissingApiKey => write!(f, "annotation api key is not configured"),
            Self::Rejected(reason) => write!(f, "annotation rejected: {reason}"),
            Self::Io(err) => write!(f, "archive io error: {err}"),
            Self::Json(err) => write!(f, "archive json error: {err}"),
        }
    }
}

impl Error for AnnotateError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Http(err) => Some(err),
            Self::Io(err) => Some(err),
            Self::Json(err) => Some(err),
            Self::Api { .. } | Self::EmptyResponse | Self::MissingApiKey | Self::Rejected(_) => {
                None
            }
        }
    }
}

impl From<reqwest::Error> for AnnotateError {
    fn from(value: reqwest::Error) -> Self {
        Self::Http(value)
    }
}

impl From<std::io::Error> for AnnotateError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for AnnotateError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

/// Produces annotation text for one item.
pub trait Annotator {
    fn annotate(&self, permalink: &str) -> AnnotateResult<String>;
}

/// Rejects blank text and text longer than `max_chars` characters.
pub fn validate_annotation(text: &str, max_chars: usize) -> AnnotateResult<()> {
    if text.trim().is_empty() {
        return Err(AnnotateError::Rejected("annotation is blank".to_string()));
    }
    let length = text.chars().count();
    if length > max_chars {
        return Err(AnnotateError::Rejected(format!(
            "annotation has {length} characters, limit is {max_chars}"
        )));
    }
    Ok(())
}

/// Stored form of an accepted annotation.
pub fn decorate(text: &str) -> String {
    format!("{SEPARATOR}{text}")
}

pub fn format_timestamp(at: DateTime<Local>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}
