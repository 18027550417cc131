//! Listing-page item extraction.
//!
//! # Responsibility
//! - Turn one listing markup snapshot into deduplicated [`RawItem`]s.
//! - Fill gaps in card data by visiting the item page through a
//!   [`RenderSession`] auxiliary view.
//!
//! # Invariants
//! - Parse misses never raise; unresolved fields stay empty.
//! - Fallback failures are isolated to the item that triggered them.
//!
//! [`RawItem`]: crate::model::item::RawItem
//! [`RenderSession`]: crate::render::RenderSession

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod dom;
mod extractor;
pub mod rules;
pub mod title;
pub mod urls;

pub use extractor::{filter_by_category, DetailPageData, ItemExtractor};
pub use rules::ExtractionRules;
pub use title::clean_title;
pub use urls::normalize_url;

pub type ExtractResult<T> = Result<T, ExtractError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    /// A configured CSS selector failed to parse.
    InvalidSelector { selector: String, message: String },
    /// The site origin is not an absolute URL.
    InvalidOrigin(String),
}

impl Display for ExtractError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidSelector { selector, message } => {
                write!(f, "invalid selector `{selector}`: {message}")
            }
            Self::InvalidOrigin(value) => write!(f, "site origin must be absolute: `{value}`"),
        }
    }
}

impl Error for ExtractError {}
