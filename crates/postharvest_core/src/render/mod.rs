//! Browser capability consumed by the extractor and the scrape stage.
//!
//! # Responsibility
//! - Define the blocking navigation contract the pipeline depends on.
//! - Keep browser-driver details out of extraction logic.
//!
//! # Invariants
//! - One navigable context at a time; an auxiliary view is opened and closed
//!   before the next one is requested.
//! - `open_auxiliary_view` reports failure as `false`, never as an error.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

pub mod webdriver;

pub use webdriver::{WebDriverSession, WebDriverSettings};

pub type RenderResult<T> = Result<T, RenderError>;

#[derive(Debug)]
pub enum RenderError {
    /// Runtime or driver could not be brought up.
    Startup(String),
    /// Navigation or script execution failed.
    Command(String),
    /// The session was already shut down.
    Closed,
}

impl Display for RenderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Startup(message) => write!(f, "render session startup failed: {message}"),
            Self::Command(message) => write!(f, "render command failed: {message}"),
            Self::Closed => write!(f, "render session is closed"),
        }
    }
}

impl Error for RenderError {}

/// Blocking control surface over a rendered page.
pub trait RenderSession {
    fn navigate(&mut self, url: &str) -> RenderResult<()>;
    /// Markup of whichever view is currently active.
    fn current_markup(&mut self) -> RenderResult<String>;
    /// Scrolls to the end of the document, then waits `settle_delay` so
    /// lazy-loaded content can render.
    fn scroll_to_end(&mut self, settle_delay: Duration) -> RenderResult<()>;
    /// Waits until `selector` matches or `timeout` elapses.
    fn wait_for_selector(&mut self, selector: &str, timeout: Duration) -> bool;
    fn open_auxiliary_view(&mut self, url: &str) -> bool;
    fn close_auxiliary_view(&mut self);
    fn shutdown(&mut self);
}
