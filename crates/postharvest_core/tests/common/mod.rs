#![allow(dead_code)]

use postharvest_core::render::{RenderError, RenderResult, RenderSession};
use std::collections::HashMap;
use std::time::Duration;

/// Scripted render session: a fixed listing page plus item pages by URL.
#[derive(Default)]
pub struct ScriptedSession {
    pub listing: String,
    pub pages: HashMap<String, String>,
    /// Pages that open but whose markup cannot be read.
    pub unreadable: Vec<String>,
    pub fail_navigation: bool,
    pub selector_present: bool,
    pub opened: Vec<String>,
    pub closed: usize,
    pub shutdowns: usize,
    active_page: Option<String>,
}

impl ScriptedSession {
    pub fn new(listing: &str) -> Self {
        Self {
            listing: listing.to_string(),
            selector_present: true,
            ..Self::default()
        }
    }

    pub fn with_page(mut self, url: &str, markup: &str) -> Self {
        self.pages.insert(url.to_string(), markup.to_string());
        self
    }

    pub fn with_unreadable_page(mut self, url: &str) -> Self {
        self.unreadable.push(url.to_string());
        self
    }
}

impl RenderSession for ScriptedSession {
    fn navigate(&mut self, url: &str) -> RenderResult<()> {
        if self.fail_navigation {
            return Err(RenderError::Command(format!("cannot reach {url}")));
        }
        Ok(())
    }

    fn current_markup(&mut self) -> RenderResult<String> {
        match &self.active_page {
            Some(url) if self.unreadable.contains(url) => {
                Err(RenderError::Command(format!("page source unavailable for {url}")))
            }
            Some(url) => self
                .pages
                .get(url)
                .cloned()
                .ok_or_else(|| RenderError::Command(format!("no page for {url}"))),
            None => Ok(self.listing.clone()),
        }
    }

    fn scroll_to_end(&mut self, _settle_delay: Duration) -> RenderResult<()> {
        Ok(())
    }

    fn wait_for_selector(&mut self, _selector: &str, _timeout: Duration) -> bool {
        self.selector_present
    }

    fn open_auxiliary_view(&mut self, url: &str) -> bool {
        self.opened.push(url.to_string());
        if self.pages.contains_key(url) || self.unreadable.iter().any(|page| page == url) {
            self.active_page = Some(url.to_string());
            true
        } else {
            false
        }
    }

    fn close_auxiliary_view(&mut self) {
        self.closed += 1;
        self.active_page = None;
    }

    fn shutdown(&mut self) {
        self.shutdowns += 1;
    }
}

pub fn listing(cards: &str) -> String {
    format!("<html><body><main>{cards}</main></body></html>")
}
