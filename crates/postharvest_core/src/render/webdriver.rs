//! WebDriver-backed render session.
//!
//! Drives a WebDriver endpoint (chromedriver or a Selenium grid) with
//! `fantoccini` on a private current-thread runtime so every call blocks.

use super::{RenderError, RenderResult, RenderSession};
use fantoccini::wd::WindowHandle;
use fantoccini::{Client, ClientBuilder, Locator};
use log::{debug, info, warn};
use serde_json::{json, Map, Value};
use std::time::Duration;
use tokio::runtime::Runtime;

const SCROLL_TO_END_SCRIPT: &str = "window.scrollTo(0, document.body.scrollHeight);";

/// Connection and pacing settings for [`WebDriverSession`].
#[derive(Debug, Clone)]
pub struct WebDriverSettings {
    pub webdriver_url: String,
    pub headless: bool,
    pub user_agent: String,
    /// Pause after opening an auxiliary view, before reading its markup.
    pub page_load_delay: Duration,
}

pub struct WebDriverSession {
    runtime: Runtime,
    client: Option<Client>,
    main_window: WindowHandle,
    page_load_delay: Duration,
}

impl WebDriverSession {
    /// Connects to the WebDriver endpoint and opens a browser session.
    pub fn connect(settings: &WebDriverSettings) -> RenderResult<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|err| RenderError::Startup(format!("tokio runtime: {err}")))?;

        let capabilities = chrome_capabilities(settings);
        let client = runtime
            .block_on(
                ClientBuilder::native()
                    .capabilities(capabilities)
                    .connect(&settings.webdriver_url),
            )
            .map_err(|err| {
                RenderError::Startup(format!(
                    "connect to {} failed: {err}",
                    settings.webdriver_url
                ))
            })?;

        let main_window = runtime
            .block_on(client.window())
            .map_err(|err| RenderError::Startup(format!("main window handle: {err}")))?;

        info!(
            "event=render_start module=render status=ok webdriver_url={} headless={}",
            settings.webdriver_url, settings.headless
        );

        Ok(Self {
            runtime,
            client: Some(client),
            main_window,
            page_load_delay: settings.page_load_delay,
        })
    }

    fn client(&self) -> RenderResult<&Client> {
        self.client.as_ref().ok_or(RenderError::Closed)
    }

    fn try_open_auxiliary(&self, url: &str) -> RenderResult<()> {
        let client = self.client()?;
        let opened = self
            .runtime
            .block_on(client.new_window(true))
            .map_err(|err| RenderError::Command(format!("new tab: {err}")))?;
        self.runtime
            .block_on(client.switch_to_window(opened.handle))
            .map_err(|err| RenderError::Command(format!("switch to tab: {err}")))?;

        if let Err(err) = self.runtime.block_on(client.goto(url)) {
            self.return_to_main_window(true);
            return Err(RenderError::Command(format!("goto {url}: {err}")));
        }
        std::thread::sleep(self.page_load_delay);
        Ok(())
    }

    fn return_to_main_window(&self, close_current: bool) {
        let Some(client) = self.client.as_ref() else {
            return;
        };
        if close_current {
            if let Err(err) = self.runtime.block_on(client.close_window()) {
                warn!(
                    "event=render_close_view module=render status=error error={}",
                    err
                );
            }
        }
        if let Err(err) = self
            .runtime
            .block_on(client.switch_to_window(self.main_window.clone()))
        {
            warn!(
                "event=render_switch_main module=render status=error error={}",
                err
            );
        }
    }
}

impl RenderSession for WebDriverSession {
    fn navigate(&mut self, url: &str) -> RenderResult<()> {
        let client = self.client()?;
        self.runtime
            .block_on(client.goto(url))
            .map_err(|err| RenderError::Command(format!("goto {url}: {err}")))?;
        debug!("event=render_navigate module=render status=ok url={}", url);
        Ok(())
    }

    fn current_markup(&mut self) -> RenderResult<String> {
        let client = self.client()?;
        self.runtime
            .block_on(client.source())
            .map_err(|err| RenderError::Command(format!("page source: {err}")))
    }

    fn scroll_to_end(&mut self, settle_delay: Duration) -> RenderResult<()> {
        let client = self.client()?;
        self.runtime
            .block_on(client.execute(SCROLL_TO_END_SCRIPT, Vec::new()))
            .map_err(|err| RenderError::Command(format!("scroll: {err}")))?;
        std::thread::sleep(settle_delay);
        debug!("event=render_scroll module=render status=ok");
        Ok(())
    }

    fn wait_for_selector(&mut self, selector: &str, timeout: Duration) -> bool {
        let Ok(client) = self.client() else {
            return false;
        };
        let found = self.runtime.block_on(
            client
                .wait()
                .at_most(timeout)
                .for_element(Locator::Css(selector)),
        );
        match found {
            Ok(_) => true,
            Err(err) => {
                warn!(
                    "event=render_wait module=render status=timeout selector={} error={}",
                    selector, err
                );
                false
            }
        }
    }

    fn open_auxiliary_view(&mut self, url: &str) -> bool {
        match self.try_open_auxiliary(url) {
            Ok(()) => true,
            Err(err) => {
                warn!(
                    "event=render_open_view module=render status=error url={} error={}",
                    url, err
                );
                false
            }
        }
    }

    fn close_auxiliary_view(&mut self) {
        self.return_to_main_window(true);
    }

    fn shutdown(&mut self) {
        let Some(client) = self.client.take() else {
            return;
        };
        match self.runtime.block_on(client.close()) {
            Ok(()) => info!("event=render_stop module=render status=ok"),
            Err(err) => warn!("event=render_stop module=render status=error error={}", err),
        }
    }
}

impl Drop for WebDriverSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn chrome_capabilities(settings: &WebDriverSettings) -> Map<String, Value> {
    let mut args = vec![
        "--no-sandbox".to_string(),
        "--disable-gpu".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--disable-blink-features=AutomationControlled".to_string(),
        format!("--user-agent={}", settings.user_agent),
    ];
    if settings.headless {
        args.push("--headless=new".to_string());
    }

    let mut capabilities = Map::new();
    capabilities.insert("browserName".to_string(), json!("chrome"));
    capabilities.insert(
        "goog:chromeOptions".to_string(),
        json!({
            "args": args,
            "excludeSwitches": ["enable-automation"],
        }),
    );
    capabilities
}

#[cfg(test)]
mod tests {
    use super::{chrome_capabilities, WebDriverSettings};
    use std::time::Duration;

    #[test]
    fn capabilities_include_headless_flag_only_when_requested() {
        let mut settings = WebDriverSettings {
            webdriver_url: "http://localhost:9515".to_string(),
            headless: true,
            user_agent: "postharvest-test".to_string(),
            page_load_delay: Duration::from_millis(0),
        };

        let headless = chrome_capabilities(&settings);
        let args = headless["goog:chromeOptions"]["args"].to_string();
        assert!(args.contains("--headless=new"));
        assert!(args.contains("--user-agent=postharvest-test"));

        settings.headless = false;
        let headed = chrome_capabilities(&settings);
        assert!(!headed["goog:chromeOptions"]["args"]
            .to_string()
            .contains("--headless"));
    }
}
