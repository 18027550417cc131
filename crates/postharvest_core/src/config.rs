//! Application configuration.
//!
//! # Responsibility
//! - Load one [`AppConfig`] at process start from a TOML file plus
//!   environment overrides.
//! - Hand components explicit settings instead of global state.
//!
//! # Invariants
//! - A loaded config has passed [`AppConfig::validate`].
//! - Every field has a default, so a missing or partial file still loads.

use crate::render::WebDriverSettings;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Default configuration file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "postharvest.toml";
/// Prefix for environment overrides, e.g. `POSTHARVEST__SITE__ORIGIN`.
pub const ENV_PREFIX: &str = "POSTHARVEST";
/// Conventional variable consulted when `annotation.api_key` is unset.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug)]
pub enum ConfigError {
    Load(config::ConfigError),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Load(err) => write!(f, "failed to load configuration: {err}"),
            Self::Invalid(message) => write!(f, "invalid configuration: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Load(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<config::ConfigError> for ConfigError {
    fn from(value: config::ConfigError) -> Self {
        Self::Load(value)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub site: SiteConfig,
    pub render: RenderConfig,
    pub files: FilesConfig,
    pub annotation: AnnotationConfig,
    pub delivery: DeliveryConfig,
    pub logging: LoggingConfig,
    pub schedule: ScheduleConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Absolute origin used to resolve relative links.
    pub origin: String,
    /// The single listing surface the pipeline scrapes.
    pub listing_url: String,
    pub item_path_marker: String,
    /// Case-insensitive category allow-list; empty keeps every item.
    pub target_categories: Vec<String>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            origin: "https://www.databricks.com".to_string(),
            listing_url: "https://www.databricks.com/blog/category/product".to_string(),
            item_path_marker: "/blog/".to_string(),
            target_categories: vec!["product".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub webdriver_url: String,
    pub headless: bool,
    pub user_agent: String,
    /// Selector awaited after navigating to the listing surface.
    pub listing_ready_selector: String,
    pub wait_timeout_secs: u64,
    pub scroll_delay_ms: u64,
    pub page_load_delay_ms: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".to_string(),
            headless: true,
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36".to_string(),
            listing_ready_selector: "main, .blog-archive, .category-results-wrapper".to_string(),
            wait_timeout_secs: 30,
            scroll_delay_ms: 2_000,
            page_load_delay_ms: 2_000,
        }
    }
}

impl RenderConfig {
    pub fn scroll_delay(&self) -> Duration {
        Duration::from_millis(self.scroll_delay_ms)
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }

    pub fn webdriver_settings(&self) -> WebDriverSettings {
        WebDriverSettings {
            webdriver_url: self.webdriver_url.clone(),
            headless: self.headless,
            user_agent: self.user_agent.clone(),
            page_load_delay: Duration::from_millis(self.page_load_delay_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FilesConfig {
    pub working_set_path: PathBuf,
    pub ledger_path: PathBuf,
    pub archive_path: PathBuf,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            working_set_path: PathBuf::from("data/posts.csv"),
            ledger_path: PathBuf::from("database/processed.sqlite3"),
            archive_path: PathBuf::from("data/annotations.json"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AnnotationConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    /// Upper bound on annotation length, in characters.
    pub max_chars: usize,
    pub timeout_secs: u64,
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            max_chars: 1_500,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    pub webhook_url_production: String,
    pub webhook_url_test: String,
    pub use_production: bool,
    pub timeout_secs: u64,
    pub include_images: bool,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            webhook_url_production: String::new(),
            webhook_url_test: String::new(),
            use_production: false,
            timeout_secs: 30,
            include_images: true,
        }
    }
}

impl DeliveryConfig {
    /// Webhook selected by `use_production`.
    pub fn webhook_url(&self) -> &str {
        if self.use_production {
            &self.webhook_url_production
        } else {
            &self.webhook_url_test
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Relative paths resolve against the working directory.
    pub dir: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: crate::logging::default_log_level().to_string(),
            dir: PathBuf::from("logs"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub enabled: bool,
    /// Five-field cron expression: minute hour day month weekday.
    pub cron: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cron: "0 8 * * 1".to_string(),
        }
    }
}

impl AppConfig {
    /// Loads `path` (optional file) overlaid with `POSTHARVEST__*` variables.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let settings = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("site.target_categories"),
            )
            .build()?;

        let mut loaded: AppConfig = settings.try_deserialize()?;
        if loaded.annotation.api_key.trim().is_empty() {
            if let Ok(key) = std::env::var(API_KEY_ENV) {
                loaded.annotation.api_key = key;
            }
        }
        loaded.validate()?;
        Ok(loaded)
    }

    /// Rejects settings no run could succeed with.
    pub fn validate(&self) -> ConfigResult<()> {
        require_absolute_url("site.origin", &self.site.origin)?;
        require_absolute_url("site.listing_url", &self.site.listing_url)?;
        if self.site.item_path_marker.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "site.item_path_marker must not be empty".to_string(),
            ));
        }
        if self.annotation.max_chars == 0 {
            return Err(ConfigError::Invalid(
                "annotation.max_chars must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn require_absolute_url(field: &str, value: &str) -> ConfigResult<()> {
    match Url::parse(value.trim()) {
        Ok(url) if url.has_host() => Ok(()),
        _ => Err(ConfigError::Invalid(format!(
            "{field} must be an absolute URL, got `{value}`"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::{AppConfig, ConfigError};
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        AppConfig::default()
            .validate()
            .expect("default config should validate");
    }

    #[test]
    fn load_merges_partial_file_over_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("postharvest.toml");
        let mut file = std::fs::File::create(&path).expect("create config");
        writeln!(
            file,
            "[site]\norigin = \"https://example.com\"\nlisting_url = \"https://example.com/blog\"\ntarget_categories = []\n\n[delivery]\nuse_production = true\nwebhook_url_production = \"https://hooks.example.com/prod\""
        )
        .expect("write config");

        let config = AppConfig::load(&path).expect("config should load");

        assert_eq!(config.site.origin, "https://example.com");
        assert!(config.site.target_categories.is_empty());
        assert_eq!(config.site.item_path_marker, "/blog/");
        assert_eq!(config.delivery.webhook_url(), "https://hooks.example.com/prod");
        assert_eq!(config.annotation.max_chars, 1_500);
    }

    #[test]
    fn relative_origin_is_rejected() {
        let mut config = AppConfig::default();
        config.site.origin = "/blog".to_string();

        let err = config.validate().expect_err("relative origin must fail");
        assert!(matches!(err, ConfigError::Invalid(message) if message.contains("site.origin")));
    }
}
