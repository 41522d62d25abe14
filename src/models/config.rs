//! Application configuration structures.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::TermSpec;

/// Where a resolved configuration came from.
#[derive(Debug)]
pub enum ConfigSource {
    File(PathBuf),
    /// The implicit default file could not be loaded.
    Defaults { path: PathBuf, error: AppError },
}

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP and crawling behavior settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Form parameters sent with every department request
    #[serde(default)]
    pub form: FormConfig,

    /// Terms to crawl, in crawl order
    #[serde(default = "defaults::terms")]
    pub terms: Vec<TermSpec>,

    /// Snapshot destinations
    #[serde(default)]
    pub output: OutputConfig,

    /// Log output settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load `explicit` strictly when given. Otherwise try `fallback` and use
    /// the built-in defaults if it cannot be loaded.
    pub fn resolve(explicit: Option<&Path>, fallback: &Path) -> Result<(Self, ConfigSource)> {
        if let Some(path) = explicit {
            return Ok((Self::load(path)?, ConfigSource::File(path.to_path_buf())));
        }
        match Self::load(fallback) {
            Ok(config) => Ok((config, ConfigSource::File(fallback.to_path_buf()))),
            Err(error) => Ok((
                Self::default(),
                ConfigSource::Defaults {
                    path: fallback.to_path_buf(),
                    error,
                },
            )),
        }
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.crawler.max_concurrent == Some(0) {
            return Err(AppError::validation("crawler.max_concurrent must be > 0"));
        }
        Url::parse(&self.crawler.base_url).map_err(|e| {
            AppError::validation(format!(
                "crawler.base_url '{}' is not a valid URL: {e}",
                self.crawler.base_url
            ))
        })?;
        if self.form.term_field.trim().is_empty() {
            return Err(AppError::validation("form.term_field is empty"));
        }
        if self.form.department_field.trim().is_empty() {
            return Err(AppError::validation("form.department_field is empty"));
        }
        if self.terms.is_empty() {
            return Err(AppError::validation("No terms defined"));
        }

        let mut seen = HashSet::new();
        for term in &self.terms {
            if term.code.trim().is_empty() || term.label.trim().is_empty() {
                return Err(AppError::validation(
                    "terms entries need a non-empty code and label",
                ));
            }
            if !seen.insert(term.code.as_str()) {
                return Err(AppError::validation(format!(
                    "Duplicate term code '{}'",
                    term.code
                )));
            }
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            crawler: CrawlerConfig::default(),
            form: FormConfig::default(),
            terms: defaults::terms(),
            output: OutputConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// HTTP client and crawling behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// Catalog endpoint: GET for the main page, POST for department listings
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Parse worker count and in-flight request cap.
    /// Defaults to the host's available parallelism.
    #[serde(default)]
    pub max_concurrent: Option<usize>,
}

impl CrawlerConfig {
    /// Effective concurrency cap (K).
    pub fn concurrency(&self) -> usize {
        self.max_concurrent
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1)
            })
            .max(1)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            max_concurrent: None,
        }
    }
}

/// Form template shared by all department requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormConfig {
    /// Parameter carrying the term label
    #[serde(default = "defaults::term_field")]
    pub term_field: String,

    /// Parameter carrying the department code
    #[serde(default = "defaults::department_field")]
    pub department_field: String,

    /// Fixed parameters sent with every request
    #[serde(default = "defaults::form_params")]
    pub params: BTreeMap<String, String>,
}

impl FormConfig {
    /// Build the url-encoded form for one department request.
    ///
    /// The term and department fields override any template entry of the same name.
    pub fn build(&self, term: &TermSpec, department: &str) -> Vec<(String, String)> {
        let mut form: Vec<(String, String)> = self
            .params
            .iter()
            .filter(|(key, _)| **key != self.term_field && **key != self.department_field)
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        form.push((self.term_field.clone(), term.label.clone()));
        form.push((self.department_field.clone(), department.to_string()));
        form
    }
}

impl Default for FormConfig {
    fn default() -> Self {
        Self {
            term_field: defaults::term_field(),
            department_field: defaults::department_field(),
            params: defaults::form_params(),
        }
    }
}

/// Where the finished snapshot goes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Snapshot JSON file
    #[serde(default = "defaults::output_file")]
    pub file: String,

    /// sqlx connection URL for the relational store
    #[serde(default = "defaults::database_url")]
    pub database_url: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            file: defaults::output_file(),
            database_url: defaults::database_url(),
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log filter when RUST_LOG is unset
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    use std::collections::BTreeMap;

    use super::TermSpec;

    // Crawler defaults
    pub fn base_url() -> String {
        "https://www.reg.uci.edu/perl/WebSoc".into()
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; soc-crawler/0.1)".into()
    }
    pub fn timeout() -> u64 {
        60
    }

    // Form defaults
    pub fn term_field() -> String {
        "YearTerm".into()
    }
    pub fn department_field() -> String {
        "Dept".into()
    }
    pub fn form_params() -> BTreeMap<String, String> {
        [
            ("Submit", "Display Web Results"),
            ("ShowDebug", "0"),
            ("ShowComments", "on"),
            ("ShowFinals", "on"),
            ("Breadth", "ANY"),
            ("CourseNum", ""),
            ("Division", "ANY"),
            ("CourseCodes", ""),
            ("InstrName", ""),
            ("CourseTitle", ""),
            ("ClassType", "ALL"),
            ("Units", ""),
            ("Days", ""),
            ("StartTime", ""),
            ("EndTime", ""),
            ("MaxCap", ""),
            ("FullCourses", "ANY"),
            ("FontSize", "100"),
            ("CancelledCourses", "Exclude"),
            ("Bldg", ""),
            ("Room", ""),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    // Term defaults
    pub fn terms() -> Vec<TermSpec> {
        vec![
            TermSpec::new("2024-Fall", "2024-92"),
            TermSpec::new("2025-Winter", "2025-03"),
        ]
    }

    // Output defaults
    pub fn output_file() -> String {
        "output.json".into()
    }
    pub fn database_url() -> String {
        "sqlite://catalog.db".into()
    }

    pub fn log_level() -> String {
        "info".into()
    }
}
