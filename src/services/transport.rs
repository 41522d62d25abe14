// src/services/transport.rs

//! Transport client: one request per call, no retries.

use async_trait::async_trait;
use reqwest::Client;

use crate::error::Result;
use crate::models::{Config, FormConfig, TermSpec};
use crate::utils::http;

/// Fetches raw catalog pages.
///
/// Implementations surface any failure (including timeouts) as an error;
/// the orchestrator attaches the term and department context.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch the main catalog page used for department discovery.
    async fn fetch_main(&self) -> Result<String>;

    /// Fetch the course listing of one department for one term.
    async fn fetch_department(&self, term: &TermSpec, department: &str) -> Result<String>;
}

/// Transport backed by the catalog's HTTP endpoint.
pub struct HttpTransport {
    client: Client,
    base_url: String,
    form: FormConfig,
}

impl HttpTransport {
    pub fn new(client: Client, base_url: impl Into<String>, form: FormConfig) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            form,
        }
    }

    /// Build a transport with a client configured from `config.crawler`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = http::create_client(&config.crawler)?;
        Ok(Self::new(
            client,
            config.crawler.base_url.clone(),
            config.form.clone(),
        ))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch_main(&self) -> Result<String> {
        log::debug!("Requesting main page {}", self.base_url);
        http::get_text(&self.client, &self.base_url).await
    }

    async fn fetch_department(&self, term: &TermSpec, department: &str) -> Result<String> {
        let form = self.form.build(term, department);
        http::post_form_text(&self.client, &self.base_url, &form).await
    }
}
