// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use reqwest::Client;

use crate::error::Result;
use crate::models::CrawlerConfig;

/// Create a configured asynchronous HTTP client.
pub fn create_client(config: &CrawlerConfig) -> Result<Client> {
    let client = Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

/// GET a page and return its body. Non-2xx responses are errors.
pub async fn get_text(client: &Client, url: &str) -> Result<String> {
    let text = client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;
    Ok(text)
}

/// POST an url-encoded form and return the response body.
pub async fn post_form_text(
    client: &Client,
    url: &str,
    form: &[(String, String)],
) -> Result<String> {
    let text = client
        .post(url)
        .form(form)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;
    Ok(text)
}
