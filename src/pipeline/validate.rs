// src/pipeline/validate.rs

use crate::error::Result;
use crate::models::Config;
use crate::utils::log;

/// Validate the configuration and print what a crawl would use.
pub fn run_validate(config: &Config) -> Result<()> {
    log::header("Validating configuration");

    if let Err(e) = config.validate() {
        ::log::error!("Configuration invalid: {e}");
        return Err(e);
    }

    ::log::info!("✓ Config OK");
    log::sub_item(&format!("Base URL: {}", config.crawler.base_url));
    log::sub_item(&format!("User agent: {}", config.crawler.user_agent));
    log::sub_item(&format!("Timeout: {}s", config.crawler.timeout_secs));
    log::sub_item(&format!("Workers: {}", config.crawler.concurrency()));
    log::sub_item(&format!(
        "Form: {} template params, term field '{}', department field '{}'",
        config.form.params.len(),
        config.form.term_field,
        config.form.department_field
    ));
    for term in &config.terms {
        log::sub_item(&format!("Term {} -> {}", term.code, term.label));
    }
    log::sub_item(&format!("Output file: {}", config.output.file));
    log::sub_item(&format!("Store: {}", config.output.database_url));

    Ok(())
}
