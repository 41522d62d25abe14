// src/pipeline/pipeline.rs

//! Pipeline entry points.
//!
//! - `run_pipeline`: discover → expand → crawl → persist
//! - `run_replay`: load a previously written snapshot → persist

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;

use crate::error::Result;
use crate::models::{CatalogSnapshot, Config, CrawlStats};
use crate::pipeline::crawl::Orchestrator;
use crate::pipeline::terms::expand_terms;
use crate::services::{CourseParser, Transport, discover_departments};
use crate::storage::SnapshotSink;
use crate::utils::log;

/// Run a live crawl and hand the assembled snapshot to `sink`.
///
/// Nothing reaches the sink unless every term completed.
pub async fn run_pipeline(
    config: &Config,
    transport: Arc<dyn Transport>,
    parser: Arc<dyn CourseParser>,
    sink: &dyn SnapshotSink,
) -> Result<CrawlStats> {
    let start_time = Utc::now();
    log::header("Catalog crawl starting");

    log::step(1, 4, "Discover - Fetching department list");
    let main_page = transport.fetch_main().await?;
    let departments = discover_departments(&main_page)?;
    ::log::info!("Found {} departments", departments.len());

    log::step(2, 4, "Expand - Pairing terms with departments");
    let units = expand_terms(&config.terms, &departments);
    for unit in &units {
        log::sub_item(&format!(
            "{} ({}): {} departments",
            unit.term.code,
            unit.term.label,
            unit.len()
        ));
    }

    let concurrency = config.crawler.concurrency();
    log::step(
        3,
        4,
        &format!("Crawl - Requesting and parsing with {concurrency} workers"),
    );
    let orchestrator = Orchestrator::new(transport, parser, concurrency);
    let snapshot = orchestrator.run(&units).await?;

    log::step(4, 4, "Persist - Writing snapshot");
    let stats = CrawlStats::from_snapshot(&snapshot, start_time);
    persist(&snapshot, &stats, sink).await?;

    Ok(stats)
}

/// Persist a snapshot document produced by an earlier run, skipping the crawl.
pub async fn run_replay(path: &Path, sink: &dyn SnapshotSink) -> Result<CrawlStats> {
    let start_time = Utc::now();
    log::header("Snapshot replay");

    let content = tokio::fs::read_to_string(path).await?;
    let snapshot = CatalogSnapshot::from_json(&content)?;
    ::log::info!(
        "Loaded {} terms from {}",
        snapshot.term_count(),
        path.display()
    );

    let stats = CrawlStats::from_snapshot(&snapshot, start_time);
    persist(&snapshot, &stats, sink).await?;

    Ok(stats)
}

async fn persist(
    snapshot: &CatalogSnapshot,
    stats: &CrawlStats,
    sink: &dyn SnapshotSink,
) -> Result<()> {
    let metadata = sink.write(snapshot, stats).await?;

    log::summary(
        "Catalog snapshot",
        &[
            ("Terms", stats.term_count.to_string()),
            ("Departments", stats.department_count.to_string()),
            ("Courses", stats.course_count.to_string()),
            ("Elapsed", format!("{:.1}s", stats.elapsed_secs())),
            ("File", metadata.location),
            ("Run", metadata.run_id.to_string()),
            ("Written", metadata.timestamp.to_rfc3339()),
            ("Digest", snapshot.digest()?),
        ],
    );
    Ok(())
}
