// src/models/mod.rs

//! Domain models for the catalog crawler.
//!
//! - `config`: application configuration loaded from TOML
//! - `term`: configured terms and the per-term work units
//! - `course`: parsed course records (opaque to the orchestrator)
//! - `snapshot`: the nested result document handed to the sink

mod config;
mod course;
mod snapshot;
mod term;

// Re-export all public types
pub use config::{Config, ConfigSource, CrawlerConfig, FormConfig, LoggingConfig, OutputConfig};
pub use course::{CourseRecord, Section};
pub use snapshot::{CatalogSnapshot, CrawlStats, DepartmentResult, TermResult};
pub use term::{TermSpec, WorkUnit};
