//! The assembled catalog document.
//!
//! A `CatalogSnapshot` is only ever built whole: the orchestrator assembles
//! it after every term completes, replay mode deserializes it from a file.
//! `to_json` is the one canonical serialization, used both for the output
//! file and for the digest, so a replayed snapshot reproduces the live
//! bytes exactly.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::models::{CourseRecord, TermSpec};

/// The courses of one department for one term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartmentResult {
    pub department: String,
    pub courses: Vec<CourseRecord>,
}

/// All departments of one term, in discovery order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermResult {
    pub term: TermSpec,
    pub departments: Vec<DepartmentResult>,
}

/// Complete result of a crawl across all configured terms.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    pub terms: Vec<TermResult>,
}

impl CatalogSnapshot {
    pub fn new(terms: Vec<TermResult>) -> Self {
        Self { terms }
    }

    /// Parse a previously written snapshot document.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a snapshot document from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Canonical compact JSON serialization.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Hex SHA-256 of the canonical serialization.
    pub fn digest(&self) -> Result<String> {
        let json = self.to_json()?;
        Ok(hex::encode(Sha256::digest(json.as_bytes())))
    }

    pub fn term_count(&self) -> usize {
        self.terms.len()
    }

    /// Department entries summed over all terms.
    pub fn department_count(&self) -> usize {
        self.terms.iter().map(|t| t.departments.len()).sum()
    }

    /// Course records summed over all terms and departments.
    pub fn course_count(&self) -> usize {
        self.terms
            .iter()
            .flat_map(|t| &t.departments)
            .map(|d| d.courses.len())
            .sum()
    }
}

/// Statistics of a finished crawl.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlStats {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub term_count: usize,
    pub department_count: usize,
    pub course_count: usize,
}

impl CrawlStats {
    /// Summarize a snapshot assembled between `start_time` and now.
    pub fn from_snapshot(snapshot: &CatalogSnapshot, start_time: DateTime<Utc>) -> Self {
        Self {
            start_time,
            end_time: Utc::now(),
            term_count: snapshot.term_count(),
            department_count: snapshot.department_count(),
            course_count: snapshot.course_count(),
        }
    }

    pub fn elapsed_secs(&self) -> f64 {
        (self.end_time - self.start_time)
            .num_milliseconds()
            .max(0) as f64
            / 1000.0
    }
}
