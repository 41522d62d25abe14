//! In-memory transport, parser and sink used by pipeline tests.

use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::models::{CatalogSnapshot, CourseRecord, CrawlStats, TermSpec};
use crate::services::{CourseParser, Transport};
use crate::storage::SnapshotSink;

/// Counts department jobs from the start of their request to the end of their parse.
#[derive(Default)]
pub(crate) struct JobGauge {
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl JobGauge {
    fn begin(&self) {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn end(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// Serves a department select for `departments` and a `"{term}|{dept}"` body per request.
pub(crate) struct FakeTransport {
    seed: u64,
    departments: Vec<String>,
    fail_on: Option<(String, String)>,
    calls: Mutex<Vec<(String, String)>>,
    in_flight: AtomicUsize,
    pub peak: AtomicUsize,
    jobs: Option<Arc<JobGauge>>,
}

impl FakeTransport {
    /// `seed` shuffles per-department latency, and with it completion order.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            departments: Vec::new(),
            fail_on: None,
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            jobs: None,
        }
    }

    /// Open a job on `gauge` for every department request.
    pub fn with_jobs(mut self, gauge: Arc<JobGauge>) -> Self {
        self.jobs = Some(gauge);
        self
    }

    pub fn with_departments(mut self, departments: &[&str]) -> Self {
        self.departments = departments.iter().map(|d| d.to_string()).collect();
        self
    }

    pub fn fail_on(mut self, term: &str, department: &str) -> Self {
        self.fail_on = Some((term.to_string(), department.to_string()));
        self
    }

    /// `(term code, department)` in dispatch order.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    fn latency(&self, department: &str) -> Duration {
        let weight: u64 = department.bytes().map(u64::from).sum();
        Duration::from_millis((weight * 31 + self.seed * 17) % 9)
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn fetch_main(&self) -> Result<String> {
        let options: String = self
            .departments
            .iter()
            .map(|d| format!(r#"<option value="{d}">{d}</option>"#))
            .collect();
        Ok(format!(
            r#"<html><body><select name="Dept"><option value=" ALL">All</option>{options}</select></body></html>"#
        ))
    }

    async fn fetch_department(&self, term: &TermSpec, department: &str) -> Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push((term.code.clone(), department.to_string()));
        if let Some(jobs) = &self.jobs {
            jobs.begin();
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.latency(department)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some((fail_term, fail_dept)) = &self.fail_on {
            if *fail_term == term.code && fail_dept == department {
                return Err(AppError::transport(&term.code, department, "connection reset"));
            }
        }
        Ok(format!("{}|{}", term.code, department))
    }
}

/// Returns one course per body: `(department, "1", body)`.
#[derive(Default)]
pub(crate) struct FakeParser {
    fail_on: Option<String>,
    jobs: Option<Arc<JobGauge>>,
}

impl FakeParser {
    pub fn failing_on(department: &str) -> Self {
        Self {
            fail_on: Some(department.to_string()),
            jobs: None,
        }
    }

    /// Parse slowly and close a job on `gauge` once each parse is done.
    pub fn with_jobs(gauge: Arc<JobGauge>) -> Self {
        Self {
            fail_on: None,
            jobs: Some(gauge),
        }
    }
}

impl CourseParser for FakeParser {
    fn parse(&self, department: &str, body: &str) -> Result<Vec<CourseRecord>> {
        if let Some(jobs) = &self.jobs {
            std::thread::sleep(Duration::from_millis(3));
            jobs.end();
        }
        if self.fail_on.as_deref() == Some(department) {
            return Err(AppError::parse(department, "unexpected markup"));
        }
        Ok(vec![CourseRecord::new(department, "1", body)])
    }
}

/// Records the canonical JSON of every snapshot it receives.
#[derive(Default)]
pub(crate) struct RecordingSink {
    writes: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl SnapshotSink for RecordingSink {
    async fn write_file(&self, snapshot: &CatalogSnapshot) -> Result<String> {
        self.writes.lock().unwrap().push(snapshot.to_json()?);
        Ok("memory".to_string())
    }

    async fn insert_store(&self, _snapshot: &CatalogSnapshot, _stats: &CrawlStats) -> Result<i64> {
        Ok(1)
    }
}
