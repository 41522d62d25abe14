// src/pipeline/crawl.rs

//! Crawl orchestration.
//!
//! Terms run strictly one after another. Within a term, up to K department
//! jobs (request, then parse) are in flight at once, where K is also the
//! parse pool size. Jobs complete in any order; each result is written into
//! the slot reserved for its department index, so the assembled term always
//! lists departments in discovery order. The first error of any kind aborts
//! the whole crawl.

use std::fmt;
use std::sync::Arc;

use futures::stream::{self, StreamExt};

use crate::error::{AppError, Result};
use crate::models::{CatalogSnapshot, DepartmentResult, TermResult, TermSpec, WorkUnit};
use crate::pipeline::workers::ParsePool;
use crate::services::{CourseParser, Transport};

/// Lifecycle of a single term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermPhase {
    Idle,
    Dispatching,
    Collecting,
    Complete,
    Failed,
}

impl fmt::Display for TermPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TermPhase::Idle => "idle",
            TermPhase::Dispatching => "dispatching",
            TermPhase::Collecting => "collecting",
            TermPhase::Complete => "complete",
            TermPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Result slots of one term, reserved by department index.
struct TermSlots {
    term: TermSpec,
    phase: TermPhase,
    slots: Vec<Option<DepartmentResult>>,
    filled: usize,
}

impl TermSlots {
    fn new(term: TermSpec, departments: usize) -> Self {
        Self {
            term,
            phase: TermPhase::Idle,
            slots: (0..departments).map(|_| None).collect(),
            filled: 0,
        }
    }

    fn enter(&mut self, phase: TermPhase) {
        if self.phase != phase {
            log::debug!("Term {}: {} -> {}", self.term.code, self.phase, phase);
            self.phase = phase;
        }
    }

    /// Assign a slot. Each slot is written exactly once.
    fn fill(&mut self, index: usize, result: DepartmentResult) -> Result<()> {
        let slot = self.slots.get_mut(index).ok_or_else(|| {
            AppError::validation(format!(
                "term {}: department index {index} out of range",
                self.term.code
            ))
        })?;
        if slot.is_some() {
            return Err(AppError::validation(format!(
                "term {}: department slot {index} filled twice",
                self.term.code
            )));
        }
        *slot = Some(result);
        self.filled += 1;
        Ok(())
    }

    fn is_complete(&self) -> bool {
        self.filled == self.slots.len()
    }

    fn into_result(mut self) -> Result<TermResult> {
        if !self.is_complete() {
            self.enter(TermPhase::Failed);
            return Err(AppError::validation(format!(
                "term {}: {} of {} departments collected",
                self.term.code,
                self.filled,
                self.slots.len()
            )));
        }
        self.enter(TermPhase::Complete);
        Ok(TermResult {
            term: self.term,
            departments: self.slots.into_iter().flatten().collect(),
        })
    }
}

/// Drives every work unit through request, parse and assembly.
pub struct Orchestrator {
    transport: Arc<dyn Transport>,
    parser: Arc<dyn CourseParser>,
    concurrency: usize,
}

impl Orchestrator {
    /// `concurrency` is both the parse pool size and the per-term in-flight cap.
    pub fn new(
        transport: Arc<dyn Transport>,
        parser: Arc<dyn CourseParser>,
        concurrency: usize,
    ) -> Self {
        Self {
            transport,
            parser,
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Crawl every unit in order and assemble the snapshot.
    ///
    /// The parse pool lives for exactly this call. On error it is dropped
    /// without draining; jobs already running finish on their own.
    pub async fn run(&self, units: &[WorkUnit]) -> Result<CatalogSnapshot> {
        let pool = ParsePool::new(Arc::clone(&self.parser), self.concurrency);
        let mut terms = Vec::with_capacity(units.len());

        for unit in units {
            let term = self.run_term(&pool, unit).await?;
            log::info!(
                "Term {} complete: {} departments",
                term.term.code,
                term.departments.len()
            );
            terms.push(term);
        }

        pool.shutdown().await;
        Ok(CatalogSnapshot::new(terms))
    }

    async fn run_term(&self, pool: &ParsePool, unit: &WorkUnit) -> Result<TermResult> {
        let mut slots = TermSlots::new(unit.term.clone(), unit.len());
        slots.enter(TermPhase::Dispatching);

        let mut jobs = stream::iter(unit.departments.iter().enumerate())
            .map(|(index, department)| self.run_department(pool, &unit.term, index, department))
            .buffer_unordered(self.concurrency);

        while let Some(outcome) = jobs.next().await {
            let (index, result) = match outcome {
                Ok(done) => done,
                Err(e) => {
                    slots.enter(TermPhase::Failed);
                    return Err(e);
                }
            };
            slots.enter(TermPhase::Collecting);
            slots.fill(index, result)?;
        }

        slots.into_result()
    }

    async fn run_department(
        &self,
        pool: &ParsePool,
        term: &TermSpec,
        index: usize,
        department: &str,
    ) -> Result<(usize, DepartmentResult)> {
        log::debug!("Iterating on {department} ({})", term.code);

        let body = self
            .transport
            .fetch_department(term, department)
            .await
            .map_err(|e| match e {
                AppError::Transport { .. } => e,
                other => AppError::transport(&term.code, department, other),
            })?;

        let courses = pool.submit(department.to_string(), body).await?.wait().await?;

        Ok((
            index,
            DepartmentResult {
                department: department.to_string(),
                courses,
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashSet;
    use std::sync::atomic::Ordering;

    use crate::models::CourseRecord;
    use crate::pipeline::fakes::{FakeParser, FakeTransport, JobGauge};
    use crate::pipeline::terms::expand_terms;

    fn terms(codes: &[&str]) -> Vec<TermSpec> {
        codes
            .iter()
            .map(|code| TermSpec::new(*code, format!("{code}-label")))
            .collect()
    }

    fn departments(count: usize) -> Vec<String> {
        (0..count).map(|i| format!("D{i:02}")).collect()
    }

    fn orchestrator(transport: &Arc<FakeTransport>, k: usize) -> Orchestrator {
        Orchestrator::new(transport.clone(), Arc::new(FakeParser::default()), k)
    }

    #[tokio::test]
    async fn test_order_survives_any_completion_order() {
        let depts = departments(8);
        let units = expand_terms(&terms(&["2024-Fall", "2025-Winter"]), &depts);

        for seed in 0..6 {
            let transport = Arc::new(FakeTransport::new(seed));
            let snapshot = orchestrator(&transport, 8).run(&units).await.unwrap();

            for term in &snapshot.terms {
                let order: Vec<_> = term.departments.iter().map(|d| d.department.clone()).collect();
                assert_eq!(order, depts, "seed {seed}");
                for dept in &term.departments {
                    assert_eq!(
                        dept.courses[0].title,
                        format!("{}|{}", term.term.code, dept.department)
                    );
                }
            }
        }
    }

    #[tokio::test]
    async fn test_dispatches_each_pair_exactly_once() {
        let term_specs = terms(&["T1", "T2", "T3"]);
        let depts = departments(5);
        let units = expand_terms(&term_specs, &depts);
        let transport = Arc::new(FakeTransport::new(3));

        orchestrator(&transport, 2).run(&units).await.unwrap();

        let calls = transport.calls();
        assert_eq!(calls.len(), 15);
        let unique: HashSet<_> = calls.iter().cloned().collect();
        assert_eq!(unique.len(), 15);

        // Terms never overlap: calls are grouped by term in configuration order.
        let term_order: Vec<_> = calls.iter().map(|(term, _)| term.as_str()).collect();
        let mut expected = Vec::new();
        for spec in &term_specs {
            expected.extend(std::iter::repeat_n(spec.code.as_str(), depts.len()));
        }
        assert_eq!(term_order, expected);
    }

    #[tokio::test]
    async fn test_transport_failure_stops_before_next_term() {
        let units = expand_terms(&terms(&["T1", "T2"]), &departments(6));
        let transport = Arc::new(FakeTransport::new(1).fail_on("T1", "D03"));

        let err = orchestrator(&transport, 2).run(&units).await.unwrap_err();

        match err {
            AppError::Transport {
                term, department, ..
            } => {
                assert_eq!(term, "T1");
                assert_eq!(department, "D03");
            }
            other => panic!("expected transport error, got {other:?}"),
        }
        assert!(transport.calls().iter().all(|(term, _)| term == "T1"));
    }

    #[tokio::test]
    async fn test_parse_failure_aborts_run() {
        let units = expand_terms(&terms(&["T1", "T2"]), &departments(4));
        let transport = Arc::new(FakeTransport::new(0));
        let orchestrator = Orchestrator::new(
            transport.clone(),
            Arc::new(FakeParser::failing_on("D01")),
            2,
        );

        let err = orchestrator.run(&units).await.unwrap_err();

        assert!(matches!(err, AppError::Parse { ref department, .. } if department == "D01"));
        assert!(transport.calls().iter().all(|(term, _)| term == "T1"));
    }

    #[tokio::test]
    async fn test_in_flight_never_exceeds_k() {
        let units = expand_terms(&terms(&["T1", "T2"]), &departments(12));

        for k in [1, 2, 3, 8] {
            let transport = Arc::new(FakeTransport::new(k as u64));
            orchestrator(&transport, k).run(&units).await.unwrap();

            let peak = transport.peak.load(Ordering::SeqCst);
            assert!(peak >= 1);
            assert!(peak <= k, "k={k} peak={peak}");
        }
    }

    #[tokio::test]
    async fn test_outstanding_jobs_never_exceed_k() {
        let units = expand_terms(&terms(&["T1", "T2"]), &departments(12));

        for k in [1, 2, 3, 8] {
            let jobs = Arc::new(JobGauge::default());
            let transport = Arc::new(FakeTransport::new(k as u64).with_jobs(jobs.clone()));
            let parser = Arc::new(FakeParser::with_jobs(jobs.clone()));

            Orchestrator::new(transport, parser, k).run(&units).await.unwrap();

            // A job stays open from its request until its parse returns.
            assert_eq!(jobs.active(), 0, "k={k}");
            assert!(jobs.peak() >= 1);
            assert!(jobs.peak() <= k, "k={k} peak={}", jobs.peak());
        }
    }

    #[tokio::test]
    async fn test_two_terms_two_departments() {
        let term_specs = vec![
            TermSpec::new("2024-Fall", "2024-Fall-label"),
            TermSpec::new("2024-Winter", "2024-Winter-label"),
        ];
        let depts = vec!["CS".to_string(), "MATH".to_string()];
        let units = expand_terms(&term_specs, &depts);
        let transport = Arc::new(FakeTransport::new(7));

        let snapshot = orchestrator(&transport, 4).run(&units).await.unwrap();

        assert_eq!(snapshot.terms.len(), 2);
        for (term, spec) in snapshot.terms.iter().zip(&term_specs) {
            assert_eq!(&term.term, spec);
            let order: Vec<_> = term.departments.iter().map(|d| d.department.as_str()).collect();
            assert_eq!(order, ["CS", "MATH"]);
            for dept in &term.departments {
                assert_eq!(
                    dept.courses,
                    vec![CourseRecord::new(
                        dept.department.clone(),
                        "1",
                        format!("{}|{}", spec.code, dept.department)
                    )]
                );
            }
        }
    }

    #[tokio::test]
    async fn test_no_units_yields_empty_snapshot() {
        let transport = Arc::new(FakeTransport::new(0));
        let snapshot = orchestrator(&transport, 2).run(&[]).await.unwrap();
        assert!(snapshot.terms.is_empty());
        assert!(transport.calls().is_empty());
    }

    #[test]
    fn test_slots_reject_double_fill() {
        let mut slots = TermSlots::new(TermSpec::new("T", "L"), 2);
        let result = || DepartmentResult {
            department: "CS".into(),
            courses: vec![],
        };
        slots.fill(1, result()).unwrap();
        assert!(slots.fill(1, result()).is_err());
        assert!(slots.fill(5, result()).is_err());
        assert!(!slots.is_complete());
        assert!(slots.into_result().is_err());
    }

    #[test]
    fn test_slots_assemble_by_index() {
        let mut slots = TermSlots::new(TermSpec::new("T", "L"), 2);
        for (index, name) in [(1, "MATH"), (0, "CS")] {
            slots
                .fill(
                    index,
                    DepartmentResult {
                        department: name.into(),
                        courses: vec![],
                    },
                )
                .unwrap();
        }
        let term = slots.into_result().unwrap();
        let order: Vec<_> = term.departments.iter().map(|d| d.department.as_str()).collect();
        assert_eq!(order, ["CS", "MATH"]);
    }
}
