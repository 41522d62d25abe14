// src/pipeline/workers.rs

//! Bounded parse worker pool.
//!
//! A fixed number of workers pull `(department, body)` jobs from one FIFO
//! queue. Each worker handles a single job at a time and runs the parser on
//! the blocking thread pool, so a slow or panicking parse never stalls the
//! async request loop. Results come back through a per-job handle.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinSet;

use crate::error::{AppError, Result};
use crate::models::CourseRecord;
use crate::services::CourseParser;

type Reply = oneshot::Sender<Result<Vec<CourseRecord>>>;

/// A queued parse request.
struct Job {
    department: String,
    body: String,
    reply: Reply,
}

/// Completion handle for a submitted job.
pub struct ParseHandle {
    department: String,
    reply: oneshot::Receiver<Result<Vec<CourseRecord>>>,
}

impl ParseHandle {
    /// Wait for the worker's reply.
    pub async fn wait(self) -> Result<Vec<CourseRecord>> {
        self.reply
            .await
            .map_err(|_| AppError::parse(&self.department, "parse worker dropped the job"))?
    }
}

/// Fixed-size pool of parse workers.
pub struct ParsePool {
    queue: mpsc::Sender<Job>,
    workers: JoinSet<()>,
    size: usize,
}

impl ParsePool {
    /// Start `size` workers (at least one) sharing `parser`.
    pub fn new(parser: Arc<dyn CourseParser>, size: usize) -> Self {
        let size = size.max(1);
        let (queue, jobs) = mpsc::channel::<Job>(size);
        let jobs = Arc::new(Mutex::new(jobs));

        let mut workers = JoinSet::new();
        for id in 0..size {
            workers.spawn(worker_loop(id, Arc::clone(&jobs), Arc::clone(&parser)));
        }
        log::debug!("Started parse pool with {size} workers");

        Self {
            queue,
            workers,
            size,
        }
    }

    /// Number of workers.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Queue a job. Waits for queue space when every worker is busy.
    pub async fn submit(&self, department: String, body: String) -> Result<ParseHandle> {
        let (reply, receiver) = oneshot::channel();
        let job = Job {
            department: department.clone(),
            body,
            reply,
        };
        self.queue
            .send(job)
            .await
            .map_err(|_| AppError::parse(&department, "parse pool is shut down"))?;

        Ok(ParseHandle {
            department,
            reply: receiver,
        })
    }

    /// Submit a job and wait for its result.
    pub async fn parse(&self, department: String, body: String) -> Result<Vec<CourseRecord>> {
        self.submit(department, body).await?.wait().await
    }

    /// Close the queue and wait for every worker to finish its current job.
    pub async fn shutdown(self) {
        let Self {
            queue, mut workers, ..
        } = self;
        drop(queue);

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                log::warn!("Parse worker exited abnormally: {e}");
            }
        }
        log::debug!("Parse pool shut down");
    }
}

async fn worker_loop(
    id: usize,
    jobs: Arc<Mutex<mpsc::Receiver<Job>>>,
    parser: Arc<dyn CourseParser>,
) {
    loop {
        // Lock only while waiting for the next job; the mutex hands jobs out in arrival order.
        let next = jobs.lock().await.recv().await;
        let Some(Job {
            department,
            body,
            reply,
        }) = next
        else {
            break;
        };

        log::debug!("Worker {id} parsing {department}");
        let outcome = tokio::task::spawn_blocking({
            let parser = Arc::clone(&parser);
            let department = department.clone();
            move || parser.parse(&department, &body)
        })
        .await;

        let result = match outcome {
            Ok(result) => result,
            Err(e) if e.is_panic() => Err(AppError::parse(&department, "parse worker panicked")),
            Err(e) => Err(AppError::parse(&department, e)),
        };

        // The requester may already be gone if the run aborted.
        let _ = reply.send(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Echoes the body back as a single course; panics on "BOOM".
    struct EchoParser {
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    impl EchoParser {
        fn new() -> Self {
            Self {
                active: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }
    }

    impl CourseParser for EchoParser {
        fn parse(&self, department: &str, body: &str) -> Result<Vec<CourseRecord>> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(5));
            self.active.fetch_sub(1, Ordering::SeqCst);

            if department == "BOOM" {
                panic!("pathological body");
            }
            if body.is_empty() {
                return Err(AppError::parse(department, "empty body"));
            }
            Ok(vec![CourseRecord::new(department, "1", body)])
        }
    }

    #[tokio::test]
    async fn test_parse_returns_records() {
        let pool = ParsePool::new(Arc::new(EchoParser::new()), 2);
        let courses = pool.parse("CS".into(), "algorithms".into()).await.unwrap();
        assert_eq!(courses, vec![CourseRecord::new("CS", "1", "algorithms")]);
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_parse_error_is_returned() {
        let pool = ParsePool::new(Arc::new(EchoParser::new()), 1);
        let err = pool.parse("CS".into(), String::new()).await.unwrap_err();
        assert!(matches!(err, AppError::Parse { .. }));
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let pool = ParsePool::new(Arc::new(EchoParser::new()), 1);

        let err = pool.parse("BOOM".into(), "x".into()).await.unwrap_err();
        assert!(
            matches!(err, AppError::Parse { ref department, ref cause } if department == "BOOM" && cause.contains("panicked"))
        );

        // The single worker survives and keeps serving jobs.
        let courses = pool.parse("MATH".into(), "calculus".into()).await.unwrap();
        assert_eq!(courses.len(), 1);
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_workers_bound_parallelism() {
        let parser = Arc::new(EchoParser::new());
        let pool = ParsePool::new(parser.clone(), 2);
        assert_eq!(pool.size(), 2);

        let mut handles = Vec::new();
        for i in 0..8 {
            handles.push(pool.submit(format!("D{i}"), "body".into()).await.unwrap());
        }
        for handle in handles {
            handle.wait().await.unwrap();
        }

        assert!(parser.peak.load(Ordering::SeqCst) <= 2);
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_zero_size_pool_still_has_a_worker() {
        let pool = ParsePool::new(Arc::new(EchoParser::new()), 0);
        assert_eq!(pool.size(), 1);
        assert!(pool.parse("CS".into(), "x".into()).await.is_ok());
        pool.shutdown().await;
    }
}
