//! Relational store for snapshots (sqlite via sqlx).

use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tokio::sync::OnceCell;

use crate::error::{AppError, Result};
use crate::models::{CatalogSnapshot, CrawlStats};

/// Connection pool plus the insert/query operations on the catalog schema.
#[derive(Clone)]
pub struct SqlStore {
    pool: SqlitePool,
    schema: Arc<OnceCell<()>>,
}

impl SqlStore {
    /// Prepare a lazy pool for `url`. Nothing is opened, created or migrated
    /// until the first query, so a crawl that fails leaves no database behind.
    pub fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        // A single connection keeps `sqlite::memory:` databases alive and
        // serializes writers, which sqlite does anyway.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_lazy_with(options);
        log::debug!("Store configured for {url}");

        Ok(Self {
            pool,
            schema: Arc::new(OnceCell::new()),
        })
    }

    /// Apply migrations once per store.
    async fn ensure_schema(&self) -> Result<()> {
        self.schema
            .get_or_try_init(|| async {
                sqlx::migrate!("./migrations").run(&self.pool).await?;
                log::debug!("Store schema is up to date");
                Ok::<_, AppError>(())
            })
            .await?;
        Ok(())
    }

    /// Insert a whole snapshot in one transaction. Returns the run id.
    pub async fn insert_snapshot(
        &self,
        snapshot: &CatalogSnapshot,
        stats: &CrawlStats,
    ) -> Result<i64> {
        let digest = snapshot.digest()?;
        self.ensure_schema().await?;
        let mut tx = self.pool.begin().await?;

        let run_id = sqlx::query(
            r#"
            INSERT INTO crawl_runs
            (digest, started_at, finished_at, term_count, department_count, course_count, inserted_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&digest)
        .bind(stats.start_time.to_rfc3339())
        .bind(stats.end_time.to_rfc3339())
        .bind(snapshot.term_count() as i64)
        .bind(snapshot.department_count() as i64)
        .bind(snapshot.course_count() as i64)
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        for (term_pos, term) in snapshot.terms.iter().enumerate() {
            let term_id = sqlx::query(
                "INSERT INTO terms (run_id, position, code, label) VALUES ($1, $2, $3, $4)",
            )
            .bind(run_id)
            .bind(term_pos as i64)
            .bind(&term.term.code)
            .bind(&term.term.label)
            .execute(&mut *tx)
            .await?
            .last_insert_rowid();

            for (dept_pos, dept) in term.departments.iter().enumerate() {
                let department_id = sqlx::query(
                    "INSERT INTO departments (term_id, position, code) VALUES ($1, $2, $3)",
                )
                .bind(term_id)
                .bind(dept_pos as i64)
                .bind(&dept.department)
                .execute(&mut *tx)
                .await?
                .last_insert_rowid();

                for (course_pos, course) in dept.courses.iter().enumerate() {
                    sqlx::query(
                        r#"
                        INSERT INTO courses
                        (department_id, position, prefix, number, title, sections)
                        VALUES ($1, $2, $3, $4, $5, $6)
                        "#,
                    )
                    .bind(department_id)
                    .bind(course_pos as i64)
                    .bind(&course.department)
                    .bind(&course.number)
                    .bind(&course.title)
                    .bind(serde_json::to_string(&course.sections)?)
                    .execute(&mut *tx)
                    .await?;
                }
            }
        }

        tx.commit().await?;
        Ok(run_id)
    }

    /// Department codes of one term of a run, in snapshot order.
    pub async fn department_codes(&self, run_id: i64, term_code: &str) -> Result<Vec<String>> {
        self.ensure_schema().await?;
        let codes = sqlx::query_scalar::<_, String>(
            r#"
            SELECT d.code
            FROM departments d
            JOIN terms t ON t.id = d.term_id
            WHERE t.run_id = $1 AND t.code = $2
            ORDER BY d.position
            "#,
        )
        .bind(run_id)
        .bind(term_code)
        .fetch_all(&self.pool)
        .await?;
        Ok(codes)
    }

    /// Number of course rows stored for a run.
    pub async fn course_count(&self, run_id: i64) -> Result<i64> {
        self.ensure_schema().await?;
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM courses c
            JOIN departments d ON d.id = c.department_id
            JOIN terms t ON t.id = d.term_id
            WHERE t.run_id = $1
            "#,
        )
        .bind(run_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Digest recorded for a run, if the run exists.
    pub async fn run_digest(&self, run_id: i64) -> Result<Option<String>> {
        self.ensure_schema().await?;
        let digest = sqlx::query_scalar::<_, String>("SELECT digest FROM crawl_runs WHERE id = $1")
            .bind(run_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(digest)
    }

    /// Close every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
