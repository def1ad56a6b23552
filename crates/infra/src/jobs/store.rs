//! Job store implementations.
//!
//! `PostgresJobStore` is the production queue: the row-level lock taken
//! during claim is the only concurrency-correctness mechanism in the system,
//! so workers may run as independent processes. `InMemoryJobStore` backs
//! dev and tests with the same semantics behind a mutex.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Row};
use uuid::Uuid;

use billscribe_core::InvoiceId;

use super::types::{Job, JobId, JobKind, JobState};

/// Job store error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum JobStoreError {
    #[error("job not found: {0}")]
    NotFound(JobId),

    #[error("job {id} is {state:?}; {op} requires {required:?}")]
    InvalidState {
        id: JobId,
        state: JobState,
        op: &'static str,
        required: JobState,
    },

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<sqlx::Error> for JobStoreError {
    fn from(e: sqlx::Error) -> Self {
        JobStoreError::Storage(e.to_string())
    }
}

/// Queue client abstraction.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a pending job. A job with the same (kind, dedup_key) already
    /// existing makes this a silent no-op; the caller cannot tell the two
    /// outcomes apart.
    async fn enqueue(&self, job: Job) -> Result<(), JobStoreError>;

    /// Claim the oldest pending job, transitioning it to `processing` and
    /// bumping its attempt counter. Returns `Ok(None)` when the pending set
    /// is empty. At most one caller can claim a given job.
    async fn claim_next(&self) -> Result<Option<Job>, JobStoreError>;

    /// Transition to `completed`. Unconditional and idempotent.
    async fn complete(&self, job_id: JobId) -> Result<(), JobStoreError>;

    /// Transition to `failed`, recording the message. Unconditional.
    async fn fail(&self, job_id: JobId, message: &str) -> Result<(), JobStoreError>;

    /// Explicitly re-enqueue a failed job: the same row returns to
    /// `pending` with its error cleared, so the dedup key never blocks a
    /// deliberate retry. Errors unless the job is currently `failed`.
    async fn retry(&self, job_id: JobId) -> Result<Job, JobStoreError>;

    /// Snapshot lookup.
    async fn get(&self, job_id: JobId) -> Result<Option<Job>, JobStoreError>;
}

// ---------------------------------------------------------------------------
// In-memory store (dev/tests)
// ---------------------------------------------------------------------------

/// In-memory job store with queue semantics matching the Postgres store.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: Mutex<HashMap<JobId, Job>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn enqueue(&self, job: Job) -> Result<(), JobStoreError> {
        let mut jobs = self.jobs.lock().unwrap();
        let duplicate = jobs
            .values()
            .any(|j| j.kind == job.kind && j.dedup_key == job.dedup_key);
        if !duplicate {
            jobs.insert(job.id, job);
        }
        Ok(())
    }

    async fn claim_next(&self) -> Result<Option<Job>, JobStoreError> {
        let mut jobs = self.jobs.lock().unwrap();

        let next = jobs
            .values()
            .filter(|j| j.state == JobState::Pending)
            .min_by_key(|j| (j.created_at, j.id.as_uuid()))
            .map(|j| j.id);

        let Some(id) = next else {
            return Ok(None);
        };

        let job = jobs.get_mut(&id).ok_or(JobStoreError::NotFound(id))?;
        job.state = JobState::Processing;
        job.attempts += 1;
        job.updated_at = Utc::now();
        Ok(Some(job.clone()))
    }

    async fn complete(&self, job_id: JobId) -> Result<(), JobStoreError> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs
            .get_mut(&job_id)
            .ok_or(JobStoreError::NotFound(job_id))?;
        job.state = JobState::Completed;
        job.updated_at = Utc::now();
        Ok(())
    }

    async fn fail(&self, job_id: JobId, message: &str) -> Result<(), JobStoreError> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs
            .get_mut(&job_id)
            .ok_or(JobStoreError::NotFound(job_id))?;
        job.state = JobState::Failed;
        job.last_error = Some(message.to_string());
        job.updated_at = Utc::now();
        Ok(())
    }

    async fn retry(&self, job_id: JobId) -> Result<Job, JobStoreError> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs
            .get_mut(&job_id)
            .ok_or(JobStoreError::NotFound(job_id))?;
        if job.state != JobState::Failed {
            return Err(JobStoreError::InvalidState {
                id: job_id,
                state: job.state,
                op: "retry",
                required: JobState::Failed,
            });
        }
        job.state = JobState::Pending;
        job.last_error = None;
        job.updated_at = Utc::now();
        Ok(job.clone())
    }

    async fn get(&self, job_id: JobId) -> Result<Option<Job>, JobStoreError> {
        Ok(self.jobs.lock().unwrap().get(&job_id).cloned())
    }
}

// ---------------------------------------------------------------------------
// Postgres store
// ---------------------------------------------------------------------------

#[derive(Debug, FromRow)]
struct JobRow {
    id: Uuid,
    kind: String,
    invoice_id: Uuid,
    payload: serde_json::Value,
    state: String,
    attempts: i32,
    dedup_key: String,
    last_error: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<JobRow> for Job {
    type Error = JobStoreError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        Ok(Job {
            id: JobId::from_uuid(row.id),
            kind: JobKind::from_str(&row.kind).map_err(JobStoreError::Storage)?,
            invoice_id: InvoiceId::from_uuid(row.invoice_id),
            payload: row.payload,
            state: JobState::from_str(&row.state).map_err(JobStoreError::Storage)?,
            attempts: row.attempts,
            dedup_key: row.dedup_key,
            last_error: row.last_error,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Postgres-backed job store.
#[derive(Debug, Clone)]
pub struct PostgresJobStore {
    pool: PgPool,
}

impl PostgresJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for PostgresJobStore {
    async fn enqueue(&self, job: Job) -> Result<(), JobStoreError> {
        sqlx::query(
            r#"
            INSERT INTO jobs (id, kind, invoice_id, payload, state, attempts, dedup_key,
                              last_error, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (kind, dedup_key) DO NOTHING
            "#,
        )
        .bind(job.id.as_uuid())
        .bind(job.kind.as_str())
        .bind(job.invoice_id.as_uuid())
        .bind(&job.payload)
        .bind(job.state.as_str())
        .bind(job.attempts)
        .bind(&job.dedup_key)
        .bind(&job.last_error)
        .bind(job.created_at)
        .bind(job.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn claim_next(&self) -> Result<Option<Job>, JobStoreError> {
        let mut tx = self.pool.begin().await?;

        // SKIP LOCKED lets concurrent pollers pass over rows another claimant
        // holds instead of queuing on the lock.
        let row = sqlx::query(
            "SELECT id, kind, invoice_id, payload, state, attempts, dedup_key, last_error, created_at, updated_at \
             FROM jobs \
             WHERE state = 'pending' \
             ORDER BY created_at ASC \
             LIMIT 1 \
             FOR UPDATE SKIP LOCKED",
        )
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.commit().await?;
            return Ok(None);
        };

        let job_row = JobRow::from_row(&row).map_err(|e| JobStoreError::Storage(e.to_string()))?;
        let mut job = Job::try_from(job_row)?;

        let updated = sqlx::query(
            "UPDATE jobs SET state = 'processing', attempts = attempts + 1, updated_at = now() \
             WHERE id = $1 \
             RETURNING attempts, updated_at",
        )
        .bind(job.id.as_uuid())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        job.state = JobState::Processing;
        job.attempts = updated.get("attempts");
        job.updated_at = updated.get("updated_at");
        Ok(Some(job))
    }

    async fn complete(&self, job_id: JobId) -> Result<(), JobStoreError> {
        let result =
            sqlx::query("UPDATE jobs SET state = 'completed', updated_at = now() WHERE id = $1")
                .bind(job_id.as_uuid())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(JobStoreError::NotFound(job_id));
        }
        Ok(())
    }

    async fn fail(&self, job_id: JobId, message: &str) -> Result<(), JobStoreError> {
        let result = sqlx::query(
            "UPDATE jobs SET state = 'failed', last_error = $2, updated_at = now() WHERE id = $1",
        )
        .bind(job_id.as_uuid())
        .bind(message)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(JobStoreError::NotFound(job_id));
        }
        Ok(())
    }

    async fn retry(&self, job_id: JobId) -> Result<Job, JobStoreError> {
        let row = sqlx::query(
            "UPDATE jobs SET state = 'pending', last_error = NULL, updated_at = now() \
             WHERE id = $1 AND state = 'failed' \
             RETURNING id, kind, invoice_id, payload, state, attempts, dedup_key, last_error, created_at, updated_at",
        )
        .bind(job_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let job_row =
                    JobRow::from_row(&row).map_err(|e| JobStoreError::Storage(e.to_string()))?;
                Job::try_from(job_row)
            }
            None => match self.get(job_id).await? {
                Some(job) => Err(JobStoreError::InvalidState {
                    id: job_id,
                    state: job.state,
                    op: "retry",
                    required: JobState::Failed,
                }),
                None => Err(JobStoreError::NotFound(job_id)),
            },
        }
    }

    async fn get(&self, job_id: JobId) -> Result<Option<Job>, JobStoreError> {
        let row = sqlx::query(
            "SELECT id, kind, invoice_id, payload, state, attempts, dedup_key, last_error, created_at, updated_at \
             FROM jobs WHERE id = $1",
        )
            .bind(job_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let job_row =
                    JobRow::from_row(&row).map_err(|e| JobStoreError::Storage(e.to_string()))?;
                Ok(Some(Job::try_from(job_row)?))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn test_job(dedup_key: &str) -> Job {
        Job::new(
            JobKind::TranscribeAndExtract,
            InvoiceId::new(),
            dedup_key,
            serde_json::json!({}),
        )
    }

    #[tokio::test]
    async fn enqueue_same_dedup_key_twice_keeps_one_job() {
        let store = InMemoryJobStore::new();

        store.enqueue(test_job("audio-1.wav")).await.unwrap();
        store.enqueue(test_job("audio-1.wav")).await.unwrap();

        assert!(store.claim_next().await.unwrap().is_some());
        assert!(store.claim_next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn claim_is_fifo_and_bumps_attempts() {
        let store = InMemoryJobStore::new();
        let first = test_job("a");
        let second = test_job("b");
        let first_id = first.id;
        let second_id = second.id;

        store.enqueue(first).await.unwrap();
        store.enqueue(second).await.unwrap();

        let claimed = store.claim_next().await.unwrap().unwrap();
        assert_eq!(claimed.id, first_id);
        assert_eq!(claimed.state, JobState::Processing);
        assert_eq!(claimed.attempts, 1);

        let claimed = store.claim_next().await.unwrap().unwrap();
        assert_eq!(claimed.id, second_id);
    }

    #[tokio::test]
    async fn concurrent_claimers_never_share_a_job() {
        let store = Arc::new(InMemoryJobStore::new());
        store.enqueue(test_job("only")).await.unwrap();

        let a = {
            let store = store.clone();
            tokio::spawn(async move { store.claim_next().await.unwrap() })
        };
        let b = {
            let store = store.clone();
            tokio::spawn(async move { store.claim_next().await.unwrap() })
        };

        let (a, b) = (a.await.unwrap(), b.await.unwrap());
        assert!(a.is_some() ^ b.is_some());
    }

    #[tokio::test]
    async fn state_never_regresses_to_pending() {
        let store = InMemoryJobStore::new();
        let job = test_job("x");
        let id = job.id;
        store.enqueue(job).await.unwrap();

        store.claim_next().await.unwrap().unwrap();
        store.complete(id).await.unwrap();

        // Completed jobs are invisible to claim and cannot be retried.
        assert!(store.claim_next().await.unwrap().is_none());
        assert!(matches!(
            store.retry(id).await,
            Err(JobStoreError::InvalidState { .. })
        ));
        assert_eq!(store.get(id).await.unwrap().unwrap().state, JobState::Completed);
    }

    #[tokio::test]
    async fn complete_is_idempotent() {
        let store = InMemoryJobStore::new();
        let job = test_job("x");
        let id = job.id;
        store.enqueue(job).await.unwrap();
        store.claim_next().await.unwrap();

        store.complete(id).await.unwrap();
        store.complete(id).await.unwrap();
        assert_eq!(store.get(id).await.unwrap().unwrap().state, JobState::Completed);
    }

    #[tokio::test]
    async fn fail_records_message_and_stays_terminal() {
        let store = InMemoryJobStore::new();
        let job = test_job("x");
        let id = job.id;
        store.enqueue(job).await.unwrap();
        store.claim_next().await.unwrap();

        store.fail(id, "transcription timed out").await.unwrap();

        let job = store.get(id).await.unwrap().unwrap();
        assert_eq!(job.state, JobState::Failed);
        assert_eq!(job.last_error.as_deref(), Some("transcription timed out"));
        assert!(store.claim_next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn retry_requeues_a_failed_job_without_a_duplicate_row() {
        let store = InMemoryJobStore::new();
        let job = test_job("x");
        let id = job.id;
        store.enqueue(job).await.unwrap();
        store.claim_next().await.unwrap();
        store.fail(id, "boom").await.unwrap();

        let retried = store.retry(id).await.unwrap();
        assert_eq!(retried.id, id);
        assert_eq!(retried.state, JobState::Pending);
        assert!(retried.last_error.is_none());

        let claimed = store.claim_next().await.unwrap().unwrap();
        assert_eq!(claimed.id, id);
        assert_eq!(claimed.attempts, 2);
    }

    #[tokio::test]
    async fn retry_of_missing_job_is_not_found() {
        let store = InMemoryJobStore::new();
        assert!(matches!(
            store.retry(JobId::new()).await,
            Err(JobStoreError::NotFound(_))
        ));
    }
}
