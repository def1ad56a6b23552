//! `billscribe-infra` — persistence, object storage, the job queue, the
//! worker loop, and the OpenAI-backed client.
//!
//! Every seam is a trait with a Postgres/S3/OpenAI implementation for
//! production and an in-memory implementation for dev and tests.

pub mod ai;
pub mod db;
pub mod jobs;
pub mod object_store;
pub mod repo;
pub mod workers;

pub use db::{connect_pool, run_migrations};
pub use jobs::{InMemoryJobStore, Job, JobId, JobKind, JobState, JobStore, PostgresJobStore};
pub use ai::{OpenAiClient, OpenAiConfig};
pub use object_store::{InMemoryObjectStore, ObjectStore, ObjectStoreError, S3Config, S3ObjectStore};
pub use repo::{
    InMemoryInvoiceRepo, InMemoryRefreshTokenRepo, InMemoryUserRepo, InvoiceRepo,
    PostgresInvoiceRepo, PostgresRefreshTokenRepo, PostgresUserRepo, RefreshTokenRepo, RepoError,
    UserRepo,
};
pub use workers::{TranscriptionWorker, WorkerConfig, WorkerDeps, WorkerHandle};
