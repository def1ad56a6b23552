//! Background job queue.
//!
//! A single-table polling queue bridging synchronous HTTP requests to slow,
//! fallible AI processing:
//!
//! - enqueue is an idempotent insert keyed on (kind, dedup_key)
//! - claim takes the oldest pending row under a row lock and moves it to
//!   `processing`, so concurrent pollers never share a job
//! - complete/fail terminate the lifecycle; a failed job stays failed until
//!   an explicit `retry` puts the same row back in the pending set

pub mod store;
pub mod types;

pub use store::{InMemoryJobStore, JobStore, JobStoreError, PostgresJobStore};
pub use types::{Job, JobId, JobKind, JobState};
