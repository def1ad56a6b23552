//! Core job types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use billscribe_core::InvoiceId;

/// Unique job identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of deferred work. Closed enum; routing in the worker is an
/// exhaustive match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    TranscribeAndExtract,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::TranscribeAndExtract => "transcribe_and_extract",
        }
    }
}

impl std::str::FromStr for JobKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "transcribe_and_extract" => Ok(JobKind::TranscribeAndExtract),
            other => Err(format!("unknown job kind: {other}")),
        }
    }
}

/// Job lifecycle state.
///
/// Transitions are monotonic: `pending → processing → {completed, failed}`.
/// The only way back into the pending set is the explicit retry operation
/// on a failed job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Processing => "processing",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

impl std::str::FromStr for JobState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobState::Pending),
            "processing" => Ok(JobState::Processing),
            "completed" => Ok(JobState::Completed),
            "failed" => Ok(JobState::Failed),
            other => Err(format!("unknown job state: {other}")),
        }
    }
}

/// A unit of deferred work against one invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub kind: JobKind,
    pub invoice_id: InvoiceId,
    pub payload: serde_json::Value,
    pub state: JobState,
    /// Number of times the job has been claimed.
    pub attempts: i32,
    /// Uniqueness key; a second enqueue with the same (kind, dedup_key)
    /// is a no-op.
    pub dedup_key: String,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Create a new pending job.
    pub fn new(
        kind: JobKind,
        invoice_id: InvoiceId,
        dedup_key: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            kind,
            invoice_id,
            payload,
            state: JobState::Pending,
            attempts: 0,
            dedup_key: dedup_key.into(),
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn kind_round_trips_as_text() {
        let kind = JobKind::TranscribeAndExtract;
        assert_eq!(JobKind::from_str(kind.as_str()).unwrap(), kind);
        assert!(JobKind::from_str("reticulate_splines").is_err());
    }

    #[test]
    fn state_round_trips_and_terminality() {
        for state in [
            JobState::Pending,
            JobState::Processing,
            JobState::Completed,
            JobState::Failed,
        ] {
            assert_eq!(JobState::from_str(state.as_str()).unwrap(), state);
        }
        assert!(!JobState::Pending.is_terminal());
        assert!(!JobState::Processing.is_terminal());
        assert!(JobState::Completed.is_terminal());
        assert!(JobState::Failed.is_terminal());
    }

    #[test]
    fn new_job_is_pending_with_zero_attempts() {
        let job = Job::new(
            JobKind::TranscribeAndExtract,
            billscribe_core::InvoiceId::new(),
            "audio-1.wav",
            serde_json::json!({}),
        );
        assert_eq!(job.state, JobState::Pending);
        assert_eq!(job.attempts, 0);
        assert!(job.last_error.is_none());
    }
}
