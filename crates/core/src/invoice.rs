use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{InvoiceId, InvoiceItemId, UserId};

/// Invoice lifecycle status.
///
/// A fresh invoice starts in `Processing` and moves to `Ready` once the
/// background transcription/extraction task has finished. A failed task
/// leaves the invoice in `Processing` (the failure is recorded on the job).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Processing,
    Ready,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Processing => "processing",
            InvoiceStatus::Ready => "ready",
        }
    }
}

impl std::str::FromStr for InvoiceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(InvoiceStatus::Processing),
            "ready" => Ok(InvoiceStatus::Ready),
            other => Err(format!("unknown invoice status: {other}")),
        }
    }
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An invoice derived from one uploaded meeting recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub user_id: UserId,
    pub name: String,
    /// Object-storage key of the uploaded audio.
    pub audio_key: String,
    pub status: InvoiceStatus,
    /// Transcript text, present once processing has succeeded.
    pub transcript: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    /// Create a new invoice in `Processing` state.
    pub fn new(user_id: UserId, name: impl Into<String>, audio_key: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: InvoiceId::new(),
            user_id,
            name: name.into(),
            audio_key: audio_key.into(),
            status: InvoiceStatus::Processing,
            transcript: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A persisted invoice line item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceItem {
    pub id: InvoiceItemId,
    pub invoice_id: InvoiceId,
    pub item_date: NaiveDate,
    pub description: String,
    pub quantity: f64,
    pub amount: f64,
}

/// Line item content without identity; used when items are wholesale
/// replaced (edit endpoint, extraction output).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceItemDraft {
    pub item_date: NaiveDate,
    pub description: String,
    pub quantity: f64,
    pub amount: f64,
}
