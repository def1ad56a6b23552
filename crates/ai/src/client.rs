//! Provider-facing traits.
//!
//! Both calls are pass-throughs to an external service and may be slow;
//! callers are expected to bound them with a deadline.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::AiError;
use crate::extract::ExtractedItem;

/// Speech-to-text over a complete audio file.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe `audio` (the full file contents) into plain text.
    ///
    /// `filename` is forwarded so the provider can sniff the container
    /// format from the extension.
    async fn transcribe(&self, audio: &[u8], filename: &str) -> Result<String, AiError>;
}

/// Structured extraction of invoice line items from a transcript.
#[async_trait]
pub trait ItemExtractor: Send + Sync {
    /// Extract line items. `fallback_date` is used by the model whenever the
    /// transcript leaves a date ambiguous.
    async fn extract_items(
        &self,
        transcript: &str,
        fallback_date: NaiveDate,
    ) -> Result<Vec<ExtractedItem>, AiError>;
}
