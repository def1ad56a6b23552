//! Extraction schema and prompts.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One line item as emitted by the extraction model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedItem {
    /// YYYY-MM-DD.
    pub item_date: NaiveDate,
    pub description: String,
    pub quantity: f64,
    pub amount: f64,
}

/// System prompt pinning the output schema the extractor must emit.
pub const EXTRACTION_SYSTEM_PROMPT: &str = "You are an accounting assistant. Given a meeting \
transcript with speakers (Person 1/Person 2), output JSON strictly matching schema: \
items[{ item_date: YYYY-MM-DD, description: string, quantity: number, amount: number }]. \
Assume CAD. If dates are ambiguous, use the provided fallback date. Keep concise \
legal-style descriptions.";

/// Build the user prompt carrying the fallback date and the transcript.
pub fn build_extraction_user_prompt(fallback_date: NaiveDate, transcript: &str) -> String {
    format!(
        "Fallback date: {}\nTranscript:\n{}",
        fallback_date.format("%Y-%m-%d"),
        transcript
    )
}

#[derive(Debug, Deserialize)]
struct ExtractionEnvelope {
    #[serde(default)]
    items: Vec<ExtractedItem>,
}

/// Parse the model's JSON content into items.
///
/// Unparseable content or a missing `items` field yields an empty list; the
/// extraction step must not fail the whole job over a malformed reply.
pub fn parse_extraction_content(content: &str) -> Vec<ExtractedItem> {
    serde_json::from_str::<ExtractionEnvelope>(content)
        .map(|env| env.items)
        .unwrap_or_default()
}
