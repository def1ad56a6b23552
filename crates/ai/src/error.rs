use thiserror::Error;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("transcription failed: {0}")]
    Transcription(String),

    #[error("extraction failed: {0}")]
    Extraction(String),

    #[error("AI call timed out after {0}s")]
    Timeout(u64),
}
