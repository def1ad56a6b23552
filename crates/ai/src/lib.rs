//! `billscribe-ai`
//!
//! **Responsibility:** the AI subsystem boundary.
//!
//! This crate defines *what* the transcription/extraction step consumes and
//! produces, not *how* it talks to a provider:
//! - It must not depend on storage or HTTP machinery.
//! - Concrete clients (OpenAI over reqwest) live in infra; tests supply
//!   in-process fakes.

pub mod client;
pub mod error;
pub mod extract;

pub use client::{ItemExtractor, Transcriber};
pub use error::AiError;
pub use extract::{
    EXTRACTION_SYSTEM_PROMPT, ExtractedItem, build_extraction_user_prompt,
    parse_extraction_content,
};
