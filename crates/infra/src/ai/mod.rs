//! Production implementation of the transcription and extraction traits.

mod openai;

pub use openai::{OpenAiClient, OpenAiConfig};
