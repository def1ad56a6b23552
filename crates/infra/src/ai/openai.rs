use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;

use billscribe_ai::{
    AiError, ExtractedItem, ItemExtractor, Transcriber, build_extraction_user_prompt,
    parse_extraction_content, EXTRACTION_SYSTEM_PROMPT,
};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const TRANSCRIPTION_MODEL: &str = "gpt-4o-transcribe";
const EXTRACTION_MODEL: &str = "gpt-5";

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    /// Override for tests and gateways; `None` targets api.openai.com.
    pub base_url: Option<String>,
    pub request_timeout: Duration,
}

/// HTTP client for the audio transcription and chat completion endpoints.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Result<Self, AiError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AiError::Transcription(e.to_string()))?;

        Ok(Self {
            http,
            api_key: config.api_key,
            base_url: config
                .base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        })
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

#[async_trait]
impl Transcriber for OpenAiClient {
    async fn transcribe(&self, audio: &[u8], filename: &str) -> Result<String, AiError> {
        if audio.is_empty() {
            return Err(AiError::InvalidInput("empty audio payload".to_string()));
        }

        let part = reqwest::multipart::Part::bytes(audio.to_vec())
            .file_name(filename.to_string())
            .mime_str("application/octet-stream")
            .map_err(|e| AiError::Transcription(e.to_string()))?;
        let form = reqwest::multipart::Form::new()
            .text("model", TRANSCRIPTION_MODEL)
            .text("response_format", "text")
            .part("file", part);

        let response = self
            .http
            .post(format!("{}/v1/audio/transcriptions", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AiError::Transcription(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::Transcription(format!(
                "transcription request returned {status}: {body}"
            )));
        }

        response
            .text()
            .await
            .map_err(|e| AiError::Transcription(e.to_string()))
    }
}

#[async_trait]
impl ItemExtractor for OpenAiClient {
    async fn extract_items(
        &self,
        transcript: &str,
        fallback_date: NaiveDate,
    ) -> Result<Vec<ExtractedItem>, AiError> {
        let body = json!({
            "model": EXTRACTION_MODEL,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": EXTRACTION_SYSTEM_PROMPT },
                { "role": "user", "content": build_extraction_user_prompt(fallback_date, transcript) },
            ],
        });

        let response = self
            .http
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AiError::Extraction(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::Extraction(format!(
                "extraction request returned {status}: {body}"
            )));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| AiError::Extraction(e.to_string()))?;
        let content = completion
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .unwrap_or_default();

        Ok(parse_extraction_content(content))
    }
}
