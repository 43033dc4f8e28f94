//! Gemini `generateContent` client with schema-constrained JSON output.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use super::{ExtractionError, ExtractionRequest, StructuredExtractor};
use crate::config::GenerativeConfig;

/// Gemini API client.
pub struct GeminiClient {
    client: Client,
    api_key: String,
    api_base: String,
    max_retries: u32,
    backoff: Duration,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig<'a>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text {
        text: &'a str,
    },
    #[serde(rename_all = "camelCase")]
    InlineData {
        inline_data: InlineData<'a>,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    temperature: f32,
    response_mime_type: &'static str,
    response_schema: &'a Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<ResponseContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

/// Outcome of a single HTTP attempt
enum Attempt {
    Retryable(String),
    Fatal(String),
}

impl GeminiClient {
    /// Create a new Gemini client.
    pub fn new(config: &GenerativeConfig) -> anyhow::Result<Self> {
        let mut builder = Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        Ok(Self {
            client: builder.build()?,
            api_key: config.api_key.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
            backoff: Duration::from_secs(1),
        })
    }

    /// Base delay between retries; attempt `n` waits `n * backoff`
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.api_base,
            urlencoding::encode(model)
        )
    }

    async fn send_once(&self, url: &str, body: &GenerateRequest<'_>) -> Result<String, Attempt> {
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| Attempt::Retryable(format!("Gemini API request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let message = format!("Gemini API returned {}: {}", status, error_text.trim());
            return Err(if is_retryable(status) {
                Attempt::Retryable(message)
            } else {
                Attempt::Fatal(message)
            });
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| Attempt::Retryable(format!("Failed to read Gemini response: {}", e)))?;

        if let Some(reason) = parsed.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(Attempt::Fatal(format!("Prompt blocked: {}", reason)));
        }

        let candidate = parsed
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| Attempt::Fatal("No candidates in Gemini response".to_string()))?;

        let text: String = candidate
            .content
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect()
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(Attempt::Fatal(format!(
                "No content in Gemini response (finish reason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            )));
        }

        Ok(text)
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Remove a surrounding Markdown code fence, if any
fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    let text = text.strip_suffix("```").unwrap_or(text);
    text.trim()
}

#[async_trait]
impl StructuredExtractor for GeminiClient {
    async fn extract(&self, request: &ExtractionRequest) -> Result<Value, ExtractionError> {
        let url = self.endpoint(&request.model);
        let body = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![
                    Part::Text {
                        text: &request.prompt,
                    },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: &request.media.mime_type,
                            data: &request.media.data_base64,
                        },
                    },
                ],
            }],
            generation_config: GenerationConfig {
                temperature: request.temperature,
                response_mime_type: "application/json",
                response_schema: &request.schema,
            },
        };

        let mut retries = 0;
        loop {
            info!("Calling Gemini model {} (attempt {})", request.model, retries + 1);

            match self.send_once(&url, &body).await {
                Ok(text) => {
                    return serde_json::from_str(strip_code_fence(&text))
                        .map_err(|e| ExtractionError::Malformed(e.to_string()));
                }
                Err(Attempt::Retryable(message)) if retries < self.max_retries => {
                    retries += 1;
                    warn!("Transient Gemini failure, retrying: {}", message);
                    sleep(self.backoff * retries).await;
                }
                Err(Attempt::Retryable(message)) => {
                    return Err(ExtractionError::Transient {
                        attempts: retries + 1,
                        message,
                    });
                }
                Err(Attempt::Fatal(message)) => return Err(ExtractionError::Rejected(message)),
            }
        }
    }
}
