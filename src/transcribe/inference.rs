use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

use super::{ComputePlan, InferenceOptions, RecognitionOutput, SpeechModel, SpeechModelLoader};
use crate::config::SpeechConfig;

/// Speech models served by a remote inference endpoint.
///
/// The endpoint accepts `POST {endpoint}/models/{model_id}` with base64 media and
/// answers with the ASR pipeline output (`text` plus timestamped `chunks`).
pub struct HttpSpeechLoader {
    client: Client,
    endpoint: String,
    api_token: Option<String>,
}

pub struct HttpSpeechModel {
    client: Client,
    url: String,
    api_token: Option<String>,
}

#[derive(Debug, Serialize)]
struct InferenceRequest<'a> {
    inputs: String,
    parameters: InferenceParameters<'a>,
}

#[derive(Debug, Serialize)]
struct InferenceParameters<'a> {
    return_timestamps: bool,
    generate_kwargs: GenerateKwargs<'a>,
}

#[derive(Debug, Serialize)]
struct GenerateKwargs<'a> {
    task: &'a str,
    language: &'a str,
}

impl HttpSpeechLoader {
    pub fn new(config: &SpeechConfig) -> Self {
        Self {
            client: Client::new(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
        }
    }
}

#[async_trait]
impl SpeechModelLoader for HttpSpeechLoader {
    async fn load(&self, model_id: &str, plan: ComputePlan) -> Result<Arc<dyn SpeechModel>> {
        // Placement is decided by the server
        tracing::debug!("Remote speech model {} requested for {}", model_id, plan);

        Ok(Arc::new(HttpSpeechModel {
            client: self.client.clone(),
            url: format!("{}/models/{}", self.endpoint, model_id),
            api_token: self.api_token.clone(),
        }))
    }
}

#[async_trait]
impl SpeechModel for HttpSpeechModel {
    async fn infer(&self, path: &Path, options: &InferenceOptions) -> Result<RecognitionOutput> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let request = InferenceRequest {
            inputs: STANDARD.encode(bytes),
            parameters: InferenceParameters {
                return_timestamps: options.return_timestamps,
                generate_kwargs: GenerateKwargs {
                    task: &options.task,
                    language: &options.language,
                },
            },
        };

        let mut builder = self
            .client
            .post(&self.url)
            .header("x-wait-for-model", "true")
            .json(&request);

        if let Some(token) = &self.api_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder
            .send()
            .await
            .context("Speech inference request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Speech inference returned {}: {}", status, error_text);
        }

        response
            .json::<RecognitionOutput>()
            .await
            .context("Failed to parse speech inference response")
    }
}
