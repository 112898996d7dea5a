//! Narrative insights from an OpenAI-compatible chat completions API.
//!
//! Works with OpenAI, OpenRouter, vLLM, Ollama's compatibility endpoint and
//! any other service implementing `POST {base_url}/chat/completions`.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::time::Duration;
use tracing::debug;

use super::provider::{InsightProvider, InsightsRequest, ProviderError, ProviderKind};

const SYSTEM_PROMPT: &str = "You are a music royalty analyst. Given monthly revenue per \
streaming platform, write three short paragraphs: overall performance, platform mix, and \
the outlook for the requested timeframe. Use plain text, no markdown.";

pub struct OpenAiInsightProvider {
    id: String,
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    timeout: Option<Duration>,
    temperature: f32,
}

impl OpenAiInsightProvider {
    /// # Arguments
    /// * `base_url` - Base URL of the API (e.g., "https://api.openai.com/v1").
    /// * `model` - Model to use (e.g., "gpt-4o-mini").
    pub fn new(
        id: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
            timeout: None,
            temperature: 0.3,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub(crate) fn build_prompt(request: &InsightsRequest) -> String {
        let mut prompt = format!(
            "Genre: {}\nForecast timeframe: {} months\n",
            if request.artist_genre.is_empty() {
                "unknown"
            } else {
                request.artist_genre.as_str()
            },
            request.timeframe.months()
        );
        if request.royalty_data.is_empty() {
            prompt.push_str("No royalty data reported.\n");
        }
        for (platform, points) in &request.royalty_data {
            let _ = writeln!(prompt, "Platform {}:", platform);
            for point in points {
                let _ = writeln!(
                    prompt,
                    "  {}: revenue {:.2}, streams {}",
                    point.month, point.revenue, point.streams
                );
            }
        }
        prompt
    }
}

#[async_trait]
impl InsightProvider for OpenAiInsightProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Narrative
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    async fn analyze(&self, request: &InsightsRequest) -> Result<serde_json::Value, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);

        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: Self::build_prompt(request),
                },
            ],
            temperature: self.temperature,
        };

        debug!(provider = %self.id, model = %self.model, "Requesting narrative insights");

        let mut req_builder = self.client.post(&url).json(&body);
        if let Some(api_key) = &self.api_key {
            req_builder = req_builder.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = req_builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout
            } else {
                ProviderError::Connection(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let chat: ChatResponse = response.json().await.map_err(|e| {
            ProviderError::InvalidResponse(format!("Failed to parse completion response: {}", e))
        })?;

        let text = chat
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| ProviderError::InvalidResponse("No completion text in response".to_string()))?;

        Ok(serde_json::json!({
            "text": text.trim(),
            "model": self.model,
        }))
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}
