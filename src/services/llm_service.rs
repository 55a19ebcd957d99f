use futures::StreamExt;
use reqwest::Client as HttpClient;
use serde_json::{json, Value};

use crate::api::middleware::AppError;
use crate::config::Config;
use crate::models::StreamEvent;
use crate::services::stream_emitter::EventSink;

/// Black-box text completion.
///
/// Transport failures come back as `AppError::LlmService`; callers decide
/// what to do with them, this layer never retries.
#[async_trait::async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, AppError>;

    /// Completion whose partial output is forwarded to `sink` as `chunk`
    /// events while it arrives. Returns the full text.
    async fn complete_streaming(
        &self,
        prompt: &str,
        sink: &mut dyn EventSink,
    ) -> Result<String, AppError> {
        let text = self.complete(prompt).await?;
        sink.emit(StreamEvent::chunk(text.clone()));
        Ok(text)
    }
}

/// OpenAI-compatible `/chat/completions` client
pub struct LlmService {
    gateway_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
    max_tokens: u32,
    http_client: HttpClient,
}

impl LlmService {
    pub fn new(config: &Config) -> Self {
        Self {
            gateway_url: config.llm.gateway_url.trim_end_matches('/').to_string(),
            api_key: config.llm.api_key.clone(),
            model: config.llm.model.clone(),
            temperature: config.llm.temperature,
            max_tokens: config.llm.max_tokens,
            http_client: HttpClient::new(),
        }
    }

    fn request_body(&self, prompt: &str, stream: bool) -> Value {
        json!({
            "model": self.model,
            "messages": [
                { "role": "user", "content": prompt }
            ],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "stream": stream,
        })
    }

    async fn send(&self, prompt: &str, stream: bool) -> Result<reqwest::Response, AppError> {
        if self.gateway_url.is_empty() {
            return Err(AppError::LlmService("LLM gateway is not configured".to_string()));
        }

        let mut request = self
            .http_client
            .post(format!("{}/chat/completions", self.gateway_url))
            .json(&self.request_body(prompt, stream));

        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::LlmService(format!("third-party API request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::LlmService(format!(
                "third-party API request failed: {} {}",
                status, error_text
            )));
        }

        Ok(response)
    }

    /// Content delta carried by one `data:` line of a streamed completion.
    /// `[DONE]` and lines that do not parse carry nothing.
    fn parse_stream_line(line: &str) -> Option<String> {
        let data = line.trim().strip_prefix("data:")?.trim();
        if data == "[DONE]" {
            return None;
        }
        let parsed: Value = match serde_json::from_str(data) {
            Ok(v) => v,
            Err(e) => {
                tracing::debug!("Skipping unparsable stream line: {}", e);
                return None;
            }
        };
        parsed["choices"][0]["delta"]["content"]
            .as_str()
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }
}

/// Splits a byte stream into lines.
///
/// Bytes are held until their line ends, so a multi-byte character cut
/// across two network chunks is decoded whole.
#[derive(Default)]
struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Append `bytes` and return every line they complete
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    /// Whatever is left after the stream closed without a final newline
    fn finish(self) -> String {
        String::from_utf8_lossy(&self.pending).into_owned()
    }
}

#[async_trait::async_trait]
impl CompletionClient for LlmService {
    async fn complete(&self, prompt: &str) -> Result<String, AppError> {
        let response = self.send(prompt, false).await?;

        let result: Value = response
            .json()
            .await
            .map_err(|e| AppError::LlmService(format!("Failed to parse LLM response: {}", e)))?;

        result["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| AppError::LlmService("LLM response does not contain any content".to_string()))
    }

    async fn complete_streaming(
        &self,
        prompt: &str,
        sink: &mut dyn EventSink,
    ) -> Result<String, AppError> {
        let response = self.send(prompt, true).await?;
        let mut body = response.bytes_stream();

        let mut full_response = String::new();
        let mut lines = LineBuffer::default();

        while let Some(chunk) = body.next().await {
            let bytes = chunk
                .map_err(|e| AppError::LlmService(format!("third-party API stream failed: {}", e)))?;

            for line in lines.push(&bytes) {
                if let Some(content) = Self::parse_stream_line(&line) {
                    full_response.push_str(&content);
                    sink.emit(StreamEvent::chunk(content));
                }
            }
        }

        if let Some(content) = Self::parse_stream_line(&lines.finish()) {
            full_response.push_str(&content);
            sink.emit(StreamEvent::chunk(content));
        }

        Ok(full_response)
    }
}
