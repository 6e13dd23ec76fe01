mod sse;

use anyhow::{anyhow, Context, Result};
use futures::stream::{BoxStream, StreamExt};
use reqwest::{header::HeaderValue, Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::env;
use tokio::time::{sleep, Duration};

pub use sse::{sse_fragments, SseDecoder, StreamFormat};

const MAX_RETRIES: usize = 6;
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    OpenAi,
    Anthropic,
    Deepseek,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmProvider::OpenAi => "openai",
            LlmProvider::Anthropic => "anthropic",
            LlmProvider::Deepseek => "deepseek",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "openai" => Some(LlmProvider::OpenAi),
            "anthropic" => Some(LlmProvider::Anthropic),
            "deepseek" => Some(LlmProvider::Deepseek),
            _ => None,
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            LlmProvider::OpenAi => "gpt-4o-mini",
            LlmProvider::Anthropic => "claude-3-5-haiku-latest",
            LlmProvider::Deepseek => "deepseek-chat",
        }
    }

    pub fn api_key_var(&self) -> &'static str {
        match self {
            LlmProvider::OpenAi => "OPENAI_API_KEY",
            LlmProvider::Anthropic => "ANTHROPIC_API_KEY",
            LlmProvider::Deepseek => "DEEPSEEK_API_KEY",
        }
    }

    pub fn stream_format(&self) -> StreamFormat {
        match self {
            LlmProvider::Anthropic => StreamFormat::AnthropicMessages,
            LlmProvider::OpenAi | LlmProvider::Deepseek => StreamFormat::ChatCompletions,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LlmRequest {
    pub system: Option<String>,
    pub user: String,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl LlmResponse {
    pub fn total_tokens(&self) -> u32 {
        self.prompt_tokens.saturating_add(self.completion_tokens)
    }
}

/// HTTP client for one provider and model. Construct once at start-up and share;
/// cloning is cheap.
#[derive(Clone)]
pub struct LlmClient {
    http: Client,
    provider: LlmProvider,
    model: String,
    config: ProviderConfig,
}

#[derive(Clone)]
enum ProviderConfig {
    OpenAi(OpenAiConfig),
    Anthropic(AnthropicConfig),
    Deepseek(DeepseekConfig),
}

#[derive(Clone)]
struct OpenAiConfig {
    api_key: String,
    base_url: String,
}

#[derive(Clone)]
struct AnthropicConfig {
    api_key: String,
    max_tokens: u32,
}

#[derive(Clone)]
struct DeepseekConfig {
    api_key: String,
}

impl LlmClient {
    /// Reads the provider's API key (and `OPENAI_BASE_URL`) from the environment.
    pub fn new(provider: LlmProvider, model: impl Into<String>) -> Result<Self> {
        let api_key = read_api_key(provider.api_key_var())?;
        Self::with_api_key(provider, model, api_key)
    }

    pub fn with_api_key(
        provider: LlmProvider,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self> {
        let api_key = api_key.into();
        validate_api_key(provider.api_key_var(), &api_key)?;
        let config = match provider {
            LlmProvider::OpenAi => ProviderConfig::OpenAi(OpenAiConfig {
                api_key,
                base_url: env::var("OPENAI_BASE_URL")
                    .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            }),
            LlmProvider::Anthropic => ProviderConfig::Anthropic(AnthropicConfig {
                api_key,
                max_tokens: env::var("ANTHROPIC_MAX_TOKENS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(2048),
            }),
            LlmProvider::Deepseek => ProviderConfig::Deepseek(DeepseekConfig { api_key }),
        };
        Ok(Self {
            http: Client::new(),
            provider,
            model: model.into(),
            config,
        })
    }

    pub fn provider(&self) -> LlmProvider {
        self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn chat(&self, req: &LlmRequest) -> Result<LlmResponse> {
        let response = self.send(&self.payload(req, false)).await?;
        let label = self.provider.as_str();
        match &self.config {
            ProviderConfig::Anthropic(_) => {
                let body = response
                    .json::<AnthropicResponse>()
                    .await
                    .context("failed to decode anthropic response")?;
                let text = body
                    .content
                    .into_iter()
                    .find_map(|part| part.text)
                    .ok_or_else(|| anyhow!("missing text in Anthropic response"))?;
                let usage = body.usage.unwrap_or_default();
                Ok(LlmResponse {
                    content: text,
                    prompt_tokens: usage.input_tokens.unwrap_or(0),
                    completion_tokens: usage.output_tokens.unwrap_or(0),
                })
            }
            ProviderConfig::OpenAi(_) | ProviderConfig::Deepseek(_) => {
                let value: Value = response
                    .json()
                    .await
                    .with_context(|| format!("failed to decode {label} response"))?;
                let content = extract_chat_text(&value)
                    .ok_or_else(|| anyhow!("missing text in {label} response"))?;
                let usage: OpenAiUsage = value
                    .get("usage")
                    .and_then(|value| serde_json::from_value(value.clone()).ok())
                    .unwrap_or_default();
                Ok(LlmResponse {
                    content,
                    prompt_tokens: usage.prompt_tokens.unwrap_or(0),
                    completion_tokens: usage.completion_tokens.unwrap_or(0),
                })
            }
        }
    }

    /// Opens a streamed completion and yields its text fragments in order.
    ///
    /// The returned stream ends without error only once the provider's
    /// completion sentinel has arrived.
    pub async fn chat_stream(&self, req: &LlmRequest) -> Result<BoxStream<'static, Result<String>>> {
        let response = self.send(&self.payload(req, true)).await?;
        tracing::debug!(provider = self.provider.as_str(), model = %self.model, "stream opened");
        Ok(sse_fragments(response.bytes_stream(), self.provider.stream_format()).boxed())
    }

    fn payload(&self, req: &LlmRequest, stream: bool) -> Value {
        let mut payload = match &self.config {
            ProviderConfig::Anthropic(cfg) => {
                let mut payload = json!({
                    "model": self.model,
                    "max_tokens": req.max_tokens.unwrap_or(cfg.max_tokens),
                    "messages": [ { "role": "user", "content": req.user } ],
                });
                if let Some(system) = &req.system {
                    payload["system"] = json!(system);
                }
                payload
            }
            ProviderConfig::OpenAi(_) | ProviderConfig::Deepseek(_) => {
                let mut messages = Vec::new();
                if let Some(system) = &req.system {
                    messages.push(json!({ "role": "system", "content": system }));
                }
                messages.push(json!({ "role": "user", "content": req.user }));
                let mut payload = json!({
                    "model": self.model,
                    "messages": messages,
                });
                if let Some(max_tokens) = req.max_tokens {
                    payload["max_tokens"] = json!(max_tokens);
                }
                payload
            }
        };
        if let Some(temperature) = req.temperature {
            payload["temperature"] = json!(temperature);
        }
        if stream {
            payload["stream"] = json!(true);
        }
        payload
    }

    fn request(&self) -> RequestBuilder {
        match &self.config {
            ProviderConfig::OpenAi(cfg) => self
                .http
                .post(format!("{}/chat/completions", cfg.base_url.trim_end_matches('/')))
                .bearer_auth(&cfg.api_key),
            ProviderConfig::Anthropic(cfg) => self
                .http
                .post("https://api.anthropic.com/v1/messages")
                .header("x-api-key", &cfg.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION),
            ProviderConfig::Deepseek(cfg) => self
                .http
                .post("https://api.deepseek.com/v1/chat/completions")
                .bearer_auth(&cfg.api_key),
        }
    }

    /// Sends with retries on transport errors and rate limiting.
    async fn send(&self, payload: &Value) -> Result<reqwest::Response> {
        let label = self.provider.as_str();
        let mut attempt = 0usize;
        loop {
            attempt += 1;
            let response = match self.request().json(payload).send().await {
                Ok(resp) => resp,
                Err(err) => {
                    if attempt > MAX_RETRIES {
                        return Err(err).with_context(|| format!("{label} request failed"));
                    }
                    tracing::warn!(provider = label, attempt, error = %err, "request failed, retrying");
                    sleep(backoff_delay(attempt, None)).await;
                    continue;
                }
            };
            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS {
                if attempt > MAX_RETRIES {
                    return Err(anyhow!("{label} rate limited after {MAX_RETRIES} retries"));
                }
                let wait = backoff_delay(attempt, response.headers().get("retry-after"));
                tracing::warn!(provider = label, attempt, wait_secs = wait.as_secs(), "rate limited");
                sleep(wait).await;
                continue;
            }
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(anyhow!("{label} returned error (status {status}): {body}"));
            }
            return Ok(response);
        }
    }
}

fn backoff_delay(attempt: usize, retry_after: Option<&HeaderValue>) -> Duration {
    if let Some(value) = retry_after {
        if let Ok(text) = value.to_str() {
            if let Ok(secs) = text.parse::<u64>() {
                return Duration::from_secs(secs.max(1));
            }
        }
    }
    let capped = attempt.min(6) as u32;
    Duration::from_secs(1u64 << capped)
}

fn read_api_key(var: &str) -> Result<String> {
    let value = env::var(var).map_err(|_| anyhow!("{var} is not set"))?;
    validate_api_key(var, &value)?;
    Ok(value)
}

fn validate_api_key(var: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(anyhow!("{var} is empty"));
    }
    if var.contains("ANTHROPIC") && !value.starts_with("sk-ant-") {
        return Err(anyhow!("{var} must start with 'sk-ant-'"));
    }
    if (var.contains("OPENAI") || var.contains("DEEPSEEK")) && !value.starts_with("sk-") {
        return Err(anyhow!("{var} must start with 'sk-'"));
    }
    Ok(())
}

fn extract_chat_text(value: &Value) -> Option<String> {
    let choice = value.get("choices")?.as_array()?.first()?;
    if let Some(text) = choice.get("text").and_then(|t| t.as_str()) {
        return Some(text.to_string());
    }
    let content = choice.get("message")?.get("content")?;
    if let Some(text) = content.as_str() {
        return Some(text.to_string());
    }
    content
        .as_array()?
        .iter()
        .find_map(|part| part.get("text").and_then(|t| t.as_str()))
        .map(str::to_string)
}

#[derive(Default, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
    #[serde(default)]
    usage: Option<AnthropicUsage>,
}

#[derive(Deserialize)]
struct AnthropicContent {
    text: Option<String>,
}

#[derive(Default, Deserialize)]
struct AnthropicUsage {
    input_tokens: Option<u32>,
    output_tokens: Option<u32>,
}
