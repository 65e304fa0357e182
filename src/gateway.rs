use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::models::{Completion, Message, Role};
use anyhow::{Context, Result};
use async_openai::error::{ApiError, OpenAIError};
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequest, CreateChatCompletionRequestArgs, CreateChatCompletionResponse,
};
use async_openai::{Client, config::OpenAIConfig};
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;

/// Capability to send a conversation to a model and get text back
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn complete(&self, model: &str, conversation: &[Message]) -> Result<Completion, GatewayError>;
}

/// Gateway for any OpenAI-compatible chat completions endpoint
pub struct OpenAiGateway {
    client: Client<OpenAIConfig>,
    temperature: f32,
    max_tokens: u16,
    rate_limit_rps: f64,
    /// Time of the last request, for rate limiting
    last_request: Mutex<Option<Instant>>,
}

impl OpenAiGateway {
    /// Create a gateway, reading the API key from the configured environment variable
    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        let api_key = std::env::var(&config.env_var_api_key)
            .with_context(|| format!("Environment variable {} not found", config.env_var_api_key))?;

        Ok(Self::new(api_key, config))
    }

    /// Create a gateway with an explicit API key
    pub fn new(api_key: impl Into<String>, config: &GatewayConfig) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(api_key.into())
            .with_api_base(&config.api_endpoint);

        // Retries belong to the retry policy; stop the client from retrying 429s itself.
        let no_retries = backoff::ExponentialBackoffBuilder::new()
            .with_max_elapsed_time(Some(Duration::ZERO))
            .build();

        Self {
            client: Client::with_config(openai_config).with_backoff(no_retries),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            rate_limit_rps: config.rate_limit_rps,
            last_request: Mutex::new(None),
        }
    }

    /// Enforce rate limiting for API requests
    async fn enforce_rate_limit(last_request: &mut Option<Instant>, rate_limit_rps: f64) {
        if rate_limit_rps <= 0.0 {
            return;
        }

        let min_interval = Duration::from_secs_f64(1.0 / rate_limit_rps);

        if let Some(last_time) = *last_request {
            let elapsed = last_time.elapsed();
            if elapsed < min_interval {
                let sleep_duration = min_interval - elapsed;
                sleep(sleep_duration).await;
            }
        }

        *last_request = Some(Instant::now());
    }

    /// Build the chat completion request
    fn build_request(
        &self,
        model: &str,
        conversation: &[Message],
    ) -> Result<CreateChatCompletionRequest, OpenAIError> {
        let messages = conversation
            .iter()
            .map(Self::request_message)
            .collect::<Result<Vec<_>, _>>()?;

        CreateChatCompletionRequestArgs::default()
            .model(model)
            .messages(messages)
            .temperature(self.temperature)
            .max_tokens(self.max_tokens)
            .build()
    }

    fn request_message(message: &Message) -> Result<ChatCompletionRequestMessage, OpenAIError> {
        let content = message.content.clone();
        let built = match message.role {
            Role::System => ChatCompletionRequestSystemMessageArgs::default()
                .content(content)
                .build()?
                .into(),
            Role::User => ChatCompletionRequestUserMessageArgs::default()
                .content(content)
                .build()?
                .into(),
            Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                .content(content)
                .build()?
                .into(),
        };
        Ok(built)
    }

    /// Extract a Completion from the API response
    fn extract_completion(response: CreateChatCompletionResponse, latency: Duration) -> Completion {
        let text = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .unwrap_or_default();

        let (input_tokens, output_tokens) = match response.usage {
            Some(usage) => (usage.prompt_tokens, usage.completion_tokens),
            None => (0, 0),
        };

        Completion {
            text,
            input_tokens,
            output_tokens,
            latency,
        }
    }
}

#[async_trait]
impl Gateway for OpenAiGateway {
    async fn complete(&self, model: &str, conversation: &[Message]) -> Result<Completion, GatewayError> {
        {
            let mut last_request = self.last_request.lock().await;
            Self::enforce_rate_limit(&mut last_request, self.rate_limit_rps).await;
        }

        let request = self
            .build_request(model, conversation)
            .map_err(|e| GatewayError::Fatal(format!("Failed to build request: {}", e)))?;

        let started = Instant::now();
        let response = self.client.chat().create(request).await.map_err(classify)?;

        Ok(Self::extract_completion(response, started.elapsed()))
    }
}

/// Sort a client error into retryable and non-retryable
pub(crate) fn classify(error: OpenAIError) -> GatewayError {
    match error {
        OpenAIError::ApiError(api) => classify_api_error(&api),
        OpenAIError::Reqwest(e) => classify_transport(&e),
        OpenAIError::JSONDeserialize(e) => {
            GatewayError::Transient(format!("Unreadable response body: {}", e))
        }
        other => GatewayError::Fatal(other.to_string()),
    }
}

/// Markers in an error `type` or `code` that mean "try again later"
const RETRYABLE_MARKERS: [&str; 6] = [
    "rate_limit",
    "server",
    "timeout",
    "overloaded",
    "too_many_requests",
    "service_unavailable",
];

/// Phrases in an error message that mean "try again later"; some servers
/// put the raw response body here
const RETRYABLE_MESSAGES: [&str; 6] = [
    "rate limit",
    "rate_limit",
    "too many requests",
    "overloaded",
    "server_error",
    "timed out",
];

fn classify_api_error(api: &ApiError) -> GatewayError {
    let code = api.code.clone().unwrap_or_default();
    let kind = api.r#type.clone().unwrap_or_default();
    let description = format!("{} (type: {}, code: {})", api.message, kind, code);

    if is_quota_exhausted(&kind, &code) || !is_retryable(&kind, &code, &api.message) {
        GatewayError::Fatal(description)
    } else {
        GatewayError::Transient(description)
    }
}

fn is_quota_exhausted(kind: &str, code: &str) -> bool {
    kind == "insufficient_quota" || code == "insufficient_quota"
}

/// The client drops the HTTP status, so OpenAI-compatible servers are
/// recognized by what they put in the error body
fn is_retryable(kind: &str, code: &str, message: &str) -> bool {
    let kind = kind.to_lowercase();
    let code = code.to_lowercase();
    let message = message.to_lowercase();

    kind == "requests"
        || kind == "tokens"
        || is_retryable_status(&code)
        || RETRYABLE_MARKERS
            .iter()
            .any(|marker| kind.contains(marker) || code.contains(marker))
        || RETRYABLE_MESSAGES
            .iter()
            .any(|phrase| message.contains(phrase))
}

/// Numeric codes: 429 and 5xx
fn is_retryable_status(code: &str) -> bool {
    match code.trim().parse::<u16>() {
        Ok(status) => status == 429 || (500..600).contains(&status),
        Err(_) => false,
    }
}

fn classify_transport(error: &reqwest::Error) -> GatewayError {
    if error.is_builder() {
        GatewayError::Fatal(format!("Invalid request: {}", error))
    } else {
        GatewayError::Transient(format!("Transport error: {}", error))
    }
}
