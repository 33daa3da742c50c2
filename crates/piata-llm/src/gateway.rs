use std::sync::Arc;
use std::time::{Duration, Instant};

use piata_config::LlmConfig;
use piata_core::{Message, PiataError, Result};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use tracing::{Instrument, debug, info_span, warn};
use uuid::Uuid;

use crate::provider::{LlmProvider, LlmRequest, LlmResponse, ResponseFormat};
use crate::structured::{parse_structured, response_format_for};
use crate::trace::{LlmTrace, NoopTraceSink, TraceOutcome, TraceSink};

/// Base delay for exponential backoff (doubles each retry).
const BASE_DELAY_MS: u64 = 1000;

/// A single prompted call: system instructions, the user turn, and optional
/// prior turns placed between them.
#[derive(Debug, Clone, Default)]
pub struct Prompt {
    pub system: String,
    pub user: String,
    pub history: Vec<Message>,
}

impl Prompt {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            history: vec![],
        }
    }

    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.history = history;
        self
    }

    fn char_len(&self) -> usize {
        self.system.chars().count()
            + self.user.chars().count()
            + self
                .history
                .iter()
                .map(|m| m.content.chars().count())
                .sum::<usize>()
    }
}

/// Model parameters applied to every gateway call.
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub max_retries: u32,
    pub base_delay_ms: u64,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self::from(&LlmConfig::default())
    }
}

impl From<&LlmConfig> for GatewaySettings {
    fn from(config: &LlmConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
            base_delay_ms: BASE_DELAY_MS,
        }
    }
}

/// One-shot prompted calls against a single provider, with structured output
/// parsing, retries on transient failures, and a trace record per call.
#[derive(Clone)]
pub struct LlmGateway {
    provider: Arc<dyn LlmProvider>,
    settings: GatewaySettings,
    sink: Arc<dyn TraceSink>,
}

/// Check if an error is transient and worth retrying.
fn is_retryable(err: &PiataError) -> bool {
    match err {
        PiataError::RateLimited { .. } => true,
        PiataError::LlmProvider(msg) => {
            msg.starts_with("HTTP 429")
                || msg.starts_with("HTTP 500")
                || msg.starts_with("HTTP 502")
                || msg.starts_with("HTTP 503")
                || msg.contains("timed out")
                || msg.contains("connection reset")
                || msg.contains("connection closed")
        }
        _ => false,
    }
}

/// Extract retry-after hint from a RateLimited error (in seconds).
fn retry_after_hint(err: &PiataError) -> Option<u64> {
    if let PiataError::RateLimited { retry_after_secs } = err {
        Some(*retry_after_secs)
    } else {
        None
    }
}

/// `base * 2^attempt`, saturating instead of overflowing.
fn backoff_delay_ms(base_delay_ms: u64, attempt: u32) -> u64 {
    2u64.checked_pow(attempt)
        .map_or(u64::MAX, |factor| base_delay_ms.saturating_mul(factor))
}

impl LlmGateway {
    pub fn new(provider: Arc<dyn LlmProvider>, settings: GatewaySettings) -> Self {
        Self {
            provider,
            settings,
            sink: Arc::new(NoopTraceSink),
        }
    }

    pub fn from_config(config: &LlmConfig, provider: Arc<dyn LlmProvider>) -> Self {
        Self::new(provider, GatewaySettings::from(config))
    }

    /// Install a trace sink. Replaces the default no-op sink.
    pub fn with_trace_sink(mut self, sink: Arc<dyn TraceSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn settings(&self) -> &GatewaySettings {
        &self.settings
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Free-form completion. An empty reply is an error.
    pub async fn complete_text(&self, operation: &str, prompt: &Prompt) -> Result<String> {
        let resp = self.call(operation, prompt, None).await?;
        let text = resp.text.trim();
        if text.is_empty() {
            return Err(PiataError::LlmProvider(format!(
                "{operation}: provider returned an empty reply"
            )));
        }
        Ok(text.to_string())
    }

    /// Completion constrained to the JSON schema of `T`, parsed into `T`.
    pub async fn complete_structured<T>(&self, operation: &str, prompt: &Prompt) -> Result<T>
    where
        T: DeserializeOwned + JsonSchema,
    {
        let format = response_format_for::<T>();

        let mut prompt = prompt.clone();
        let schema_text = serde_json::to_string_pretty(&format.schema)?;
        prompt.system = format!(
            "{}\n\nRespond with a single JSON document matching this schema and nothing else:\n{schema_text}",
            prompt.system
        );

        let resp = self.call(operation, &prompt, Some(format)).await?;
        parse_structured(&resp.text)
    }

    /// Run one call inside its own span, retrying transient failures, and
    /// hand the trace to the sink whatever the outcome.
    async fn call(
        &self,
        operation: &str,
        prompt: &Prompt,
        response_format: Option<ResponseFormat>,
    ) -> Result<LlmResponse> {
        let correlation_id = format!("{operation}-{}", Uuid::new_v4());
        let span = info_span!(
            "llm_call",
            operation = %operation,
            correlation_id = %correlation_id,
            model = %self.settings.model,
        );

        async {
            let mut messages = prompt.history.clone();
            messages.push(Message::user(prompt.user.clone()));

            let request = LlmRequest {
                model: self.settings.model.clone(),
                messages,
                system: Some(prompt.system.clone()),
                max_tokens: self.settings.max_tokens,
                temperature: self.settings.temperature,
                response_format,
            };

            let started = Instant::now();
            let (result, attempts) = self.complete_with_retry(&request).await;
            let latency_ms = started.elapsed().as_millis() as u64;

            let (usage, outcome) = match result {
                Ok(ref resp) => (resp.usage.clone(), TraceOutcome::Ok),
                Err(ref e) => (Default::default(), TraceOutcome::Error(e.to_string())),
            };
            debug!(latency_ms, attempts, "llm call finished");

            self.sink.record(&LlmTrace {
                correlation_id: correlation_id.clone(),
                operation: operation.to_string(),
                model: self.settings.model.clone(),
                latency_ms,
                attempts,
                system_prompt: prompt.system.clone(),
                user_prompt: prompt.user.clone(),
                prompt_chars: prompt.char_len(),
                usage,
                outcome,
            });

            result
        }
        .instrument(span)
        .await
    }

    /// Retry a complete() call with exponential backoff on transient errors.
    /// Returns the final result and the number of attempts made.
    async fn complete_with_retry(&self, request: &LlmRequest) -> (Result<LlmResponse>, u32) {
        let max_retries = self.settings.max_retries;
        let mut attempt = 0;

        loop {
            match self.provider.complete(request).await {
                Ok(resp) => return (Ok(resp), attempt + 1),
                Err(e) if is_retryable(&e) && attempt < max_retries => {
                    let delay = retry_after_hint(&e)
                        .map(|s| s.saturating_mul(1000))
                        .unwrap_or_else(|| backoff_delay_ms(self.settings.base_delay_ms, attempt));
                    warn!(
                        provider = self.provider.name(),
                        attempt = attempt + 1,
                        max = max_retries,
                        delay_ms = delay,
                        error = %e,
                        "retrying after transient error"
                    );
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    attempt += 1;
                }
                Err(e) => return (Err(e), attempt + 1),
            }
        }
    }
}
