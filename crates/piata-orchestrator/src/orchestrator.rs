use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use piata_config::PiataConfig;
use piata_core::{Message, OrchestratorResponse, PiataError, Result};
use piata_llm::{LlmGateway, LlmProvider, LogTraceSink};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, error, field, info, info_span};
use uuid::Uuid;

use crate::classifier::IntentClassifier;
use crate::executor::{ExecutionMode, ToolExecutor};
use crate::planner::ToolPlanner;
use crate::registry::ToolServerRegistry;
use crate::synthesiser::ResponseSynthesiser;

/// Pipeline stage, recorded on the request span as it advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Classifying,
    Planning,
    Executing,
    Synthesising,
    Done,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Classifying => "classifying",
            Stage::Planning => "planning",
            Stage::Executing => "executing",
            Stage::Synthesising => "synthesising",
            Stage::Done => "done",
        }
    }
}

/// Tunables for the executor and synthesiser.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub tool_timeout: Duration,
    pub execution_mode: ExecutionMode,
    pub history_window: usize,
    pub max_payload_chars: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            tool_timeout: Duration::from_secs(30),
            execution_mode: ExecutionMode::Sequential,
            history_window: 6,
            max_payload_chars: 4000,
        }
    }
}

impl From<&PiataConfig> for PipelineOptions {
    fn from(config: &PiataConfig) -> Self {
        Self {
            tool_timeout: Duration::from_secs(config.executor.timeout_secs),
            execution_mode: if config.executor.parallel {
                ExecutionMode::Parallel
            } else {
                ExecutionMode::Sequential
            },
            history_window: config.synthesis.history_window,
            max_payload_chars: config.synthesis.max_payload_chars,
        }
    }
}

/// The single entry point: utterance and history in, response out.
///
/// Holds only shared, read-only collaborators, so clones are cheap and
/// concurrent requests do not interfere.
#[derive(Clone)]
pub struct Orchestrator {
    registry: Arc<ToolServerRegistry>,
    classifier: Arc<IntentClassifier>,
    planner: Arc<ToolPlanner>,
    executor: Arc<ToolExecutor>,
    synthesiser: Arc<ResponseSynthesiser>,
}

impl Orchestrator {
    pub fn new(registry: ToolServerRegistry, gateway: LlmGateway, options: PipelineOptions) -> Self {
        let registry = Arc::new(registry);
        let classifier = IntentClassifier::new(gateway.clone(), Arc::clone(&registry));
        let planner = ToolPlanner::new(gateway.clone(), Arc::clone(&registry));
        let executor = ToolExecutor::new(Arc::clone(&registry), options.tool_timeout)
            .with_mode(options.execution_mode);
        let synthesiser = ResponseSynthesiser::new(gateway)
            .with_history_window(options.history_window)
            .with_max_payload_chars(options.max_payload_chars);

        Self {
            registry,
            classifier: Arc::new(classifier),
            planner: Arc::new(planner),
            executor: Arc::new(executor),
            synthesiser: Arc::new(synthesiser),
        }
    }

    /// Build registry, gateway and pipeline settings from configuration.
    /// LLM calls are traced through the log.
    pub fn from_config(config: &PiataConfig, provider: Arc<dyn LlmProvider>) -> Result<Self> {
        let registry = ToolServerRegistry::from_config(config)?;
        let gateway =
            LlmGateway::from_config(&config.llm, provider).with_trace_sink(Arc::new(LogTraceSink));
        info!(
            provider = gateway.provider_name(),
            model = %gateway.settings().model,
            servers = registry.len(),
            "orchestrator ready"
        );
        Ok(Self::new(registry, gateway, PipelineOptions::from(config)))
    }

    pub fn registry(&self) -> &ToolServerRegistry {
        &self.registry
    }

    pub fn classifier(&self) -> &IntentClassifier {
        &self.classifier
    }

    /// Handle one request. Always returns a well-formed response: failures
    /// end up in the tool results or the reply text, and a panic anywhere in
    /// the pipeline yields the degraded response.
    pub async fn process_request(&self, utterance: &str, history: &[Message]) -> OrchestratorResponse {
        let span = info_span!(
            "request",
            request_id = %Uuid::new_v4(),
            stage = field::Empty,
        );

        async {
            if utterance.trim().is_empty() {
                return OrchestratorResponse::degraded(PiataError::EmptyUtterance);
            }

            match AssertUnwindSafe(self.run_pipeline(utterance, history))
                .catch_unwind()
                .await
            {
                Ok(response) => response,
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    error!(error = %message, "request pipeline panicked");
                    OrchestratorResponse::degraded(message)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// [`process_request`](Self::process_request) that stops when `token` fires.
    pub async fn process_request_cancellable(
        &self,
        utterance: &str,
        history: &[Message],
        token: &CancellationToken,
    ) -> Result<OrchestratorResponse> {
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                info!("request cancelled");
                Err(PiataError::Cancelled)
            }
            response = self.process_request(utterance, history) => Ok(response),
        }
    }

    async fn run_pipeline(&self, utterance: &str, history: &[Message]) -> OrchestratorResponse {
        let started = Instant::now();

        enter(Stage::Classifying);
        let intent = self.classifier.classify(utterance).await;

        enter(Stage::Planning);
        let calls = self.planner.plan(&intent, utterance).await;

        enter(Stage::Executing);
        let results = self.executor.execute(&calls).await;

        enter(Stage::Synthesising);
        let reply = self
            .synthesiser
            .synthesise(utterance, &intent, &results, history)
            .await;

        let response = OrchestratorResponse::new(reply, intent, results);
        enter(Stage::Done);
        info!(
            intent = %response.intent.as_ref().map(|i| i.intent_type.as_str()).unwrap_or("none"),
            calls = response.tool_results.len(),
            tools_used = response.tools_used.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "request handled"
        );
        response
    }
}

fn enter(stage: Stage) {
    Span::current().record("stage", stage.as_str());
    info!(stage = stage.as_str(), "stage");
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
