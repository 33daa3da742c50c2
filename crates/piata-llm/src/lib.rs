//! # piata-llm
//!
//! LLM access for the orchestrator. A provider trait with an
//! OpenAI-compatible and a mock implementation, and a gateway that turns
//! prompts into plain text or typed, schema-constrained values.

pub mod gateway;
pub mod mock;
pub mod openai;
pub mod provider;
pub mod structured;
pub mod trace;

pub use gateway::{GatewaySettings, LlmGateway, Prompt};
pub use mock::MockProvider;
pub use openai::OpenAiProvider;
pub use provider::{LlmProvider, LlmRequest, LlmResponse, ResponseFormat, StopReason, Usage};
pub use trace::{LlmTrace, LogTraceSink, MemoryTraceSink, NoopTraceSink, TraceOutcome, TraceSink};
