//! # piata-orchestrator
//!
//! The request pipeline behind the Piata.ro assistant. Turns one user
//! utterance into tool calls against the marketplace tool-servers and a
//! natural-language reply.
//!
//! ## Architecture
//!
//! ```text
//!              ┌──────────────┐
//!              │ Orchestrator │  ← utterance + history
//!              │              │
//!              │ 1. Classify  │  ← intent (LLM, keyword fallback)
//!              │ 2. Plan      │  ← tool calls (LLM, generic fallback)
//!              │ 3. Execute   │  ← POST {base_url}/call per call
//!              │ 4. Synthesise│  ← reply (LLM, apology fallback)
//!              └──────────────┘
//!                     │
//!         ┌───────────┼───────────┐
//!         ▼           ▼           ▼
//!    ┌─────────┐ ┌─────────┐ ┌─────────┐
//!    │  LLM    │ │ Server  │ │  Tool   │
//!    │ Gateway │ │ Registry│ │ Servers │
//!    └─────────┘ └─────────┘ └─────────┘
//! ```
//!
//! Every stage degrades instead of failing, so [`Orchestrator::process_request`]
//! always returns a response.

pub mod classifier;
pub mod executor;
pub mod orchestrator;
pub mod planner;
pub mod registry;
pub mod synthesiser;

pub use classifier::{IntentClassifier, IntentDraft, keyword_intent};
pub use executor::{ExecutionMode, McpRequest, ToolExecutor};
pub use orchestrator::{Orchestrator, PipelineOptions, Stage};
pub use planner::{PlanDraft, PlannedCall, ToolPlanner};
pub use registry::ToolServerRegistry;
pub use synthesiser::{ResponseSynthesiser, apology};
