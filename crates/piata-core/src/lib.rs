//! # piata-core
//!
//! Core types, traits, and primitives for the Piata MCP orchestrator.
//! This crate defines the shared vocabulary used by every other crate in the workspace.

pub mod conversation;
pub mod error;
pub mod intent;
pub mod message;
pub mod response;
pub mod tool;

pub use conversation::{Conversation, ConversationId, ConversationStore};
pub use error::{PiataError, Result};
pub use intent::{IntentType, RequestIntent};
pub use message::{Message, Role};
pub use response::OrchestratorResponse;
pub use tool::{ServerKind, ToolCall, ToolDescriptor, ToolOutcome, ToolResult, ToolServer, tool_ref};
