//! # piata-cli
//!
//! Command-line host for the Piata orchestrator.
//!
//! ## Commands
//!
//! - `piata chat`: Interactive chat, persisted to the configured store
//! - `piata ask`: Answer a single request
//! - `piata classify`: Show how a request would be routed
//! - `piata servers`: List tool-servers, optionally probing their health
//! - `piata config`: Show the effective configuration
//! - `piata version`: Show version and build info

pub mod commands;
pub mod service;

pub use commands::Cli;
pub use service::{ChatService, ChatTurn};
