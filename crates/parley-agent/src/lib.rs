//! Reasoning agent for Parley.
//!
//! Wraps a hosted language model, a fixed set of tools and the conversation
//! memory behind a single [`Reasoner::run`] entry point.

pub mod agent;
pub mod error;
pub mod gemini;
pub mod llm;
pub mod memory;
pub mod react;
pub mod tools;

pub use agent::{Agent, Reasoner, RetryPolicy, ITERATION_LIMIT_REPLY};
pub use error::{AgentError, AgentErrorKind};
pub use gemini::GeminiModel;
pub use llm::{LanguageModel, ModelMessage, ModelRequest, Role, ScriptedModel};
pub use memory::{ConversationMemory, Exchange};
pub use tools::{SearchTool, Tool, ToolRegistry};
