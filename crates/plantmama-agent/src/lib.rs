//! Tool-calling plant care agent for PlantMama.
//!
//! The agent talks to an OpenAI-compatible chat completions endpoint, offers
//! the model a set of plant care tools and persists every conversation in the
//! JSON store.
//!
//! # Core Types
//!
//! - [`PlantAssistant`]: what the bot calls for text and photos
//! - [`PlantCareAgent`]: the implementation with the tool loop
//! - [`ChatClient`]: HTTP client for chat completions
//! - [`ModelConfig`]: model, temperature, token budget
//! - [`ToolDefinition`], [`ToolCall`], [`ToolResult`]: tool plumbing
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use plantmama_agent::{PlantAssistant, PlantCareAgent, UserRef};
//!
//! let agent = PlantCareAgent::new(&settings, Arc::new(store))?;
//! let reply = agent
//!     .process_message("Why are my monstera leaves yellow?", &UserRef::new(42), None, None)
//!     .await;
//! ```

pub mod agent;
pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod tool;
pub mod tools;

pub use agent::{PlantAssistant, PlantCareAgent, ERROR_REPLY, FALLBACK_REPLY, SYSTEM_PROMPT};
pub use client::{ChatClient, ChatMessage, ChatResponse, ChatTool, ChatToolCall};
pub use config::ModelConfig;
pub use context::{AttachedImage, ToolContext, UserRef};
pub use error::{AgentError, Result};
pub use tool::{ToolCall, ToolDefinition, ToolResult};
