//! Short-Term Conversation Memory
//!
//! Supplies a chat agent with the prior turns most relevant to each new
//! request plus a compact, structured rolling summary:
//! - Keyword extraction and multi-factor relevance scoring over stored turns
//! - A structured summary regenerated by an external summarizer model
//! - Context assembly in a fixed order: instructions, summary, history, query
//! - A single-owner session task that applies model results as they arrive
//!
//! FLOW:
//! USER TURN → STORE → SEARCH → ASSEMBLE → CHAT MODEL → STORE → SUMMARIZE → REPLACE SUMMARY

pub mod api;
pub mod config;
pub mod error;
pub mod llm;
pub mod memory;
pub mod session;

pub use error::{MemoryError, Result};

// Re-export common types
pub use config::MemoryConfig;
pub use llm::{ChatMessage, ChatModel, ChatRole};
pub use memory::{Comparer, ContextAssembler, ConversationTurn, Speaker, SummaryState, SummaryUpdater};
pub use session::{Session, SessionHandle, SessionUpdate};
