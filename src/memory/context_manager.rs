//! Request context assembly
//!
//! Builds the message list for a chat request. Order is fixed: instructions,
//! summary, retrieved history, then the live query.

use chrono::Local;
use tracing::debug;

use crate::llm::{estimate_request_tokens, ChatMessage};
use crate::memory::comparer::{Comparer, MAX_RELEVANT_TURNS};
use crate::memory::store::ConversationTurn;
use crate::memory::summary::SummaryState;

/// Assembles chat requests from instructions, summary and relevant history
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    instructions: String,
    max_relevant: usize,
}

/// Messages for one request plus a rough size estimate
#[derive(Debug, Clone)]
pub struct AssembledContext {
    pub messages: Vec<ChatMessage>,
    /// Number of retrieved turns included
    pub relevant_count: usize,
    pub token_estimate: usize,
}

impl ContextAssembler {
    pub fn new(instructions: impl Into<String>, max_relevant: usize) -> Self {
        Self {
            instructions: instructions.into(),
            max_relevant,
        }
    }

    /// Environment metadata followed by the conversation instructions
    pub fn system_prompt(&self) -> String {
        format!(
            "=== System Information ===\n\
             Current time: {}\n\
             Runtime environment: {}/{}\n\
             \n\
             === Instructions ===\n\
             {}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            std::env::consts::OS,
            std::env::consts::ARCH,
            self.instructions,
        )
        .trim()
        .to_string()
    }

    /// Build the ordered messages for `query`
    pub fn build(&self, summary: &SummaryState, comparer: &Comparer, query: &str) -> AssembledContext {
        let mut messages = vec![
            ChatMessage::system(self.system_prompt()),
            ChatMessage::system(summary.format_for_model_context().trim()),
        ];

        let relevant: Vec<&ConversationTurn> = comparer
            .search(query)
            .into_iter()
            .take(self.max_relevant)
            .collect();
        let relevant_count = relevant.len().min(MAX_RELEVANT_TURNS);
        let relevant_context = Comparer::format_relevant(&relevant);
        let relevant_context = relevant_context.trim();

        if !relevant_context.is_empty() {
            messages.push(ChatMessage::system(relevant_context));
        }

        messages.push(ChatMessage::user(query));

        let token_estimate = estimate_request_tokens(&messages);
        debug!(relevant_count, token_estimate, "Assembled request context");

        AssembledContext {
            messages,
            relevant_count,
            token_estimate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ChatRole;
    use crate::memory::store::Speaker;

    #[test]
    fn test_system_prompt_contains_metadata() {
        let assembler = ContextAssembler::new("Answer in English.", 5);
        let prompt = assembler.system_prompt();

        assert!(prompt.starts_with("=== System Information ==="));
        assert!(prompt.contains(std::env::consts::OS));
        assert!(prompt.ends_with("Answer in English."));
    }

    #[test]
    fn test_build_without_history() {
        let assembler = ContextAssembler::new("", 5);
        let context = assembler.build(&SummaryState::default(), &Comparer::default(), "Hello there");

        let roles: Vec<ChatRole> = context.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![ChatRole::System, ChatRole::System, ChatRole::User]);
        assert_eq!(context.relevant_count, 0);
        assert_eq!(context.messages[2].content, "Hello there");
        assert!(context.messages[1].content.contains("Core discussion: empty"));
        assert!(context.token_estimate > 0);
    }

    #[test]
    fn test_build_orders_relevant_history_before_query() {
        let mut comparer = Comparer::default();
        comparer.add_record(Speaker::User, "What is Rust's ownership model?");
        comparer.add_record(Speaker::Assistant, "Ownership tracks single-owner memory.");

        let assembler = ContextAssembler::new("Be brief.", 5);
        let context = assembler.build(&SummaryState::default(), &comparer, "Explain ownership");

        assert_eq!(context.messages.len(), 4);
        assert_eq!(context.relevant_count, 2);
        assert!(context.messages[0].content.contains("Be brief."));
        assert!(context.messages[1].content.starts_with("=== Conversation Summary ==="));
        assert_eq!(context.messages[2].role, ChatRole::System);
        assert!(context.messages[2].content.contains("LLM: Ownership tracks single-owner memory."));
        assert_eq!(context.messages[3], ChatMessage::user("Explain ownership"));
    }

    #[test]
    fn test_build_caps_relevant_turns() {
        let mut comparer = Comparer::default();
        for i in 0..10 {
            comparer.add_record(Speaker::User, format!("tokio runtime question {}", i));
        }

        let assembler = ContextAssembler::new("", 3);
        let context = assembler.build(&SummaryState::default(), &comparer, "tokio runtime");

        assert_eq!(context.relevant_count, 3);
        let history = &context.messages[2].content;
        assert_eq!(history.lines().filter(|l| l.starts_with("User:")).count(), 3);
    }
}
