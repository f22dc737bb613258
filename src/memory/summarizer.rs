//! Summary refresh
//!
//! Sends the current summary plus the newest exchange to a summarizer model
//! and installs the structure it returns. Refreshes fail soft: any problem
//! leaves the previous summary in place.

use std::sync::Arc;
use tracing::{info, warn};

use crate::error::MemoryError;
use crate::llm::{ChatMessage, ChatModel};
use crate::memory::summary::SummaryState;

const SUMMARIZER_ROLE: &str = "You are a professional conversation summary assistant. \
Extract and update the summary from the conversation content and always answer in JSON.";

const SUMMARY_SCHEMA: &str = r#"{
  "core_discussion": "The core topic currently under discussion",
  "confirmed_needs": ["Accumulate and keep every confirmed need"],
  "constraints": ["Accumulate and keep every constraint"],
  "excluded_options": ["Excluded option: reason (watch closely for the user ruling something out)"],
  "key_data": ["Accumulate and keep all important data and facts"],
  "current_conclusion": ["All conclusions in chronological order, newest first"],
  "pending_questions": ["Open questions about the current topic"],
  "pending_discussion": ["All important earlier discussion points, including previous topics"]
}"#;

/// How a refresh ended
#[derive(Debug)]
pub enum RefreshStatus {
    /// The summarizer produced a valid summary
    Updated,
    /// The reply could not be parsed; the previous summary is kept
    Malformed,
    /// The summarizer call failed; the previous summary is kept
    Failed(MemoryError),
}

/// Result of one refresh: the summary to install and how it was obtained
#[derive(Debug)]
pub struct SummaryRefresh {
    pub summary: SummaryState,
    pub status: RefreshStatus,
}

impl SummaryRefresh {
    pub fn is_updated(&self) -> bool {
        matches!(self.status, RefreshStatus::Updated)
    }

    /// Error worth showing to the user, if any
    pub fn error(&self) -> Option<&MemoryError> {
        match &self.status {
            RefreshStatus::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// Regenerates the conversation summary through an external model
pub struct SummaryUpdater {
    model: Arc<dyn ChatModel>,
    instructions: String,
}

impl SummaryUpdater {
    pub fn new(model: Arc<dyn ChatModel>, instructions: impl Into<String>) -> Self {
        Self {
            model,
            instructions: instructions.into(),
        }
    }

    /// Messages sent to the summarizer for one refresh
    pub fn build_messages(
        &self,
        current: &SummaryState,
        user_turn: &str,
        assistant_turn: &str,
    ) -> Vec<ChatMessage> {
        let prompt = format!(
            r#"Update the conversation summary with the information below and keep the JSON format:

Current summary:
{}

New exchange:
User question: {}
Assistant reply: {}

{}

Required JSON format:
{}

Return only the JSON, with no other explanation.

Updated summary:"#,
            current.format_for_model_context(),
            user_turn,
            assistant_turn,
            self.instructions,
            SUMMARY_SCHEMA,
        );

        vec![ChatMessage::system(SUMMARIZER_ROLE), ChatMessage::user(prompt)]
    }

    /// Produce the next summary.
    ///
    /// Never returns an error: on failure the returned summary is `current`
    /// unchanged and the status says why.
    pub async fn refresh(
        &self,
        current: &SummaryState,
        user_turn: &str,
        assistant_turn: &str,
    ) -> SummaryRefresh {
        let messages = self.build_messages(current, user_turn, assistant_turn);

        let response = match self.model.ask(&messages).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Summary refresh failed, keeping previous summary: {}", e);
                return SummaryRefresh {
                    summary: current.clone(),
                    status: RefreshStatus::Failed(e),
                };
            }
        };

        match parse_summary(&response) {
            Ok(summary) => {
                info!(core = %summary.core_discussion, "Summary refreshed");
                SummaryRefresh {
                    summary,
                    status: RefreshStatus::Updated,
                }
            }
            Err(e) => {
                warn!("Discarding malformed summary: {}", e);
                SummaryRefresh {
                    summary: current.clone(),
                    status: RefreshStatus::Malformed,
                }
            }
        }
    }
}

/// Remove a surrounding Markdown code fence (```json or ```)
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let without_close = without_open.strip_suffix("```").unwrap_or(without_open);

    without_close.trim()
}

/// Parse a summarizer reply into a summary
pub fn parse_summary(response: &str) -> crate::Result<SummaryState> {
    SummaryState::from_json(strip_code_fence(response))
        .map_err(|e| MemoryError::InvalidSummary(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedModel;

    const VALID: &str = r#"{
        "core_discussion": "Rust ownership",
        "confirmed_needs": ["Understand moves"],
        "constraints": [],
        "excluded_options": ["Garbage collection: not available"],
        "key_data": ["Each value has one owner"],
        "current_conclusion": ["Borrowing avoids moves"],
        "pending_questions": ["How do lifetimes interact?"],
        "pending_discussion": []
    }"#;

    fn previous() -> SummaryState {
        SummaryState {
            core_discussion: "Async runtimes".to_string(),
            key_data: vec!["tokio is multi-threaded".to_string()],
            ..SummaryState::default()
        }
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("  {}  "), "{}");
    }

    #[test]
    fn test_fenced_and_plain_parse_identically() {
        let fenced = format!("```json\n{}\n```", VALID);
        assert_eq!(parse_summary(&fenced).unwrap(), parse_summary(VALID).unwrap());
    }

    #[test]
    fn test_build_messages() {
        let updater = SummaryUpdater::new(Arc::new(ScriptedModel::new()), "Keep it short");
        let messages = updater.build_messages(&previous(), "What is tokio?", "An async runtime.");

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], ChatMessage::system(SUMMARIZER_ROLE));
        let prompt = &messages[1].content;
        assert!(prompt.contains("Core discussion: Async runtimes"));
        assert!(prompt.contains("User question: What is tokio?"));
        assert!(prompt.contains("Assistant reply: An async runtime."));
        assert!(prompt.contains("Keep it short"));
        assert!(prompt.contains("\"current_conclusion\""));
    }

    #[tokio::test]
    async fn test_refresh_installs_valid_summary() {
        let model = Arc::new(ScriptedModel::new().reply(format!("```json\n{}\n```", VALID)));
        let updater = SummaryUpdater::new(model, "");

        let refresh = updater.refresh(&previous(), "q", "a").await;
        assert!(refresh.is_updated());
        assert_eq!(refresh.summary.core_discussion, "Rust ownership");
        // replaced wholesale, nothing merged from the previous state
        assert!(!refresh.summary.key_data.contains(&"tokio is multi-threaded".to_string()));
    }

    #[tokio::test]
    async fn test_refresh_keeps_previous_on_malformed_json() {
        let model = Arc::new(ScriptedModel::new().reply(r#"{"core_discussion": "trunc"#));
        let updater = SummaryUpdater::new(model, "");

        let refresh = updater.refresh(&previous(), "q", "a").await;
        assert!(matches!(refresh.status, RefreshStatus::Malformed));
        assert!(refresh.error().is_none());
        assert_eq!(refresh.summary, previous());
    }

    #[tokio::test]
    async fn test_refresh_keeps_previous_on_model_failure() {
        let model = Arc::new(ScriptedModel::new().fail("rate limited"));
        let updater = SummaryUpdater::new(model, "");

        let refresh = updater.refresh(&previous(), "q", "a").await;
        assert_eq!(refresh.summary, previous());
        assert!(refresh.error().unwrap().to_string().contains("rate limited"));
    }

    #[test]
    fn test_refresh_blocking() {
        let model = Arc::new(ScriptedModel::new().reply("not json at all"));
        let updater = SummaryUpdater::new(model, "");

        let refresh = tokio_test::block_on(updater.refresh(&previous(), "q", "a"));
        assert_eq!(refresh.summary, previous());
    }
}
