//! Structured conversation summary
//!
//! The summary is regenerated by an external summarizer after every exchange
//! and replaced as a whole; this type only holds and renders it.

use serde::{Deserialize, Serialize};

/// Placeholder core discussion before the first successful refresh
pub const EMPTY_CORE_DISCUSSION: &str = "empty";

/// Accumulated knowledge about the conversation.
///
/// Serialized field names are the JSON contract with the summarizer. Every
/// key is required when parsing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SummaryState {
    pub core_discussion: String,
    pub confirmed_needs: Vec<String>,
    pub constraints: Vec<String>,
    pub excluded_options: Vec<String>,
    pub key_data: Vec<String>,
    /// Newest first
    #[serde(rename = "current_conclusion")]
    pub current_conclusions: Vec<String>,
    pub pending_questions: Vec<String>,
    pub pending_discussion: Vec<String>,
}

impl Default for SummaryState {
    fn default() -> Self {
        Self {
            core_discussion: EMPTY_CORE_DISCUSSION.to_string(),
            confirmed_needs: Vec::new(),
            constraints: Vec::new(),
            excluded_options: Vec::new(),
            key_data: Vec::new(),
            current_conclusions: Vec::new(),
            pending_questions: Vec::new(),
            pending_discussion: Vec::new(),
        }
    }
}

impl SummaryState {
    fn sections(&self) -> [(&'static str, &'static str, &[String]); 7] {
        [
            ("Needs", "Confirmed needs", self.confirmed_needs.as_slice()),
            ("Constraints", "Constraints", self.constraints.as_slice()),
            ("Exclude", "Excluded options", self.excluded_options.as_slice()),
            ("Key Data", "Key data", self.key_data.as_slice()),
            ("Current", "Latest conclusions", self.current_conclusions.as_slice()),
            ("Pending Questions", "Open questions", self.pending_questions.as_slice()),
            ("Pending Discussions", "Earlier discussion", self.pending_discussion.as_slice()),
        ]
    }

    /// Render every field for a human reader. Section titles are always shown.
    pub fn format_for_display(&self) -> String {
        let mut content = String::new();
        content.push_str("Core\n");
        content.push_str(&self.core_discussion);
        content.push_str("\n\n");

        for (title, _, items) in self.sections() {
            content.push_str(title);
            content.push('\n');
            for item in items {
                content.push_str(&format!("• {}\n", item));
            }
            content.push('\n');
        }

        content
    }

    /// Render for a model prompt. Empty sections are omitted; the core
    /// discussion line is always present.
    pub fn format_for_model_context(&self) -> String {
        let mut context = String::new();
        context.push_str("=== Conversation Summary ===\n");
        context.push_str(&format!("Core discussion: {}\n", self.core_discussion));

        for (_, title, items) in self.sections() {
            if items.is_empty() {
                continue;
            }

            context.push_str(&format!("{}:\n", title));
            for item in items {
                context.push_str(&format!("- {}\n", item));
            }
        }

        context
    }

    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SummaryState {
        SummaryState {
            core_discussion: "Choosing an async runtime".to_string(),
            confirmed_needs: vec!["Low latency".to_string()],
            constraints: vec!["Linux only".to_string(), "No nightly".to_string()],
            excluded_options: vec!["async-std: unmaintained".to_string()],
            key_data: vec![],
            current_conclusions: vec!["Use tokio".to_string(), "Avoid blocking calls".to_string()],
            pending_questions: vec!["Which tokio features?".to_string()],
            pending_discussion: vec![],
        }
    }

    #[test]
    fn test_default_state() {
        let summary = SummaryState::default();
        assert_eq!(summary.core_discussion, EMPTY_CORE_DISCUSSION);
        assert!(summary.confirmed_needs.is_empty());
        assert!(summary.pending_discussion.is_empty());
    }

    #[test]
    fn test_display_shows_all_titles() {
        let rendered = SummaryState::default().format_for_display();
        for title in [
            "Core",
            "Needs",
            "Constraints",
            "Exclude",
            "Key Data",
            "Current",
            "Pending Questions",
            "Pending Discussions",
        ] {
            assert!(rendered.contains(title), "missing {}", title);
        }
        assert!(!rendered.contains('•'));
    }

    #[test]
    fn test_display_lists_items() {
        let rendered = sample().format_for_display();
        assert!(rendered.contains("• Linux only\n• No nightly\n"));
        assert!(rendered.contains("• Use tokio\n• Avoid blocking calls\n"));
    }

    #[test]
    fn test_model_context_omits_empty_sections() {
        let rendered = sample().format_for_model_context();
        assert!(rendered.contains("Core discussion: Choosing an async runtime\n"));
        assert!(rendered.contains("Constraints:\n- Linux only\n- No nightly\n"));
        assert!(!rendered.contains("Key data:"));
        assert!(!rendered.contains("Earlier discussion:"));

        let empty = SummaryState::default().format_for_model_context();
        assert_eq!(empty, "=== Conversation Summary ===\nCore discussion: empty\n");
    }

    #[test]
    fn test_rendering_is_pure() {
        let summary = sample();
        let before = summary.clone();
        let _ = summary.format_for_display();
        let _ = summary.format_for_model_context();
        assert_eq!(summary, before);
    }

    #[test]
    fn test_json_round_trip() {
        let summary = sample();
        let json = summary.to_json().unwrap();
        assert!(json.contains("\"current_conclusion\""));
        assert_eq!(SummaryState::from_json(&json).unwrap(), summary);
    }

    #[test]
    fn test_missing_field_is_rejected() {
        let json = r#"{"core_discussion": "x", "confirmed_needs": []}"#;
        assert!(SummaryState::from_json(json).is_err());
    }
}
