//! Conversation record storage
//!
//! Append-only, insertion-ordered turns with their derived keyword lists

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;

use crate::memory::keywords::extract_keywords;

/// Who produced a turn
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Assistant,
}

impl Speaker {
    /// Label used when a turn is rendered into a prompt
    pub fn label(&self) -> &'static str {
        match self {
            Speaker::User => "User",
            Speaker::Assistant => "LLM",
        }
    }
}

/// A single stored turn. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationTurn {
    pub sequence_id: u64,
    pub timestamp: DateTime<Utc>,
    pub speaker: Speaker,
    pub content: String,
    pub keywords: Vec<String>,
}

/// Ordered turn storage for one session
#[derive(Debug, Clone, Default)]
pub struct RecordStore {
    turns: VecDeque<ConversationTurn>,
    next_id: u64,
    /// Oldest turns are evicted beyond this count; `None` keeps everything
    capacity: Option<usize>,
}

impl RecordStore {
    /// Create an unbounded store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that keeps at most `capacity` turns. A limit of zero
    /// is treated as one, so the newest turn is always retained.
    pub fn with_capacity_limit(capacity: Option<usize>) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    /// Append a turn stamped with the current time
    pub fn add_record(&mut self, speaker: Speaker, content: impl Into<String>) -> &ConversationTurn {
        self.add_record_at(speaker, content, Utc::now())
    }

    /// Append a turn with an explicit timestamp
    pub fn add_record_at(
        &mut self,
        speaker: Speaker,
        content: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> &ConversationTurn {
        let content = content.into();
        self.next_id += 1;

        let turn = ConversationTurn {
            sequence_id: self.next_id,
            timestamp,
            speaker,
            keywords: extract_keywords(&content),
            content,
        };
        self.turns.push_back(turn);
        self.evict_overflow();

        &self.turns[self.turns.len() - 1]
    }

    fn evict_overflow(&mut self) {
        let Some(capacity) = self.capacity else {
            return;
        };

        while self.turns.len() > capacity.max(1) {
            if let Some(evicted) = self.turns.pop_front() {
                debug!(sequence_id = evicted.sequence_id, "Evicted oldest conversation turn");
            }
        }
    }

    /// All turns in insertion order
    pub fn all_records(
        &self,
    ) -> impl DoubleEndedIterator<Item = &ConversationTurn> + ExactSizeIterator {
        self.turns.iter()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_record_assigns_monotonic_ids() {
        let mut store = RecordStore::new();
        store.add_record(Speaker::User, "What is RSI?");
        store.add_record(Speaker::Assistant, "RSI is a momentum oscillator.");

        let ids: Vec<u64> = store.all_records().map(|t| t.sequence_id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_keywords_are_derived_on_insert() {
        let mut store = RecordStore::new();
        let turn = store.add_record(Speaker::User, "Explain the borrow checker");
        assert_eq!(turn.keywords, vec!["explain", "borrow", "checker"]);
        assert_eq!(turn.speaker, Speaker::User);
    }

    #[test]
    fn test_unbounded_by_default() {
        let mut store = RecordStore::new();
        for i in 0..500 {
            store.add_record(Speaker::User, format!("Question {}", i));
        }
        assert_eq!(store.len(), 500);
    }

    #[test]
    fn test_capacity_evicts_oldest_and_keeps_ids_monotonic() {
        let mut store = RecordStore::with_capacity_limit(Some(3));
        for i in 0..5 {
            store.add_record(Speaker::User, format!("Question {}", i));
        }

        let ids: Vec<u64> = store.all_records().map(|t| t.sequence_id).collect();
        assert_eq!(ids, vec![3, 4, 5]);
        assert_eq!(store.all_records().next().map(|t| t.content.as_str()), Some("Question 2"));
    }

    #[test]
    fn test_zero_capacity_keeps_newest_turn() {
        let mut store = RecordStore::with_capacity_limit(Some(0));
        store.add_record(Speaker::User, "first");
        let turn = store.add_record(Speaker::User, "second");
        assert_eq!(turn.sequence_id, 2);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_all_records_reverses_and_reports_len() {
        let mut store = RecordStore::new();
        store.add_record(Speaker::User, "first");
        store.add_record(Speaker::Assistant, "second");

        let records = store.all_records();
        assert_eq!(records.len(), 2);
        let newest_first: Vec<&str> = store.all_records().rev().map(|t| t.content.as_str()).collect();
        assert_eq!(newest_first, vec!["second", "first"]);
    }

    #[test]
    fn test_speaker_serialization() {
        let json = serde_json::to_string(&Speaker::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
        assert_eq!(Speaker::Assistant.label(), "LLM");
        assert_eq!(Speaker::User.label(), "User");
    }
}
