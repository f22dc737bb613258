//! Relevance retrieval
//!
//! Scores every stored turn against a query and keeps the ones that clear
//! the threshold:
//!
//! `score = 0.4 * keyword + 0.4 * semantic + 0.2 * time`
//!
//! Scores are recomputed in full on each search; there is no index.

use chrono::{DateTime, Utc};

use crate::memory::keywords::extract_keywords;
use crate::memory::store::{ConversationTurn, RecordStore, Speaker};

pub const DEFAULT_THRESHOLD: f64 = 0.3;

/// Maximum number of turns rendered by [`Comparer::format_relevant`]
pub const MAX_RELEVANT_TURNS: usize = 5;

const KEYWORD_WEIGHT: f64 = 0.4;
const SEMANTIC_WEIGHT: f64 = 0.4;
const TIME_WEIGHT: f64 = 0.2;

/// Hours over which the recency score decays linearly
const DECAY_WINDOW_HOURS: f64 = 24.0;
/// Total recency score lost over the decay window
const DECAY_SPAN: f64 = 0.3;
/// Recency score for anything older than the decay window
const DECAY_FLOOR: f64 = 0.7;

/// A turn paired with its score for one search call
#[derive(Debug, Clone, Copy)]
pub struct ScoredTurn<'a> {
    pub turn: &'a ConversationTurn,
    pub score: f64,
}

/// Owns the record store and answers relevance queries over it
#[derive(Debug, Clone)]
pub struct Comparer {
    store: RecordStore,
    threshold: f64,
}

impl Comparer {
    pub fn new(threshold: f64) -> Self {
        Self::with_store(RecordStore::new(), threshold)
    }

    pub fn with_store(store: RecordStore, threshold: f64) -> Self {
        Self { store, threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Append a turn to the underlying store
    pub fn add_record(&mut self, speaker: Speaker, content: impl Into<String>) -> &ConversationTurn {
        self.store.add_record(speaker, content)
    }

    /// Relevant turns for `query`, best first
    pub fn search(&self, query: &str) -> Vec<&ConversationTurn> {
        self.search_scored(query, Utc::now())
            .into_iter()
            .map(|scored| scored.turn)
            .collect()
    }

    /// Score every turn against `query` as of `now`, drop those under the
    /// threshold and sort the rest by descending score.
    ///
    /// Order among equal scores is not part of the contract.
    pub fn search_scored(&self, query: &str, now: DateTime<Utc>) -> Vec<ScoredTurn<'_>> {
        if self.store.is_empty() {
            return Vec::new();
        }

        let query_keywords = extract_keywords(query);

        let mut results: Vec<ScoredTurn<'_>> = self
            .store
            .all_records()
            .map(|turn| ScoredTurn {
                turn,
                score: score(&query_keywords, query, turn, now),
            })
            .filter(|scored| scored.score >= self.threshold)
            .collect();

        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results
    }

    /// Render up to [`MAX_RELEVANT_TURNS`] turns, in the given order, for a prompt.
    ///
    /// Returns an empty string when there is nothing to render.
    pub fn format_relevant(turns: &[&ConversationTurn]) -> String {
        if turns.is_empty() {
            return String::new();
        }

        let mut context = String::new();
        context.push_str("=== Relevant Conversation History ===\n");

        for turn in turns.iter().take(MAX_RELEVANT_TURNS) {
            context.push_str(&format!("{}: {}\n", turn.speaker.label(), turn.content));
        }

        context.push('\n');
        context
    }
}

impl Default for Comparer {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

/// Combined relevance of `turn` for a query
pub fn score(
    query_keywords: &[String],
    query: &str,
    turn: &ConversationTurn,
    now: DateTime<Utc>,
) -> f64 {
    let keyword = keyword_score(query_keywords, &turn.keywords);
    let semantic = semantic_score(query, &turn.content);
    let time = time_score(turn.timestamp, now);

    keyword * KEYWORD_WEIGHT + semantic * SEMANTIC_WEIGHT + time * TIME_WEIGHT
}

/// Keyword overlap: matches over the union of both lists.
///
/// A query keyword matches when it is a substring of any turn keyword or the
/// other way round; each query keyword counts at most once. Several query
/// keywords can hit the same turn keyword, so the ratio is capped at 1.0.
pub fn keyword_score(query_keywords: &[String], turn_keywords: &[String]) -> f64 {
    if query_keywords.is_empty() || turn_keywords.is_empty() {
        return 0.0;
    }

    let matches = query_keywords
        .iter()
        .filter(|qk| {
            let qk = qk.to_lowercase();
            turn_keywords.iter().any(|tk| {
                let tk = tk.to_lowercase();
                qk.contains(&tk) || tk.contains(&qk)
            })
        })
        .count();

    let union = query_keywords.len() + turn_keywords.len() - matches;
    if union == 0 {
        return 0.0;
    }

    (matches as f64 / union as f64).min(1.0)
}

/// Lexical overlap of raw lower-cased words, normalised like a cosine over
/// binary presence. Words are not deduplicated.
pub fn semantic_score(query: &str, content: &str) -> f64 {
    let query = query.to_lowercase();
    let content = content.to_lowercase();
    let query_words: Vec<&str> = query.split_whitespace().collect();
    let content_words: Vec<&str> = content.split_whitespace().collect();

    if query_words.is_empty() || content_words.is_empty() {
        return 0.0;
    }

    let count = query_words
        .iter()
        .filter(|qw| content_words.contains(*qw))
        .count();

    count as f64 / ((query_words.len() * content_words.len()) as f64).sqrt()
}

/// Recency: 1.0 for a fresh turn, linear down to 0.7 at 24 hours, flat after.
pub fn time_score(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let hours = (now - timestamp).num_milliseconds() as f64 / 3_600_000.0;
    time_score_for_hours(hours.max(0.0))
}

pub fn time_score_for_hours(hours: f64) -> f64 {
    if hours <= DECAY_WINDOW_HOURS {
        return 1.0 - (hours * DECAY_SPAN / DECAY_WINDOW_HOURS);
    }

    DECAY_FLOOR
}
