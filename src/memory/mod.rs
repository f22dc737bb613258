//! Short-term conversation memory
//!
//! Keeps every turn of the session, retrieves the ones relevant to a new
//! query, and maintains a structured rolling summary.

pub mod comparer;
pub mod context_manager;
pub mod keywords;
pub mod store;
pub mod summarizer;
pub mod summary;

pub use comparer::{Comparer, ScoredTurn};
pub use context_manager::{AssembledContext, ContextAssembler};
pub use keywords::extract_keywords;
pub use store::{ConversationTurn, RecordStore, Speaker};
pub use summarizer::{RefreshStatus, SummaryRefresh, SummaryUpdater};
pub use summary::SummaryState;
