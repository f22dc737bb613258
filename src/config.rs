//! Runtime configuration
//!
//! Values come from the environment (a `.env` file is honoured) and from
//! plain text files looked up in the working directory first, then next to
//! the executable.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::MemoryError;
use crate::llm::openai::DEFAULT_BASE_URL;
use crate::memory::comparer::{DEFAULT_THRESHOLD, MAX_RELEVANT_TURNS};

pub const API_KEY_FILE: &str = "OPENAI_API_KEY";
pub const CONVERSATION_INSTRUCTION_FILE: &str = "INSTRUCTION_CONVERSATION";
pub const SUMMARY_INSTRUCTION_FILE: &str = "INSTRUCTION_SUMMARY";

/// Settings for the chat completion backend
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub api_key: String,
    pub base_url: String,
    /// Model answering the conversation
    pub chat_model: String,
    /// Smaller model producing summaries
    pub summary_model: String,
    pub timeout: Duration,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            chat_model: "gpt-4o".to_string(),
            summary_model: "gpt-4o-mini".to_string(),
            timeout: Duration::from_secs(120),
        }
    }
}

/// Configuration for one memory session
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    /// Minimum combined score for a turn to count as relevant
    pub threshold: f64,
    /// Relevant turns rendered into a request
    pub max_relevant: usize,
    /// Store capacity; `None` never evicts
    pub max_records: Option<usize>,
    pub conversation_instructions: String,
    pub summary_instructions: String,
    pub model: ModelConfig,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            max_relevant: MAX_RELEVANT_TURNS,
            max_records: None,
            conversation_instructions: String::new(),
            summary_instructions: String::new(),
            model: ModelConfig::default(),
        }
    }
}

impl MemoryConfig {
    /// Load configuration from `.env`, environment variables and instruction files
    pub fn from_env() -> crate::Result<Self> {
        dotenv::dotenv().ok();

        let defaults = Self::default();

        let api_key = env::var("OPENAI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .map(|key| key.trim().to_string())
            .or_else(|| read_text_file(API_KEY_FILE))
            .unwrap_or_default();

        if api_key.is_empty() {
            warn!("OPENAI_API_KEY not found in environment or key file");
        }

        let model = ModelConfig {
            api_key,
            base_url: env::var("OPENAI_BASE_URL").unwrap_or(defaults.model.base_url),
            chat_model: env::var("MEMORY_CHAT_MODEL").unwrap_or(defaults.model.chat_model),
            summary_model: env::var("MEMORY_SUMMARY_MODEL")
                .unwrap_or(defaults.model.summary_model),
            timeout: match env::var("MEMORY_TIMEOUT_SECS") {
                Ok(raw) => Duration::from_secs(parse_var("MEMORY_TIMEOUT_SECS", &raw)?),
                Err(_) => defaults.model.timeout,
            },
        };

        let threshold = match env::var("MEMORY_THRESHOLD") {
            Ok(raw) => parse_var("MEMORY_THRESHOLD", &raw)?,
            Err(_) => defaults.threshold,
        };

        let max_records = match env::var("MEMORY_MAX_RECORDS") {
            Ok(raw) => Some(parse_capacity(&raw)?),
            Err(_) => None,
        };

        Ok(Self {
            threshold,
            max_relevant: defaults.max_relevant,
            max_records,
            conversation_instructions: read_text_file(CONVERSATION_INSTRUCTION_FILE)
                .unwrap_or_default(),
            summary_instructions: read_text_file(SUMMARY_INSTRUCTION_FILE).unwrap_or_default(),
            model,
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, raw: &str) -> crate::Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| MemoryError::ConfigError(format!("Invalid {}={:?}: {}", name, raw, e)))
}

/// Record limit from `MEMORY_MAX_RECORDS`; zero is rejected
fn parse_capacity(raw: &str) -> crate::Result<usize> {
    match parse_var("MEMORY_MAX_RECORDS", raw)? {
        0 => Err(MemoryError::ConfigError(
            "MEMORY_MAX_RECORDS must be at least 1".to_string(),
        )),
        capacity => Ok(capacity),
    }
}

/// Trimmed contents of `name` from the working directory, else from the
/// executable's directory.
pub fn read_text_file(name: &str) -> Option<String> {
    candidate_paths(name)
        .into_iter()
        .find_map(|path| read_trimmed(&path))
}

fn candidate_paths(name: &str) -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(name)];

    if let Some(exec_dir) = env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        paths.push(exec_dir.join(name));
    }

    paths
}

fn read_trimmed(path: &Path) -> Option<String> {
    match std::fs::read_to_string(path) {
        Ok(data) => {
            debug!(path = %path.display(), "Loaded configuration file");
            Some(data.trim().to_string())
        }
        Err(_) => None,
    }
}
