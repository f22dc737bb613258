//! Keyword extraction
//!
//! Splits text on whitespace, lower-cases, strips edge punctuation and drops
//! stop words and very short tokens.

/// Punctuation trimmed from both ends of every token
const EDGE_PUNCTUATION: &[char] = &[
    '.', ',', '!', '?', ';', ':', '(', ')', '[', ']', '{', '}', '"', '\'',
];

/// Chinese and English function words that carry no topical signal
const STOP_WORDS: &[&str] = &[
    "的", "是", "在", "有", "和", "與", "或", "但", "這", "那", "我", "你", "他", "她", "它",
    "了", "嗎", "呢", "啊", "吧", "the", "is", "at", "which", "on", "and", "or", "but",
    "this", "that", "i", "you", "he", "she", "it",
];

/// Minimum token length, in bytes of UTF-8
const MIN_KEYWORD_LEN: usize = 2;

fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(&word)
}

/// Extract the keyword list of a text.
///
/// Output order follows the input; duplicates are kept.
pub fn extract_keywords(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(|word| word.trim_matches(EDGE_PUNCTUATION))
        .filter(|word| word.len() >= MIN_KEYWORD_LEN && !is_stop_word(word))
        .map(str::to_string)
        .collect()
}
