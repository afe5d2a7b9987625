//! Text processing helpers shared by the embedder and the summarizers

use std::borrow::Cow;

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref WHITESPACE_REGEX: Regex = Regex::new(r"\s+").unwrap();
    static ref STOP_WORDS: Vec<&'static str> = vec![
        "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for",
        "of", "with", "by", "is", "am", "are", "was", "were", "be", "been",
        "being", "have", "has", "had", "do", "does", "did", "will", "would",
        "shall", "should", "may", "might", "must", "can", "could", "i", "you",
        "he", "she", "it", "we", "they", "me", "him", "her", "us", "them",
        "my", "your", "his", "its", "our", "their", "mine", "yours", "hers",
        "ours", "theirs", "this", "that", "these", "those", "as", "so", "if",
    ];
}

pub struct TextUtils;

impl TextUtils {
    /// Lower-cased alphanumeric runs; everything else separates tokens.
    pub fn tokenize(text: &str) -> Vec<String> {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
            .collect()
    }

    /// Tokens minus stop words; used for term weighting.
    pub fn content_terms(text: &str) -> Vec<String> {
        Self::tokenize(text)
            .into_iter()
            .filter(|t| !Self::is_stop_word(t))
            .collect()
    }

    /// Splits on the `". "` boundary the summarizers work with, dropping
    /// empty fragments and a trailing period on the last sentence.
    pub fn split_sentences(text: &str) -> Vec<String> {
        let normalized = Self::normalize_whitespace(text);
        normalized
            .split(". ")
            .map(|s| s.trim().trim_end_matches('.').trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn normalize_whitespace(text: &str) -> Cow<'_, str> {
        if WHITESPACE_REGEX.is_match(text) {
            Cow::Owned(WHITESPACE_REGEX.replace_all(text, " ").trim().to_string())
        } else {
            Cow::Borrowed(text)
        }
    }

    pub fn count_words(text: &str) -> usize {
        text.split_whitespace().count()
    }

    /// Truncates on a char boundary, appending `...` when shortened.
    pub fn truncate_with_ellipsis(text: &str, max_chars: usize) -> Cow<'_, str> {
        if text.chars().count() <= max_chars {
            return Cow::Borrowed(text);
        }
        if max_chars <= 3 {
            return Cow::Borrowed("...");
        }
        let mut result: String = text.chars().take(max_chars - 3).collect();
        result.push_str("...");
        Cow::Owned(result)
    }

    pub fn is_stop_word(word: &str) -> bool {
        STOP_WORDS.contains(&word.to_lowercase().as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_strips_punctuation_and_case() {
        assert_eq!(
            TextUtils::tokenize("What's your JOB?  (engineer)"),
            vec!["what", "s", "your", "job", "engineer"]
        );
        assert!(TextUtils::tokenize("  ...  ").is_empty());
    }

    #[test]
    fn test_content_terms_drop_stop_words() {
        assert_eq!(TextUtils::content_terms("I work as an engineer"), vec!["work", "engineer"]);
    }

    #[test]
    fn test_split_sentences() {
        let sentences = TextUtils::split_sentences("First one. Second\n one.  Third.");
        assert_eq!(sentences, vec!["First one", "Second one", "Third"]);
        assert!(TextUtils::split_sentences("   ").is_empty());
    }

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(TextUtils::normalize_whitespace("a  b\n\tc "), "a b c");
    }

    #[test]
    fn test_truncate_is_char_safe() {
        assert_eq!(TextUtils::truncate_with_ellipsis("short", 10), "short");
        assert_eq!(TextUtils::truncate_with_ellipsis("héllo wörld", 8), "héllo...");
        assert_eq!(TextUtils::truncate_with_ellipsis("abcdef", 2), "...");
    }

    #[test]
    fn test_count_words() {
        assert_eq!(TextUtils::count_words(""), 0);
        assert_eq!(TextUtils::count_words(" one two  three "), 3);
    }
}
