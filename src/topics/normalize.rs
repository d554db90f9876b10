// Text normalization — turns raw post/comment text into clustering input.
//
// Every step is a total function over strings: there is no input that makes
// normalization fail. Empty input yields empty output.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex_lite::Regex;
use stop_words::{get, LANGUAGE};

/// Filler and conversational tokens common in discussion threads that the
/// standard English list doesn't cover.
pub const DOMAIN_STOP_WORDS: &[&str] = &[
    "actually", "also", "anyone", "anything", "anyway", "basically", "cant",
    "could", "didnt", "does", "doesnt", "dont", "edit", "etc", "even", "ever",
    "everyone", "get", "gets", "getting", "going", "gonna", "got", "guys",
    "hey", "ive", "just", "know", "like", "lol", "lot", "maybe", "much",
    "need", "one", "pretty", "probably", "really", "say", "someone",
    "something", "still", "sure", "thanks", "thank", "thats", "theres",
    "thing", "things", "think", "tldr", "trying", "use", "used", "using",
    "want", "way", "well", "what", "whats", "wont", "would", "yeah", "yes",
    "youre",
];

/// Tokens of this many characters or fewer are dropped.
pub const MAX_SHORT_TOKEN_LEN: usize = 2;

static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:[a-z][a-z0-9+.\-]*://|www\.)\S*").expect("valid URL pattern")
});

static DEFAULT_NORMALIZER: LazyLock<TextNormalizer> = LazyLock::new(TextNormalizer::default);

/// Lower-cases, strips URLs/punctuation/digits, and removes stop words.
#[derive(Debug, Clone)]
pub struct TextNormalizer {
    stop_words: HashSet<String>,
}

impl Default for TextNormalizer {
    /// Standard English stop words plus [`DOMAIN_STOP_WORDS`].
    fn default() -> Self {
        let mut stop_words: HashSet<String> = get(LANGUAGE::English).into_iter().collect();
        stop_words.extend(DOMAIN_STOP_WORDS.iter().map(|w| w.to_string()));
        Self { stop_words }
    }
}

impl TextNormalizer {
    /// Build a normalizer with an explicit stop-word set.
    pub fn with_stop_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            stop_words: words.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_stop_word(&self, token: &str) -> bool {
        self.stop_words.contains(token)
    }

    /// Normalize a raw string into space-separated content tokens.
    pub fn normalize(&self, text: &str) -> String {
        self.tokens(text).join(" ")
    }

    /// The content tokens of `text`, in order.
    pub fn tokens(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        let without_urls = URL_RE.replace_all(&lowered, " ");

        // "fine-tuning" becomes "finetuning": punctuation is deleted, not spaced
        let stripped: String = without_urls
            .chars()
            .filter(|c| c.is_alphanumeric() || c.is_whitespace())
            .collect();

        stripped
            .split_whitespace()
            .filter(|token| !token.chars().all(char::is_numeric))
            .filter(|token| token.chars().count() > MAX_SHORT_TOKEN_LEN)
            .filter(|token| !self.stop_words.contains(*token))
            .map(str::to_string)
            .collect()
    }
}

/// Normalize with the default stop-word set.
pub fn normalize_text(text: &str) -> String {
    DEFAULT_NORMALIZER.normalize(text)
}

/// Number of space-separated tokens in an already-normalized string.
pub fn token_count(normalized: &str) -> usize {
    normalized.split_whitespace().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowercases_and_strips_punctuation() {
        assert_eq!(
            normalize_text("Fine-Tuning LLaMA: LoRA & QLoRA!"),
            "finetuning llama lora qlora"
        );
    }

    #[test]
    fn test_removes_urls() {
        assert_eq!(
            normalize_text("Benchmarks https://example.com/a?b=1 and www.gpu.org/x vram"),
            "benchmarks vram"
        );
    }

    #[test]
    fn test_removes_standalone_digits_but_keeps_alphanumerics() {
        assert_eq!(normalize_text("4090 gpu 3090ti vram 2024"), "gpu 3090ti vram");
    }

    #[test]
    fn test_drops_short_and_stop_words() {
        assert_eq!(normalize_text("I think it is a GPU overheating lol"), "gpu overheating");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(normalize_text(""), "");
        assert_eq!(normalize_text("   \n\t "), "");
        assert_eq!(normalize_text("!!! ??? 123"), "");
    }

    #[test]
    fn test_custom_stop_words() {
        let normalizer = TextNormalizer::with_stop_words(["gpu"]);
        assert_eq!(normalizer.normalize("the gpu melted"), "the melted");
        assert!(normalizer.is_stop_word("gpu"));
    }

    #[test]
    fn test_token_count() {
        assert_eq!(token_count("finetuning llama lora"), 3);
        assert_eq!(token_count(""), 0);
    }
}
