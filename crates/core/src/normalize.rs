//! Cleanup of detected token text before it is placed on a page.

use regex::Regex;
use std::sync::LazyLock;
use unicode_normalization::UnicodeNormalization;

use crate::types::TextToken;

/// Regex to collapse any whitespace run into one space.
static WHITESPACE_COLLAPSE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Normalizer for OCR token text.
#[derive(Debug, Clone)]
pub struct TokenNormalizer {
    /// Apply NFKC compatibility folding (ligatures, full-width forms).
    compatibility_fold: bool,
}

impl Default for TokenNormalizer {
    fn default() -> Self {
        Self {
            compatibility_fold: true,
        }
    }
}

impl TokenNormalizer {
    /// Create a normalizer that folds compatibility characters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether NFKC folding is applied.
    pub fn with_compatibility_fold(mut self, fold: bool) -> Self {
        self.compatibility_fold = fold;
        self
    }

    /// Normalize a single piece of token text.
    ///
    /// - NFKC folds "ﬁ" to "fi" and full-width letters to ASCII
    /// - Collapses whitespace runs (including newlines) to single spaces
    /// - Trims leading/trailing whitespace
    pub fn normalize_text(&self, text: &str) -> String {
        let folded: String = if self.compatibility_fold {
            text.nfkc().collect()
        } else {
            text.to_string()
        };

        WHITESPACE_COLLAPSE_REGEX
            .replace_all(&folded, " ")
            .trim()
            .to_string()
    }

    /// Normalize every token, dropping those left empty.
    pub fn normalize_tokens(&self, tokens: Vec<TextToken>) -> Vec<TextToken> {
        let before = tokens.len();
        let kept: Vec<TextToken> = tokens
            .into_iter()
            .filter_map(|mut token| {
                token.text = self.normalize_text(&token.text);
                (!token.text.is_empty()).then_some(token)
            })
            .collect();

        if kept.len() != before {
            log::debug!("Dropped {} blank tokens", before - kept.len());
        }

        kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trim_and_collapse() {
        let normalizer = TokenNormalizer::new();
        assert_eq!(normalizer.normalize_text("  Hello \t  world\n"), "Hello world");
    }

    #[test]
    fn test_ligature_folding() {
        let normalizer = TokenNormalizer::new();
        assert_eq!(normalizer.normalize_text("\u{FB01}nal"), "final");
        assert_eq!(normalizer.normalize_text("\u{FF21}\u{FF22}"), "AB");
    }

    #[test]
    fn test_folding_disabled() {
        let normalizer = TokenNormalizer::new().with_compatibility_fold(false);
        assert_eq!(normalizer.normalize_text("\u{FB01}nal"), "\u{FB01}nal");
    }

    #[test]
    fn test_blank_tokens_dropped() {
        let normalizer = TokenNormalizer::new();
        let tokens = vec![
            TextToken::new("Hello", 100, 50, 80, 20),
            TextToken::new("   ", 0, 0, 10, 10),
            TextToken::new("", 5, 5, 0, 0),
            TextToken::new(" world ", 190, 50, 90, 20),
        ];

        let kept = normalizer.normalize_tokens(tokens);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].text, "Hello");
        assert_eq!(kept[1].text, "world");
        assert_eq!(kept[1].left, 190);
    }
}
