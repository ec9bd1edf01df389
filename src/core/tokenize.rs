//! Shared tokenization for the chunker and the BM25 index (spec.md §9, Open
//! Question 1): one module, two token notions over the same text.

use std::collections::HashSet;
use std::sync::OnceLock;

/// Whitespace-delimited runs with their byte spans, used by the chunker to
/// size windows and compute offsets.
pub fn whitespace_tokens_with_offsets(text: &str) -> Vec<(usize, usize)> {
    let mut tokens = Vec::new();
    let mut start: Option<usize> = None;

    for (i, ch) in text.char_indices() {
        if ch.is_whitespace() {
            if let Some(s) = start.take() {
                tokens.push((s, i));
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        tokens.push((s, text.len()));
    }

    tokens
}

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "been", "being", "but", "by", "can", "cannot",
    "could", "did", "do", "does", "doing", "down", "for", "from", "had", "has", "have", "having",
    "he", "her", "here", "hers", "him", "his", "how", "i", "if", "in", "into", "is", "it", "its",
    "me", "more", "most", "my", "no", "nor", "not", "of", "off", "on", "once", "only", "or",
    "other", "our", "out", "over", "own", "she", "should", "so", "some", "such", "than", "that",
    "the", "their", "them", "then", "there", "these", "they", "this", "those", "through", "to",
    "too", "under", "until", "up", "very", "was", "we", "were", "what", "when", "where", "which",
    "while", "who", "whom", "why", "will", "with", "would", "you", "your",
];

fn stopword_set() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| STOPWORDS.iter().copied().collect())
}

/// Lowercased, non-alphanumeric-boundary-split tokens for BM25 scoring, with
/// single-character tokens and stopwords dropped.
pub fn bm25_tokens(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let stopwords = stopword_set();

    lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|tok| tok.len() > 1 && !stopwords.contains(tok))
        .map(|tok| tok.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bm25_tokens_drops_stopwords_and_single_chars() {
        let tokens = bm25_tokens("The quick Fox jumps over a log, I think.");
        assert!(!tokens.contains(&"the".to_string()));
        assert!(!tokens.contains(&"a".to_string()));
        assert!(!tokens.contains(&"i".to_string()));
        assert!(tokens.contains(&"quick".to_string()));
        assert!(tokens.contains(&"jumps".to_string()));
    }

    #[test]
    fn whitespace_tokens_cover_text_in_order() {
        let toks = whitespace_tokens_with_offsets("foo  bar\nbaz");
        assert_eq!(toks, vec![(0, 3), (5, 8), (9, 12)]);
    }
}
