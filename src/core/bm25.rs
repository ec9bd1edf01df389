//! BM25 Okapi lexical index (C5), fixed k1/b per spec.md §4.4.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::tokenize::bm25_tokens;

const K1: f32 = 1.5;
const B: f32 = 0.75;

/// Rebuilt wholesale from the store's cached chunk text on every indexing
/// pass (spec.md §9, Open Question 2) rather than incrementally updated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Bm25Index {
    idf: HashMap<String, f32>,
    term_freqs: HashMap<String, HashMap<String, u32>>,
    doc_lengths: HashMap<String, u32>,
    avg_doc_length: f32,
}

impl Bm25Index {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute term frequencies, document lengths, and IDF from scratch
    /// over the given `(chunk_id, text)` corpus.
    pub fn rebuild<'a, I>(&mut self, documents: I)
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        self.idf.clear();
        self.term_freqs.clear();
        self.doc_lengths.clear();

        let mut doc_freq: HashMap<String, u32> = HashMap::new();
        let mut total_len: u64 = 0;
        let mut doc_count: u32 = 0;

        for (chunk_id, text) in documents {
            let tokens = bm25_tokens(text);
            let mut freqs: HashMap<String, u32> = HashMap::new();
            for token in &tokens {
                *freqs.entry(token.clone()).or_insert(0) += 1;
            }
            for term in freqs.keys() {
                *doc_freq.entry(term.clone()).or_insert(0) += 1;
            }

            total_len += tokens.len() as u64;
            doc_count += 1;
            self.doc_lengths.insert(chunk_id.to_string(), tokens.len() as u32);
            self.term_freqs.insert(chunk_id.to_string(), freqs);
        }

        self.avg_doc_length = if doc_count > 0 {
            total_len as f32 / doc_count as f32
        } else {
            0.0
        };

        let n = doc_count as f32;
        for (term, df) in doc_freq {
            let idf = ((n - df as f32 + 0.5) / (df as f32 + 0.5) + 1.0).ln();
            self.idf.insert(term, idf);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.doc_lengths.is_empty()
    }

    /// Score `query` against every document in the index, or, if `candidates`
    /// is given, only those ids. Returns an ordered list of `(chunk_id,
    /// score)` pairs, descending by score, for documents that share at least
    /// one query term, truncated to `k`.
    pub fn search(&self, query: &str, k: usize, candidates: Option<&[String]>) -> Vec<(String, f32)> {
        let query_terms = bm25_tokens(query);
        if query_terms.is_empty() || self.doc_lengths.is_empty() {
            return Vec::new();
        }

        let ids: Vec<&String> = match candidates {
            Some(c) => c.iter().filter(|id| self.doc_lengths.contains_key(*id)).collect(),
            None => self.doc_lengths.keys().collect(),
        };

        let mut scores = Vec::new();
        for id in ids {
            let freqs = match self.term_freqs.get(id) {
                Some(f) => f,
                None => continue,
            };
            let doc_len = *self.doc_lengths.get(id).unwrap_or(&0) as f32;

            let mut score = 0.0f32;
            for term in &query_terms {
                let f = *freqs.get(term).unwrap_or(&0) as f32;
                if f == 0.0 {
                    continue;
                }
                let idf = *self.idf.get(term).unwrap_or(&0.0);
                let denom = f + K1 * (1.0 - B + B * doc_len / self.avg_doc_length.max(1.0));
                score += idf * (f * (K1 + 1.0)) / denom;
            }

            if score > 0.0 {
                scores.push((id.clone(), score));
            }
        }

        scores.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        scores.truncate(k);
        scores
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Vec<(&'static str, &'static str)> {
        vec![
            ("a", "the quick brown fox jumps over the lazy dog"),
            ("b", "a fast red fox runs through the forest"),
            ("c", "totally unrelated document about spreadsheets"),
        ]
    }

    #[test]
    fn scores_documents_sharing_query_terms() {
        let mut idx = Bm25Index::new();
        idx.rebuild(corpus());

        let results = idx.search("fox", 10, None);
        let ids: Vec<&str> = results.iter().map(|(id, _)| id.as_str()).collect();
        assert!(ids.contains(&"a"));
        assert!(ids.contains(&"b"));
        assert!(!ids.contains(&"c"));
        assert!(results.windows(2).all(|w| w[0].1 >= w[1].1));
    }

    #[test]
    fn truncates_to_k() {
        let mut idx = Bm25Index::new();
        idx.rebuild(corpus());

        let results = idx.search("fox", 1, None);
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn restricts_to_candidate_set() {
        let mut idx = Bm25Index::new();
        idx.rebuild(corpus());

        let results = idx.search("fox", 10, Some(&["a".to_string()]));
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, "a");
    }

    #[test]
    fn empty_query_yields_no_results() {
        let mut idx = Bm25Index::new();
        idx.rebuild(corpus());
        assert!(idx.search("", 10, None).is_empty());
        assert!(idx.search("the a", 10, None).is_empty());
    }
}
