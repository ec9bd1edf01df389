//! Query engine (C7): embed → dense search → optional BM25 fusion → dedupe
//! → filter → rescale → graph-expand.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use crate::error::{Result, SemadexError};

use super::bm25::Bm25Index;
use super::chunker::parse_chunk_id;
use super::config::HybridConfig;
use super::embedder::Embedder;
use super::graph::SimilarityGraph;
use super::vector_store::VectorStore;

const RRF_K: f32 = 60.0;
const RESCALE_BASELINE: f32 = 0.5;

#[derive(Debug, Clone, Serialize)]
pub struct DirectMatch {
    pub chunk_id: String,
    pub parent_path: String,
    pub type_tag: String,
    pub start_line: usize,
    pub end_line: usize,
    pub score: f32,
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RelatedMatch {
    pub parent_path: String,
    pub chunk_id: String,
    pub type_tag: String,
    pub via: String,
    pub depth: usize,
    pub edge_weight: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub direct: Vec<DirectMatch>,
    pub related: Vec<RelatedMatch>,
}

pub struct QueryEngine {
    store: Arc<VectorStore>,
    graph: Arc<SimilarityGraph>,
    bm25: Arc<Bm25Index>,
    embedder: Arc<dyn Embedder>,
    hybrid: HybridConfig,
    max_depth: usize,
    expand_threshold: f32,
}

impl QueryEngine {
    pub fn new(
        store: Arc<VectorStore>,
        graph: Arc<SimilarityGraph>,
        bm25: Arc<Bm25Index>,
        embedder: Arc<dyn Embedder>,
        hybrid: HybridConfig,
        max_depth: usize,
        expand_threshold: f32,
    ) -> Self {
        Self {
            store,
            graph,
            bm25,
            embedder,
            hybrid,
            max_depth,
            expand_threshold,
        }
    }

    pub fn query(
        &self,
        text: &str,
        top_k: usize,
        type_filter: Option<&str>,
        expand: bool,
        expand_depth: Option<usize>,
        min_score: Option<f32>,
    ) -> Result<QueryResult> {
        if text.trim().is_empty() {
            return Err(SemadexError::InvalidRequest("query text is empty".into()));
        }
        if top_k == 0 {
            return Err(SemadexError::InvalidRequest("top_k must be > 0".into()));
        }

        let min_score = min_score.unwrap_or(self.hybrid.min_score);
        let query_vec = self.embedder.embed_text(text)?;

        let dense = self.store.search(&query_vec, top_k * 2, min_score, None);

        let fused = if self.hybrid.enabled && !dense.is_empty() {
            let candidate_ids: Vec<String> = dense.iter().map(|(id, _)| id.clone()).collect();
            let bm25_hits = self.bm25.search(text, top_k * 2, Some(&candidate_ids));
            self.fuse(&dense, &bm25_hits)
        } else {
            dense
                .iter()
                .enumerate()
                .map(|(rank, (id, score))| (id.clone(), *score, 1.0 / (RRF_K + rank as f32 + 1.0)))
                .collect()
        };

        let raw_scores: HashMap<String, f32> =
            dense.iter().map(|(id, score)| (id.clone(), *score)).collect();

        let deduped = dedupe_by_parent(&fused, &raw_scores);

        let mut filtered: Vec<(String, f32, f32)> = deduped
            .into_iter()
            .filter(|(id, _, _)| match type_filter {
                Some(tag) => self
                    .store
                    .entries
                    .get(id)
                    .map(|e| e.type_tag == tag)
                    .unwrap_or(false),
                None => true,
            })
            .collect();

        filtered.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        filtered.truncate(top_k);

        let direct: Vec<DirectMatch> = filtered
            .into_iter()
            .filter_map(|(id, _fused_score, raw_score)| {
                let entry = self.store.entries.get(&id)?;
                Some(DirectMatch {
                    chunk_id: id,
                    parent_path: entry.parent_path.clone(),
                    type_tag: entry.type_tag.clone(),
                    start_line: entry.start_line,
                    end_line: entry.end_line,
                    score: rescale_score(raw_score),
                    text: entry.chunk_text.clone(),
                })
            })
            .collect();

        let related = if expand && !direct.is_empty() {
            let depth = expand_depth.unwrap_or(self.max_depth);
            self.expand_related(&direct, type_filter, depth)
        } else {
            Vec::new()
        };

        Ok(QueryResult { direct, related })
    }

    fn fuse(&self, dense: &[(String, f32)], bm25: &[(String, f32)]) -> Vec<(String, f32, f32)> {
        let mut dense_ranked = dense.to_vec();
        dense_ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

        let mut bm25_ranked = bm25.to_vec();
        bm25_ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

        let dense_rank: HashMap<&str, usize> = dense_ranked
            .iter()
            .enumerate()
            .map(|(rank, (id, _))| (id.as_str(), rank))
            .collect();
        let bm25_rank: HashMap<&str, usize> = bm25_ranked
            .iter()
            .enumerate()
            .map(|(rank, (id, _))| (id.as_str(), rank))
            .collect();
        let raw: HashMap<&str, f32> = dense_ranked
            .iter()
            .map(|(id, score)| (id.as_str(), *score))
            .collect();

        let mut ids: Vec<&str> = dense_rank.keys().copied().collect();
        for id in bm25_rank.keys() {
            if !dense_rank.contains_key(id) {
                ids.push(id);
            }
        }

        ids.into_iter()
            .map(|id| {
                let mut score = 0.0f32;
                if let Some(rank) = dense_rank.get(id) {
                    score += self.hybrid.vector_weight / (RRF_K + *rank as f32 + 1.0);
                }
                if let Some(rank) = bm25_rank.get(id) {
                    score += self.hybrid.bm25_weight / (RRF_K + *rank as f32 + 1.0);
                }
                (id.to_string(), *raw.get(id).unwrap_or(&0.0), score)
            })
            .collect()
    }

    fn expand_related(
        &self,
        direct: &[DirectMatch],
        type_filter: Option<&str>,
        max_depth: usize,
    ) -> Vec<RelatedMatch> {
        let seeds: Vec<String> = direct.iter().map(|d| d.chunk_id.clone()).collect();
        let expanded = self.graph.expand(&seeds, self.expand_threshold, max_depth);

        let mut seen_parents: std::collections::HashSet<String> =
            direct.iter().map(|d| d.parent_path.clone()).collect();

        let mut related = Vec::new();
        for hit in expanded {
            let parent = parse_chunk_id(&hit.id).0;
            if seen_parents.contains(&parent) {
                continue;
            }
            seen_parents.insert(parent.clone());

            let type_tag = match self.store.entries.get(&hit.id) {
                Some(entry) => entry.type_tag.clone(),
                None => continue,
            };
            if let Some(tag) = type_filter {
                if type_tag != tag {
                    continue;
                }
            }

            let via = parse_chunk_id(&hit.via).0;
            related.push(RelatedMatch {
                parent_path: parent,
                chunk_id: hit.id,
                type_tag,
                via,
                depth: hit.depth,
                edge_weight: hit.edge_weight,
            });
        }

        related.sort_by(|a, b| b.edge_weight.partial_cmp(&a.edge_weight).unwrap_or(Ordering::Equal));
        related
    }
}

/// Collapse fused results to one per parent file, keeping the entry with the
/// highest raw cosine score. Fused-score ordering is preserved on the
/// survivor's triple so later sorting still works.
fn dedupe_by_parent(
    fused: &[(String, f32, f32)],
    raw_scores: &HashMap<String, f32>,
) -> Vec<(String, f32, f32)> {
    let mut best: HashMap<String, (String, f32, f32)> = HashMap::new();

    for (id, raw, fused_score) in fused {
        let parent = parse_chunk_id(id).0;
        let raw = raw_scores.get(id).copied().unwrap_or(*raw);
        best.entry(parent)
            .and_modify(|(best_id, best_raw, best_fused)| {
                if raw > *best_raw {
                    *best_id = id.clone();
                    *best_raw = raw;
                    *best_fused = *fused_score;
                }
            })
            .or_insert((id.clone(), raw, *fused_score));
    }

    best.into_values()
        .map(|(id, raw, fused_score)| (id, fused_score, raw))
        .collect()
}

fn rescale_score(raw: f32) -> f32 {
    let rescaled = ((raw - RESCALE_BASELINE) / (1.0 - RESCALE_BASELINE)).max(0.0);
    (rescaled * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rescale_clamps_at_zero_and_rounds() {
        assert_eq!(rescale_score(0.5), 0.0);
        assert_eq!(rescale_score(0.3), 0.0);
        assert_eq!(rescale_score(0.75), 0.5);
        assert_eq!(rescale_score(1.0), 1.0);
    }

    #[test]
    fn dedupe_keeps_highest_raw_score_per_parent() {
        let fused = vec![
            ("a.rs#chunk_0".to_string(), 0.8, 0.03),
            ("a.rs#chunk_1".to_string(), 0.9, 0.02),
            ("b.rs".to_string(), 0.7, 0.01),
        ];
        let raw: HashMap<String, f32> = fused.iter().map(|(id, r, _)| (id.clone(), *r)).collect();
        let deduped = dedupe_by_parent(&fused, &raw);
        assert_eq!(deduped.len(), 2);
        let a = deduped.iter().find(|(id, _, _)| id == "a.rs#chunk_1").unwrap();
        assert_eq!(a.2, 0.9);
    }
}
