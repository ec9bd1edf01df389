//! Weighted k-NN similarity graph (C4) over chunk ids, with bounded-depth
//! BFS expansion used by the query engine's "related files" step.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};
use std::fs;
use std::path::Path;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SemadexError};

use super::vector_store::cosine_similarity;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub to: String,
    pub weight: f32,
}

/// Undirected adjacency list keyed by chunk id, plus the threshold the graph
/// was built with (persisted so callers can tell how it was produced).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarityGraph {
    pub adjacency: HashMap<String, Vec<Edge>>,
    pub k: usize,
    pub threshold: f32,
}

impl SimilarityGraph {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self {
                adjacency: HashMap::new(),
                k: 10,
                threshold: 0.0,
            });
        }
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| SemadexError::CorruptArtifact(format!("graph: {e}")))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_json::to_vec_pretty(self)
            .map_err(|e| SemadexError::CorruptArtifact(format!("graph: {e}")))?;
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)?;
        let tmp = parent.join(format!(
            ".{}.tmp",
            path.file_name().and_then(|n| n.to_str()).unwrap_or("graph.json")
        ));
        fs::write(&tmp, &data)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Build a fresh graph from scratch: for each node, keep its `k` nearest
    /// neighbors by cosine similarity whose weight clears `threshold`, then
    /// symmetrize. The per-node neighbor search is embarrassingly parallel,
    /// so it runs across `nodes` with rayon before the sequential merge.
    pub fn build(nodes: &[(String, Vec<f32>)], k: usize, threshold: f32) -> Self {
        let per_node: Vec<(String, Vec<Edge>)> = nodes
            .par_iter()
            .enumerate()
            .map(|(i, (id_i, emb_i))| {
                let mut heap: BinaryHeap<ScoredNeighbor> = BinaryHeap::new();
                for (j, (id_j, emb_j)) in nodes.iter().enumerate() {
                    if i == j {
                        continue;
                    }
                    let sim = cosine_similarity(emb_i, emb_j);
                    if sim < threshold {
                        continue;
                    }
                    heap.push(ScoredNeighbor {
                        weight: sim,
                        id: id_j.clone(),
                    });
                    if heap.len() > k {
                        heap.pop();
                    }
                }

                let mut neighbors: Vec<Edge> = heap
                    .into_iter()
                    .map(|n| Edge {
                        to: n.id,
                        weight: n.weight,
                    })
                    .collect();
                neighbors
                    .sort_by(|a, b| b.weight.partial_cmp(&a.weight).unwrap_or(Ordering::Equal));
                (id_i.clone(), neighbors)
            })
            .collect();

        let mut adjacency: HashMap<String, Vec<Edge>> = HashMap::new();
        for (id_i, neighbors) in per_node {
            for edge in &neighbors {
                adjacency
                    .entry(id_i.clone())
                    .or_default()
                    .push(edge.clone());
                adjacency.entry(edge.to.clone()).or_default().push(Edge {
                    to: id_i.clone(),
                    weight: edge.weight,
                });
            }
        }

        // Dedup symmetrized edges (a node may have been added as a neighbor's
        // reciprocal edge more than once if it was also a direct top-k hit).
        for edges in adjacency.values_mut() {
            edges.sort_by(|a, b| a.to.cmp(&b.to));
            edges.dedup_by(|a, b| a.to == b.to);
        }

        Self {
            adjacency,
            k,
            threshold,
        }
    }

    /// A single reachable node: its smallest BFS depth from any seed, the
    /// weight of the edge that reached it on that shortest path, and the
    /// immediate predecessor on that path.
    pub fn expand(&self, seeds: &[String], min_weight: f32, max_depth: usize) -> Vec<ExpansionHit> {
        let seed_set: HashSet<&str> = seeds.iter().map(|s| s.as_str()).collect();
        let mut visited: HashMap<String, (usize, f32, String)> = HashMap::new();
        let mut queue: VecDeque<(String, usize, f32, String)> = VecDeque::new();

        for seed in seeds {
            queue.push_back((seed.clone(), 0, f32::INFINITY, String::new()));
            visited.insert(seed.clone(), (0, f32::INFINITY, String::new()));
        }

        let mut results = Vec::new();

        while let Some((id, depth, weight, via)) = queue.pop_front() {
            if depth > 0 && !seed_set.contains(id.as_str()) {
                results.push(ExpansionHit {
                    id: id.clone(),
                    via: via.clone(),
                    depth,
                    edge_weight: weight,
                });
            }
            if depth >= max_depth {
                continue;
            }
            if let Some(edges) = self.adjacency.get(&id) {
                for edge in edges {
                    if edge.weight < min_weight {
                        continue;
                    }
                    let next_depth = depth + 1;
                    let better = match visited.get(&edge.to) {
                        Some((d, w, _)) => {
                            next_depth < *d || (next_depth == *d && edge.weight > *w)
                        }
                        None => true,
                    };
                    if better {
                        visited.insert(edge.to.clone(), (next_depth, edge.weight, id.clone()));
                        queue.push_back((edge.to.clone(), next_depth, edge.weight, id.clone()));
                    }
                }
            }
        }

        // Deterministic order: smaller depth, then larger final-hop weight,
        // then lexicographic id.
        let mut deduped: HashMap<String, (usize, f32, String)> = HashMap::new();
        for hit in results {
            deduped
                .entry(hit.id)
                .and_modify(|(d, w, v)| {
                    if hit.depth < *d || (hit.depth == *d && hit.edge_weight > *w) {
                        *d = hit.depth;
                        *w = hit.edge_weight;
                        *v = hit.via.clone();
                    }
                })
                .or_insert((hit.depth, hit.edge_weight, hit.via));
        }

        let mut out: Vec<ExpansionHit> = deduped
            .into_iter()
            .map(|(id, (depth, edge_weight, via))| ExpansionHit {
                id,
                via,
                depth,
                edge_weight,
            })
            .collect();
        out.sort_by(|a, b| {
            a.depth
                .cmp(&b.depth)
                .then_with(|| b.edge_weight.partial_cmp(&a.edge_weight).unwrap_or(Ordering::Equal))
                .then_with(|| a.id.cmp(&b.id))
        });
        out
    }
}

/// One node reached by `SimilarityGraph::expand`: its id, the predecessor
/// (`via`) on the retained shortest path, the hop count, and the weight of
/// the final edge on that path.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpansionHit {
    pub id: String,
    pub via: String,
    pub depth: usize,
    pub edge_weight: f32,
}

struct ScoredNeighbor {
    weight: f32,
    id: String,
}

impl PartialEq for ScoredNeighbor {
    fn eq(&self, other: &Self) -> bool {
        self.weight == other.weight
    }
}
impl Eq for ScoredNeighbor {}
impl PartialOrd for ScoredNeighbor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for ScoredNeighbor {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so the BinaryHeap (a max-heap) pops the *smallest* weight
        // first, letting us evict the weakest neighbor once we exceed `k`.
        other
            .weight
            .partial_cmp(&self.weight)
            .unwrap_or(Ordering::Equal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nodes() -> Vec<(String, Vec<f32>)> {
        vec![
            ("a".into(), vec![1.0, 0.0]),
            ("b".into(), vec![0.9, 0.1]),
            ("c".into(), vec![0.0, 1.0]),
        ]
    }

    #[test]
    fn build_keeps_only_edges_above_threshold() {
        let graph = SimilarityGraph::build(&nodes(), 10, 0.5);
        let a_edges = graph.adjacency.get("a").unwrap();
        assert!(a_edges.iter().any(|e| e.to == "b"));
        assert!(!a_edges.iter().any(|e| e.to == "c"));
    }

    #[test]
    fn expand_excludes_seeds_and_sorts_by_depth_then_weight() {
        let graph = SimilarityGraph::build(&nodes(), 10, 0.5);
        let related = graph.expand(&["a".to_string()], 0.0, 2);
        assert!(related.iter().all(|hit| hit.id != "a"));
        assert_eq!(related[0].id, "b");
        assert_eq!(related[0].via, "a");
    }

    #[test]
    fn expand_respects_max_depth() {
        let graph = SimilarityGraph::build(&nodes(), 10, 0.5);
        let none = graph.expand(&["a".to_string()], 0.0, 0);
        assert!(none.is_empty());
    }

    #[test]
    fn expand_skips_edges_below_min_weight() {
        let graph = SimilarityGraph::build(&nodes(), 10, 0.5);
        let related = graph.expand(&["a".to_string()], 0.999, 2);
        assert!(related.is_empty());
    }
}
