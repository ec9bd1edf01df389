//! Brute-force exact-cosine vector store (C1), matching spec.md's ANN
//! non-goal. Persisted with `bincode`, write-temp-then-rename (spec.md §6).

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SemadexError};

/// Per-file bookkeeping used by the two-tier mtime-then-hash staleness check
/// (spec.md §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileMeta {
    pub mtime_secs: i64,
    pub content_hash: String,
    pub chunk_ids: Vec<String>,
}

/// One embedded chunk, plus the offsets needed to reconstruct its span and
/// the cached text needed to rebuild BM25 without re-reading the file
/// (spec.md §9, Open Question 2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreEntry {
    pub chunk_id: String,
    pub parent_path: String,
    pub type_tag: String,
    pub start_char: usize,
    pub end_char: usize,
    pub start_line: usize,
    pub end_line: usize,
    pub embedding: Vec<f32>,
    pub chunk_text: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VectorStore {
    pub entries: HashMap<String, StoreEntry>,
    pub files: HashMap<String, FileMeta>,
}

impl VectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read(path)?;
        bincode::deserialize(&data)
            .map_err(|e| SemadexError::CorruptArtifact(format!("vector store: {e}")))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let data = bincode::serialize(self)
            .map_err(|e| SemadexError::CorruptArtifact(format!("vector store: {e}")))?;
        atomic_write(path, &data)?;
        Ok(())
    }

    pub fn file_needs_reindex(&self, path: &str, mtime_secs: i64, content_hash: &str) -> bool {
        match self.files.get(path) {
            Some(meta) => meta.mtime_secs != mtime_secs && meta.content_hash != content_hash,
            None => true,
        }
    }

    pub fn remove_file(&mut self, path: &str) {
        if let Some(meta) = self.files.remove(path) {
            for id in meta.chunk_ids {
                self.entries.remove(&id);
            }
        }
    }

    pub fn insert_file(&mut self, path: String, meta: FileMeta, entries: Vec<StoreEntry>) {
        self.remove_file(&path);
        for entry in entries {
            self.entries.insert(entry.chunk_id.clone(), entry);
        }
        self.files.insert(path, meta);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn all_chunk_texts(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .values()
            .map(|e| (e.chunk_id.as_str(), e.chunk_text.as_str()))
    }

    /// Exact brute-force cosine top-`k` search, optionally restricted to a
    /// `type_tag`, with scores floored at `min_score`.
    pub fn search(
        &self,
        query: &[f32],
        top_k: usize,
        min_score: f32,
        type_tag: Option<&str>,
    ) -> Vec<(String, f32)> {
        let mut scored: Vec<(String, f32)> = self
            .entries
            .values()
            .filter(|e| type_tag.map(|t| e.type_tag == t).unwrap_or(true))
            .filter_map(|e| {
                let score = cosine_similarity(query, &e.embedding);
                (score >= min_score).then(|| (e.chunk_id.clone(), score))
            })
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        scored
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;
    let tmp: PathBuf = parent.join(format!(
        ".{}.tmp",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("store")
    ));
    {
        let mut f = fs::File::create(&tmp)?;
        f.write_all(data)?;
        f.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = vec![0.6, 0.8];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_of_orthogonal_vectors_is_zero() {
        assert!((cosine_similarity(&[1.0, 0.0], &[0.0, 1.0])).abs() < 1e-6);
    }

    #[test]
    fn search_respects_min_score_and_type_tag() {
        let mut store = VectorStore::new();
        store.insert_file(
            "a.rs".into(),
            FileMeta {
                mtime_secs: 1,
                content_hash: "h1".into(),
                chunk_ids: vec!["a.rs".into()],
            },
            vec![StoreEntry {
                chunk_id: "a.rs".into(),
                parent_path: "a.rs".into(),
                type_tag: "code".into(),
                start_char: 0,
                end_char: 3,
                start_line: 1,
                end_line: 1,
                embedding: vec![1.0, 0.0],
                chunk_text: "foo".into(),
            }],
        );
        store.insert_file(
            "b.md".into(),
            FileMeta {
                mtime_secs: 1,
                content_hash: "h2".into(),
                chunk_ids: vec!["b.md".into()],
            },
            vec![StoreEntry {
                chunk_id: "b.md".into(),
                parent_path: "b.md".into(),
                type_tag: "doc".into(),
                start_char: 0,
                end_char: 3,
                start_line: 1,
                end_line: 1,
                embedding: vec![1.0, 0.0],
                chunk_text: "bar".into(),
            }],
        );

        let results = store.search(&[1.0, 0.0], 10, 0.0, Some("code"));
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, "a.rs");

        let none = store.search(&[0.0, 1.0], 10, 0.5, None);
        assert!(none.is_empty());
    }

    #[test]
    fn remove_file_drops_its_entries() {
        let mut store = VectorStore::new();
        store.insert_file(
            "a.rs".into(),
            FileMeta {
                mtime_secs: 1,
                content_hash: "h1".into(),
                chunk_ids: vec!["a.rs".into()],
            },
            vec![StoreEntry {
                chunk_id: "a.rs".into(),
                parent_path: "a.rs".into(),
                type_tag: "code".into(),
                start_char: 0,
                end_char: 3,
                start_line: 1,
                end_line: 1,
                embedding: vec![1.0, 0.0],
                chunk_text: "foo".into(),
            }],
        );
        assert_eq!(store.len(), 1);
        store.remove_file("a.rs");
        assert!(store.is_empty());
    }
}
