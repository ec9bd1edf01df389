//! Indexer (C6): scan → filter unchanged files → chunk → embed → persist.
//!
//! Orchestration mirrors a scan/incremental-filter/chunk/embed/store/persist
//! pipeline; the parallel step here is graph construction rather than
//! chunking, since chunking is already cheap relative to one embedding call
//! per chunk.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use anyhow::{Context, Result};
use glob::Pattern;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use super::bm25::Bm25Index;
use super::chunker::{chunk_text, make_chunk_id};
use super::config::{ProjectConfig, SourceSpec};
use super::embedder::Embedder;
use super::graph::SimilarityGraph;
use super::vector_store::{FileMeta, StoreEntry, VectorStore};

#[derive(Debug, Clone, Default)]
pub struct IndexStats {
    pub files_scanned: usize,
    pub files_indexed: usize,
    pub files_skipped: usize,
    pub files_removed: usize,
    pub chunks_written: usize,
}

pub struct Indexer {
    config: ProjectConfig,
    embedder: Arc<dyn Embedder>,
    store_path: PathBuf,
    graph_path: PathBuf,
    bm25_path: PathBuf,
}

impl Indexer {
    pub fn new(config: ProjectConfig, embedder: Arc<dyn Embedder>, data_dir: PathBuf) -> Self {
        Self {
            config,
            embedder,
            store_path: data_dir.join("store.bin"),
            graph_path: data_dir.join("graph.json"),
            bm25_path: data_dir.join("bm25.pkl"),
        }
    }

    /// Run one indexing pass. `rebuild = true` forces every matched file to
    /// be re-chunked and re-embedded regardless of staleness.
    pub fn index(&self, rebuild: bool) -> Result<IndexStats> {
        let mut stats = IndexStats::default();
        let mut store = if rebuild {
            VectorStore::new()
        } else {
            VectorStore::load(&self.store_path).context("loading vector store")?
        };

        let scanned = self.scan_sources()?;
        stats.files_scanned = scanned.len();

        let scanned_paths: std::collections::HashSet<&str> =
            scanned.iter().map(|(p, _)| p.as_str()).collect();
        let stale_paths: Vec<String> = store
            .files
            .keys()
            .filter(|p| !scanned_paths.contains(p.as_str()))
            .cloned()
            .collect();
        for path in &stale_paths {
            store.remove_file(path);
            stats.files_removed += 1;
        }

        for (path, type_tag) in &scanned {
            let content = match fs::read_to_string(path) {
                Ok(c) => c,
                Err(e) => {
                    warn!(file = %path, error = %e, "skipping unreadable file");
                    continue;
                }
            };
            let mtime = file_mtime_secs(Path::new(path)).unwrap_or(0);
            let hash = hash_content(&content);

            if !rebuild && !store.file_needs_reindex(path, mtime, &hash) {
                stats.files_skipped += 1;
                continue;
            }

            let chunks = chunk_text(
                &content,
                self.config.chunking.max_tokens,
                self.config.chunking.overlap_tokens,
            );
            if chunks.is_empty() {
                continue;
            }

            let inputs: Vec<String> = chunks
                .iter()
                .map(|c| {
                    format!(
                        "Path: {path}\nChunk {}/{}\n\n{}",
                        c.chunk_index + 1,
                        chunks.len(),
                        c.text
                    )
                })
                .collect();
            let embeddings = self
                .embedder
                .embed_batch(&inputs)
                .context("embedding chunk batch")?;

            let mut chunk_ids = Vec::with_capacity(chunks.len());
            let mut entries = Vec::with_capacity(chunks.len());
            for (chunk, embedding) in chunks.iter().zip(embeddings.into_iter()) {
                let chunk_id = if chunks.len() == 1 {
                    path.clone()
                } else {
                    make_chunk_id(path, chunk.chunk_index)
                };
                chunk_ids.push(chunk_id.clone());
                entries.push(StoreEntry {
                    chunk_id,
                    parent_path: path.clone(),
                    type_tag: type_tag.clone(),
                    start_char: chunk.start_char,
                    end_char: chunk.end_char,
                    start_line: chunk.start_line,
                    end_line: chunk.end_line,
                    embedding,
                    chunk_text: chunk.text.clone(),
                });
            }

            stats.chunks_written += entries.len();
            store.insert_file(
                path.clone(),
                FileMeta {
                    mtime_secs: mtime,
                    content_hash: hash,
                    chunk_ids,
                },
                entries,
            );
            stats.files_indexed += 1;
        }

        if stats.files_indexed > 0 || stats.files_removed > 0 {
            let nodes: Vec<(String, Vec<f32>)> = store
                .entries
                .values()
                .map(|e| (e.chunk_id.clone(), e.embedding.clone()))
                .collect();
            let graph =
                SimilarityGraph::build(&nodes, self.config.graph.k, self.config.graph.threshold);

            let mut bm25 = Bm25Index::new();
            bm25.rebuild(store.all_chunk_texts());

            store.save(&self.store_path)?;
            graph.save(&self.graph_path)?;
            save_bm25(&bm25, &self.bm25_path)?;
        } else {
            debug!("no files indexed or removed, skipping graph/BM25 rebuild and persistence");
        }

        info!(
            scanned = stats.files_scanned,
            indexed = stats.files_indexed,
            skipped = stats.files_skipped,
            removed = stats.files_removed,
            chunks = stats.chunks_written,
            "indexing pass complete"
        );

        Ok(stats)
    }

    fn scan_sources(&self) -> Result<Vec<(String, String)>> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();

        for source in &self.config.sources {
            for path in self.scan_source(source)? {
                let key = path.to_string_lossy().to_string();
                if seen.insert(key.clone()) {
                    out.push((key, source.type_tag.clone()));
                }
            }
        }

        Ok(out)
    }

    fn scan_source(&self, source: &SourceSpec) -> Result<Vec<PathBuf>> {
        let pattern = source.root_path.join(&source.glob);
        let pattern_str = pattern.to_string_lossy();
        debug!(pattern = %pattern_str, "scanning source");

        let excludes: Vec<Pattern> = source
            .excludes
            .iter()
            .filter_map(|p| Pattern::new(p).ok())
            .collect();

        let mut matches = Vec::new();
        for entry in glob::glob(&pattern_str).with_context(|| format!("invalid glob: {pattern_str}"))?
        {
            let path = entry?;
            if !path.is_file() {
                continue;
            }
            if is_excluded(&path, &excludes) {
                continue;
            }
            matches.push(path);
        }
        Ok(matches)
    }
}

fn is_excluded(path: &Path, excludes: &[Pattern]) -> bool {
    let path_str = path.to_string_lossy();
    excludes.iter().any(|p| p.matches(&path_str))
}

fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(&hasher.finalize()[..8])
}

fn file_mtime_secs(path: &Path) -> Option<i64> {
    let meta = fs::metadata(path).ok()?;
    let modified = meta.modified().ok()?;
    let secs = modified.duration_since(UNIX_EPOCH).ok()?.as_secs();
    Some(secs as i64)
}

fn save_bm25(bm25: &Bm25Index, path: &Path) -> Result<()> {
    let data = bincode::serialize(bm25)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("pkl.tmp");
    fs::write(&tmp, &data)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

pub fn load_bm25(path: &Path) -> Result<Bm25Index> {
    if !path.exists() {
        return Ok(Bm25Index::new());
    }
    let data = fs::read(path)?;
    Ok(bincode::deserialize(&data)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::embedder::HashingEmbedder;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn indexes_matched_files_and_skips_unchanged() {
        let tmp = tempfile::tempdir().unwrap();
        write_file(tmp.path(), "a.rs", "fn main() { println!(\"hello world\"); }");

        let mut config = ProjectConfig::default();
        config.sources.push(SourceSpec {
            root_path: tmp.path().to_path_buf(),
            glob: "*.rs".to_string(),
            type_tag: "code".to_string(),
            excludes: vec![],
        });

        let data_dir = tmp.path().join(".semadex");
        let indexer = Indexer::new(config, Arc::new(HashingEmbedder::new(32)), data_dir);

        let stats = indexer.index(false).unwrap();
        assert_eq!(stats.files_indexed, 1);
        assert_eq!(stats.files_skipped, 0);

        let stats2 = indexer.index(false).unwrap();
        assert_eq!(stats2.files_indexed, 0);
        assert_eq!(stats2.files_skipped, 1);
    }

    #[test]
    fn removed_files_drop_from_the_store() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_file(tmp.path(), "a.rs", "fn main() {}");

        let mut config = ProjectConfig::default();
        config.sources.push(SourceSpec {
            root_path: tmp.path().to_path_buf(),
            glob: "*.rs".to_string(),
            type_tag: "code".to_string(),
            excludes: vec![],
        });

        let data_dir = tmp.path().join(".semadex");
        let indexer = Indexer::new(config, Arc::new(HashingEmbedder::new(32)), data_dir.clone());
        indexer.index(false).unwrap();

        fs::remove_file(&path).unwrap();
        let stats = indexer.index(false).unwrap();
        assert_eq!(stats.files_removed, 1);

        let store = VectorStore::load(&data_dir.join("store.bin")).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn no_op_pass_skips_rebuild_and_leaves_artifacts_untouched() {
        let tmp = tempfile::tempdir().unwrap();
        write_file(tmp.path(), "a.rs", "fn main() { println!(\"hello world\"); }");

        let mut config = ProjectConfig::default();
        config.sources.push(SourceSpec {
            root_path: tmp.path().to_path_buf(),
            glob: "*.rs".to_string(),
            type_tag: "code".to_string(),
            excludes: vec![],
        });

        let data_dir = tmp.path().join(".semadex");
        let indexer = Indexer::new(config, Arc::new(HashingEmbedder::new(32)), data_dir.clone());
        indexer.index(false).unwrap();

        let graph_bytes_before = fs::read(data_dir.join("graph.json")).unwrap();
        let bm25_modified_before = fs::metadata(data_dir.join("bm25.pkl")).unwrap().modified().unwrap();

        let stats = indexer.index(false).unwrap();
        assert_eq!(stats.files_indexed, 0);
        assert_eq!(stats.files_removed, 0);

        let graph_bytes_after = fs::read(data_dir.join("graph.json")).unwrap();
        let bm25_modified_after = fs::metadata(data_dir.join("bm25.pkl")).unwrap().modified().unwrap();
        assert_eq!(graph_bytes_before, graph_bytes_after);
        assert_eq!(bm25_modified_before, bm25_modified_after);
    }
}
