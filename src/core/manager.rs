//! Index manager (C8): holds named indexes, swaps the active one under a
//! short-held lock, and gates indexing behind a per-index write lease so it
//! can't run concurrently with itself (spec.md §5).
//!
//! Readers (queries) clone the `Arc<LoadedIndex>` under that same short lock
//! and then release it; an old engine is freed once its last clone drops, so
//! in-flight queries against it finish normally even after a swap.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use crate::error::{Result, SemadexError};

use super::bm25::Bm25Index;
use super::config::ProjectConfig;
use super::embedder::Embedder;
use super::graph::SimilarityGraph;
use super::indexer::{self, IndexStats, Indexer};
use super::query::QueryEngine;
use super::vector_store::VectorStore;

/// Everything a query needs, snapshotted at load time.
pub struct LoadedIndex {
    pub name: String,
    pub store: Arc<VectorStore>,
    pub graph: Arc<SimilarityGraph>,
    pub bm25: Arc<Bm25Index>,
    pub config: ProjectConfig,
}

impl LoadedIndex {
    pub fn query_engine(&self, embedder: Arc<dyn Embedder>) -> QueryEngine {
        QueryEngine::new(
            self.store.clone(),
            self.graph.clone(),
            self.bm25.clone(),
            embedder,
            self.config.hybrid.clone(),
            self.config.graph.max_depth,
            self.config.graph.expand_threshold,
        )
    }
}

/// One entry in the "list indexes" surface (spec.md §6): the registered
/// name, its config path, the file count currently on disk, and whether
/// it's the active index.
#[derive(Debug, Clone, serde::Serialize)]
pub struct IndexInfo {
    pub name: String,
    pub path: PathBuf,
    pub file_count: usize,
    pub is_active: bool,
}

/// Number of files tracked by the store persisted next to `config_path`,
/// without loading the rest of the index. Returns 0 if the config or store
/// can't be read.
pub fn file_count_on_disk(config_path: &Path) -> usize {
    let Ok(config) = ProjectConfig::load(config_path) else {
        return 0;
    };
    let data_dir = config.data_dir(config_path);
    VectorStore::load(&data_dir.join("store.bin"))
        .map(|s| s.files.len())
        .unwrap_or(0)
}

struct Registration {
    config_path: PathBuf,
}

pub struct IndexManager {
    embedder: Arc<dyn Embedder>,
    registry: Mutex<HashMap<String, Registration>>,
    active: Mutex<Option<(String, Arc<LoadedIndex>)>>,
    write_leases: Mutex<HashMap<String, Arc<RwLock<()>>>>,
}

impl IndexManager {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            registry: Mutex::new(HashMap::new()),
            active: Mutex::new(None),
            write_leases: Mutex::new(HashMap::new()),
        }
    }

    pub fn register(&self, name: &str, config_path: PathBuf) {
        self.registry.lock().unwrap().insert(
            name.to_string(),
            Registration { config_path },
        );
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.registry.lock().unwrap().keys().cloned().collect();
        names.sort();
        names
    }

    /// Full `{name, path, file_count, is_active}` listing (spec.md §6).
    pub fn list_info(&self) -> Vec<IndexInfo> {
        let active_name = self.active_name();
        let registry = self.registry.lock().unwrap();
        let mut infos: Vec<IndexInfo> = registry
            .iter()
            .map(|(name, reg)| IndexInfo {
                name: name.clone(),
                path: reg.config_path.clone(),
                file_count: file_count_on_disk(&reg.config_path),
                is_active: active_name.as_deref() == Some(name.as_str()),
            })
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }

    pub fn active_name(&self) -> Option<String> {
        self.active.lock().unwrap().as_ref().map(|(n, _)| n.clone())
    }

    /// Clone of the currently active index, if one is loaded.
    pub fn active(&self) -> Option<Arc<LoadedIndex>> {
        self.active.lock().unwrap().as_ref().map(|(_, idx)| idx.clone())
    }

    pub fn embedder(&self) -> Arc<dyn Embedder> {
        self.embedder.clone()
    }

    /// Load `name` from disk and make it the active index. Returns the
    /// freshly loaded engine.
    pub fn switch_to(&self, name: &str) -> Result<Arc<LoadedIndex>> {
        let config_path = {
            let registry = self.registry.lock().unwrap();
            registry
                .get(name)
                .map(|r| r.config_path.clone())
                .ok_or_else(|| SemadexError::UnknownIndex(name.to_string()))?
        };

        let loaded = Arc::new(self.load_from_disk(name, &config_path)?);

        let mut active = self.active.lock().unwrap();
        *active = Some((name.to_string(), loaded.clone()));
        Ok(loaded)
    }

    /// Returns the active index, loading `fallback` if nothing is active yet.
    pub fn ensure_loaded(&self, fallback: Option<&str>) -> Result<Arc<LoadedIndex>> {
        if let Some(idx) = self.active() {
            return Ok(idx);
        }
        let name = fallback.ok_or(SemadexError::IndexNotLoaded)?;
        self.switch_to(name)
    }

    fn load_from_disk(&self, name: &str, config_path: &PathBuf) -> Result<LoadedIndex> {
        let config = ProjectConfig::load(config_path)
            .map_err(|e| SemadexError::CorruptArtifact(format!("project config: {e}")))?;
        let data_dir = config.data_dir(config_path);

        let store = VectorStore::load(&data_dir.join("store.bin"))?;
        let graph = SimilarityGraph::load(&data_dir.join("graph.json"))?;
        let bm25 = indexer::load_bm25(&data_dir.join("bm25.pkl"))
            .map_err(|e| SemadexError::CorruptArtifact(format!("bm25 index: {e}")))?;

        Ok(LoadedIndex {
            name: name.to_string(),
            store: Arc::new(store),
            graph: Arc::new(graph),
            bm25: Arc::new(bm25),
            config,
        })
    }

    fn write_lease(&self, name: &str) -> Arc<RwLock<()>> {
        self.write_leases
            .lock()
            .unwrap()
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(())))
            .clone()
    }

    /// Run an indexing pass for `name`, excluding any concurrent indexing
    /// pass on the same index, then reload it if it's the active index.
    pub fn reindex(&self, name: &str, rebuild: bool) -> Result<IndexStats> {
        let config_path = {
            let registry = self.registry.lock().unwrap();
            registry
                .get(name)
                .map(|r| r.config_path.clone())
                .ok_or_else(|| SemadexError::UnknownIndex(name.to_string()))?
        };

        let lease = self.write_lease(name);
        let _guard = lease.write().unwrap();

        let config = ProjectConfig::load(&config_path)
            .map_err(|e| SemadexError::CorruptArtifact(format!("project config: {e}")))?;
        let data_dir = config.data_dir(&config_path);
        let indexer = Indexer::new(config, self.embedder.clone(), data_dir);
        let stats = indexer
            .index(rebuild)
            .map_err(|e| SemadexError::IoFailure(to_io_error(e)))?;

        let should_reload = self.active_name().as_deref() == Some(name);
        if should_reload {
            self.switch_to(name)?;
        }

        Ok(stats)
    }
}

fn to_io_error(e: anyhow::Error) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::SourceSpec;
    use crate::core::embedder::HashingEmbedder;
    use std::fs;

    #[test]
    fn switch_to_unknown_index_errors() {
        let manager = IndexManager::new(Arc::new(HashingEmbedder::new(16)));
        let err = manager.switch_to("missing").unwrap_err();
        assert_eq!(err.kind(), "UNKNOWN_INDEX");
    }

    #[test]
    fn ensure_loaded_without_active_or_fallback_errors() {
        let manager = IndexManager::new(Arc::new(HashingEmbedder::new(16)));
        let err = manager.ensure_loaded(None).unwrap_err();
        assert_eq!(err.kind(), "INDEX_NOT_LOADED");
    }

    #[test]
    fn reindex_then_switch_reflects_new_data() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("a.rs"), "fn main() { println!(\"hello\"); }").unwrap();

        let mut config = ProjectConfig::default();
        config.sources.push(SourceSpec {
            root_path: tmp.path().to_path_buf(),
            glob: "*.rs".to_string(),
            type_tag: "code".to_string(),
            excludes: vec![],
        });
        let config_path = tmp.path().join("semadex.yaml");
        config.save(&config_path).unwrap();

        let manager = IndexManager::new(Arc::new(HashingEmbedder::new(16)));
        manager.register("demo", config_path);

        let stats = manager.reindex("demo", true).unwrap();
        assert_eq!(stats.files_indexed, 1);

        let loaded = manager.switch_to("demo").unwrap();
        assert_eq!(loaded.store.len(), 1);
    }

    #[test]
    fn list_info_reports_file_count_and_active_flag() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("a.rs"), "fn main() {}").unwrap();

        let mut config = ProjectConfig::default();
        config.sources.push(SourceSpec {
            root_path: tmp.path().to_path_buf(),
            glob: "*.rs".to_string(),
            type_tag: "code".to_string(),
            excludes: vec![],
        });
        let config_path = tmp.path().join("semadex.yaml");
        config.save(&config_path).unwrap();

        let manager = IndexManager::new(Arc::new(HashingEmbedder::new(16)));
        manager.register("demo", config_path);
        manager.reindex("demo", true).unwrap();
        manager.switch_to("demo").unwrap();

        let infos = manager.list_info();
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].name, "demo");
        assert_eq!(infos[0].file_count, 1);
        assert!(infos[0].is_active);
    }
}
