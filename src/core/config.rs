//! Per-index project configuration: what to index, how to chunk it, and the
//! knobs for the similarity graph and hybrid fusion (spec.md §3, §4).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// One glob-matched slice of the filesystem to index, tagged with the type
/// used for query-time filtering (spec.md §3's `type_tag`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSpec {
    pub root_path: PathBuf,
    pub glob: String,
    pub type_tag: String,
    #[serde(default)]
    pub excludes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    #[serde(default = "default_overlap_tokens")]
    pub overlap_tokens: usize,
}

fn default_max_tokens() -> usize {
    400
}

fn default_overlap_tokens() -> usize {
    60
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            overlap_tokens: default_overlap_tokens(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    #[serde(default = "default_k")]
    pub k: usize,
    #[serde(default = "default_threshold")]
    pub threshold: f32,
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    /// Minimum edge weight traversed during query-time expansion
    /// (spec.md §4.3's `min_weight`). Distinct from `threshold`, which
    /// governs which edges the graph keeps at build time.
    #[serde(default = "default_expand_threshold")]
    pub expand_threshold: f32,
}

fn default_k() -> usize {
    10
}

fn default_threshold() -> f32 {
    0.5
}

fn default_max_depth() -> usize {
    2
}

fn default_expand_threshold() -> f32 {
    0.5
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            k: default_k(),
            threshold: default_threshold(),
            max_depth: default_max_depth(),
            expand_threshold: default_expand_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HybridConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_min_score")]
    pub min_score: f32,
    #[serde(default = "default_weight")]
    pub vector_weight: f32,
    #[serde(default = "default_weight")]
    pub bm25_weight: f32,
}

fn default_true() -> bool {
    true
}

fn default_min_score() -> f32 {
    0.5
}

fn default_weight() -> f32 {
    1.0
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            min_score: default_min_score(),
            vector_weight: default_weight(),
            bm25_weight: default_weight(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProjectConfig {
    pub sources: Vec<SourceSpec>,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub graph: GraphConfig,
    #[serde(default)]
    pub hybrid: HybridConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl ProjectConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading project config at {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&content)
            .with_context(|| format!("parsing project config at {}", path.display()))?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Where the vector store / graph / BM25 artifacts live for this index,
    /// defaulting to a `.semadex` directory next to the config.
    pub fn data_dir(&self, config_path: &Path) -> PathBuf {
        self.storage.data_dir.clone().unwrap_or_else(|| {
            config_path
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join(".semadex")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = ProjectConfig::default();
        assert_eq!(config.chunking.max_tokens, 400);
        assert_eq!(config.graph.k, 10);
        assert_eq!(config.graph.expand_threshold, 0.5);
        assert!(config.hybrid.enabled);
        assert_eq!(config.hybrid.min_score, 0.5);
    }

    #[test]
    fn roundtrips_through_yaml() {
        let mut config = ProjectConfig::default();
        config.sources.push(SourceSpec {
            root_path: PathBuf::from("."),
            glob: "**/*.rs".to_string(),
            type_tag: "code".to_string(),
            excludes: vec!["target/**".to_string()],
        });

        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: ProjectConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.sources.len(), 1);
        assert_eq!(parsed.sources[0].glob, "**/*.rs");
    }
}
