//! Index command - run a single indexing pass for a named index.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use colored::Colorize;

use crate::core::config::ProjectConfig;
use crate::core::embedder::HashingEmbedder;
use crate::core::indexer::Indexer;

pub struct IndexOptions {
    pub config_path: PathBuf,
    pub force: bool,
    pub json: bool,
}

pub async fn run(options: IndexOptions) -> Result<()> {
    let config = ProjectConfig::load(&options.config_path)
        .with_context(|| format!("loading {}", options.config_path.display()))?;
    let data_dir = config.data_dir(&options.config_path);

    if !options.json {
        println!(
            "{} {} {}",
            "⚡".yellow(),
            "Indexing".cyan().bold(),
            options.config_path.display().to_string().dimmed()
        );
    }

    let embedder = Arc::new(HashingEmbedder::default());
    let indexer = Indexer::new(config, embedder, data_dir);
    let stats = indexer.index(options.force)?;

    if options.json {
        println!(
            "{}",
            serde_json::json!({
                "files_scanned": stats.files_scanned,
                "files_indexed": stats.files_indexed,
                "files_skipped": stats.files_skipped,
                "files_removed": stats.files_removed,
                "chunks_written": stats.chunks_written,
            })
        );
        return Ok(());
    }

    println!();
    if stats.files_indexed > 0 || stats.files_skipped > 0 {
        println!(
            "{} Indexed {} files ({} new, {} unchanged, {} removed)",
            "✓".green().bold(),
            stats.files_scanned.to_string().cyan(),
            stats.files_indexed.to_string().green(),
            stats.files_skipped.to_string().dimmed(),
            stats.files_removed.to_string().dimmed(),
        );
        println!("   {} chunks written", stats.chunks_written.to_string().cyan());
    } else {
        println!("{} No files matched the configured sources", "⚠".yellow());
    }

    Ok(())
}
