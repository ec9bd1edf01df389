//! Query command - run a single query against a named index.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use colored::Colorize;

use crate::core::embedder::HashingEmbedder;
use crate::core::manager::IndexManager;

pub struct QueryOptions {
    pub config_path: PathBuf,
    pub text: String,
    pub top_k: usize,
    pub type_filter: Option<String>,
    pub expand: bool,
    pub expand_depth: Option<usize>,
    pub min_score: Option<f32>,
    pub json: bool,
}

pub async fn run(options: QueryOptions) -> Result<()> {
    let start = Instant::now();
    let embedder = Arc::new(HashingEmbedder::default());
    let manager = IndexManager::new(embedder.clone());
    manager.register("default", options.config_path.clone());

    let loaded = manager.switch_to("default")?;
    let engine = loaded.query_engine(embedder);
    let result = engine.query(
        &options.text,
        options.top_k,
        options.type_filter.as_deref(),
        options.expand,
        options.expand_depth,
        options.min_score,
    )?;

    if options.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    if result.direct.is_empty() {
        println!("{} No matches found", "⚠".yellow());
        return Ok(());
    }

    for (i, hit) in result.direct.iter().enumerate() {
        println!(
            "{} {} {}:{}-{}",
            format!("{}.", i + 1).dimmed(),
            format!("{:.4}", hit.score).green().bold(),
            hit.parent_path.cyan(),
            hit.start_line,
            hit.end_line,
        );
    }

    if options.expand && !result.related.is_empty() {
        println!();
        println!("{}", "Related files".dimmed());
        for rel in &result.related {
            println!(
                "   {} {} ({:.3})",
                "↳".dimmed(),
                rel.parent_path.cyan(),
                rel.edge_weight
            );
        }
    }

    println!();
    println!("{} in {:.2}s", "done".dimmed(), start.elapsed().as_secs_f64());

    Ok(())
}
