//! list-indexes / switch-index commands - manage the daemon's index
//! registry without starting the server.

use std::path::PathBuf;

use anyhow::Result;
use colored::Colorize;

use crate::core::manager::file_count_on_disk;
use crate::daemon_config::{DaemonConfig, IndexRegistration};

pub fn list(daemon_config_path: &PathBuf, json: bool) -> Result<()> {
    let config = DaemonConfig::load(daemon_config_path)?;

    let infos: Vec<serde_json::Value> = config
        .indexes
        .iter()
        .map(|reg| {
            serde_json::json!({
                "name": reg.name,
                "path": reg.config_path,
                "file_count": file_count_on_disk(&reg.config_path),
                "is_active": config.default_index.as_deref() == Some(reg.name.as_str()),
            })
        })
        .collect();

    if json {
        println!("{}", serde_json::json!({ "indexes": infos }));
        return Ok(());
    }

    if config.indexes.is_empty() {
        println!("{} No indexes registered", "⚠".yellow());
        return Ok(());
    }

    for reg in &config.indexes {
        let is_active = config.default_index.as_deref() == Some(reg.name.as_str());
        let marker = if is_active { "*".green().bold() } else { " ".normal() };
        let file_count = file_count_on_disk(&reg.config_path);
        println!(
            "{} {} {} {}",
            marker,
            reg.name.cyan(),
            reg.config_path.display().to_string().dimmed(),
            format!("({file_count} files)").dimmed(),
        );
    }

    Ok(())
}

pub fn register(
    daemon_config_path: &PathBuf,
    name: String,
    index_config_path: PathBuf,
    make_default: bool,
) -> Result<()> {
    let mut config = DaemonConfig::load(daemon_config_path)?;
    config.indexes.retain(|r| r.name != name);
    config.indexes.push(IndexRegistration {
        name: name.clone(),
        config_path: index_config_path,
    });
    if make_default || config.default_index.is_none() {
        config.default_index = Some(name.clone());
    }
    config.save(daemon_config_path)?;

    println!("{} registered index {}", "✓".green().bold(), name.cyan());
    Ok(())
}

pub fn switch_default(daemon_config_path: &PathBuf, name: String) -> Result<()> {
    let mut config = DaemonConfig::load(daemon_config_path)?;
    if !config.indexes.iter().any(|r| r.name == name) {
        anyhow::bail!("no such index: {name}");
    }
    config.default_index = Some(name.clone());
    config.save(daemon_config_path)?;

    println!("{} default index set to {}", "✓".green().bold(), name.cyan());
    Ok(())
}
