use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use semadex::commands::{index, query, registry, serve};

#[derive(Parser)]
#[command(name = "semadex")]
#[command(about = "Persistent semantic-retrieval daemon for source-code and document repositories")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one indexing pass against a project config
    #[command(alias = "i")]
    Index {
        /// Path to the project config (YAML)
        #[arg(long, default_value = "semadex.yaml")]
        config: PathBuf,

        /// Re-chunk and re-embed every matched file, ignoring the cache
        #[arg(short, long)]
        force: bool,

        #[arg(long)]
        json: bool,
    },

    /// Run a single query against a project config
    #[command(alias = "q")]
    Query {
        /// Natural language query
        text: String,

        /// Path to the project config (YAML)
        #[arg(long, default_value = "semadex.yaml")]
        config: PathBuf,

        /// Maximum number of direct matches
        #[arg(short = 'k', long, default_value = "10")]
        top_k: usize,

        /// Restrict results to a source type tag
        #[arg(long = "type")]
        type_filter: Option<String>,

        /// Include graph-expanded related files
        #[arg(long, default_value = "true")]
        expand: bool,

        /// Override the graph expansion depth for this query
        #[arg(long)]
        expand_depth: Option<usize>,

        /// Override the minimum dense-search score for this query
        #[arg(long)]
        min_score: Option<f32>,

        #[arg(long)]
        json: bool,
    },

    /// Run the daemon, serving HTTP and WebSocket clients
    Serve {
        /// Path to the daemon config (YAML)
        #[arg(long, default_value = "daemon.yaml")]
        config: PathBuf,
    },

    /// List the indexes registered with a daemon config
    ListIndexes {
        #[arg(long, default_value = "daemon.yaml")]
        config: PathBuf,

        #[arg(long)]
        json: bool,
    },

    /// Register (or update) a named index in a daemon config
    AddIndex {
        #[arg(long, default_value = "daemon.yaml")]
        config: PathBuf,

        name: String,

        /// Path to that index's project config
        index_config: PathBuf,

        /// Make this the daemon's default index
        #[arg(long)]
        default: bool,
    },

    /// Set the daemon's default index
    SwitchIndex {
        #[arg(long, default_value = "daemon.yaml")]
        config: PathBuf,

        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Index { config, force, json } => {
            index::run(index::IndexOptions {
                config_path: config,
                force,
                json,
            })
            .await?;
        }
        Commands::Query {
            text,
            config,
            top_k,
            type_filter,
            expand,
            expand_depth,
            min_score,
            json,
        } => {
            query::run(query::QueryOptions {
                config_path: config,
                text,
                top_k,
                type_filter,
                expand,
                expand_depth,
                min_score,
                json,
            })
            .await?;
        }
        Commands::Serve { config } => {
            serve::run(serve::ServeOptions {
                daemon_config_path: config,
            })
            .await?;
        }
        Commands::ListIndexes { config, json } => {
            registry::list(&config, json)?;
        }
        Commands::AddIndex {
            config,
            name,
            index_config,
            default,
        } => {
            registry::register(&config, name, index_config, default)?;
        }
        Commands::SwitchIndex { config, name } => {
            registry::switch_default(&config, name)?;
        }
    }

    Ok(())
}
