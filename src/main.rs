//! Skilldex CLI
//!
//! Thin command-line surface over the library for corpora stored in the
//! canonical JSON shape:
//! - Rebuild the index and show indexing stats
//! - Run structured queries and statistics
//! - Run BM25 keyword search
//! - Inspect one action record
//!
//! Dialect decoding is out of scope here: the `index` command expects
//! documents a decoder has already reduced to the canonical shape.

use anyhow::Context;
use clap::{Parser, Subcommand};
use skilldex::config::{generate_default_config, Config};
use skilldex::document::JsonDirSource;
use skilldex::query::StructuredQueryEngine;
use skilldex::search::{Bm25Index, FusionMethod};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "skilldex")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Query and search engine for structured skill documents")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory of canonical-shape skill documents (*.json)
    #[arg(long, global = true)]
    pub documents: Option<PathBuf>,

    /// Output format (json, pretty)
    #[arg(short, long, default_value = "pretty", global = true)]
    pub format: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Rebuild the index and print indexing stats
    Index {
        /// Reindex files even when their content hash is unchanged
        #[arg(long)]
        force: bool,
    },

    /// Run a structured query
    Query {
        /// Query text (simple or SELECT form)
        query: String,
        /// Maximum results
        #[arg(short, long, default_value = "100")]
        limit: usize,
        /// Include raw source context per result
        #[arg(long)]
        context: bool,
    },

    /// Grouped statistics over the catalogue
    Stats {
        /// Optional pre-filter query
        #[arg(short, long)]
        query: Option<String>,
        /// Field to group by
        #[arg(short, long, default_value = "action_type")]
        group_by: String,
    },

    /// BM25 keyword search over action summaries and parameters
    Search {
        /// Search text
        text: String,
        /// Maximum results
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Show one action record with its raw context
    Detail {
        /// File path as indexed
        file: String,
        /// Record address, e.g. tracks[0].actions[1]
        json_path: String,
    },

    /// Generate a default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn init_logging(config: &Config) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone()));

    if config.logging.format == "json" {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn build_engine(cli: &Cli, config: &Config, force: bool) -> anyhow::Result<(StructuredQueryEngine, skilldex::IndexStats)> {
    let dir = cli
        .documents
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.index.documents_dir));
    let source = JsonDirSource::new(&dir);
    let engine = StructuredQueryEngine::with_config(Arc::new(source), config.engine_config());
    let stats = engine
        .rebuild_index(force)
        .with_context(|| format!("failed to index documents in {}", dir.display()))?;
    Ok((engine, stats))
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load_default();
    init_logging(&config);

    match &cli.command {
        Commands::Index { force } => {
            let (_engine, stats) = build_engine(&cli, &config, *force)?;
            if cli.format == "json" {
                print_json(&stats)?;
            } else {
                println!(
                    "{} files ({} indexed, {} skipped), {} actions",
                    stats.total_files, stats.indexed_files, stats.skipped_files, stats.total_actions
                );
                for error in &stats.errors {
                    eprintln!("  error in {}: {}", error.file, error.error);
                }
            }
        }

        Commands::Query { query, limit, context } => {
            let (engine, _) = build_engine(&cli, &config, false)?;
            let response = engine.query(query, *limit, *context);
            if cli.format == "json" {
                print_json(&response)?;
            } else {
                if let Some(warning) = &response.parse_warning {
                    eprintln!("warning: {}", warning);
                }
                println!(
                    "{} matches ({} returned) in {:.2} ms",
                    response.total_matches, response.returned_count, response.query_time_ms
                );
                for item in &response.results {
                    match item {
                        skilldex::query::QueryResultItem::Action(hit) => {
                            println!(
                                "  {}#{}  [{}] {}",
                                hit.file_path, hit.record.json_path, hit.track_name,
                                hit.record.summary
                            );
                        }
                        skilldex::query::QueryResultItem::Aggregate(row) => {
                            let rendered: Vec<String> = row
                                .iter()
                                .map(|(k, v)| format!("{}={}", k, v.as_str_lossy()))
                                .collect();
                            println!("  {}", rendered.join("  "));
                        }
                    }
                }
            }
        }

        Commands::Stats { query, group_by } => {
            let (engine, _) = build_engine(&cli, &config, false)?;
            let report = engine.get_statistics(query.as_deref(), group_by)?;
            if cli.format == "json" {
                print_json(&report)?;
            } else {
                println!("{} actions in {} groups", report.total_actions, report.groups.len());
                for (group, stats) in &report.groups {
                    println!("  {} ({} records)", group, stats.count);
                    for (metric, value) in &stats.metrics {
                        println!("    {} = {:.2}", metric, value);
                    }
                }
            }
        }

        Commands::Search { text, limit } => {
            let (engine, _) = build_engine(&cli, &config, false)?;
            let mut bm25 = Bm25Index::with_params(config.search.bm25_k1, config.search.bm25_b);
            engine.index_search_text(&mut bm25);

            // No vector provider on the CLI: fuse against an empty list
            let hits = engine.search_text(&bm25, text, &[], *limit, FusionMethod::ReciprocalRank);
            if cli.format == "json" {
                print_json(&hits)?;
            } else {
                for hit in &hits {
                    println!("  {:.4}  {}", hit.score, hit.doc_id);
                }
            }
        }

        Commands::Detail { file, json_path } => {
            let (engine, _) = build_engine(&cli, &config, false)?;
            match engine.get_action_detail(file, json_path) {
                Some(detail) => {
                    if cli.format == "json" {
                        print_json(&detail)?;
                    } else {
                        println!("{} [{}] {}", detail.skill_name, detail.track_name, detail.record.summary);
                        if let Some(context) = &detail.context {
                            println!("---\n{}\n---", context);
                        }
                    }
                }
                None => {
                    eprintln!("no record at {}#{}", file, json_path);
                    std::process::exit(1);
                }
            }
        }

        Commands::Config { output } => match output {
            Some(path) => {
                std::fs::write(path, generate_default_config())
                    .with_context(|| format!("failed to write {}", path.display()))?;
                println!("wrote {}", path.display());
            }
            None => print!("{}", generate_default_config()),
        },
    }

    Ok(())
}
