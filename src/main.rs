//! Rust Page Outline CLI
//!
//! Inspect, search and edit the outlines of a paginated document.

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser, Subcommand};
use rust_page_outline::{
    config::{Config, DeletePolicy},
    engine::{EditOutcome, OutlineEngine},
    glossary::TermStore,
    persistence::{document_exists, document_size, load_document, save_document},
    registry::Registry,
    search::{SearchOptions, SectionSearcher},
    section::Section,
    sync::PersistedOutline,
    tree::{OutlineDocument, OutlineMode, max_depth},
};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Rust Page Outline - outline trees for paginated documents
#[derive(Parser)]
#[command(name = "page-outline")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the outline document (.json or .bin)
    #[arg(short, long, global = true, default_value = "data/outline.json")]
    document: PathBuf,

    /// Outline to work on (ai-toc or bookmarks); defaults to the configured mode
    #[arg(short, long, global = true)]
    mode: Option<OutlineMode>,

    /// Log edits and index rebuilds
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display an outline
    Show {
        /// Output the persisted items as JSON instead of a formatted tree
        #[arg(long)]
        json: bool,
    },

    /// Show information about an outline document
    Info,

    /// Search sections, or glossary terms with --terms
    Search {
        /// The search query
        query: String,

        /// Number of results to return
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Search glossary terms instead of sections
        #[arg(long)]
        terms: bool,

        /// Include deleted (hidden) sections
        #[arg(long)]
        all: bool,
    },

    /// Find the section current at a reading position
    Locate {
        /// 0-based page index
        #[arg(long)]
        page: u32,

        /// Vertical offset on the page
        #[arg(long)]
        y: f64,
    },

    /// Set the bookmark title of a section
    Rename {
        id: u64,
        title: String,
    },

    /// Delete a section
    Delete {
        id: u64,

        /// Delete the section's children as well
        #[arg(long)]
        drop_subtree: bool,
    },

    /// Promote (--left) or demote (--right) a section one level
    #[command(group(ArgGroup::new("direction").required(true).args(["left", "right"])))]
    Indent {
        id: u64,

        #[arg(long)]
        left: bool,

        #[arg(long)]
        right: bool,
    },

    /// Add a bookmark at a reading position
    Add {
        title: String,

        #[arg(long)]
        page: u32,

        #[arg(long)]
        y: f64,
    },

    /// Show the outline a mode switch leads to
    Switch,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = Config::load().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;
    let mode = cli.mode.unwrap_or(config.outline.default_mode);
    let path = cli.document.as_path();

    match cli.command {
        Commands::Show { json } => cmd_show(path, mode, json, &config),
        Commands::Info => cmd_info(path),
        Commands::Search {
            query,
            top_k,
            terms,
            all,
        } => {
            let limit = top_k.unwrap_or(config.search.max_results);
            if terms {
                cmd_search_terms(path, &query, limit)
            } else {
                cmd_search(path, mode, &query, limit, all, &config)
            }
        }
        Commands::Locate { page, y } => cmd_locate(path, mode, page, y, &config),
        Commands::Rename { id, title } => {
            cmd_edit(path, mode, &config, |engine| engine.rename(id, title))
        }
        Commands::Delete { id, drop_subtree } => {
            let mut config = config.clone();
            if drop_subtree {
                config.outline.delete_policy = DeletePolicy::DropSubtree;
            }
            cmd_edit(path, mode, &config, |engine| engine.delete(id))
        }
        Commands::Indent { id, left, .. } => cmd_edit(path, mode, &config, |engine| {
            if left {
                engine.left_indent(id)
            } else {
                engine.right_indent(id)
            }
        }),
        Commands::Add { title, page, y } => {
            cmd_edit(path, mode, &config, |engine| engine.insert_bookmark(title, page, y))
        }
        Commands::Switch => cmd_switch(path, mode, &config),
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn open(path: &Path) -> Result<OutlineDocument> {
    if !document_exists(path) {
        anyhow::bail!("Outline document not found at '{}'.", path.display());
    }
    load_document(path).context("Failed to load outline document")
}

fn engine_for(document: &OutlineDocument, mode: OutlineMode, config: &Config) -> OutlineEngine<PersistedOutline> {
    let mut settings = config.outline.clone();
    settings.default_mode = mode;
    OutlineEngine::from_document(document, settings, PersistedOutline::new(document.clone()))
}

fn cmd_show(path: &Path, mode: OutlineMode, json: bool, config: &Config) -> Result<()> {
    let document = open(path)?;

    if json {
        let json_str = serde_json::to_string_pretty(document.items(mode)).context("Failed to serialize outline")?;
        println!("{}", json_str);
    } else {
        let engine = engine_for(&document, mode, config);
        println!("{}", engine.snapshot().format());
    }

    Ok(())
}

fn cmd_info(path: &Path) -> Result<()> {
    let document = open(path)?;
    let size = document_size(path)?;

    println!("Outline Document Information");
    println!("{}", "─".repeat(40));
    println!("  Document:     {}", document.name);
    println!("  Total pages:  {}", document.total_pages);
    for mode in [OutlineMode::AiToc, OutlineMode::Bookmarks] {
        let roots = document.roots(mode);
        let visible: usize = roots.iter().map(|root| root.node_count()).sum();
        let stored = document.sections(mode).len();
        println!(
            "  {:<13} {} sections ({} hidden), depth {}",
            format!("{}:", mode),
            visible,
            stored - visible,
            max_depth(&roots)
        );
    }
    println!("  Terms:        {}", document.terms.len());
    println!("  File size:    {:.1} KB", size as f64 / 1024.0);
    println!("  Path:         {}", path.display());

    Ok(())
}

fn cmd_search(
    path: &Path,
    mode: OutlineMode,
    query: &str,
    limit: usize,
    include_hidden: bool,
    config: &Config,
) -> Result<()> {
    let document = open(path)?;
    let searcher = SectionSearcher::with_options(SearchOptions {
        max_results: limit,
        include_hidden,
    });

    let start = Instant::now();
    let results = if include_hidden {
        searcher.search(&document.sections(mode), query)
    } else {
        searcher.search_snapshot(&engine_for(&document, mode, config).snapshot(), query)
    };
    let search_duration = start.elapsed();

    if results.is_empty() {
        println!("No matching sections found.");
        return Ok(());
    }

    println!("Results ({}):", mode);
    println!("{}", "─".repeat(60));
    for (i, section) in results.iter().enumerate() {
        println!("{:>2}. {}", i + 1, describe(section));
    }
    println!("{}", "─".repeat(60));
    println!("Found {} results in {:.2?}", results.len(), search_duration);

    Ok(())
}

fn cmd_search_terms(path: &Path, query: &str, limit: usize) -> Result<()> {
    let document = open(path)?;
    let registry: Registry<TermStore> = Registry::new();
    let store = registry.acquire(&document.name, || TermStore::new(document.name.clone()));
    store
        .load(|| Ok(document.terms.clone()))
        .context("Failed to load glossary")?;

    let results = store.search(query, limit);
    registry.release(&document.name);

    if results.is_empty() {
        println!("No matching terms found.");
        return Ok(());
    }

    println!("Terms:");
    println!("{}", "─".repeat(60));
    for (i, term) in results.iter().enumerate() {
        println!("{:>2}. {} ({} refs) #{}", i + 1, term.term, term.num_refs, term.id);
        if let Some(definition) = &term.definition {
            let preview: String = definition.chars().take(120).collect();
            println!("    {}", preview);
        }
    }

    Ok(())
}

fn cmd_locate(path: &Path, mode: OutlineMode, page: u32, y: f64, config: &Config) -> Result<()> {
    let document = open(path)?;
    let snapshot = engine_for(&document, mode, config).snapshot();

    match snapshot.nearest_section(page, y) {
        Some(section) => {
            println!("{}", describe(&section));
            if let Some(title) = snapshot.nearest_title(section.id()) {
                println!("  Within: {}", title);
            }
        }
        None => println!("No section precedes page {}, y {}.", page, y),
    }

    Ok(())
}

fn cmd_edit<F>(path: &Path, mode: OutlineMode, config: &Config, edit: F) -> Result<()>
where
    F: FnOnce(&mut OutlineEngine<PersistedOutline>) -> rust_page_outline::Result<EditOutcome>,
{
    let document = open(path)?;
    let mut engine = engine_for(&document, mode, config);

    let id = match edit(&mut engine).context("Edit failed")? {
        EditOutcome::Applied(id) => id,
        EditOutcome::Abandoned(err) => anyhow::bail!("Edit not applied: {}", err),
    };

    let snapshot = engine.snapshot();
    let changes = engine.adapter().applied_changes();
    save_document(engine.adapter().document(), path).context("Failed to save outline document")?;
    info!(id, changes, "saved edited outline");

    match snapshot.section(id) {
        Some(section) => println!("Updated {}", describe(&section)),
        None => println!("Removed #{}", id),
    }
    println!("{}", snapshot.format());

    Ok(())
}

fn cmd_switch(path: &Path, mode: OutlineMode, config: &Config) -> Result<()> {
    let document = open(path)?;
    let mut engine = engine_for(&document, mode, config);
    engine.switch_mode();
    println!("{}", engine.snapshot().format());

    Ok(())
}

fn describe(section: &Section) -> String {
    format!(
        "{} [page {}, y {}] ({} refs) #{}",
        section.full_descriptor(),
        section.page(),
        section.y(),
        section.num_refs(),
        section.id()
    )
}
