//! `context-engine` command line.
//!
//! Every subcommand analyzes the project once, runs one query against the
//! live model and prints text or, with `--json`, a JSON document on stdout.
//! Logs go to stderr.

use anyhow::{anyhow, Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand};
use context_graph::{DependencyGraph, GraphError, GraphNodeId};
use context_indexer::{ChangeWatcher, ContextEngine, ContextService, EngineConfig};
use context_search::CodeQuery;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::sync::broadcast::error::RecvError;

mod report;

use report::{DependencyEntry, DependentsOutput, DepsOutput, PathOutput, StatsOutput};

#[derive(Parser)]
#[command(name = "context-engine")]
#[command(about = "Live code context and dependency queries", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(long, global = true)]
    quiet: bool,

    /// Print JSON on stdout instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Engine config file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a project and print its summary
    Analyze(ProjectArgs),

    /// Find code related to a free-text query
    Search(SearchArgs),

    /// Show what a symbol depends on, or with --reverse what depends on it
    Deps(DepsArgs),

    /// Check whether one symbol transitively depends on another
    Path(PathArgs),

    /// List circular dependencies
    Cycles(ProjectArgs),

    /// Print dependency graph and engine statistics
    Stats(ProjectArgs),

    /// Keep the model live and print each applied change batch
    Watch(WatchArgs),
}

#[derive(Args)]
struct ProjectArgs {
    /// Project directory (defaults to current directory)
    #[arg(default_value = ".")]
    path: PathBuf,
}

#[derive(Args)]
struct SearchArgs {
    /// Search query
    query: String,

    /// Project directory
    #[arg(short, long, default_value = ".")]
    path: PathBuf,

    /// Maximum number of results
    #[arg(short, long)]
    limit: Option<usize>,
}

#[derive(Args)]
struct DepsArgs {
    /// Symbol name or full node id
    symbol: String,

    /// Project directory
    #[arg(short, long, default_value = ".")]
    path: PathBuf,

    /// List dependents instead of dependencies
    #[arg(long)]
    reverse: bool,
}

#[derive(Args)]
struct PathArgs {
    /// Symbol the path starts from
    from: String,

    /// Symbol the path should reach
    to: String,

    /// Project directory
    #[arg(short, long, default_value = ".")]
    path: PathBuf,
}

#[derive(Args)]
struct WatchArgs {
    /// Project directory (defaults to current directory)
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Debounce window in milliseconds (overrides config)
    #[arg(long)]
    debounce_ms: Option<u64>,
}

pub async fn main_entry() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);
    run(cli).await
}

fn init_logging(cli: &Cli) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();
}

pub async fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if let Commands::Search(args) = &cli.command {
        if let Some(limit) = args.limit {
            anyhow::ensure!(limit > 0, "--limit must be at least 1");
            config.max_results = limit;
        }
    }
    if let Commands::Watch(args) = &cli.command {
        if let Some(debounce_ms) = args.debounce_ms {
            config.watch_debounce_ms = debounce_ms;
        }
    }

    let engine = ContextEngine::new(config);
    let json = cli.json;

    match cli.command {
        Commands::Analyze(args) => {
            let project = engine.analyze_project(&project_path(&args.path)?).await;
            emit(json, &*project, report::render_project)?;
        }
        Commands::Search(args) => {
            engine.analyze_project(&project_path(&args.path)?).await;
            let hits = engine.find_related_code(&CodeQuery::new(args.query));
            emit(json, &hits, |hits| report::render_search(hits))?;
        }
        Commands::Deps(args) => {
            let graph = engine.dependency_graph(&project_path(&args.path)?).await;
            let symbol = resolve(&graph, &args.symbol)?;
            if args.reverse {
                let output = DependentsOutput {
                    dependents: graph.dependents(&symbol),
                    symbol,
                };
                emit(json, &output, report::render_dependents)?;
            } else {
                let dependencies = graph
                    .dependencies(&symbol)
                    .into_iter()
                    .map(|target| DependencyEntry {
                        resolved: graph.resolve_target(&target),
                        target,
                    })
                    .collect();
                let output = DepsOutput {
                    symbol,
                    dependencies,
                };
                emit(json, &output, report::render_deps)?;
            }
        }
        Commands::Path(args) => {
            let graph = engine.dependency_graph(&project_path(&args.path)?).await;
            let from = resolve(&graph, &args.from)?;
            let to = resolve(&graph, &args.to)?;
            let output = PathOutput {
                reachable: graph.has_path(&from, &to),
                from,
                to,
            };
            emit(json, &output, report::render_path)?;
        }
        Commands::Cycles(args) => {
            let graph = engine.dependency_graph(&project_path(&args.path)?).await;
            let cycles = graph.detect_circular_dependencies();
            emit(json, &cycles, |cycles| report::render_cycles(&graph, cycles))?;
        }
        Commands::Stats(args) => {
            let graph = engine.dependency_graph(&project_path(&args.path)?).await;
            let output = StatsOutput {
                graph: graph.statistics(),
                engine: engine.metrics(),
            };
            emit(json, &output, report::render_stats)?;
        }
        Commands::Watch(args) => watch(engine, &project_path(&args.path)?, json).await?,
    }
    Ok(())
}

async fn watch(engine: ContextEngine, root: &Path, json: bool) -> Result<()> {
    let project = engine.analyze_project(root).await;
    emit(json, &*project, report::render_project)?;

    let watcher = ChangeWatcher::start(engine.clone(), root)
        .with_context(|| format!("Failed to watch {}", root.display()))?;
    let mut updates = watcher.subscribe_updates();
    log::info!(
        "Watching {} (debounce {}ms); press Ctrl-C to stop",
        watcher.root().display(),
        engine.config().watch_debounce_ms
    );

    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Ok(update) => emit(json, &update, report::render_update)?,
                Err(RecvError::Lagged(skipped)) => log::warn!("Skipped {skipped} update(s)"),
                Err(RecvError::Closed) => break,
            },
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl-C")?;
                break;
            }
        }
    }
    Ok(())
}

fn project_path(path: &Path) -> Result<PathBuf> {
    path.canonicalize()
        .with_context(|| format!("Invalid project path {}", path.display()))
}

fn resolve(graph: &DependencyGraph, symbol: &str) -> Result<GraphNodeId> {
    graph.resolve_symbol(symbol).map_err(|err| match err {
        GraphError::AmbiguousSymbol { name, candidates } => {
            let listed: Vec<String> = candidates.iter().map(ToString::to_string).collect();
            anyhow!(
                "Symbol {name} is ambiguous; pass one of:\n  {}",
                listed.join("\n  ")
            )
        }
        other => anyhow!(other),
    })
}

fn emit<T: Serialize + ?Sized>(json: bool, value: &T, render: impl Fn(&T) -> String) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        print!("{}", render(value));
    }
    Ok(())
}
