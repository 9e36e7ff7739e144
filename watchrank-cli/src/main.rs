mod api;
mod cache;
mod config;
mod history;
mod output;
mod service;

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;
use watchrank_core::{Backend, LogisticConfig};

use crate::api::AppState;
use crate::cache::{DEFAULT_CACHE_TTL, SnapshotCache};
use crate::config::{LogisticSection, WatchrankConfig};
use crate::history::HistorySource;
use crate::service::RatingService;

const DEFAULT_BIND: &str = "127.0.0.1:3000";

pub fn bail(msg: impl std::fmt::Display) -> ! {
    eprintln!("Error: {msg}");
    std::process::exit(1);
}

#[derive(Parser)]
#[command(name = "watchrank", version, about = "Rate titles from a watch history of pairwise judgments")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Serve GET /api/movies over HTTP
    Serve(ServeArgs),
    /// Compute ratings once and print them
    Rank(RankArgs),
    /// Create a default config file at ~/.config/watchrank/config.toml
    Init,
}

#[derive(clap::Args)]
struct SourceArgs {
    /// Watch history JSON file
    #[arg(long, env = "WATCHRANK_HISTORY")]
    history: Option<PathBuf>,

    /// URL serving the watch history JSON (used when no file is given)
    #[arg(long, env = "WATCHRANK_HISTORY_URL")]
    history_url: Option<String>,

    /// Path to config file (default: ~/.config/watchrank/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Debug-level logging (RUST_LOG overrides)
    #[arg(short, long)]
    verbose: bool,
}

#[derive(clap::Args, Default)]
struct LogisticArgs {
    /// Logistic solver backend: "auto", "dense" or "sparse"
    #[arg(long)]
    backend: Option<String>,

    /// Training epochs for the logistic solver
    #[arg(long)]
    epochs: Option<usize>,

    /// Adam learning rate for the logistic solver
    #[arg(long)]
    learning_rate: Option<f64>,

    /// Mini-batch size for the logistic solver
    #[arg(long)]
    batch_size: Option<usize>,

    /// Fixed seed for reproducible logistic scores
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Parser)]
struct ServeArgs {
    #[command(flatten)]
    source: SourceArgs,

    #[command(flatten)]
    logistic: LogisticArgs,

    /// Address to listen on (default: 127.0.0.1:3000)
    #[arg(long)]
    bind: Option<String>,

    /// Seconds a computed result is served before recomputing (default: 3600)
    #[arg(long)]
    cache_seconds: Option<u64>,
}

#[derive(Parser)]
struct RankArgs {
    #[command(flatten)]
    source: SourceArgs,

    #[command(flatten)]
    logistic: LogisticArgs,

    /// Output JSON instead of table
    #[arg(long)]
    json: bool,

    /// Print the comparison graph as JSON instead of rankings
    #[arg(long, conflicts_with = "json")]
    graph: bool,
}

/// Set up tracing on stderr. RUST_LOG wins over --verbose.
fn init_logging(verbose: bool) {
    let default = if verbose { "watchrank=debug,watchrank_core=debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// History source: CLI file > CLI URL > config file > config URL.
fn resolve_source(args: &SourceArgs, cfg: &WatchrankConfig) -> Option<HistorySource> {
    if let Some(path) = &args.history {
        return Some(HistorySource::File(path.clone()));
    }
    if let Some(url) = &args.history_url {
        return Some(HistorySource::Url(url.clone()));
    }
    if let Some(path) = &cfg.history {
        return Some(HistorySource::File(path.clone()));
    }
    cfg.history_url.clone().map(HistorySource::Url)
}

/// Layer CLI flags over the `[logistic]` config table over solver defaults.
fn resolve_logistic(args: &LogisticArgs, section: &LogisticSection) -> Result<LogisticConfig, String> {
    let defaults = LogisticConfig::default();
    let backend = match args.backend.as_deref().or(section.backend.as_deref()) {
        Some(name) => name.parse::<Backend>()?,
        None => defaults.backend,
    };

    let config = LogisticConfig {
        learning_rate: args.learning_rate.or(section.learning_rate).unwrap_or(defaults.learning_rate),
        epochs: args.epochs.or(section.epochs).unwrap_or(defaults.epochs),
        batch_size: args.batch_size.or(section.batch_size).unwrap_or(defaults.batch_size),
        validation_split: section.validation_split.unwrap_or(defaults.validation_split),
        backend,
        seed: args.seed.or(section.seed),
        ..defaults
    };
    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

/// Load config and build the rating service shared by both subcommands.
fn build_service(source: &SourceArgs, logistic: &LogisticArgs, cache_ttl: Option<u64>) -> (RatingService, WatchrankConfig) {
    let config_path = source.config.clone().unwrap_or_else(config::config_path);
    let cfg = config::load_config(&config_path);

    let history = resolve_source(source, &cfg).unwrap_or_else(|| {
        bail(format!(
            "No watch history specified. Pass --history or --history-url, or set one in {}",
            config_path.display()
        ))
    });
    let logistic = resolve_logistic(logistic, &cfg.logistic).unwrap_or_else(|e| bail(e));
    let ttl = cache_ttl
        .or(cfg.cache_seconds)
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_CACHE_TTL);

    tracing::debug!(source = %history.describe(), ?logistic, ttl_secs = ttl.as_secs(), "configuration resolved");
    (RatingService::new(history, SnapshotCache::new(ttl), logistic), cfg)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(args) => run_serve(args).await,
        Commands::Rank(args) => run_rank(args).await,
        Commands::Init => {
            let path = config::create_default_config();
            println!("Created config at {}", path.display());
            println!("Edit it to point at your watch history.");
        }
    }
}

async fn run_serve(args: ServeArgs) {
    init_logging(args.source.verbose);
    let (service, cfg) = build_service(&args.source, &args.logistic, args.cache_seconds);
    let bind = args.bind.or(cfg.bind).unwrap_or_else(|| DEFAULT_BIND.to_string());

    let state = AppState {
        service: Arc::new(service),
    };
    if let Err(e) = api::serve(&bind, state).await {
        bail(format!("Server on {bind} failed: {e}"));
    }
}

async fn run_rank(args: RankArgs) {
    init_logging(args.source.verbose);
    let (service, _) = build_service(&args.source, &args.logistic, None);

    let snapshot = service
        .compute(Instant::now())
        .await
        .unwrap_or_else(|e| bail(e));

    let printed = if args.graph {
        output::print_graph(&snapshot.graph)
    } else {
        let titles = output::rank_titles(&snapshot.movies);
        if args.json {
            output::print_json(&titles, snapshot.movies.len())
        } else {
            output::print_table(&titles, snapshot.movies.len());
            Ok(())
        }
    };
    if let Err(e) = printed {
        bail(format!("Failed to write output: {e}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source_args(history: Option<&str>, url: Option<&str>) -> SourceArgs {
        SourceArgs {
            history: history.map(PathBuf::from),
            history_url: url.map(str::to_string),
            config: None,
            verbose: false,
        }
    }

    #[test]
    fn test_cli_flag_beats_config_source() {
        let cfg = WatchrankConfig {
            history: Some(PathBuf::from("/from/config.json")),
            ..WatchrankConfig::default()
        };
        let source = resolve_source(&source_args(Some("/from/cli.json"), None), &cfg).unwrap();
        assert!(matches!(source, HistorySource::File(p) if p == PathBuf::from("/from/cli.json")));

        let source = resolve_source(&source_args(None, None), &cfg).unwrap();
        assert!(matches!(source, HistorySource::File(p) if p == PathBuf::from("/from/config.json")));
    }

    #[test]
    fn test_url_source_and_missing_source() {
        let cfg = WatchrankConfig {
            history_url: Some("https://example.com/h.json".to_string()),
            ..WatchrankConfig::default()
        };
        let source = resolve_source(&source_args(None, None), &cfg).unwrap();
        assert!(matches!(source, HistorySource::Url(u) if u == "https://example.com/h.json"));

        assert!(resolve_source(&source_args(None, None), &WatchrankConfig::default()).is_none());
    }

    #[test]
    fn test_logistic_layering() {
        let section = LogisticSection {
            epochs: Some(250),
            learning_rate: Some(0.05),
            backend: Some("dense".to_string()),
            ..LogisticSection::default()
        };
        let args = LogisticArgs {
            epochs: Some(10),
            backend: Some("sparse".to_string()),
            ..LogisticArgs::default()
        };
        let config = resolve_logistic(&args, &section).unwrap();
        assert_eq!(config.epochs, 10);
        assert_eq!(config.learning_rate, 0.05);
        assert_eq!(config.backend, Backend::Sparse);
        assert_eq!(config.batch_size, LogisticConfig::default().batch_size);
    }

    #[test]
    fn test_logistic_rejects_bad_values() {
        let bad_backend = LogisticArgs {
            backend: Some("gpu".to_string()),
            ..LogisticArgs::default()
        };
        assert!(resolve_logistic(&bad_backend, &LogisticSection::default()).is_err());

        let bad_batch = LogisticArgs {
            batch_size: Some(0),
            ..LogisticArgs::default()
        };
        assert!(resolve_logistic(&bad_batch, &LogisticSection::default()).is_err());
    }

    #[test]
    fn test_cli_parses_rank_flags() {
        let cli = Cli::try_parse_from([
            "watchrank", "rank", "--history", "h.json", "--json", "--backend", "sparse", "--seed", "4",
        ])
        .unwrap();
        match cli.command {
            Commands::Rank(args) => {
                assert!(args.json);
                assert!(!args.graph);
                assert_eq!(args.source.history, Some(PathBuf::from("h.json")));
                assert_eq!(args.logistic.backend.as_deref(), Some("sparse"));
                assert_eq!(args.logistic.seed, Some(4));
            }
            _ => panic!("expected rank"),
        }
    }
}
