use crate::config::AppConfig;
use crate::db::{CandidateStore, MemoryStore, SqliteStore};
use crate::handlers::{self, AppState};
use crate::repair::{AccentFolding, Deduplicator};
use crate::service::CandidateService;
use crate::tasks;
use clap::{Args, Parser, Subcommand};
use log::{info, warn};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

type CommandResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

#[derive(Parser, Debug)]
#[command(
    name = "dance-award-votes",
    version,
    about = "Vote counting and ranking service for the dance awards"
)]
pub struct Cli {
    /// Overrides DATABASE_URL
    #[arg(long, global = true)]
    pub database_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the candidates API
    Serve(ServeArgs),
    /// Add candidates from a JSON file
    Seed(SeedArgs),
    /// Print counts per category, total votes and the current top 5
    Check,
    /// Merge duplicate candidates and normalize stored records
    Repair(RepairArgs),
    /// Delete every candidate
    Clear(ClearArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Overrides BIND_ADDR
    #[arg(long)]
    pub bind: Option<String>,

    /// Keep candidates in memory instead of the database
    #[arg(long, default_value_t = false)]
    pub memory: bool,

    /// Candidates to load on startup
    #[arg(long)]
    pub seed: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct SeedArgs {
    pub file: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct RepairArgs {
    /// Log the plan without writing
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    /// Treat accented and unaccented spellings of a name as the same candidate
    #[arg(long, default_value_t = false)]
    pub fold_accents: bool,

    /// Leave category names as stored instead of mapping known variants
    #[arg(long, default_value_t = false)]
    pub no_aliases: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ClearArgs {
    #[arg(long, default_value_t = false)]
    pub yes: bool,
}

async fn open_store(config: &AppConfig) -> Result<Arc<dyn CandidateStore>, Box<dyn std::error::Error + Send + Sync>> {
    let store = SqliteStore::connect(&config.database_url, config.max_connections).await?;
    Ok(Arc::new(store))
}

pub async fn run(cli: Cli, mut config: AppConfig) -> CommandResult {
    if let Some(url) = cli.database_url {
        config.database_url = url;
    }

    match cli.command {
        Commands::Serve(args) => serve(args, config).await,
        Commands::Seed(args) => {
            let service = CandidateService::new(open_store(&config).await?);
            tasks::seed::seed_from_file(&service, &args.file).await?;
            Ok(())
        }
        Commands::Check => {
            let store = open_store(&config).await?;
            tasks::seed::check(store.as_ref()).await?;
            Ok(())
        }
        Commands::Repair(args) => {
            let mut dedup = Deduplicator::new(open_store(&config).await?);
            if args.fold_accents {
                dedup = dedup.with_normalizer(Box::new(AccentFolding));
            }
            if args.no_aliases {
                dedup = dedup.with_aliases(HashMap::new());
            }
            tasks::repair::run_repair(&dedup, args.dry_run).await
        }
        Commands::Clear(args) => {
            if !args.yes {
                warn!("Refusing to delete every candidate without --yes");
                return Ok(());
            }
            let removed = open_store(&config).await?.clear().await?;
            info!("Removed {} candidates", removed);
            Ok(())
        }
    }
}

async fn serve(args: ServeArgs, mut config: AppConfig) -> CommandResult {
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }

    let store: Arc<dyn CandidateStore> = if args.memory {
        info!("Using in-memory candidate store");
        Arc::new(MemoryStore::new())
    } else {
        open_store(&config).await?
    };
    let service = CandidateService::new(Arc::clone(&store));

    if let Some(path) = &args.seed {
        tasks::seed::seed_from_file(&service, path).await?;
    }

    // Kept alive for the lifetime of the server
    let _standings = tasks::standings::watch_leaders(store);

    let app = handlers::router(AppState {
        service,
        leaderboard_limit: config.leaderboard_limit,
    });

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("Listening on http://{}", config.bind_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;

    Ok(())
}
