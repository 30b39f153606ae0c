//! Arbiter server binary.
//!
//! `serve` runs the gateway and worker pool; `seed-user` and `open-game` are
//! admin helpers that write straight to the database.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use arbiter_server::config::{self, Settings};
use arbiter_server::dispatch::{TaskQueue, WorkerConfig, WorkerPool};
use arbiter_server::gateway::Gateway;
use arbiter_server::locks::LeaseLocks;
use arbiter_server::model::{Game, User};
use arbiter_server::notify::ChannelHub;
use arbiter_server::orchestrator::Orchestrator;
use arbiter_server::persistence::{
    generate_game_id, generate_user_id, Database, GameRepository, MemoryStore, PoolConfig,
    SessionStore, SqliteStore, UserRepository,
};

/// Rated chess session orchestrator.
#[derive(Parser)]
#[command(name = "arbiter", version, about)]
struct Cli {
    /// Write logs to daily rolling files in this directory instead of stderr.
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// SQLite database file. Defaults to ARBITER_DATABASE or the data directory.
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the gateway and the session workers.
    Serve {
        /// Address to listen on, e.g. 127.0.0.1:7878.
        #[arg(long)]
        listen: Option<String>,

        /// Number of session workers.
        #[arg(long)]
        workers: Option<usize>,

        /// Keep all state in memory; nothing survives a restart.
        #[arg(long)]
        in_memory: bool,
    },
    /// Register a player.
    SeedUser {
        login: String,

        /// Starting rating.
        #[arg(long, default_value_t = rating::DEFAULT_RATING)]
        rating: f64,
    },
    /// Create a pending game between two registered players.
    OpenGame {
        /// Login of the player with the white pieces.
        white: String,
        /// Login of the player with the black pieces.
        black: String,
    },
}

/// Install the global subscriber. The returned guard must live as long as
/// logging is needed.
fn init_tracing(log_dir: Option<&PathBuf>) -> anyhow::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating log directory {}", dir.display()))?;
            let file_appender = tracing_appender::rolling::daily(dir, "arbiter");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            tracing_subscriber::registry()
                .with(
                    fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false)
                        .with_target(true)
                        .with_line_number(true)
                        .with_span_events(FmtSpan::CLOSE),
                )
                .with(filter)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_span_events(FmtSpan::CLOSE)
                .init();
            Ok(None)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_tracing(cli.log_dir.as_ref())?;

    let mut settings = Settings::from_env();
    if let Some(path) = cli.database {
        settings.database_path = path;
    }

    match cli.command {
        Commands::Serve {
            listen,
            workers,
            in_memory,
        } => {
            if let Some(listen) = listen {
                settings.listen_addr = listen;
            }
            if let Some(workers) = workers {
                settings.workers = workers.max(1);
            }

            if in_memory {
                tracing::warn!("Running with in-memory state");
                serve(Arc::new(MemoryStore::new()), settings).await
            } else {
                let db = open_database(&settings).await?;
                serve(Arc::new(SqliteStore::new(&db)), settings).await
            }
        }
        Commands::SeedUser { login, rating } => {
            let db = open_database(&settings).await?;
            let store = SqliteStore::new(&db);
            let user = User::new(generate_user_id(), login).with_rating(rating);
            store
                .create_user(&user)
                .await
                .with_context(|| format!("creating user {}", user.login))?;
            tracing::info!(user_id = %user.id, login = %user.login, "User created");
            println!("{}", user.id);
            Ok(())
        }
        Commands::OpenGame { white, black } => {
            let db = open_database(&settings).await?;
            let store = SqliteStore::new(&db);
            let white = find_login(&store, &white).await?;
            let black = find_login(&store, &black).await?;
            let game = Game::pending(generate_game_id(), white.id, black.id);
            store.create_game(&game).await.context("creating game")?;
            tracing::info!(game_id = %game.id, "Pending game created");
            println!("{}", game.id);
            Ok(())
        }
    }
}

async fn open_database(settings: &Settings) -> anyhow::Result<Database> {
    tracing::info!(
        "Using database: {} (data directory {})",
        settings.database_path.display(),
        config::get_data_dir().display()
    );
    let pool = PoolConfig::for_workers(settings.workers, settings.db_busy_timeout);
    Database::open(&settings.database_path, pool)
        .await
        .with_context(|| format!("opening {}", settings.database_path.display()))
}

async fn find_login(store: &SqliteStore, login: &str) -> anyhow::Result<User> {
    store
        .find_user_by_login(login)
        .await?
        .with_context(|| format!("no user with login {login}"))
}

async fn serve<S: SessionStore>(store: Arc<S>, settings: Settings) -> anyhow::Result<()> {
    tracing::info!(?settings, "Starting arbiter");

    let hub = Arc::new(ChannelHub::new());
    let pool = WorkerPool::new(WorkerConfig {
        workers: settings.workers,
        max_attempts: settings.max_attempts,
        retry_backoff: settings.retry_backoff,
    });
    let queue: Arc<dyn TaskQueue> = Arc::new(pool.sender());
    let locks = LeaseLocks::new(settings.lock_lease, settings.lock_wait);

    let orchestrator = Arc::new(Orchestrator::new(
        store,
        hub.clone(),
        queue.clone(),
        locks,
        settings.k_factor_delay,
    ));
    let _workers = pool.spawn(orchestrator.clone());

    let recovered = orchestrator
        .recover_pending()
        .await
        .context("recovering pending sessions")?;
    if recovered > 0 {
        tracing::info!(recovered, "Re-enqueued pending sessions");
    }

    let listener = TcpListener::bind(&settings.listen_addr)
        .await
        .with_context(|| format!("binding {}", settings.listen_addr))?;
    let gateway = Arc::new(Gateway::new(orchestrator, hub, queue));

    tokio::select! {
        result = gateway.serve(listener) => result.context("gateway failed"),
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down");
            Ok(())
        }
    }
}
