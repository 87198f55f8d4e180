// ABOUTME: Entry point for the notesd binary.
// ABOUTME: Parses CLI arguments, loads config, initializes tracing, and serves or queries the note store.

use std::io::Read;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use notes_core::{DbActorHandle, DbState, NotePayload, Settled, spawn};
use notes_server::{AppState, NotesdConfig, create_router};
use notes_store::SqliteGateway;

#[derive(Parser)]
#[command(name = "notesd", version, about = "Local note persistence daemon")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP API (the default)
    Serve,
    /// Print every note as JSON, most recently updated first
    List,
    /// Print one note as JSON
    Show { id: String },
    /// Save a note; reads content from stdin when not given
    Save { id: String, content: Option<String> },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "notesd=debug,notes_core=info,tower_http=debug".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = NotesdConfig::from_env()?;
    let db = spawn(SqliteGateway::new(&config.db_path));

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, db).await,
        Command::List => {
            println!("{}", list(&db).await?);
            Ok(())
        }
        Command::Show { id } => {
            println!("{}", show(&db, &id).await?);
            Ok(())
        }
        Command::Save { id, content } => {
            println!("{}", save(&db, id, content, std::io::stdin()).await?);
            Ok(())
        }
    }
}

async fn list(db: &DbActorHandle) -> anyhow::Result<String> {
    connect(db).await?;
    let notes = settle(db.get_notes().await?)?;
    Ok(serde_json::to_string_pretty(&notes)?)
}

async fn show(db: &DbActorHandle, id: &str) -> anyhow::Result<String> {
    connect(db).await?;
    match settle(db.get_note(id).await?)? {
        Some(note) => Ok(serde_json::to_string_pretty(&note)?),
        None => bail!("note not found: {id}"),
    }
}

/// Saves `content`, or everything read from `input` when it is not given.
async fn save(
    db: &DbActorHandle,
    id: String,
    content: Option<String>,
    mut input: impl Read,
) -> anyhow::Result<String> {
    let content = match content {
        Some(content) => content,
        None => {
            let mut buf = String::new();
            input
                .read_to_string(&mut buf)
                .context("reading note content from stdin")?;
            buf
        }
    };
    connect(db).await?;
    let note = settle(db.save_note(NotePayload::new(id, content)).await?)?;
    Ok(serde_json::to_string_pretty(&note)?)
}

async fn serve(config: NotesdConfig, db: DbActorHandle) -> anyhow::Result<()> {
    tracing::info!("notesd starting up, database at {}", config.db_path.display());

    // A failed startup INIT leaves the machine in error; clients may retry via /api/db/init
    if config.auto_init {
        if let Err(e) = connect(&db).await {
            tracing::error!("initial INIT failed: {:#}", e);
        }
    }

    let app = create_router(std::sync::Arc::new(AppState::new(db)), config.auth_token);
    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("binding {}", config.bind))?;
    tracing::info!("listening on http://{}", config.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await?;
    Ok(())
}

async fn connect(db: &DbActorHandle) -> anyhow::Result<()> {
    if db.state().await == DbState::Ready {
        return Ok(());
    }
    settle(db.init().await?).map(|_| ())
}

fn settle<T>(settled: Settled<T>) -> anyhow::Result<T> {
    match settled {
        Settled::Done(value) => Ok(value),
        Settled::Failed(fault) => Err(fault).context("database operation failed"),
        Settled::Ignored { state } => bail!("database is {state}"),
    }
}
