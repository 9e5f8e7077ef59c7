use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use render::{MarkdownRenderer, PlainTextRenderer, Renderer};
use shared::{
    deck_csv::{deck_file_name, serialize_deck},
    domain::RawFile,
};
use storage::{prepare_database_url, DeckStore, SqliteDeckStore};
use study_core::{
    ControlLayout, DeckSelection, EventBus, MemorySelectionMarker, SessionDeps, StudySession,
    UrlSelectionMarker,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod prompt;
mod study;

use config::load_settings;
use prompt::TerminalPrompt;

#[derive(Parser, Debug)]
#[command(name = "flashdeck", about = "Study question/answer decks from CSV files")]
struct Cli {
    /// Overrides the configured database url.
    #[arg(long)]
    database_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Lists stored decks.
    List,
    /// Imports `.csv` deck files.
    Import {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Overwrite existing decks without asking.
        #[arg(long)]
        yes: bool,
    },
    Remove {
        name: String,
        #[arg(long)]
        yes: bool,
    },
    /// Writes a deck back out as CSV.
    Export {
        name: String,
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// Interactive study session.
    Study {
        #[arg(long)]
        deck: Option<String>,
        /// Seed for reproducible shuffles.
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let (settings, settings_error) = load_settings();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    if let Some(err) = settings_error {
        warn!(error = %err, "using default settings");
    }

    let cli = Cli::parse();
    let database_url = prepare_database_url(
        cli.database_url
            .as_deref()
            .unwrap_or(&settings.database_url),
    )?;
    let sqlite = SqliteDeckStore::new(&database_url).await?;
    sqlite.health_check().await?;
    info!(%database_url, "deck store ready");
    let store: Arc<dyn DeckStore> = Arc::new(sqlite);

    match cli.command {
        Command::List => {
            for summary in store.summaries().await? {
                println!(
                    "{}\t{} slides\tupdated {}",
                    summary.name,
                    summary.slide_count,
                    summary.updated_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
        Command::Import { files, yes } => {
            let selection = standalone_selection(store, yes);
            let mut raw_files = Vec::with_capacity(files.len());
            for path in &files {
                raw_files.push(read_raw_file(path).await?);
            }
            let report = selection.import_files(raw_files).await?;
            for name in &report.imported {
                println!("imported {name}");
            }
            for name in &report.skipped {
                println!("kept existing {name}");
            }
            if !report.rejected.is_empty() {
                bail!("{} file(s) could not be imported", report.rejected.len());
            }
        }
        Command::Remove { name, yes } => {
            let selection = standalone_selection(store, yes);
            if selection.remove_deck(&name).await? {
                println!("removed {name}");
            }
        }
        Command::Export { name, out } => {
            let Some(deck) = store.get(&name).await? else {
                bail!("no deck named \"{name}\"");
            };
            let csv = serialize_deck(&deck)
                .with_context(|| format!("deck \"{name}\" cannot be written as CSV"))?;
            tokio::fs::create_dir_all(&out).await?;
            let path = out.join(deck_file_name(&deck.name));
            tokio::fs::write(&path, csv)
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("wrote {}", path.display());
        }
        Command::Study { deck, seed } => {
            let renderer: Arc<dyn Renderer> = if settings.markdown {
                Arc::new(MarkdownRenderer)
            } else {
                Arc::new(PlainTextRenderer)
            };
            let marker = UrlSelectionMarker::parse(&settings.location)
                .with_context(|| format!("invalid location '{}'", settings.location))?;
            let session = StudySession::new(
                SessionDeps {
                    store,
                    prompt: Arc::new(TerminalPrompt::new(false)),
                    marker: Arc::new(marker),
                    renderer,
                },
                study::session_config(&settings, seed),
                &ControlLayout::full(),
            )?;
            study::run(session, deck).await?;
        }
    }

    Ok(())
}

/// Selection for one-shot commands; nothing listens on its bus.
fn standalone_selection(store: Arc<dyn DeckStore>, assume_yes: bool) -> Arc<DeckSelection> {
    DeckSelection::new(
        EventBus::new(),
        store,
        Arc::new(TerminalPrompt::new(assume_yes)),
        Arc::new(MemorySelectionMarker::default()),
    )
}

async fn read_raw_file(path: &Path) -> Result<RawFile> {
    let contents = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(RawFile::new(name, contents))
}
