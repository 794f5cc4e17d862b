//! Command implementations.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, anyhow};
use notegraph_chat::{ChatError, ContextManager};
use notegraph_embeddings::SearchOptions;
use notegraph_gateway::{Completion, Gateway, UsageReport};
use notegraph_vault::{
    AppState, FsNoteStore, IndexOutcome, Indexer, NoteActions, NoteStore, NoteWatcher,
    RelatedNotes, VaultError,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Everything a command needs, opened once per run.
pub struct App {
    store: Arc<dyn NoteStore>,
    gateway: Arc<Gateway>,
    state: Arc<AppState>,
    vault: PathBuf,
}

impl App {
    pub async fn open(vault: &Path, settings: Option<&Path>) -> anyhow::Result<Self> {
        let settings_path = match settings {
            Some(path) => path.to_path_buf(),
            None => AppState::default_path()
                .ok_or_else(|| anyhow!("no config directory; pass --settings"))?,
        };

        let state = AppState::load(&settings_path)
            .await
            .with_context(|| format!("failed to load settings from {}", settings_path.display()))?;
        let store = FsNoteStore::new(vault)
            .with_context(|| format!("failed to open vault {}", vault.display()))?;

        let provider = state.settings().await.provider;
        let gateway = Gateway::from_config(&provider).with_observer(Arc::new(
            |report: &UsageReport| {
                debug!(
                    "{} usage: {} in / {} out tokens, ${:.6}",
                    report.model, report.input_tokens, report.output_tokens, report.cost_usd
                );
            },
        ));

        Ok(Self {
            vault: store.root().to_path_buf(),
            store: Arc::new(store),
            gateway: Arc::new(gateway),
            state: Arc::new(state),
        })
    }

    async fn indexer(&self) -> Indexer {
        let config = self.state.settings().await.indexer;
        Indexer::new(
            self.store.clone(),
            self.gateway.clone(),
            self.state.clone(),
            config,
        )
        .await
    }
}

fn friendly(error: VaultError) -> anyhow::Error {
    anyhow!(error.user_message())
}

/// Cancel `token` on Ctrl-C.
fn cancel_on_ctrl_c(token: &CancellationToken) {
    let token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, finishing the current batch");
            token.cancel();
        }
    });
}

pub async fn rebuild(app: &App) -> anyhow::Result<()> {
    let indexer = app.indexer().await;
    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(&cancel);

    let report = indexer
        .rebuild_all(
            |progress| {
                let status = match progress.outcome {
                    IndexOutcome::Indexed => "indexed".to_string(),
                    IndexOutcome::Skipped => "skipped (empty)".to_string(),
                    IndexOutcome::Failed(ref reason) => format!("failed: {reason}"),
                };
                println!(
                    "[{}/{}] {} {status}",
                    progress.done, progress.total, progress.note_id
                );
            },
            &cancel,
        )
        .await
        .map_err(friendly)?;

    println!(
        "Indexed {} of {} notes ({} empty, {} failed) in {}ms{}",
        report.indexed,
        report.total,
        report.skipped,
        report.failed.len(),
        report.duration_ms,
        if report.cancelled { ", cancelled" } else { "" }
    );
    Ok(())
}

pub async fn reindex(app: &App, note: &str) -> anyhow::Result<()> {
    app.indexer()
        .await
        .reindex_one(note)
        .await
        .map_err(friendly)?;
    println!("Reindexed {note}");
    Ok(())
}

pub async fn related(app: &App, note: &str, limit: usize, write: bool) -> anyhow::Result<()> {
    let indexer = Arc::new(app.indexer().await);
    let related = RelatedNotes::new(indexer, app.store.clone(), app.gateway.clone())
        .with_options(SearchOptions::related().with_k(limit));

    let found = related.find(note).await.map_err(friendly)?;
    if found.is_empty() {
        println!("No related notes found for {note}");
        return Ok(());
    }

    for item in &found {
        println!("{:.3}  {}", item.similarity, item.note_id);
        if let Some(ref explanation) = item.explanation {
            println!("       {explanation}");
        }
    }

    if write {
        related
            .append_section(note, &found)
            .await
            .map_err(friendly)?;
        println!("Updated {}", app.vault.join(note).display());
    }
    Ok(())
}

fn print_completion(completion: &Completion) {
    println!("{}", completion.text.trim());
    if let Some(ref usage) = completion.usage {
        eprintln!(
            "({} tokens, ${:.6})",
            usage.input_tokens + usage.output_tokens,
            usage.cost_usd
        );
    }
}

pub async fn summarize(app: &App, note: &str) -> anyhow::Result<()> {
    let actions = NoteActions::new(app.store.clone(), app.gateway.clone());
    let completion = actions.summarize(note).await.map_err(friendly)?;
    print_completion(&completion);
    Ok(())
}

pub async fn analyze(app: &App, note: &str) -> anyhow::Result<()> {
    let actions = NoteActions::new(app.store.clone(), app.gateway.clone());
    let completion = actions.analyze(note).await.map_err(friendly)?;
    print_completion(&completion);
    Ok(())
}

pub async fn chat(app: &App, note: Option<&str>) -> anyhow::Result<()> {
    let config = app.state.settings().await.chat;
    let mut manager = ContextManager::new(app.gateway.clone(), config);
    manager.subscribe_usage(|stats| {
        eprintln!(
            "(session: {} tokens, ${:.6})",
            stats.total_tokens(),
            stats.cost_usd
        );
    });

    info!("Started chat session {}", manager.session_id());
    println!("Chatting. /clear resets the conversation, /quit exits.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line {
            "" => continue,
            "/quit" | "/exit" => break,
            "/clear" => {
                manager.clear_history();
                println!("Conversation cleared.");
                continue;
            }
            _ => {}
        }

        // Re-read each turn so edits made during the chat are seen.
        let note_content = match note {
            Some(id) => Some(app.store.read_content(id).await.map_err(friendly)?),
            None => None,
        };

        match manager.ask(line, note_content.as_deref()).await {
            Ok(reply) => println!("{}\n", reply.trim()),
            Err(ChatError::Gateway(e)) => eprintln!("{}", e.user_message()),
            Err(e) => eprintln!("{e}"),
        }
    }
    Ok(())
}

pub async fn watch(app: &App) -> anyhow::Result<()> {
    let indexer = app.indexer().await;
    let (mut watcher, changes) = NoteWatcher::new(&app.vault)?;
    watcher.start()?;

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(&cancel);

    println!("Watching {} (Ctrl-C to stop)", app.vault.display());
    indexer.run_watch_loop(changes, &cancel).await;
    watcher.stop();
    Ok(())
}

pub async fn prune(app: &App) -> anyhow::Result<()> {
    let removed = app
        .indexer()
        .await
        .prune_missing()
        .await
        .map_err(friendly)?;
    println!("Removed {removed} embeddings of deleted notes");
    Ok(())
}
