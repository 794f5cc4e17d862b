//! notegraph: semantic links, summaries and chat over a folder of Markdown notes.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "notegraph", about = "Semantic tools for a Markdown note vault")]
#[command(version, propagate_version = true)]
struct Cli {
    /// Vault directory holding the notes
    #[arg(short, long, global = true, default_value = ".")]
    vault: PathBuf,

    /// Settings file (defaults to the user config directory)
    #[arg(short, long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Re-embed every note from scratch
    Rebuild,

    /// Re-embed a single note
    Reindex {
        /// Note path relative to the vault
        note: String,
    },

    /// Show notes related to a note
    Related {
        /// Note path relative to the vault
        note: String,

        /// Maximum number of related notes
        #[arg(short, long, default_value = "5")]
        limit: usize,

        /// Append a "Related notes" section to the note
        #[arg(long)]
        write: bool,
    },

    /// Summarize a note
    Summarize {
        /// Note path relative to the vault
        note: String,
    },

    /// Analyze a note's themes and open questions
    Analyze {
        /// Note path relative to the vault
        note: String,
    },

    /// Chat with the model, optionally about a note
    Chat {
        /// Note to attach as context to every message
        #[arg(short, long)]
        note: Option<String>,
    },

    /// Keep embeddings current while notes change
    Watch,

    /// Drop embeddings of deleted notes
    Prune,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries command output; logs go to stderr.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let app = commands::App::open(&cli.vault, cli.settings.as_deref()).await?;

    match cli.command {
        Command::Rebuild => commands::rebuild(&app).await,
        Command::Reindex { note } => commands::reindex(&app, &note).await,
        Command::Related { note, limit, write } => {
            commands::related(&app, &note, limit, write).await
        }
        Command::Summarize { note } => commands::summarize(&app, &note).await,
        Command::Analyze { note } => commands::analyze(&app, &note).await,
        Command::Chat { note } => commands::chat(&app, note.as_deref()).await,
        Command::Watch => commands::watch(&app).await,
        Command::Prune => commands::prune(&app).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "notegraph",
            "related",
            "ideas/garden.md",
            "--write",
            "--vault",
            "/notes",
        ]);

        assert_eq!(cli.vault, PathBuf::from("/notes"));
        assert!(cli.settings.is_none());
        match cli.command {
            Command::Related { note, limit, write } => {
                assert_eq!(note, "ideas/garden.md");
                assert_eq!(limit, 5);
                assert!(write);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_chat_note_is_optional() {
        let cli = Cli::parse_from(["notegraph", "chat"]);
        assert!(matches!(cli.command, Command::Chat { note: None }));
    }
}
