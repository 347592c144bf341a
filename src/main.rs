use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use support_rag::commands::{ask, build_index, load_config, search, show_status, start_chat};
use support_rag::config::{resolve_data_dir, run_interactive_config, show_config};

#[derive(Parser)]
#[command(name = "support-rag")]
#[command(about = "A retrieval-augmented customer support chatbot backed by Ollama")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml and the persisted index (default ~/.support-rag)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Dataset JSON file, overriding the configured path
    #[arg(long, global = true)]
    dataset: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive support session (default)
    Chat,
    /// Answer a single question
    Ask {
        /// The question to answer
        query: String,
    },
    /// Show the dataset chunks nearest to a query
    Search {
        /// Text to search for
        query: String,
        /// Number of chunks to show
        #[arg(short, long, default_value_t = 3)]
        k: usize,
    },
    /// Build the persisted index, or confirm it is current
    Index {
        /// Rebuild even if the persisted index is usable
        #[arg(long)]
        rebuild: bool,
    },
    /// Show index, dataset and Ollama status
    Status,
    /// Configure Ollama connection and settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", error_report(&e));
            ExitCode::FAILURE
        }
    }
}

/// One line with the whole context chain, outermost first
fn error_report(error: &anyhow::Error) -> String {
    format!("Error: {error:#}")
}

async fn run(cli: Cli) -> Result<()> {
    let data_dir =
        resolve_data_dir(cli.data_dir).context("Could not determine the data directory")?;

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Config { show } => {
            if show {
                show_config(&load_config(&data_dir, cli.dataset)?);
            } else {
                run_interactive_config(&data_dir)?;
            }
        }
        Commands::Chat => {
            start_chat(&load_config(&data_dir, cli.dataset)?).await?;
        }
        Commands::Ask { query } => {
            ask(&load_config(&data_dir, cli.dataset)?, &query).await?;
        }
        Commands::Search { query, k } => {
            search(&load_config(&data_dir, cli.dataset)?, &query, k).await?;
        }
        Commands::Index { rebuild } => {
            build_index(&load_config(&data_dir, cli.dataset)?, rebuild).await?;
        }
        Commands::Status => {
            show_status(&load_config(&data_dir, cli.dataset)?).await?;
        }
    }

    Ok(())
}
