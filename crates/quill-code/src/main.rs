//! Terminal coding assistant powered by quill.
//!
//! Reads the API key from `CEREBRAS_API_KEY` (or `QUILL_API_KEY`); a `.env`
//! file in the current directory is loaded first.
//!
//! # Examples
//!
//! ```sh
//! # Interactive mode
//! quill --workdir /path/to/project
//!
//! # One-shot mode
//! quill --prompt "Add error handling to src/main.rs"
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::Parser;
use quill::ChatClient;
use quill::tools::{AutoConfirm, Confirm};
use quill_code::ui::DialoguerConfirm;
use quill_code::{CodeConfig, Repl};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Terminal coding assistant powered by quill.
#[derive(Parser)]
#[command(name = "quill", version)]
struct Cli {
    /// Initial prompt (one-shot mode). Without this, starts the interactive REPL.
    #[arg(long)]
    prompt: Option<String>,

    /// Model to use for completions. Overrides the config file.
    #[arg(long)]
    model: Option<String>,

    /// Base directory for file, shell, and git operations.
    #[arg(long, default_value = ".")]
    workdir: PathBuf,

    /// Config file. Defaults to `quill.toml` in the working directory.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Answer every confirmation with yes.
    #[arg(long, short = 'y')]
    yes: bool,

    /// Log at debug level unless `QUILL_LOG` says otherwise.
    #[arg(long, short)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_env("QUILL_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}

fn api_key() -> anyhow::Result<String> {
    std::env::var("CEREBRAS_API_KEY")
        .or_else(|_| std::env::var("QUILL_API_KEY"))
        .context("CEREBRAS_API_KEY (or QUILL_API_KEY) environment variable is not set")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let workdir = std::fs::canonicalize(&cli.workdir)
        .with_context(|| format!("cannot open working directory {}", cli.workdir.display()))?;
    if !workdir.is_dir() {
        bail!("{} is not a directory", workdir.display());
    }

    let mut config = CodeConfig::load(cli.config.as_deref(), &workdir)?;
    if let Some(model) = cli.model {
        config.model = model;
    }

    let client = ChatClient::with_url(api_key()?, config.api_url.clone())
        .context("failed to create API client")?;

    // One-shot runs cannot ask questions; they refuse unless --yes.
    let confirm: Arc<dyn Confirm> = if cli.yes || !config.confirm_actions {
        Arc::new(AutoConfirm(true))
    } else if cli.prompt.is_some() {
        Arc::new(AutoConfirm(false))
    } else {
        Arc::new(DialoguerConfirm)
    };

    let mut repl = Repl::new(config, Box::new(client), confirm, &workdir);
    match cli.prompt {
        Some(prompt) => {
            if !repl.one_shot(&prompt).await {
                std::process::exit(1);
            }
        }
        None => repl.run().await?,
    }
    Ok(())
}
