//! Terminal assistant that drives a tmux pane on your behalf.
//!
//! Run it inside tmux. aiterm takes over the current pane for the chat and
//! uses a second pane in the same window (created if needed) to run the
//! commands you approve.
//!
//! # Examples
//!
//! ```sh
//! # Interactive
//! aiterm
//!
//! # Start with a request
//! aiterm why is the disk almost full
//!
//! # Another provider, longer waits, a knowledge base preloaded
//! aiterm --provider xai --model grok-2 --wait-interval 10 --kb docker
//! ```

mod commands;
mod config;
mod console;
mod keys;
mod repl;

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use aiterm_rs::AiClient;
use aiterm_rs::agent::{
    CompositeEventHandler, ExecutionCoordinator, FileTranscriptSink, LoggingHandler, Session,
    SessionControl, SystemPromptBuilder,
};
use aiterm_rs::api::Provider;
use aiterm_rs::context::DirKnowledgeStore;
use aiterm_rs::error::EngineError;
use aiterm_tmux::{Tmux, TmuxPane};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::FileConfig;
use crate::console::{ConsoleHandler, say};

/// Terminal assistant that drives a tmux pane on your behalf.
#[derive(Parser)]
#[command(name = "aiterm", version)]
struct Cli {
    /// First request. Without it, aiterm starts at the prompt.
    #[arg(trailing_var_arg = true)]
    message: Vec<String>,

    /// Config file. Defaults to `<config dir>/aiterm/config.toml`.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Model provider (openrouter, openai, requesty, zai, xai, alibaba, custom).
    #[arg(long)]
    provider: Option<Provider>,

    /// Model to use for completions.
    #[arg(long)]
    model: Option<String>,

    /// Seconds to wait after running a command before looking at the pane.
    #[arg(long)]
    wait_interval: Option<u64>,

    /// Knowledge base to load at startup. Repeatable.
    #[arg(long = "kb")]
    kb: Vec<String>,

    /// Verbose logging and a transcript file per AI request.
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), EngineError> {
    let config_path = cli
        .config
        .clone()
        .or_else(config::default_config_path)
        .ok_or_else(|| {
            EngineError::Setup("cannot locate the config directory; pass --config".into())
        })?;
    let file = FileConfig::load(&config_path)?;
    let debug = cli.debug || file.debug;
    init_logging(debug);
    info!("Starting aiterm {}", env!("CARGO_PKG_VERSION"));

    let model = file.model_config(cli.provider, cli.model.clone())?;
    let client = AiClient::new(model)?;
    let scorer = file.scorer()?;
    let mut engine = file.engine_config();
    if let Some(secs) = cli.wait_interval.filter(|s| *s > 0) {
        engine = engine.with_wait_interval(Duration::from_secs(secs));
    }

    let tmux = Tmux::new();
    let layout = TmuxPane::current(&tmux)?;
    info!(
        "Chat pane {}, exec pane {} in window {}",
        layout.chat_pane, layout.exec_pane, layout.window
    );

    let control = SessionControl::new();
    let signal_control = control.clone();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            signal_control.interrupt();
        }
    });

    let handler = CompositeEventHandler::new()
        .with(LoggingHandler)
        .with(ConsoleHandler::new(control.clone()));
    let transcript = if debug {
        config::config_dir().map(|dir| FileTranscriptSink::new(dir.join("debug")))
    } else {
        None
    };
    let knowledge = file.knowledge_dir().map(DirKnowledgeStore::new);

    let session = Session::new(
        &layout.chat_pane,
        &layout.exec_pane,
        &layout.window,
        SystemPromptBuilder::default_instructions(),
    );
    let mut coordinator = ExecutionCoordinator::new(&client, &tmux, engine, session)
        .with_scorer(scorer)
        .with_event_handler(&handler)
        .with_control(control);
    if let Some(sink) = &transcript {
        coordinator = coordinator.with_transcript(sink);
    }
    if let Some(store) = &knowledge {
        coordinator = coordinator.with_knowledge_store(store);
    }

    let mut auto_load: Vec<String> = Vec::new();
    for name in file.auto_load_kbs.iter().chain(&cli.kb) {
        if !auto_load.contains(name) {
            auto_load.push(name.clone());
        }
    }
    if !auto_load.is_empty() {
        let loaded = coordinator.auto_load(&auto_load);
        info!("Auto-loaded {loaded} of {} knowledge base(s)", auto_load.len());
    }

    say(&format!(
        "aiterm {} | {} | exec pane {}{}\nType /help for commands.",
        env!("CARGO_PKG_VERSION"),
        client.model(),
        layout.exec_pane,
        if layout.created_exec { " (new)" } else { "" }
    ));

    let initial = (!cli.message.is_empty()).then(|| cli.message.join(" "));
    let result = repl::run(&mut coordinator, initial).await;
    layout.cleanup(&tmux);
    result
}

/// Log to `<config dir>/aiterm/aiterm.log`. `AITERM_LOG` takes an
/// `EnvFilter` directive and wins over `--debug`. Without a writable config
/// directory logging stays off, since stdout belongs to the chat.
fn init_logging(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_env("AITERM_LOG").unwrap_or_else(|_| EnvFilter::new(default));

    let Some(dir) = config::config_dir() else {
        return;
    };
    let file = std::fs::create_dir_all(&dir).and_then(|()| {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join("aiterm.log"))
    });
    let file = match file {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Warning: logging disabled, cannot open log file in {}: {e}", dir.display());
            return;
        }
    };

    let layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_target(false)
        .with_writer(Mutex::new(file));
    tracing_subscriber::registry().with(filter).with(layer).init();
    if debug {
        warn!("Debug mode: transcripts of every AI request are written to disk");
    }
}
