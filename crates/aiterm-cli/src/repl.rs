//! The chat prompt loop.

use crate::commands::{ConfigAction, HELP, Input, KbAction, SlashCommand, parse_input};
use crate::console::{read_line, say};
use crate::keys::KeyListener;
use aiterm_rs::agent::{ExecutionCoordinator, LoopOutcome, SquashOutcome};
use aiterm_rs::error::EngineError;
use std::io::{self, IsTerminal, Write};
use tracing::{debug, info};

/// Prompt shown before each line, e.g. `[?] » `.
pub fn prompt_text(symbol: &str) -> String {
    format!("[{symbol}] » ")
}

/// Run the prompt loop until `/exit` or end of input. `initial` is handled
/// first, as if typed at the prompt.
pub async fn run(
    coordinator: &mut ExecutionCoordinator<'_>,
    initial: Option<String>,
) -> Result<(), EngineError> {
    if let Some(text) = initial.filter(|t| !t.trim().is_empty()) {
        if !dispatch(coordinator, parse_input(&text)).await {
            return Ok(());
        }
    }

    loop {
        {
            let mut out = io::stdout().lock();
            let _ = write!(out, "{}", prompt_text(coordinator.session().status.symbol()));
            let _ = out.flush();
        }
        let line = read_line()
            .map_err(|e| EngineError::Setup(format!("failed to read input: {e}")))?;
        let Some(line) = line else {
            say("");
            debug!("End of input");
            break;
        };
        if !dispatch(coordinator, parse_input(&line)).await {
            break;
        }
    }
    info!("Session {} finished", coordinator.session().id);
    Ok(())
}

/// Handle one input. Returns `false` when the session should end.
async fn dispatch(coordinator: &mut ExecutionCoordinator<'_>, input: Input) -> bool {
    match input {
        Input::Empty => {}
        Input::Usage(usage) => say(usage),
        Input::Message(text) => {
            let outcome = coordinator.handle_input(&text).await;
            report(&outcome);
        }
        Input::Command(SlashCommand::Exit) => return false,
        Input::Command(command) => run_command(coordinator, command).await,
    }
    true
}

fn report(outcome: &LoopOutcome) {
    match outcome {
        LoopOutcome::BackendFailed(_) => {
            say("The conversation is intact. Send another message to retry.");
        }
        LoopOutcome::Interrupted => say("Stopped. Send a message to continue."),
        // Reported through events.
        LoopOutcome::Done | LoopOutcome::AwaitingUser | LoopOutcome::IterationLimit => {}
    }
}

async fn run_command(coordinator: &mut ExecutionCoordinator<'_>, command: SlashCommand) {
    match command {
        SlashCommand::Help => say(HELP),
        SlashCommand::Exit => {}
        SlashCommand::Clear => {
            coordinator.reset();
            say("Conversation cleared.");
        }
        SlashCommand::Info => say(&info_report(coordinator)),
        SlashCommand::Squash => match coordinator.squash().await {
            SquashOutcome::NotNeeded => say("Context is below the squash threshold."),
            SquashOutcome::NothingToSquash => say("Nothing to squash."),
            // The event handler already reported these.
            SquashOutcome::Squashed { .. } | SquashOutcome::Failed(_) => {}
        },
        SlashCommand::Watch(goal) => {
            say(&format!("Watching: {goal}\nPress q or Esc to stop."));
            let keys = if io::stdin().is_terminal() {
                KeyListener::start(coordinator.control().clone())
                    .map_err(|e| debug!("Key listener unavailable: {e}"))
                    .ok()
            } else {
                None
            };
            let outcome = coordinator.watch(&goal).await;
            drop(keys);
            say(&format!(
                "Watch stopped after {} check(s), {} suggestion(s).",
                outcome.cycles, outcome.suggestions
            ));
        }
        SlashCommand::Config(action) => config_command(coordinator, action),
        SlashCommand::Kb(action) => kb_command(coordinator, action),
    }
}

fn config_command(coordinator: &mut ExecutionCoordinator<'_>, action: ConfigAction) {
    match action {
        ConfigAction::List => {
            let rows: Vec<String> = coordinator
                .settings()
                .into_iter()
                .map(|s| {
                    let mark = if s.overridden { " (session)" } else { "" };
                    format!("  {:<22} {}{mark}", s.key.as_str(), s.value)
                })
                .collect();
            say(&format!("Settings:\n{}", rows.join("\n")));
        }
        ConfigAction::Get(key) => match coordinator.get_setting(&key) {
            Ok(value) => say(&format!("{key} = {value}")),
            Err(e) => say(&format!("Error: {e}")),
        },
        ConfigAction::Set { key, value } => match coordinator.set_override(&key, &value) {
            Ok(key) => match coordinator.get_setting(key.as_str()) {
                Ok(value) => say(&format!("{key} = {value} (this session)")),
                Err(e) => say(&format!("Error: {e}")),
            },
            Err(e) => say(&format!("Error: {e}")),
        },
    }
}

fn kb_command(coordinator: &mut ExecutionCoordinator<'_>, action: KbAction) {
    match action {
        KbAction::List => match coordinator.list_knowledge() {
            Ok(bases) if bases.is_empty() => say("No knowledge bases found."),
            Ok(bases) => {
                let rows: Vec<String> = bases
                    .into_iter()
                    .map(|(name, loaded)| {
                        format!("  [{}] {name}", if loaded { "x" } else { " " })
                    })
                    .collect();
                say(&format!("Knowledge bases:\n{}", rows.join("\n")));
            }
            Err(e) => say(&format!("Error: {e}")),
        },
        KbAction::Load(name) => match coordinator.load_knowledge(&name) {
            Ok(tokens) => say(&format!("Loaded '{name}' (~{tokens} tokens).")),
            Err(e) => say(&format!("Error: {e}")),
        },
        KbAction::Unload(name) => {
            if coordinator.unload_knowledge(&name) {
                say(&format!("Unloaded '{name}'."));
            } else {
                say(&format!("'{name}' is not loaded."));
            }
        }
    }
}

fn info_report(coordinator: &ExecutionCoordinator<'_>) -> String {
    let session = coordinator.session();
    let usage = coordinator.context_usage();
    let knowledge = session.knowledge.names();
    let overrides: Vec<&str> = session.overrides.keys().map(|k| k.as_str()).collect();

    let mut lines = vec![
        format!("Session:    {}", session.id),
        format!("Status:     {}", session.status),
        format!(
            "Panes:      chat {} / exec {} (window {})",
            session.chat_pane, session.exec_pane, session.window
        ),
        format!(
            "Context:    ~{} of {} tokens ({:.1}%; messages ~{}, knowledge ~{})",
            usage.estimated_tokens,
            usage.max_tokens,
            usage.usage_pct * 100.0,
            usage.message_tokens,
            usage.knowledge_tokens
        ),
        format!("Messages:   {}", session.messages.len()),
        format!("Commands:   {} observed", session.exec_history.len()),
    ];
    lines.push(if knowledge.is_empty() {
        "Knowledge:  none".to_string()
    } else {
        format!("Knowledge:  {}", knowledge.join(", "))
    });
    if !overrides.is_empty() {
        lines.push(format!("Overrides:  {}", overrides.join(", ")));
    }
    lines.join("\n")
}
