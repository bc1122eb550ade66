//! tmux implementation of the [`PaneCollaborator`] contract.
//!
//! [`Tmux`] shells out to the `tmux` binary for every operation. The
//! process boundary sits behind [`TmuxRunner`] so the argument building and
//! output parsing can be tested without a tmux server.
//!
//! [`TmuxPane::current`] resolves the pane aiterm runs in (from
//! `TMUX_PANE`), its window, and the exec pane next to it, creating one when
//! the window has a single pane.

use aiterm_rs::error::{EngineError, PaneError};
use aiterm_rs::pane::{PaneCollaborator, PaneDetails};
use std::process::Command;
use tracing::{debug, info, warn};

/// Pane listing format, one pane per line.
pub const PANE_FORMAT: &str = "#{pane_id},#{pane_active},#{pane_pid},#{pane_current_command},#{history_size},#{history_limit}";

/// Window target format (`$session:index`).
pub const WINDOW_FORMAT: &str = "#{session_id}:#{window_index}";

const PASTE_BUFFER: &str = "aiterm";

// ── Runner ─────────────────────────────────────────────────────────

/// Runs one tmux command and returns its stdout.
pub trait TmuxRunner: Send + Sync {
    fn run(&self, args: &[&str]) -> Result<String, PaneError>;
}

/// Runs the `tmux` binary found on `PATH`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTmux;

impl TmuxRunner for SystemTmux {
    fn run(&self, args: &[&str]) -> Result<String, PaneError> {
        let label = format!("tmux {}", args.first().copied().unwrap_or_default());
        let output = Command::new("tmux")
            .args(args)
            .output()
            .map_err(|e| PaneError::Spawn {
                command: label.clone(),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            if stderr.contains("can't find") {
                return Err(PaneError::NoTarget(stderr));
            }
            return Err(PaneError::Command {
                command: label,
                message: if stderr.is_empty() {
                    format!("exited with {}", output.status)
                } else {
                    stderr
                },
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

// ── Collaborator ───────────────────────────────────────────────────

/// tmux-backed pane operations.
#[derive(Debug, Clone, Default)]
pub struct Tmux<R = SystemTmux> {
    runner: R,
}

impl Tmux {
    pub fn new() -> Self {
        Self { runner: SystemTmux }
    }
}

impl<R: TmuxRunner> Tmux<R> {
    pub fn with_runner(runner: R) -> Self {
        Self { runner }
    }

    fn run(&self, args: &[&str]) -> Result<String, PaneError> {
        debug!("tmux {}", args.join(" "));
        self.runner.run(args)
    }

    /// Window target (`$session:index`) of `pane`.
    pub fn window_of(&self, pane: &str) -> Result<String, PaneError> {
        let out = self.run(&["list-panes", "-t", pane, "-F", WINDOW_FORMAT])?;
        out.lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .map(str::to_string)
            .ok_or_else(|| PaneError::NoTarget(pane.to_string()))
    }

    /// Split `window` without focusing the new pane. Returns its id.
    pub fn split_window(&self, window: &str) -> Result<String, PaneError> {
        let out = self.run(&["split-window", "-d", "-v", "-t", window, "-P", "-F", "#{pane_id}"])?;
        let id = out.trim();
        if id.is_empty() {
            return Err(PaneError::Command {
                command: "tmux split-window".into(),
                message: "no pane id printed".into(),
            });
        }
        Ok(id.to_string())
    }

    pub fn kill_pane(&self, pane: &str) -> Result<(), PaneError> {
        self.run(&["kill-pane", "-t", pane]).map(drop)
    }

    pub fn set_title(&self, pane: &str, title: &str) -> Result<(), PaneError> {
        self.run(&["select-pane", "-t", pane, "-T", title]).map(drop)
    }
}

impl<R: TmuxRunner> PaneCollaborator for Tmux<R> {
    fn capture(&self, target: &str, max_lines: usize) -> Result<String, PaneError> {
        let start = format!("-{max_lines}");
        let out = self.run(&["capture-pane", "-p", "-t", target, "-S", &start])?;
        Ok(out.trim().to_string())
    }

    fn send_keys(&self, target: &str, key: &str) -> Result<(), PaneError> {
        self.run(&["send-keys", "-t", target, key]).map(drop)
    }

    fn dispatch_command(&self, target: &str, command: &str) -> Result<(), PaneError> {
        self.run(&["send-keys", "-t", target, "-l", command])?;
        self.run(&["send-keys", "-t", target, "Enter"]).map(drop)
    }

    fn paste(&self, target: &str, content: &str) -> Result<(), PaneError> {
        self.run(&["set-buffer", "-b", PASTE_BUFFER, "--", content])?;
        self.run(&["paste-buffer", "-d", "-b", PASTE_BUFFER, "-t", target])
            .map(drop)
    }

    fn list_panes(&self, window: &str) -> Result<Vec<PaneDetails>, PaneError> {
        let out = self.run(&["list-panes", "-t", window, "-F", PANE_FORMAT])?;
        Ok(out
            .lines()
            .filter(|l| !l.trim().is_empty())
            .filter_map(|line| {
                let parsed = parse_pane_line(line);
                if parsed.is_none() {
                    warn!("Unparseable tmux pane line: {line:?}");
                }
                parsed
            })
            .collect())
    }
}

/// Parse one [`PANE_FORMAT`] line. The current command may contain commas.
pub fn parse_pane_line(line: &str) -> Option<PaneDetails> {
    let mut head = line.trim().splitn(4, ',');
    let id = head.next()?.to_string();
    let active = head.next()? == "1";
    let pid = head.next()?.parse().ok()?;

    let mut tail = head.next()?.rsplitn(3, ',');
    let history_limit = tail.next()?.parse().ok()?;
    let history_size = tail.next()?.parse().ok()?;
    let current_command = tail.next()?.to_string();

    Some(PaneDetails {
        id,
        active,
        pid,
        current_command,
        history_size,
        history_limit,
    })
}

// ── Layout ─────────────────────────────────────────────────────────

/// The chat pane aiterm runs in and the exec pane it drives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TmuxPane {
    pub chat_pane: String,
    pub exec_pane: String,
    pub window: String,
    /// The exec pane was created by aiterm and is killed on exit.
    pub created_exec: bool,
}

impl TmuxPane {
    /// Resolve the layout around `$TMUX_PANE`.
    pub fn current<R: TmuxRunner>(tmux: &Tmux<R>) -> Result<Self, EngineError> {
        let chat = std::env::var("TMUX_PANE").map_err(|_| {
            EngineError::Setup("TMUX_PANE is not set; run aiterm inside a tmux pane".into())
        })?;
        Self::resolve(tmux, &chat)
    }

    /// Resolve the layout around `chat_pane`: the first other pane in its
    /// window becomes the exec pane, or a new one is split off.
    pub fn resolve<R: TmuxRunner>(tmux: &Tmux<R>, chat_pane: &str) -> Result<Self, EngineError> {
        let window = tmux.window_of(chat_pane)?;
        let panes = tmux.list_panes(&window)?;

        let (exec_pane, created_exec) = match panes.iter().find(|p| p.id != chat_pane) {
            Some(existing) => (existing.id.clone(), false),
            None => {
                let id = tmux.split_window(&window)?;
                info!("Created exec pane {id} in window {window}");
                (id, true)
            }
        };

        let layout = Self {
            chat_pane: chat_pane.to_string(),
            exec_pane,
            window,
            created_exec,
        };
        layout.set_titles(tmux);
        Ok(layout)
    }

    fn set_titles<R: TmuxRunner>(&self, tmux: &Tmux<R>) {
        for (pane, title) in [(&self.chat_pane, "aiterm chat"), (&self.exec_pane, "aiterm exec")] {
            if let Err(e) = tmux.set_title(pane, title) {
                debug!("Could not set title of {pane}: {e}");
            }
        }
    }

    /// Kill the exec pane if aiterm created it.
    pub fn cleanup<R: TmuxRunner>(&self, tmux: &Tmux<R>) {
        if !self.created_exec {
            return;
        }
        match tmux.kill_pane(&self.exec_pane) {
            Ok(()) => info!("Removed exec pane {}", self.exec_pane),
            Err(e) => warn!("Failed to remove exec pane {}: {e}", self.exec_pane),
        }
    }
}
