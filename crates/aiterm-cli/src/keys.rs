//! Pause and interrupt keys during waits.
//!
//! The terminal is only in raw mode while a [`KeyListener`] is alive, so
//! line input at the prompt keeps working normally.

use aiterm_rs::agent::SessionControl;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::debug;

const POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    TogglePause,
    Interrupt,
}

/// Map a key press to an action. Raw mode swallows SIGINT, so Ctrl-C is
/// handled here too.
pub fn key_action(key: &KeyEvent) -> Option<KeyAction> {
    if key.kind == KeyEventKind::Release {
        return None;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Some(KeyAction::Interrupt);
    }
    match key.code {
        KeyCode::Char('p') | KeyCode::Char(' ') => Some(KeyAction::TogglePause),
        KeyCode::Char('q') | KeyCode::Esc => Some(KeyAction::Interrupt),
        _ => None,
    }
}

/// Raw-mode key reader on its own thread. Dropping it restores the
/// terminal.
pub struct KeyListener {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl KeyListener {
    pub fn start(control: SessionControl) -> io::Result<Self> {
        enable_raw_mode()?;
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);

        let handle = std::thread::spawn(move || {
            while !flag.load(Ordering::Relaxed) {
                match event::poll(POLL) {
                    Ok(true) => {}
                    Ok(false) => continue,
                    Err(e) => {
                        debug!("Key poll failed: {e}");
                        break;
                    }
                }
                let Ok(Event::Key(key)) = event::read() else {
                    continue;
                };
                match key_action(&key) {
                    Some(KeyAction::TogglePause) => {
                        let paused = control.toggle_pause();
                        debug!("Wait {}", if paused { "paused" } else { "resumed" });
                    }
                    Some(KeyAction::Interrupt) => {
                        debug!("Interrupt requested from keyboard");
                        control.interrupt();
                    }
                    None => {}
                }
            }
        });

        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }
}

impl Drop for KeyListener {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        if let Err(e) = disable_raw_mode() {
            debug!("Failed to leave raw mode: {e}");
        }
    }
}
