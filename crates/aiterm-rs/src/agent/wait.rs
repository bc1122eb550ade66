//! The two waiting disciplines used after a dispatch.
//!
//! - [`Countdown`]: a fixed interval of *unpaused* time. Pausing freezes
//!   the elapsed time; resuming continues from where it stopped.
//! - [`CompletionPoll`]: repeatedly probes the pane for a completion marker
//!   until one appears or the timeout elapses. Paused time does not count
//!   toward the timeout.
//!
//! Both stop early when the session interrupt flag is raised.

use super::session::SessionControl;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::warn;

/// Tick period for countdown progress and interrupt checks.
pub const DEFAULT_TICK: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Elapsed,
    Interrupted,
}

/// Pausable fixed-interval wait.
#[derive(Debug, Clone, Copy)]
pub struct Countdown {
    interval: Duration,
    tick: Duration,
}

impl Countdown {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            tick: DEFAULT_TICK,
        }
    }

    /// Run the countdown. `on_tick(remaining, paused)` fires on every tick
    /// and on every pause change.
    pub async fn run(
        &self,
        control: &SessionControl,
        mut on_tick: impl FnMut(Duration, bool),
    ) -> WaitOutcome {
        let mut pause_rx = control.subscribe_pause();
        let mut elapsed = Duration::ZERO;
        let mut running_since = (!*pause_rx.borrow()).then(Instant::now);

        loop {
            if control.is_interrupted() {
                return WaitOutcome::Interrupted;
            }

            let total = elapsed + running_since.map(|t| t.elapsed()).unwrap_or_default();
            if total >= self.interval {
                return WaitOutcome::Elapsed;
            }
            let remaining = self.interval - total;
            on_tick(remaining, running_since.is_none());

            let nap = match running_since {
                Some(_) => remaining.min(self.tick),
                None => self.tick,
            };

            tokio::select! {
                _ = sleep(nap) => {}
                changed = pause_rx.changed() => {
                    if changed.is_err() {
                        sleep(nap).await;
                        continue;
                    }
                    let paused = *pause_rx.borrow_and_update();
                    match (paused, running_since) {
                        (true, Some(t)) => {
                            elapsed += t.elapsed();
                            running_since = None;
                        }
                        (false, None) => running_since = Some(Instant::now()),
                        _ => {}
                    }
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<T> {
    Completed(T),
    TimedOut,
    Interrupted,
}

/// Bounded poll for a completion marker.
#[derive(Debug, Clone, Copy)]
pub struct CompletionPoll {
    timeout: Duration,
    interval: Duration,
}

impl CompletionPoll {
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self {
            timeout,
            interval: if interval.is_zero() {
                DEFAULT_TICK
            } else {
                interval
            },
        }
    }

    /// Call `probe` immediately and then every interval until it yields a
    /// value. Probe errors are logged and polling continues. While paused
    /// the probe is not called and the timeout does not run.
    pub async fn run<T, E: std::fmt::Display>(
        &self,
        control: &SessionControl,
        mut probe: impl FnMut() -> Result<Option<T>, E>,
    ) -> PollOutcome<T> {
        let mut pause_rx = control.subscribe_pause();
        let mut elapsed = Duration::ZERO;
        loop {
            if control.is_interrupted() {
                return PollOutcome::Interrupted;
            }
            if *pause_rx.borrow_and_update() {
                if pause_rx.changed().await.is_err() {
                    sleep(self.interval).await;
                }
                continue;
            }

            match probe() {
                Ok(Some(value)) => return PollOutcome::Completed(value),
                Ok(None) => {}
                Err(e) => warn!("Completion probe failed: {e}"),
            }
            if elapsed >= self.timeout {
                return PollOutcome::TimedOut;
            }

            let nap = self.interval.min(self.timeout - elapsed);
            let started = Instant::now();
            tokio::select! {
                _ = sleep(nap) => {}
                changed = pause_rx.changed() => {
                    if changed.is_err() {
                        sleep(nap.saturating_sub(started.elapsed())).await;
                    }
                }
            }
            elapsed += started.elapsed();
        }
    }
}
