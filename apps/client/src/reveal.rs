//! Animated reveal: a lagging projection of a growing string.
//!
//! The projection advances toward its target at a fixed cadence, a few characters
//! per tick, no matter how fast fragments arrive. When the target stops extending
//! the projection (a new submission reset it), the projection snaps to empty
//! immediately rather than on the next tick.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::warn;

use crate::config::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevealSettings {
    pub tick: Duration,
    pub chars_per_tick: usize,
}

impl Default for RevealSettings {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(20),
            chars_per_tick: 3,
        }
    }
}

impl From<&Config> for RevealSettings {
    fn from(config: &Config) -> Self {
        Self {
            tick: config.reveal_tick,
            chars_per_tick: config.reveal_chars_per_tick.max(1),
        }
    }
}

/// Computes the projection after one tick. Never longer than `target`; always a
/// prefix of it; strictly longer than `projected` unless already caught up.
pub fn advance(projected: &str, target: &str, chars_per_tick: usize) -> String {
    if !target.starts_with(projected) {
        return String::new();
    }
    let remaining = &target[projected.len()..];
    let step = remaining
        .char_indices()
        .nth(chars_per_tick.max(1))
        .map(|(i, _)| i)
        .unwrap_or(remaining.len());
    target[..projected.len() + step].to_string()
}

/// Owns one ticking task. Instances share nothing, so the summary and the cover
/// letter can each run their own.
#[derive(Debug)]
pub struct RevealProjector {
    projected: watch::Receiver<String>,
    task: JoinHandle<()>,
}

impl RevealProjector {
    /// Starts projecting `target`. The task ends once the target's sender is gone
    /// and the projection has caught up, or once nobody observes the projection.
    pub fn spawn(target: watch::Receiver<String>, settings: RevealSettings) -> Self {
        let (tx, projected) = watch::channel(String::new());
        let task = tokio::spawn(run(target, tx, settings));
        Self { projected, task }
    }

    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.projected.clone()
    }

    /// Waits for the projection to finish and returns its final value.
    pub async fn finish(self) -> String {
        if let Err(e) = self.task.await {
            warn!("Reveal task ended abnormally: {e}");
        }
        let last = self.projected.borrow().clone();
        last
    }
}

async fn run(
    mut target: watch::Receiver<String>,
    tx: watch::Sender<String>,
    settings: RevealSettings,
) {
    let mut ticker = tokio::time::interval(settings.tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut target_open = true;

    loop {
        tokio::select! {
            changed = target.changed(), if target_open => {
                if changed.is_err() {
                    target_open = false;
                }
                let latest = target.borrow_and_update();
                tx.send_if_modified(|projected| {
                    if latest.starts_with(projected.as_str()) {
                        false
                    } else {
                        projected.clear();
                        true
                    }
                });
            }
            _ = ticker.tick() => {
                let latest = target.borrow();
                // Unmodified means the projection already equals the target.
                let moved = tx.send_if_modified(|projected| {
                    let next = advance(projected, &latest, settings.chars_per_tick);
                    if next == *projected {
                        false
                    } else {
                        *projected = next;
                        true
                    }
                });
                if !moved && !target_open {
                    break;
                }
            }
        }

        if tx.is_closed() {
            break;
        }
    }
}
