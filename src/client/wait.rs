//! Wait-for-completion: poll targets until every one is back at its prompt
//! or the caller's timeout elapses.

use anyhow::Result;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::{ControlClient, RemoteOutput};
use crate::session::is_awaiting_instruction;
use crate::SessionId;

#[derive(Debug, Clone, Copy)]
pub struct WaitOptions {
    pub timeout: Duration,
    pub interval: Duration,
    /// Lines of output requested per poll
    pub lines: usize,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(600),
            interval: Duration::from_secs(2),
            lines: 50,
        }
    }
}

/// What a wait produced. On timeout, outputs of targets that did finish are kept.
#[derive(Debug, Clone, Serialize)]
pub struct WaitReport {
    pub completed: BTreeMap<SessionId, String>,
    pub pending: Vec<SessionId>,
    pub timed_out: bool,
    pub elapsed_ms: u128,
}

/// Tracks which targets have reached their prompt
#[derive(Debug, Clone)]
pub struct WaitTracker {
    targets: Vec<SessionId>,
    completed: BTreeMap<SessionId, String>,
}

impl WaitTracker {
    pub fn new(targets: Vec<SessionId>) -> Self {
        let mut targets = targets;
        targets.sort_unstable();
        targets.dedup();
        Self {
            targets,
            completed: BTreeMap::new(),
        }
    }

    /// Record one poll result. Returns true once this target is complete.
    pub fn observe(&mut self, output: &RemoteOutput) -> bool {
        if !self.targets.contains(&output.id) {
            return false;
        }
        if is_awaiting_instruction(&output.output) {
            self.completed.insert(output.id, output.output.clone());
            return true;
        }
        false
    }

    pub fn pending(&self) -> Vec<SessionId> {
        self.targets
            .iter()
            .copied()
            .filter(|id| !self.completed.contains_key(id))
            .collect()
    }

    pub fn is_done(&self) -> bool {
        self.pending().is_empty()
    }

    pub fn into_report(self, timed_out: bool, elapsed: Duration) -> WaitReport {
        let pending = self.pending();
        WaitReport {
            completed: self.completed,
            pending,
            timed_out,
            elapsed_ms: elapsed.as_millis(),
        }
    }
}

/// Poll `targets` until all are awaiting instruction or `options.timeout` elapses
pub async fn wait_for_completion(
    client: &ControlClient,
    targets: Vec<SessionId>,
    options: WaitOptions,
) -> Result<WaitReport> {
    let started = Instant::now();
    let mut tracker = WaitTracker::new(targets);

    loop {
        let polls = tracker.pending().into_iter().map(|id| {
            let client = client.clone();
            let lines = options.lines;
            tokio::task::spawn_blocking(move || client.output(id, Some(lines)))
        });

        for result in futures::future::join_all(polls).await {
            match result {
                Ok(Ok(output)) => {
                    if tracker.observe(&output) {
                        debug!("[conductor:wait] Session {} finished its turn", output.id);
                    }
                }
                Ok(Err(e)) => warn!("[conductor:wait] Poll failed: {:#}", e),
                Err(e) => warn!("[conductor:wait] Poll task failed: {}", e),
            }
        }

        if tracker.is_done() {
            return Ok(tracker.into_report(false, started.elapsed()));
        }

        let remaining = options.timeout.saturating_sub(started.elapsed());
        if remaining.is_zero() {
            return Ok(tracker.into_report(true, started.elapsed()));
        }
        tokio::time::sleep(options.interval.min(remaining)).await;
    }
}
