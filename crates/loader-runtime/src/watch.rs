//! Wait-for-condition primitive.

use std::time::Duration;

use loader_dom::{Document, Mutation};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::{self, Instant, Interval, MissedTickBehavior};

/// Shortest polling period; `tokio::time::interval` rejects zero.
pub const MIN_POLL: Duration = Duration::from_millis(1);

/// Why a watcher woke up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// The document changed.
    Mutation,
    /// The polling interval elapsed.
    Tick,
}

/// Wakes on document mutations, with a polling interval as a fallback net.
///
/// Dropping the watcher clears its interval and unsubscribes, so a
/// watcher owned by a task is released exactly when the task ends.
#[derive(Debug)]
pub struct Watcher {
    mutations: Option<broadcast::Receiver<Mutation>>,
    ticker: Interval,
}

impl Watcher {
    /// Create a watcher. Must be called inside a Tokio runtime.
    ///
    /// With `observe` false, or when the host has no mutation
    /// observation, the watcher only polls. `poll` is raised to
    /// [`MIN_POLL`].
    pub fn new(doc: &dyn Document, poll: Duration, observe: bool) -> Self {
        let mutations = if observe { doc.subscribe() } else { None };
        let poll = poll.max(MIN_POLL);

        let mut ticker = time::interval_at(Instant::now() + poll, poll);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        Self { mutations, ticker }
    }

    /// Whether mutations are still being delivered.
    pub fn is_observing(&self) -> bool {
        self.mutations.is_some()
    }

    /// Stop observing mutations; polling continues.
    pub fn disconnect(&mut self) {
        self.mutations = None;
    }

    /// Wait for the next mutation or tick.
    pub async fn next(&mut self) -> Wake {
        let Some(rx) = self.mutations.as_mut() else {
            self.ticker.tick().await;
            return Wake::Tick;
        };

        let wake = tokio::select! {
            received = rx.recv() => match received {
                // Lagging only means several changes were coalesced.
                Ok(_) | Err(RecvError::Lagged(_)) => Some(Wake::Mutation),
                Err(RecvError::Closed) => None,
            },
            _ = self.ticker.tick() => Some(Wake::Tick),
        };

        match wake {
            Some(wake) => wake,
            None => {
                tracing::debug!("mutation source closed, falling back to polling");
                self.mutations = None;
                Wake::Tick
            }
        }
    }

    /// Resolve once `condition` holds. Checks immediately first.
    pub async fn until<F>(&mut self, mut condition: F)
    where
        F: FnMut() -> bool,
    {
        while !condition() {
            self.next().await;
        }
    }
}
