//! Bounded dispatch of released chat messages
//!
//! Each released message becomes one blocking task that looks up the
//! matching command and runs its actions. At most `max_workers` tasks are
//! in flight; messages beyond that are dropped, not queued.

use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use crate::command::CommandExecutor;
use crate::error::ActionError;
use crate::message::ChatEvent;

/// What a finished dispatch task hands back
#[derive(Debug)]
pub struct DispatchOutcome {
    pub event: ChatEvent,
    /// Number of actions run, or the action failure
    pub result: Result<usize, ActionError>,
}

/// Counts from one pruning pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PruneReport {
    pub completed: usize,
    pub failed: usize,
}

/// Worker pool with a hard cap on in-flight tasks
pub struct Dispatcher {
    executor: Arc<dyn CommandExecutor>,
    max_workers: usize,
    tasks: JoinSet<DispatchOutcome>,
}

impl Dispatcher {
    /// Create a dispatcher running commands through `executor`
    pub fn new(executor: Arc<dyn CommandExecutor>, max_workers: usize) -> Self {
        Self {
            executor,
            max_workers,
            tasks: JoinSet::new(),
        }
    }

    /// Tasks submitted and not yet pruned
    pub fn active_count(&self) -> usize {
        self.tasks.len()
    }

    /// Remove finished tasks, logging failures
    ///
    /// A failed or panicked task only affects itself.
    pub fn prune(&mut self) -> PruneReport {
        let mut report = PruneReport::default();

        while let Some(joined) = self.tasks.try_join_next() {
            report.completed += 1;
            match joined {
                Ok(DispatchOutcome {
                    event,
                    result: Ok(count),
                }) => {
                    if count > 0 {
                        debug!(
                            "Ran {} actions for '{}' from {}",
                            count, event.message, event.username
                        );
                    }
                }
                Ok(DispatchOutcome {
                    event,
                    result: Err(e),
                }) => {
                    report.failed += 1;
                    warn!(
                        "Command '{}' from {} failed: {}",
                        event.message, event.username, e
                    );
                }
                Err(e) => {
                    report.failed += 1;
                    error!("Dispatch task aborted: {}", e);
                }
            }
        }

        report
    }

    /// Submit one task per event while under the worker cap
    ///
    /// Returns how many events were accepted. `queued` is only used in the
    /// warning for dropped events.
    pub fn dispatch(&mut self, events: Vec<ChatEvent>, queued: usize) -> usize {
        let mut accepted = 0;

        for event in events {
            if self.tasks.len() >= self.max_workers {
                warn!(
                    "Active tasks ({}) at worker cap ({}), dropping '{}' ({} messages in the queue)",
                    self.tasks.len(),
                    self.max_workers,
                    event.message,
                    queued
                );
                continue;
            }

            debug!("Got this message from {}: {}", event.username, event.message);
            let executor = Arc::clone(&self.executor);
            self.tasks.spawn_blocking(move || {
                let result = executor.lookup_and_execute(&event.message);
                DispatchOutcome { event, result }
            });
            accepted += 1;
        }

        accepted
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("max_workers", &self.max_workers)
            .field("active", &self.tasks.len())
            .finish()
    }
}
