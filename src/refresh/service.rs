//! RefreshService - drives a `RefreshScheduler` on a tokio task
//!
//! The scheduler is owned by exactly one task. Callers talk to it through a
//! [`RefreshHandle`] (commands over an mpsc channel) and observe it through a
//! `watch` channel of [`RefreshSnapshot`]s. Dependents re-fetch whenever
//! `trigger_count` changes.
//!
//! ```ignore
//! let shutdown = Shutdown::new();
//! let handle = RefreshService::new(RefreshConfig::default()).spawn(shutdown.subscribe());
//! let mut rx = handle.subscribe();
//! while rx.changed().await.is_ok() {
//!     let count = rx.borrow_and_update().trigger_count;
//!     // fetch balances
//! }
//! ```

use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info};

use super::{RefreshConfig, RefreshScheduler, RefreshSnapshot};
use crate::balance::UpdateNotifier;

/// Operations forwarded to the scheduler task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshCommand {
    TriggerNow,
    Accelerate,
    NotifyBalanceUpdated,
    Close,
}

/// Owns a scheduler until spawned
pub struct RefreshService {
    scheduler: RefreshScheduler,
}

impl RefreshService {
    pub fn new(config: RefreshConfig) -> Self {
        Self { scheduler: RefreshScheduler::new(config) }
    }

    pub fn with_defaults() -> Self {
        Self::new(RefreshConfig::default())
    }

    /// Spawn the scheduler loop. It ends on shutdown, when the handle is
    /// closed or dropped, cancelling every timer on the way out.
    pub fn spawn(self, shutdown: broadcast::Receiver<()>) -> RefreshHandle {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshots) = watch::channel(self.scheduler.snapshot());
        let task = tokio::spawn(run(self.scheduler, command_rx, snapshot_tx, shutdown));
        RefreshHandle { commands, snapshots, task: Some(task) }
    }
}

async fn run(
    mut scheduler: RefreshScheduler,
    mut commands: mpsc::UnboundedReceiver<RefreshCommand>,
    snapshots: watch::Sender<RefreshSnapshot>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let start = Instant::now();
    info!(cadence_ms = scheduler.cadence_ms(), "refresh service started");

    loop {
        let next = scheduler.next_timer();
        let due = next.and_then(|timer| start.checked_add(Duration::from_millis(timer.deadline_ms)));
        let wake = async {
            match due {
                Some(at) => sleep_until(at).await,
                // Past what the clock can represent
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = shutdown.recv() => break,
            command = commands.recv() => {
                let Some(command) = command else { break };
                scheduler.advance_to(start.elapsed().as_millis() as u64);
                debug!(?command, "refresh command");
                match command {
                    RefreshCommand::TriggerNow => scheduler.trigger_now(),
                    RefreshCommand::Accelerate => scheduler.accelerate(),
                    RefreshCommand::NotifyBalanceUpdated => {
                        scheduler.notify_balance_updated();
                    }
                    RefreshCommand::Close => break,
                }
            }
            _ = wake => {
                if let Some(timer) = next {
                    scheduler.fire(timer);
                }
            }
        }

        publish(&snapshots, scheduler.snapshot());
    }

    scheduler.close();
    publish(&snapshots, scheduler.snapshot());
    info!("refresh service stopped");
}

fn publish(snapshots: &watch::Sender<RefreshSnapshot>, snapshot: RefreshSnapshot) {
    snapshots.send_if_modified(|current| {
        if *current == snapshot {
            false
        } else {
            *current = snapshot;
            true
        }
    });
}

/// Client side of a running refresh service
pub struct RefreshHandle {
    commands: mpsc::UnboundedSender<RefreshCommand>,
    snapshots: watch::Receiver<RefreshSnapshot>,
    task: Option<JoinHandle<()>>,
}

impl RefreshHandle {
    pub fn trigger_now(&self) -> bool {
        self.send(RefreshCommand::TriggerNow)
    }

    /// Call after a transfer was submitted.
    pub fn accelerate(&self) -> bool {
        self.send(RefreshCommand::Accelerate)
    }

    pub fn notify_balance_updated(&self) -> bool {
        self.send(RefreshCommand::NotifyBalanceUpdated)
    }

    pub fn snapshot(&self) -> RefreshSnapshot {
        *self.snapshots.borrow()
    }

    pub fn trigger_count(&self) -> u64 {
        self.snapshot().trigger_count
    }

    pub fn subscribe(&self) -> watch::Receiver<RefreshSnapshot> {
        self.snapshots.clone()
    }

    /// Cheap sender for collaborators that only need to notify.
    pub fn notifier(&self) -> RefreshNotifier {
        RefreshNotifier { commands: self.commands.clone() }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().map(|t| !t.is_finished()).unwrap_or(false)
    }

    /// Stop the service and wait for it to cancel its timers.
    pub async fn close(mut self) {
        self.send(RefreshCommand::Close);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    fn send(&self, command: RefreshCommand) -> bool {
        self.commands.send(command).is_ok()
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Forwards balance-update notifications to a running service
#[derive(Debug, Clone)]
pub struct RefreshNotifier {
    commands: mpsc::UnboundedSender<RefreshCommand>,
}

impl UpdateNotifier for RefreshNotifier {
    fn notify_balance_updated(&mut self) {
        let _ = self.commands.send(RefreshCommand::NotifyBalanceUpdated);
    }
}
