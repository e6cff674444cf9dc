//! Session - one account's balance polling, wired to the refresh service
//!
//! ```text
//! RefreshService ──snapshot (trigger_count)──► poll task ──fetch──► BalanceSource
//!       ▲                                         │
//!       └──── notify_balance_updated ◄── BalanceChangeDetector ──► Celebrate
//! ```
//!
//! The poll task fetches once on connect and again every time the trigger
//! count moves. Triggers that arrive during a fetch are coalesced into one
//! follow-up fetch.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::balance::{format_balance, BalanceChangeDetector, Celebrate};
use crate::config::BridgeConfig;
use crate::refresh::service::{RefreshHandle, RefreshNotifier, RefreshService};
use crate::refresh::RefreshSnapshot;

/// Where balances come from (an API client in production, a mock in tests).
#[async_trait]
pub trait BalanceSource: Send + Sync {
    /// Raw token balance of `account`, as a decimal string.
    async fn fetch_balance(&self, account: &str) -> anyhow::Result<String>;
}

pub struct Session {
    account: String,
    refresh: Option<RefreshHandle>,
    balance: watch::Receiver<Option<String>>,
    poll: Option<JoinHandle<()>>,
}

impl Session {
    /// Start the refresh service and the poll task for `account`.
    pub fn connect<S, C>(
        account: impl Into<String>,
        config: &BridgeConfig,
        source: Arc<S>,
        celebration: C,
        shutdown: broadcast::Receiver<()>,
    ) -> Self
    where
        S: BalanceSource + 'static,
        C: Celebrate + 'static,
    {
        let account = account.into();
        let poll_shutdown = shutdown.resubscribe();
        let refresh = RefreshService::new(config.refresh).spawn(shutdown);
        let detector = BalanceChangeDetector::new(account.clone(), celebration).with_config(config.detector);
        let (balance_tx, balance) = watch::channel(None);

        let poll = tokio::spawn(poll_balances(
            account.clone(),
            source,
            detector,
            refresh.notifier(),
            refresh.subscribe(),
            balance_tx,
            poll_shutdown,
        ));
        info!(%account, "session connected");

        Self { account, refresh: Some(refresh), balance, poll: Some(poll) }
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    /// Call after submitting a transfer from this account.
    pub fn accelerate(&self) -> bool {
        self.refresh.as_ref().map(|r| r.accelerate()).unwrap_or(false)
    }

    pub fn refresh_now(&self) -> bool {
        self.refresh.as_ref().map(|r| r.trigger_now()).unwrap_or(false)
    }

    pub fn snapshot(&self) -> Option<RefreshSnapshot> {
        self.refresh.as_ref().map(|r| r.snapshot())
    }

    pub fn refresh_updates(&self) -> Option<watch::Receiver<RefreshSnapshot>> {
        self.refresh.as_ref().map(|r| r.subscribe())
    }

    /// Formatted balance from the last successful fetch.
    pub fn latest_balance(&self) -> Option<String> {
        self.balance.borrow().clone()
    }

    pub fn balances(&self) -> watch::Receiver<Option<String>> {
        self.balance.clone()
    }

    /// Stop polling and cancel every refresh timer.
    pub async fn disconnect(mut self) {
        if let Some(poll) = self.poll.take() {
            poll.abort();
            let _ = poll.await;
        }
        if let Some(refresh) = self.refresh.take() {
            refresh.close().await;
        }
        info!(account = %self.account, "session disconnected");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(poll) = self.poll.take() {
            poll.abort();
        }
    }
}

async fn poll_balances<S, C>(
    account: String,
    source: Arc<S>,
    mut detector: BalanceChangeDetector<C>,
    mut notifier: RefreshNotifier,
    mut snapshots: watch::Receiver<RefreshSnapshot>,
    balance_tx: watch::Sender<Option<String>>,
    mut shutdown: broadcast::Receiver<()>,
) where
    S: BalanceSource,
    C: Celebrate,
{
    loop {
        let seen = snapshots.borrow_and_update().trigger_count;

        match source.fetch_balance(&account).await {
            Ok(raw) => {
                match detector.observe(&raw, &mut notifier) {
                    Ok(change) => debug!(%account, trigger = seen, ?change, "balance observed"),
                    Err(e) => warn!(%account, error = %e, "balance not comparable"),
                }
                balance_tx.send_replace(Some(format_balance(&raw)));
            }
            // Keep the previous reading; a failed fetch is not a zero balance.
            Err(e) => warn!(%account, error = %e, "balance fetch failed"),
        }

        loop {
            tokio::select! {
                _ = shutdown.recv() => return,
                changed = snapshots.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    if snapshots.borrow_and_update().trigger_count != seen {
                        break;
                    }
                }
            }
        }
    }
}
