//! Refresh - Adaptive balance polling cadence
//!
//! `RefreshScheduler` is a pure, logically-clocked state machine. It owns no
//! threads and no runtime timers: a driver (see [`service`]) asks it for the
//! next [`Timer`], sleeps until the deadline and hands the timer back via
//! [`RefreshScheduler::fire`]. Tests drive it with [`RefreshScheduler::advance_to`].
//!
//! # Phases
//!
//! ```text
//!            accelerate()                      notify_balance_updated()
//!  Normal ───────────────► AwaitingConfirmation ────────────────────────► Accelerated
//!    ▲                          │  (cadence: fast)                          │ (cadence: fast)
//!    │   confirmation timeout   │                          settle timer     │
//!    └──────────────────────────┴───────────────────────────────────────────┘
//! ```
//!
//! # Timers
//!
//! | Slot | Kind | Armed by |
//! |------|------|----------|
//! | periodic | `Periodic` | construction, cadence change, its own firing |
//! | deadline | `ConfirmationTimeout` / `Settle` | `accelerate()` / `notify_balance_updated()` |
//!
//! Every arm takes a fresh generation. A timer handed back with a generation
//! that no longer occupies its slot is stale and ignored.

#[cfg(feature = "native")]
pub mod service;

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

/// Refresh cadence and timeout configuration (milliseconds)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// Polling interval while idle
    pub normal_cadence_ms: u64,
    /// Polling interval after a transfer
    pub fast_cadence_ms: u64,
    /// Give up waiting for a balance change after this long (from acceleration)
    pub confirm_timeout_ms: u64,
    /// Keep polling fast for this long after a change was seen
    pub settle_delay_ms: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            normal_cadence_ms: 60_000,
            fast_cadence_ms: 5_000,
            confirm_timeout_ms: 60_000,
            settle_delay_ms: 5_000,
        }
    }
}

impl RefreshConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Short intervals for tests
    pub fn fast_test() -> Self {
        Self {
            normal_cadence_ms: 200,
            fast_cadence_ms: 20,
            confirm_timeout_ms: 200,
            settle_delay_ms: 20,
        }
    }

    pub fn with_normal_cadence_ms(mut self, ms: u64) -> Self {
        self.normal_cadence_ms = ms;
        self
    }

    pub fn with_fast_cadence_ms(mut self, ms: u64) -> Self {
        self.fast_cadence_ms = ms;
        self
    }

    pub fn with_confirm_timeout_ms(mut self, ms: u64) -> Self {
        self.confirm_timeout_ms = ms;
        self
    }

    pub fn with_settle_delay_ms(mut self, ms: u64) -> Self {
        self.settle_delay_ms = ms;
        self
    }
}

/// Refresh phase.
///
/// The accelerated state is split in two: `accelerate()` enters
/// `AwaitingConfirmation`, a confirmed balance update moves on to
/// `Accelerated`, and both run at the fast cadence
/// ([`is_accelerated`](Phase::is_accelerated) is true for either).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Normal,
    /// Fast cadence, change already observed, settle timer pending
    Accelerated,
    /// Fast cadence, still waiting for the transfer to show up
    AwaitingConfirmation,
}

impl Phase {
    pub fn is_accelerated(&self) -> bool {
        !matches!(self, Phase::Normal)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Normal => "normal",
            Phase::Accelerated => "accelerated",
            Phase::AwaitingConfirmation => "awaiting_confirmation",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerKind {
    Periodic,
    ConfirmationTimeout,
    Settle,
}

/// An armed timer. Hand it back to [`RefreshScheduler::fire`] once its deadline passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timer {
    pub kind: TimerKind,
    pub generation: u64,
    pub deadline_ms: u64,
}

/// Externally observable refresh state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshSnapshot {
    pub trigger_count: u64,
    pub phase: Phase,
    pub cadence_ms: u64,
}

/// Per-session refresh state machine.
#[derive(Debug)]
pub struct RefreshScheduler {
    config: RefreshConfig,
    now_ms: u64,
    trigger_count: u64,
    phase: Phase,
    cadence_ms: u64,
    generation: u64,
    periodic: Option<Timer>,
    deadline: Option<Timer>,
    closed: bool,
}

impl RefreshScheduler {
    /// Starts in `Normal` at logical time 0 with the periodic timer armed.
    /// Zero durations in `config` are treated as 1 ms.
    pub fn new(config: RefreshConfig) -> Self {
        let config = RefreshConfig {
            normal_cadence_ms: config.normal_cadence_ms.max(1),
            fast_cadence_ms: config.fast_cadence_ms.max(1),
            confirm_timeout_ms: config.confirm_timeout_ms.max(1),
            settle_delay_ms: config.settle_delay_ms.max(1),
        };
        let mut scheduler = Self {
            config,
            now_ms: 0,
            trigger_count: 0,
            phase: Phase::Normal,
            cadence_ms: config.normal_cadence_ms,
            generation: 0,
            periodic: None,
            deadline: None,
            closed: false,
        };
        scheduler.arm_periodic();
        scheduler
    }

    pub fn with_defaults() -> Self {
        Self::new(RefreshConfig::default())
    }

    pub fn config(&self) -> &RefreshConfig {
        &self.config
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    pub fn current_trigger_count(&self) -> u64 {
        self.trigger_count
    }

    pub fn current_phase(&self) -> Phase {
        self.phase
    }

    pub fn cadence_ms(&self) -> u64 {
        self.cadence_ms
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn snapshot(&self) -> RefreshSnapshot {
        RefreshSnapshot {
            trigger_count: self.trigger_count,
            phase: self.phase,
            cadence_ms: self.cadence_ms,
        }
    }

    /// Ask dependents to re-fetch now.
    pub fn trigger_now(&mut self) {
        if self.closed {
            return;
        }
        self.trigger_count += 1;
        debug!(trigger_count = self.trigger_count, "refresh triggered");
    }

    /// Switch to the fast cadence after a transfer and refresh immediately.
    ///
    /// Any pending confirmation or settle timer is replaced, never stacked.
    pub fn accelerate(&mut self) {
        if self.closed {
            return;
        }
        info!(cadence_ms = self.config.fast_cadence_ms, "accelerating refresh rate for balance updates");
        self.phase = Phase::AwaitingConfirmation;
        self.set_cadence(self.config.fast_cadence_ms);
        self.arm_deadline(TimerKind::ConfirmationTimeout, self.config.confirm_timeout_ms);
        self.trigger_now();
    }

    /// The awaited balance change was observed. Returns false (and does
    /// nothing) when no acceleration is awaiting confirmation.
    pub fn notify_balance_updated(&mut self) -> bool {
        if self.closed || self.phase != Phase::AwaitingConfirmation {
            debug!(phase = %self.phase, "balance update with nothing to confirm");
            return false;
        }
        info!(settle_ms = self.config.settle_delay_ms, "balance update detected, settling accelerated refresh");
        self.phase = Phase::Accelerated;
        self.arm_deadline(TimerKind::Settle, self.config.settle_delay_ms);
        true
    }

    /// Earliest armed timer. On equal deadlines the periodic timer comes first.
    pub fn next_timer(&self) -> Option<Timer> {
        match (self.periodic, self.deadline) {
            (Some(p), Some(d)) if d.deadline_ms < p.deadline_ms => Some(d),
            (Some(p), _) => Some(p),
            (None, d) => d,
        }
    }

    /// Deliver a timer. Returns false for stale or cancelled timers.
    pub fn fire(&mut self, timer: Timer) -> bool {
        let slot = match timer.kind {
            TimerKind::Periodic => self.periodic,
            TimerKind::ConfirmationTimeout | TimerKind::Settle => self.deadline,
        };
        if self.closed || slot != Some(timer) {
            debug!(kind = ?timer.kind, generation = timer.generation, "ignoring stale timer");
            return false;
        }
        self.now_ms = self.now_ms.max(timer.deadline_ms);

        match timer.kind {
            TimerKind::Periodic => {
                self.trigger_now();
                self.arm_periodic();
            }
            TimerKind::ConfirmationTimeout => {
                info!("no balance update detected within timeout, reverting to normal refresh rate");
                self.revert_to_normal();
            }
            TimerKind::Settle => {
                info!("reverting to normal refresh rate after balance update");
                self.revert_to_normal();
            }
        }
        true
    }

    /// Move logical time forward, firing every timer due on the way.
    /// Returns how many timers fired.
    pub fn advance_to(&mut self, now_ms: u64) -> usize {
        let mut fired = 0;
        while let Some(timer) = self.next_timer() {
            // A saturated deadline never comes due.
            if timer.deadline_ms > now_ms || timer.deadline_ms == u64::MAX || !self.fire(timer) {
                break;
            }
            fired += 1;
        }
        self.now_ms = self.now_ms.max(now_ms);
        fired
    }

    pub fn advance_by(&mut self, elapsed_ms: u64) -> usize {
        self.advance_to(self.now_ms.saturating_add(elapsed_ms))
    }

    /// Cancel every timer. All later operations are no-ops.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.periodic = None;
        self.deadline = None;
        self.generation += 1;
        info!(trigger_count = self.trigger_count, "refresh scheduler closed");
    }

    fn revert_to_normal(&mut self) {
        self.phase = Phase::Normal;
        self.deadline = None;
        self.set_cadence(self.config.normal_cadence_ms);
    }

    fn set_cadence(&mut self, cadence_ms: u64) {
        if self.cadence_ms != cadence_ms {
            debug!(from = self.cadence_ms, to = cadence_ms, "refresh cadence changed");
            self.cadence_ms = cadence_ms;
            self.arm_periodic();
        }
    }

    fn arm_periodic(&mut self) {
        self.generation += 1;
        self.periodic = Some(Timer {
            kind: TimerKind::Periodic,
            generation: self.generation,
            deadline_ms: self.now_ms.saturating_add(self.cadence_ms),
        });
    }

    fn arm_deadline(&mut self, kind: TimerKind, delay_ms: u64) {
        self.generation += 1;
        self.deadline = Some(Timer {
            kind,
            generation: self.generation,
            deadline_ms: self.now_ms.saturating_add(delay_ms),
        });
    }
}
