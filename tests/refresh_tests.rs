//! Integration Tests: refresh scheduling
//!
//! These tests verify:
//! 1. Phase transitions on simulated time (accelerate, confirm, timeout, settle)
//! 2. Timer replacement instead of stacking
//! 3. The tokio-driven service on paused time
//! 4. Teardown cancels every timer

use sbtc_bridge::refresh::TimerKind;
use sbtc_bridge::{Phase, RefreshConfig, RefreshScheduler, RefreshService, Shutdown, UpdateNotifier};
use std::time::Duration;
use tokio::time::sleep;

/// Test: accelerate switches to the fast cadence and triggers exactly once
#[test]
fn accelerate_triggers_once_and_speeds_up() {
    let mut scheduler = RefreshScheduler::with_defaults();
    assert_eq!(scheduler.current_phase(), Phase::Normal);
    assert_eq!(scheduler.cadence_ms(), 60_000);

    scheduler.accelerate();
    assert_eq!(scheduler.current_trigger_count(), 1);
    assert_eq!(scheduler.current_phase(), Phase::AwaitingConfirmation);
    assert!(scheduler.current_phase().is_accelerated());
    assert_eq!(scheduler.cadence_ms(), 5_000);
}

/// Test: without a balance update the scheduler reverts after the confirmation timeout
#[test]
fn confirmation_timeout_reverts_to_normal() {
    let mut scheduler = RefreshScheduler::with_defaults();
    scheduler.accelerate();

    scheduler.advance_to(59_999);
    assert_eq!(scheduler.current_phase(), Phase::AwaitingConfirmation);
    // accelerate + fast ticks at 5s..55s
    assert_eq!(scheduler.current_trigger_count(), 12);

    scheduler.advance_to(60_000);
    assert_eq!(scheduler.current_phase(), Phase::Normal);
    assert_eq!(scheduler.cadence_ms(), 60_000);
    // The 60s periodic tick fires before the timeout on the tie
    assert_eq!(scheduler.current_trigger_count(), 13);

    let next = scheduler.next_timer().unwrap();
    assert_eq!(next.kind, TimerKind::Periodic);
    assert_eq!(next.deadline_ms, 120_000);
}

/// Test: a balance update settles for 5s and then reverts
#[test]
fn balance_update_settles_then_reverts() {
    let mut scheduler = RefreshScheduler::with_defaults();
    scheduler.accelerate();

    scheduler.advance_to(1_000);
    assert!(scheduler.notify_balance_updated());
    assert_eq!(scheduler.current_phase(), Phase::Accelerated);
    assert_eq!(scheduler.cadence_ms(), 5_000);

    scheduler.advance_to(5_999);
    assert_eq!(scheduler.current_phase(), Phase::Accelerated);

    scheduler.advance_to(6_000);
    assert_eq!(scheduler.current_phase(), Phase::Normal);
    assert_eq!(scheduler.cadence_ms(), 60_000);

    // The confirmation timeout was cancelled by the update
    scheduler.advance_to(61_000);
    assert_eq!(scheduler.current_phase(), Phase::Normal);
    assert_eq!(scheduler.next_timer().unwrap().deadline_ms, 66_000);
}

/// Test: a second update while settling is a no-op
#[test]
fn update_outside_confirmation_is_noop() {
    let mut scheduler = RefreshScheduler::with_defaults();
    assert!(!scheduler.notify_balance_updated());

    scheduler.accelerate();
    scheduler.advance_to(1_000);
    assert!(scheduler.notify_balance_updated());
    scheduler.advance_to(3_000);
    assert!(!scheduler.notify_balance_updated());

    // Settle deadline was not pushed back
    scheduler.advance_to(6_000);
    assert_eq!(scheduler.current_phase(), Phase::Normal);
}

/// Test: re-accelerating replaces the confirmation timeout
#[test]
fn reaccelerate_restarts_confirmation_window() {
    let mut scheduler = RefreshScheduler::with_defaults();
    scheduler.accelerate();
    scheduler.advance_to(30_000);
    scheduler.accelerate();

    scheduler.advance_to(60_000);
    assert_eq!(scheduler.current_phase(), Phase::AwaitingConfirmation);

    scheduler.advance_to(89_999);
    assert_eq!(scheduler.current_phase(), Phase::AwaitingConfirmation);

    scheduler.advance_to(90_000);
    assert_eq!(scheduler.current_phase(), Phase::Normal);
}

/// Test: periodic ticks keep firing independently of phase changes
#[test]
fn periodic_ticks_in_every_phase() {
    let mut scheduler = RefreshScheduler::new(RefreshConfig::default());
    scheduler.advance_to(120_000);
    assert_eq!(scheduler.current_trigger_count(), 2);

    scheduler.accelerate();
    assert_eq!(scheduler.current_trigger_count(), 3);
    scheduler.advance_by(10_000);
    assert_eq!(scheduler.current_trigger_count(), 5);
}

/// Test: close cancels timers and freezes the trigger count
#[test]
fn close_is_final() {
    let mut scheduler = RefreshScheduler::with_defaults();
    scheduler.accelerate();
    scheduler.close();

    assert!(scheduler.is_closed());
    assert!(scheduler.next_timer().is_none());
    assert_eq!(scheduler.advance_to(1_000_000), 0);
    scheduler.trigger_now();
    scheduler.accelerate();
    assert!(!scheduler.notify_balance_updated());
    assert_eq!(scheduler.current_trigger_count(), 1);
}

/// Let the service task drain its command queue.
async fn settle() {
    sleep(Duration::from_millis(1)).await;
}

/// Test: the service ticks on the normal cadence
#[tokio::test(start_paused = true)]
async fn service_ticks_periodically() {
    let shutdown = Shutdown::new();
    let handle = RefreshService::new(RefreshConfig::fast_test()).spawn(shutdown.subscribe());
    assert_eq!(handle.trigger_count(), 0);

    sleep(Duration::from_millis(450)).await;
    assert_eq!(handle.trigger_count(), 2);
    assert_eq!(handle.snapshot().phase, Phase::Normal);

    handle.close().await;
}

/// Test: accelerate over the service, then time out back to normal
#[tokio::test(start_paused = true)]
async fn service_accelerates_and_times_out() {
    let shutdown = Shutdown::new();
    let handle = RefreshService::new(RefreshConfig::fast_test()).spawn(shutdown.subscribe());

    assert!(handle.accelerate());
    settle().await;
    let snapshot = handle.snapshot();
    assert_eq!(snapshot.trigger_count, 1);
    assert_eq!(snapshot.phase, Phase::AwaitingConfirmation);
    assert_eq!(snapshot.cadence_ms, 20);

    sleep(Duration::from_millis(210)).await;
    let snapshot = handle.snapshot();
    assert_eq!(snapshot.phase, Phase::Normal);
    assert_eq!(snapshot.cadence_ms, 200);
    assert!(snapshot.trigger_count >= 10);

    handle.close().await;
}

/// Test: a notifier handed to a collaborator confirms the transfer
#[tokio::test(start_paused = true)]
async fn service_settles_after_notification() {
    let shutdown = Shutdown::new();
    let handle = RefreshService::new(RefreshConfig::fast_test()).spawn(shutdown.subscribe());
    let mut notifier = handle.notifier();

    handle.accelerate();
    settle().await;
    notifier.notify_balance_updated();
    settle().await;
    assert_eq!(handle.snapshot().phase, Phase::Accelerated);

    sleep(Duration::from_millis(10)).await;
    assert_eq!(handle.snapshot().phase, Phase::Accelerated);

    sleep(Duration::from_millis(15)).await;
    assert_eq!(handle.snapshot().phase, Phase::Normal);

    handle.close().await;
}

/// Test: subscribers see trigger count changes
#[tokio::test(start_paused = true)]
async fn service_publishes_snapshots() {
    let shutdown = Shutdown::new();
    let handle = RefreshService::new(RefreshConfig::fast_test()).spawn(shutdown.subscribe());
    let mut rx = handle.subscribe();

    handle.trigger_now();
    rx.changed().await.expect("snapshot");
    assert_eq!(rx.borrow_and_update().trigger_count, 1);

    handle.close().await;
}

/// Test: closing stops all timers, later ticks never arrive
#[tokio::test(start_paused = true)]
async fn close_cancels_service_timers() {
    let shutdown = Shutdown::new();
    let handle = RefreshService::new(RefreshConfig::fast_test()).spawn(shutdown.subscribe());
    let mut rx = handle.subscribe();
    handle.accelerate();
    settle().await;

    handle.close().await;
    let frozen = rx.borrow_and_update().trigger_count;
    sleep(Duration::from_millis(1_000)).await;
    assert_eq!(rx.borrow().trigger_count, frozen);
    assert!(rx.changed().await.is_err());
}

/// Test: a shutdown signal stops the service
#[tokio::test(start_paused = true)]
async fn shutdown_stops_service() {
    let shutdown = Shutdown::new();
    let handle = RefreshService::new(RefreshConfig::fast_test()).spawn(shutdown.subscribe());
    assert!(handle.is_running());

    shutdown.trigger();
    sleep(Duration::from_millis(5)).await;
    assert!(!handle.is_running());
    assert!(!handle.accelerate());
}
