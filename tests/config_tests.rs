//! Integration Tests: configuration from the environment and .env files

use once_cell::sync::Lazy;
use sbtc_bridge::{load_env_file, BridgeConfig, ConfigError, Network, StacksVersion, MAX_DURATION_MS};
use std::sync::Mutex;
use tempfile::TempDir;

static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

fn lock_env() -> std::sync::MutexGuard<'static, ()> {
    ENV_LOCK.lock().unwrap_or_else(|p| p.into_inner())
}

const VARS: &[&str] = &[
    "SBTC_BRIDGE_NETWORK",
    "SBTC_BRIDGE_VERSION",
    "SBTC_BRIDGE_NORMAL_MS",
    "SBTC_BRIDGE_FAST_MS",
    "SBTC_BRIDGE_CONFIRM_MS",
    "SBTC_BRIDGE_SETTLE_MS",
    "SBTC_BRIDGE_NOTIFY_ANY",
];

fn clear_env() {
    for var in VARS {
        std::env::remove_var(var);
    }
}

/// Test: .env values are applied, existing variables win
#[test]
fn env_file_fills_missing_variables() {
    let _guard = lock_env();
    clear_env();
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join(".env");
    std::fs::write(
        &path,
        "# bridge settings\nSBTC_BRIDGE_NETWORK=testnet\nexport SBTC_BRIDGE_FAST_MS=\"2500\"\n\nSBTC_BRIDGE_SETTLE_MS=\nSBTC_BRIDGE_NORMAL_MS=30000\n",
    )
    .expect("write");
    std::env::set_var("SBTC_BRIDGE_NORMAL_MS", "90000");

    let applied = load_env_file(&path).expect("load");
    assert_eq!(applied, 2);

    let config = BridgeConfig::from_env().expect("config");
    assert_eq!(config.network, Network::Testnet);
    assert_eq!(config.target_version, StacksVersion::TESTNET_SINGLE_SIG);
    assert_eq!(config.refresh.fast_cadence_ms, 2_500);
    assert_eq!(config.refresh.normal_cadence_ms, 90_000);
    assert_eq!(config.refresh.settle_delay_ms, 5_000);

    clear_env();
}

/// Test: a missing file is not an error
#[test]
fn missing_env_file_applies_nothing() {
    let _guard = lock_env();
    let dir = TempDir::new().expect("tempdir");
    assert_eq!(load_env_file(dir.path().join("absent.env")).expect("load"), 0);
}

/// Test: invalid values surface as typed errors
#[test]
fn invalid_environment_is_reported() {
    let _guard = lock_env();
    clear_env();

    std::env::set_var("SBTC_BRIDGE_SETTLE_MS", "0");
    assert_eq!(BridgeConfig::from_env(), Err(ConfigError::ZeroDuration("SBTC_BRIDGE_SETTLE_MS")));

    clear_env();
    std::env::set_var("SBTC_BRIDGE_FAST_MS", "18446744073709551615");
    assert_eq!(
        BridgeConfig::from_env(),
        Err(ConfigError::DurationTooLong { var: "SBTC_BRIDGE_FAST_MS", max_ms: MAX_DURATION_MS })
    );

    clear_env();
    std::env::set_var("SBTC_BRIDGE_NETWORK", "signet");
    let err = BridgeConfig::from_env().unwrap_err();
    assert_eq!(err.to_string(), "Unknown network: \"signet\" (expected mainnet or testnet)");

    clear_env();
    assert_eq!(BridgeConfig::from_env(), Ok(BridgeConfig::default()));
}

/// Test: a network override keeps an explicitly configured version
#[test]
fn network_override_respects_explicit_version() {
    let _guard = lock_env();
    clear_env();

    std::env::set_var("SBTC_BRIDGE_VERSION", "21");
    let config = BridgeConfig::from_env_with_network(Some(Network::Testnet)).expect("config");
    assert_eq!(config.network, Network::Testnet);
    assert_eq!(config.target_version, StacksVersion::TESTNET_MULTI_SIG);

    clear_env();
    std::env::set_var("SBTC_BRIDGE_NETWORK", "mainnet");
    let config = BridgeConfig::from_env_with_network(Some(Network::Testnet)).expect("config");
    assert_eq!(config.network, Network::Testnet);
    assert_eq!(config.target_version, StacksVersion::TESTNET_SINGLE_SIG);

    clear_env();
}
