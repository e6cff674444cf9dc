//! Config - network, target version and timing, from code or environment
//!
//! | Variable | Field | Default |
//! |----------|-------|---------|
//! | `SBTC_BRIDGE_NETWORK` | `network` | `mainnet` |
//! | `SBTC_BRIDGE_VERSION` | `target_version` | 22 mainnet / 26 testnet |
//! | `SBTC_BRIDGE_NORMAL_MS` | `refresh.normal_cadence_ms` | 60000 |
//! | `SBTC_BRIDGE_FAST_MS` | `refresh.fast_cadence_ms` | 5000 |
//! | `SBTC_BRIDGE_CONFIRM_MS` | `refresh.confirm_timeout_ms` | 60000 |
//! | `SBTC_BRIDGE_SETTLE_MS` | `refresh.settle_delay_ms` | 5000 |
//! | `SBTC_BRIDGE_NOTIFY_ANY` | `detector.notify_on_any_change` | `0` |

use std::env;
use std::path::Path;
use tracing::debug;

use crate::address::{Network, StacksVersion, VersionError};
use crate::balance::DetectorConfig;
use crate::refresh::RefreshConfig;

/// Longest accepted cadence or timeout (one day).
pub const MAX_DURATION_MS: u64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Unknown network: {0:?} (expected mainnet or testnet)")]
    InvalidNetwork(String),
    #[error("{var} must be a number, got {value:?}")]
    InvalidNumber { var: &'static str, value: String },
    #[error("{0} must be greater than 0")]
    ZeroDuration(&'static str),
    #[error("{var} must be at most {max_ms} ms")]
    DurationTooLong { var: &'static str, max_ms: u64 },
    #[error(transparent)]
    Version(#[from] VersionError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    pub network: Network,
    pub target_version: StacksVersion,
    pub refresh: RefreshConfig,
    pub detector: DetectorConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self::new(Network::Mainnet)
    }
}

impl BridgeConfig {
    /// Defaults for `network`, target version included.
    pub fn new(network: Network) -> Self {
        Self {
            network,
            target_version: network.stacks_version(),
            refresh: RefreshConfig::default(),
            detector: DetectorConfig::default(),
        }
    }

    pub fn with_target_version(mut self, version: StacksVersion) -> Self {
        self.target_version = version;
        self
    }

    pub fn with_refresh(mut self, refresh: RefreshConfig) -> Self {
        self.refresh = refresh;
        self
    }

    pub fn with_detector(mut self, detector: DetectorConfig) -> Self {
        self.detector = detector;
        self
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_with_network(None)
    }

    /// Like [`from_env`](Self::from_env) with `network` replacing
    /// `SBTC_BRIDGE_NETWORK`. An explicit `SBTC_BRIDGE_VERSION` still wins
    /// over the network's default version.
    pub fn from_env_with_network(network: Option<Network>) -> Result<Self, ConfigError> {
        Self::resolve(|key| env::var(key).ok().filter(|v| !v.trim().is_empty()), network)
    }

    /// Build from any key lookup. Missing keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::resolve(lookup, None)
    }

    fn resolve<F>(lookup: F, network: Option<Network>) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let network = match (network, lookup("SBTC_BRIDGE_NETWORK")) {
            (Some(network), _) => network,
            (None, Some(raw)) => Network::from_str(&raw).ok_or(ConfigError::InvalidNetwork(raw))?,
            (None, None) => Network::Mainnet,
        };
        let mut config = Self::new(network);

        if let Some(raw) = lookup("SBTC_BRIDGE_VERSION") {
            let byte = parse_number(&raw, "SBTC_BRIDGE_VERSION")?;
            let byte = u8::try_from(byte)
                .map_err(|_| ConfigError::InvalidNumber { var: "SBTC_BRIDGE_VERSION", value: raw.clone() })?;
            config.target_version = StacksVersion::new(byte)?;
        }

        let refresh = &mut config.refresh;
        if let Some(ms) = duration(&lookup, "SBTC_BRIDGE_NORMAL_MS")? {
            refresh.normal_cadence_ms = ms;
        }
        if let Some(ms) = duration(&lookup, "SBTC_BRIDGE_FAST_MS")? {
            refresh.fast_cadence_ms = ms;
        }
        if let Some(ms) = duration(&lookup, "SBTC_BRIDGE_CONFIRM_MS")? {
            refresh.confirm_timeout_ms = ms;
        }
        if let Some(ms) = duration(&lookup, "SBTC_BRIDGE_SETTLE_MS")? {
            refresh.settle_delay_ms = ms;
        }

        if let Some(raw) = lookup("SBTC_BRIDGE_NOTIFY_ANY") {
            config.detector.notify_on_any_change = matches!(raw.trim(), "1" | "true" | "yes");
        }

        debug!(?config, "bridge config loaded");
        Ok(config)
    }
}

fn parse_number(raw: &str, var: &'static str) -> Result<u64, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidNumber { var, value: raw.to_string() })
}

fn duration<F>(lookup: &F, var: &'static str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(None),
        Some(raw) => match parse_number(&raw, var)? {
            0 => Err(ConfigError::ZeroDuration(var)),
            ms if ms > MAX_DURATION_MS => Err(ConfigError::DurationTooLong { var, max_ms: MAX_DURATION_MS }),
            ms => Ok(Some(ms)),
        },
    }
}

/// Load `KEY=value` lines from a `.env` file into the process environment.
///
/// Variables already set win. Returns the number of variables applied; a
/// missing file applies none.
pub fn load_env_file(path: impl AsRef<Path>) -> std::io::Result<usize> {
    let contents = match std::fs::read_to_string(path.as_ref()) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };

    let mut applied = 0;
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        if let Some((key, value)) = line.split_once('=') {
            let key = key.trim();
            let value = value.trim().trim_matches('"').trim_matches('\'');
            if !key.is_empty() && !value.is_empty() && env::var(key).is_err() {
                env::set_var(key, value);
                applied += 1;
            }
        }
    }
    debug!(path = %path.as_ref().display(), applied, "env file loaded");
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let config = BridgeConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, BridgeConfig::default());
        assert_eq!(config.refresh.normal_cadence_ms, 60_000);
        assert_eq!(config.target_version, StacksVersion::MAINNET_SINGLE_SIG);
    }

    #[test]
    fn testnet_switches_target_version() {
        let config = BridgeConfig::from_lookup(lookup(&[("SBTC_BRIDGE_NETWORK", "testnet")])).unwrap();
        assert_eq!(config.network, Network::Testnet);
        assert_eq!(config.target_version, StacksVersion::TESTNET_SINGLE_SIG);
    }

    #[test]
    fn overrides_timings() {
        let config = BridgeConfig::from_lookup(lookup(&[
            ("SBTC_BRIDGE_FAST_MS", "1000"),
            ("SBTC_BRIDGE_SETTLE_MS", " 250 "),
            ("SBTC_BRIDGE_NOTIFY_ANY", "1"),
        ]))
        .unwrap();
        assert_eq!(config.refresh.fast_cadence_ms, 1000);
        assert_eq!(config.refresh.settle_delay_ms, 250);
        assert_eq!(config.refresh.normal_cadence_ms, 60_000);
        assert!(config.detector.notify_on_any_change);
    }

    #[test]
    fn network_override_keeps_explicit_version() {
        let vars = lookup(&[("SBTC_BRIDGE_NETWORK", "mainnet"), ("SBTC_BRIDGE_VERSION", "21")]);
        let config = BridgeConfig::resolve(vars, Some(Network::Testnet)).unwrap();
        assert_eq!(config.network, Network::Testnet);
        assert_eq!(config.target_version, StacksVersion::TESTNET_MULTI_SIG);

        let config = BridgeConfig::resolve(lookup(&[]), Some(Network::Testnet)).unwrap();
        assert_eq!(config.target_version, StacksVersion::TESTNET_SINGLE_SIG);
    }

    #[test]
    fn rejects_durations_past_a_day() {
        assert_eq!(
            BridgeConfig::from_lookup(lookup(&[("SBTC_BRIDGE_NORMAL_MS", "18446744073709551615")])),
            Err(ConfigError::DurationTooLong { var: "SBTC_BRIDGE_NORMAL_MS", max_ms: MAX_DURATION_MS })
        );
        let at_limit = BridgeConfig::from_lookup(lookup(&[("SBTC_BRIDGE_NORMAL_MS", "86400000")])).unwrap();
        assert_eq!(at_limit.refresh.normal_cadence_ms, MAX_DURATION_MS);
    }

    #[test]
    fn rejects_bad_values() {
        assert_eq!(
            BridgeConfig::from_lookup(lookup(&[("SBTC_BRIDGE_NETWORK", "regtest")])),
            Err(ConfigError::InvalidNetwork("regtest".into()))
        );
        assert_eq!(
            BridgeConfig::from_lookup(lookup(&[("SBTC_BRIDGE_NORMAL_MS", "fast")])),
            Err(ConfigError::InvalidNumber { var: "SBTC_BRIDGE_NORMAL_MS", value: "fast".into() })
        );
        assert_eq!(
            BridgeConfig::from_lookup(lookup(&[("SBTC_BRIDGE_CONFIRM_MS", "0")])),
            Err(ConfigError::ZeroDuration("SBTC_BRIDGE_CONFIRM_MS"))
        );
        assert_eq!(
            BridgeConfig::from_lookup(lookup(&[("SBTC_BRIDGE_VERSION", "40")])),
            Err(ConfigError::Version(VersionError::OutOfRange(40)))
        );
    }
}
