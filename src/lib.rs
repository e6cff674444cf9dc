//! sbtc-bridge: Bitcoin-to-Stacks address translation and adaptive balance refresh.
//!
//! # Architecture
//!
//! ```text
//! user input "bc1q..."
//!   │
//!   ├── address::AddressCodec (classify / decode witness program)
//!   │     └── address::translate_bitcoin_to_target → "SP..." (c32check)
//!   │
//!   └── session::Session (native)
//!         ├── refresh::service::RefreshService  (tokio task owning a RefreshScheduler)
//!         ├── BalanceSource (injected, async)
//!         └── balance::BalanceChangeDetector    (celebrate + notify on increase)
//! ```
//!
//! # Refresh phases
//!
//! | Phase | Cadence | Leaves on |
//! |-------|---------|-----------|
//! | Normal | 60s | `accelerate()` |
//! | AwaitingConfirmation | 5s | balance change, or 60s confirmation timeout |
//! | Accelerated | 5s | 5s settle delay |
//!
//! # Features
//!
//! - `native` - tokio refresh service, sessions, signal handling, log subscriber, CLI
//!
//! # Usage
//!
//! ```ignore
//! use sbtc_bridge::{AddressCodec, StacksVersion, translate_bitcoin_to_target};
//!
//! let codec = AddressCodec::mainnet();
//! let stacks = translate_bitcoin_to_target(
//!     &codec,
//!     "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4",
//!     StacksVersion::MAINNET_SINGLE_SIG,
//! )?;
//! assert_eq!(stacks, "SP1THWXQ8368SDN2MJGE4BMDKMCHZ2GSVTS1X0BPM");
//! ```

// =============================================================================
// Shared modules (pure, no runtime)
// =============================================================================
pub mod address;
pub mod balance;
pub mod config;
pub mod refresh;

// =============================================================================
// Native-only modules (tokio, signals, log subscriber)
// =============================================================================
#[cfg(feature = "native")]
pub mod logging;
#[cfg(feature = "native")]
pub mod runtime;
#[cfg(feature = "native")]
pub mod session;

// =============================================================================
// Re-exports: Shared
// =============================================================================
pub use address::{
    derive_target_address, translate_bitcoin_to_target, AddressCodec, AddressFamily, BitcoinAddressClass,
    DecodeError, Hash160, Network, StacksVersion, TranslationError, VersionError, WitnessProgram,
};
pub use balance::{
    format_balance, parse_balance, validate_transfer_amount, AmountError, BalanceChange, BalanceChangeDetector,
    BalanceError, BalanceIncrease, Celebrate, DetectorConfig, LogCelebration, UpdateNotifier,
};
pub use config::{load_env_file, BridgeConfig, ConfigError, MAX_DURATION_MS};
pub use refresh::{Phase, RefreshConfig, RefreshScheduler, RefreshSnapshot};

// =============================================================================
// Re-exports: Native
// =============================================================================
#[cfg(feature = "native")]
pub use refresh::service::{RefreshHandle, RefreshService};
#[cfg(feature = "native")]
pub use runtime::{install_signal_handlers, Shutdown};
#[cfg(feature = "native")]
pub use session::{BalanceSource, Session};
