//! sbtc-bridge CLI - address translation and balance refresh from the shell
//!
//! Address operations:
//!   sbtc-bridge classify <address>        → {"address", "network", "family"}
//!   sbtc-bridge decode <address>          → {"hash160"} (bc1q... or S...)
//!   sbtc-bridge receive <pubkey-hex>      → {"address"} (P2WPKH)
//!   sbtc-bridge translate <address>       → {"bitcoin", "stacks", "version"}
//!
//! Balance operations:
//!   sbtc-bridge format <raw>              → {"raw", "formatted"}
//!   sbtc-bridge amount <input> --balance <raw>
//!   sbtc-bridge watch                     → JSON event lines; stdin: balances, "sent", "refresh"
//!
//! Configuration comes from SBTC_BRIDGE_* variables (a local .env is loaded
//! first), overridden by flags.

use sbtc_bridge::address::c32;
use sbtc_bridge::logging::init_logging;
use sbtc_bridge::{
    format_balance, install_signal_handlers, load_env_file, translate_bitcoin_to_target, validate_transfer_amount,
    AddressCodec, BalanceIncrease, BalanceSource, BitcoinAddressClass, BridgeConfig, Network, Session, StacksVersion,
};
use serde_json::{json, Value};
use std::env;
use std::io::IsTerminal;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

fn main() {
    init_logging();

    let args: Vec<String> = env::args().collect();
    let opts = ParsedArgs::parse(&args[1..]);

    if opts.help {
        print_usage();
        return;
    }

    if opts.version {
        println!("sbtc-bridge {}", env!("CARGO_PKG_VERSION"));
        return;
    }

    let result = load_config(&opts).and_then(|config| match opts.command.as_deref() {
        Some("classify") => cmd_classify(&opts, &config),
        Some("decode") => cmd_decode(&opts, &config),
        Some("receive") => cmd_receive(&opts, &config),
        Some("translate") => cmd_translate(&opts, &config),
        Some("format") => cmd_format(&opts),
        Some("amount") => cmd_amount(&opts),
        Some("watch") => cmd_watch(&opts, &config),
        Some(cmd) => Err(format!("Unknown command: {}", cmd)),
        None => Err("No command given (try --help)".to_string()),
    });

    let pretty = opts.pretty || (!opts.json && std::io::stdout().is_terminal());
    match result {
        Ok(output) => println!("{}", render(&output, pretty)),
        Err(e) => {
            eprintln!("{}", render(&json!({"error": e}), pretty));
            std::process::exit(1);
        }
    }
}

fn render(value: &Value, pretty: bool) -> String {
    let rendered = if pretty { serde_json::to_string_pretty(value) } else { serde_json::to_string(value) };
    rendered.unwrap_or_else(|_| value.to_string())
}

#[derive(Default)]
struct ParsedArgs {
    command: Option<String>,
    target: Option<String>,
    network: Option<String>,
    stacks_version: Option<String>,
    balance: Option<String>,
    env_file: Option<String>,
    json: bool,
    pretty: bool,
    help: bool,
    version: bool,
}

impl ParsedArgs {
    fn parse(args: &[String]) -> Self {
        let mut opts = ParsedArgs::default();
        let mut positional = Vec::new();
        let mut i = 0;

        while i < args.len() {
            let arg = &args[i];
            match arg.as_str() {
                "--help" | "-h" => opts.help = true,
                "--version" | "-V" => opts.version = true,
                "--json" => opts.json = true,
                "--pretty" => opts.pretty = true,
                "--network" | "-n" => {
                    if i + 1 < args.len() {
                        opts.network = Some(args[i + 1].clone());
                        i += 1;
                    }
                }
                "--stacks-version" | "-s" => {
                    if i + 1 < args.len() {
                        opts.stacks_version = Some(args[i + 1].clone());
                        i += 1;
                    }
                }
                "--balance" | "-b" => {
                    if i + 1 < args.len() {
                        opts.balance = Some(args[i + 1].clone());
                        i += 1;
                    }
                }
                "--env-file" => {
                    if i + 1 < args.len() {
                        opts.env_file = Some(args[i + 1].clone());
                        i += 1;
                    }
                }
                _ if !arg.starts_with('-') => positional.push(arg.clone()),
                _ => {} // Ignore unknown flags
            }
            i += 1;
        }

        // First positional is command
        if !positional.is_empty() {
            opts.command = Some(positional.remove(0));
        }
        // Rest is the operand (amounts may contain spaces)
        if !positional.is_empty() {
            opts.target = Some(positional.join(" "));
        }

        opts
    }

    fn target(&self, what: &str) -> Result<&str, String> {
        self.target.as_deref().ok_or_else(|| format!("Missing {}", what))
    }
}

/// Environment (after .env) first, then flags on top.
fn load_config(opts: &ParsedArgs) -> Result<BridgeConfig, String> {
    let env_file = opts.env_file.as_deref().unwrap_or(".env");
    load_env_file(env_file).map_err(|e| format!("Failed to read {}: {}", env_file, e))?;

    let network = match opts.network.as_deref() {
        Some(raw) => Some(Network::from_str(raw).ok_or_else(|| format!("Unknown network: {}", raw))?),
        None => None,
    };
    let mut config = BridgeConfig::from_env_with_network(network).map_err(|e| e.to_string())?;
    if let Some(raw) = opts.stacks_version.as_deref() {
        let byte: u8 = raw.parse().map_err(|_| format!("Invalid version byte: {}", raw))?;
        config.target_version = StacksVersion::new(byte).map_err(|e| e.to_string())?;
    }
    debug!(network = %config.network, version = %config.target_version, "config resolved");
    Ok(config)
}

fn cmd_classify(opts: &ParsedArgs, config: &BridgeConfig) -> Result<Value, String> {
    let address = opts.target("address")?;
    let class = AddressCodec::new(config.network).classify(address);
    let family = class.family().map(|f| f.as_str()).unwrap_or("unrecognized");
    Ok(json!({
        "address": address,
        "network": config.network.as_str(),
        "family": family,
        "translatable": matches!(class, BitcoinAddressClass::P2wpkh(_)),
    }))
}

fn cmd_decode(opts: &ParsedArgs, config: &BridgeConfig) -> Result<Value, String> {
    let address = opts.target("address")?;
    if address.starts_with(['S', 's']) {
        let (version, hash) = c32::decode_address(address).map_err(|e| e.to_string())?;
        return Ok(json!({"address": address, "version": version.get(), "hash160": hash.to_hex()}));
    }
    let program = AddressCodec::new(config.network).decode_witness_program(address).map_err(|e| e.to_string())?;
    Ok(json!({"address": address, "witness_version": 0, "hash160": program.hash160().to_hex()}))
}

fn cmd_receive(opts: &ParsedArgs, config: &BridgeConfig) -> Result<Value, String> {
    let pubkey = opts.target("public key (hex)")?;
    let address = AddressCodec::new(config.network)
        .derive_address_from_public_key_hex(pubkey)
        .map_err(|e| e.to_string())?;
    Ok(json!({"network": config.network.as_str(), "address": address}))
}

fn cmd_translate(opts: &ParsedArgs, config: &BridgeConfig) -> Result<Value, String> {
    let address = opts.target("address")?;
    let codec = AddressCodec::new(config.network);
    let stacks =
        translate_bitcoin_to_target(&codec, address, config.target_version).map_err(|e| e.to_string())?;
    Ok(json!({"bitcoin": address, "stacks": stacks, "version": config.target_version.get()}))
}

fn cmd_format(opts: &ParsedArgs) -> Result<Value, String> {
    let raw = opts.target("balance")?;
    Ok(json!({"raw": raw, "formatted": format_balance(raw)}))
}

fn cmd_amount(opts: &ParsedArgs) -> Result<Value, String> {
    let input = opts.target("amount")?;
    let balance = opts.balance.as_deref().ok_or("Missing --balance")?;
    let amount = validate_transfer_amount(input, balance).map_err(|e| e.to_string())?;
    Ok(json!({
        "amount": amount.to_string(),
        "label": format!("Send {} sats", format_balance(&amount.to_string())),
    }))
}

/// Balance fed by stdin lines.
#[derive(Default)]
struct StdinBalance(Mutex<Option<String>>);

#[async_trait::async_trait]
impl BalanceSource for StdinBalance {
    async fn fetch_balance(&self, _account: &str) -> anyhow::Result<String> {
        let latest = self.0.lock().map_err(|_| anyhow::anyhow!("balance lock poisoned"))?.clone();
        latest.ok_or_else(|| anyhow::anyhow!("no balance reading yet"))
    }
}

fn emit(event: Value) {
    println!("{}", event);
}

fn cmd_watch(opts: &ParsedArgs, config: &BridgeConfig) -> Result<Value, String> {
    use tokio::io::{AsyncBufReadExt, BufReader};

    let account = opts.target.clone().unwrap_or_else(|| "stdin".to_string());
    let rt = tokio::runtime::Runtime::new().map_err(|e| format!("Failed to create runtime: {}", e))?;

    rt.block_on(async {
        let shutdown = install_signal_handlers();
        let source = Arc::new(StdinBalance::default());
        let celebrate = |increase: &BalanceIncrease| {
            emit(json!({
                "event": "received",
                "amount": increase.delta().to_string(),
                "balance": increase.current.to_string(),
                "at": increase.observed_at.to_rfc3339(),
            }));
        };
        let session = Session::connect(account, config, source.clone(), celebrate, shutdown.subscribe());

        if let Some(mut updates) = session.refresh_updates() {
            tokio::spawn(async move {
                while updates.changed().await.is_ok() {
                    let snapshot = *updates.borrow_and_update();
                    emit(json!({
                        "event": "refresh",
                        "trigger_count": snapshot.trigger_count,
                        "phase": snapshot.phase.as_str(),
                        "cadence_ms": snapshot.cadence_ms,
                    }));
                }
            });
        }

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut shutdown_rx = shutdown.subscribe();
        info!(account = session.account(), "watching stdin for balance readings");

        loop {
            let line = tokio::select! {
                line = lines.next_line() => line.map_err(|e| format!("Failed to read stdin: {}", e))?,
                _ = shutdown_rx.recv() => None,
            };
            let Some(line) = line else { break };
            match line.trim() {
                "" => {}
                "sent" => {
                    session.accelerate();
                }
                "refresh" => {
                    session.refresh_now();
                }
                reading => match sbtc_bridge::parse_balance(reading) {
                    Ok(value) => {
                        if let Ok(mut latest) = source.0.lock() {
                            *latest = Some(value.to_string());
                        }
                        session.refresh_now();
                    }
                    Err(e) => emit(json!({"event": "ignored", "input": reading, "reason": e.to_string()})),
                },
            }
        }

        let last = session.latest_balance();
        session.disconnect().await;
        Ok::<Value, String>(json!({"status": "stopped", "balance": last}))
    })
}

fn print_usage() {
    println!(
        r#"sbtc-bridge - Bitcoin to Stacks address bridge

USAGE:
    sbtc-bridge <command> [operand] [options]

COMMANDS:
    classify <address>          Address family (p2wpkh|p2pkh|p2sh|p2tr|unrecognized)
    decode <address>            Hash160 of a bc1q or Stacks address
    receive <pubkey-hex>        P2WPKH receive address for a compressed public key
    translate <address>         Stacks address for a bc1q address
    format <raw>                Balance with thousands separators
    amount <input> -b <raw>     Validate a transfer amount against a balance
    watch [account]             Drive the refresh scheduler from stdin

WATCH INPUT (one per line):
    <number>                    New balance reading, triggers a refresh
    sent                        Transfer submitted, poll fast until it lands
    refresh                     Refresh immediately

OPTIONS:
    --network, -n <net>         mainnet|testnet (env: SBTC_BRIDGE_NETWORK)
    --stacks-version, -s <n>    Version byte (default 22 mainnet, 26 testnet)
    --balance, -b <raw>         Available balance for `amount`
    --env-file <path>           Env file to load (default .env)
    --json                      Raw JSON output
    --pretty                    Pretty-print JSON
    --version, -V               Print version

ENVIRONMENT:
    SBTC_BRIDGE_NORMAL_MS       Idle poll interval (60000)
    SBTC_BRIDGE_FAST_MS         Poll interval after a transfer (5000)
    SBTC_BRIDGE_CONFIRM_MS      Confirmation timeout (60000)
    SBTC_BRIDGE_SETTLE_MS       Fast polling kept after a change (5000)
    SBTC_BRIDGE_NOTIFY_ANY      Treat any balance change as confirmation (0)
    SBTC_BRIDGE_LOG_JSON        JSON logs on stderr (0)
    RUST_LOG                    Log filter (info)

EXAMPLES:
    sbtc-bridge translate bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4
    sbtc-bridge receive 0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798 -n testnet
    printf '1000\nsent\n1500\n' | sbtc-bridge watch
"#
    );
}
