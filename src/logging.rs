use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber. Filter from `RUST_LOG` (default `info`),
/// JSON lines when `SBTC_BRIDGE_LOG_JSON=1`. Output goes to stderr so stdout
/// stays machine readable.
pub fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let use_json = std::env::var("SBTC_BRIDGE_LOG_JSON")
        .map(|value| value == "1")
        .unwrap_or(false);

    if use_json {
        let _ = fmt::Subscriber::builder()
            .with_env_filter(env_filter)
            .json()
            .with_writer(std::io::stderr)
            .try_init();
    } else {
        let _ = fmt::Subscriber::builder()
            .with_env_filter(env_filter)
            .pretty()
            .with_writer(std::io::stderr)
            .try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn human_readable_init_is_repeatable() {
        std::env::remove_var("SBTC_BRIDGE_LOG_JSON");
        init_logging();
        init_logging();
        tracing::info!(component = "logging", "pretty subscriber installed");
    }
}
