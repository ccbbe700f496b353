//! Prints balance events from a Substrate node for a fixed window.
//!
//! Usage:
//!   cargo run                          # wss://rpc.polkadot.io, 10 minutes
//!   cargo run -- --local               # ws://127.0.0.1:9944
//!   cargo run -- --config monitor.toml

use anyhow::{bail, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

use substrate_events::chain::NodeClient;
use substrate_events::config::{Config, LoggingConfig, LOCAL_WS_URL};
use substrate_events::monitor::{subscribe, EventMonitor};

const DEFAULT_CONFIG_PATH: &str = "monitor.toml";

#[tokio::main]
async fn main() {
    // Load .env if present
    let _ = dotenvy::dotenv();

    match run().await {
        Ok(()) => {
            println!("done");
            std::process::exit(0);
        }
        Err(e) => {
            error!(error = %e, "event monitor failed");
            println!("{}", report_line(&e));
            std::process::exit(1);
        }
    }
}

#[derive(Debug, Default, PartialEq)]
struct Args {
    local: bool,
    config_path: Option<PathBuf>,
}

fn parse_args(args: &[String]) -> Result<Args> {
    let mut parsed = Args::default();
    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--local" => parsed.local = true,
            "--config" => match iter.next() {
                Some(path) => parsed.config_path = Some(PathBuf::from(path)),
                None => bail!("--config requires a path"),
            },
            other => bail!("unknown argument: {other}"),
        }
    }
    Ok(parsed)
}

/// Error messages already carry their cause, so only the outer message is
/// printed.
fn report_line(err: &anyhow::Error) -> String {
    format!("error: {err}")
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config_path {
        Some(path) => Config::load(path)?,
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
            Config::load(Path::new(DEFAULT_CONFIG_PATH))?
        }
        None => Config::from_env()?,
    };
    if args.local {
        config.node.ws_url = LOCAL_WS_URL.to_string();
    }
    Ok(config)
}

async fn run() -> Result<()> {
    let argv: Vec<String> = std::env::args().collect();
    let config = match parse_args(&argv).and_then(|args| load_config(&args)) {
        Ok(config) => config,
        Err(e) => {
            // Still report the failure through the default logger.
            init_logging(&LoggingConfig::default());
            return Err(e);
        }
    };

    init_logging(&config.logging);
    info!("substrate-events v{} starting", env!("CARGO_PKG_VERSION"));

    // --- Connect ---
    let node = NodeClient::connect(&config.node.ws_url, config.connect_timeout()).await?;
    println!("connection to substrate is OK");

    // --- Subscribe ---
    let mut monitor = EventMonitor::new(config.monitor.sections.clone(), std::io::stdout());
    let stats = monitor.stats();
    let batches = node.subscribe_events().await?;
    let subscription = subscribe(batches, move |batch| Ok(monitor.handle_batch(batch)?));

    // --- Observation window ---
    let report = subscription
        .run_for(config.window(), async {
            if tokio::signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
        })
        .await?;

    let totals = stats.snapshot();
    info!(
        outcome = %report.outcome,
        batches = report.batches,
        events = totals.events,
        matched = totals.matched,
        fields = totals.fields,
        elapsed_secs = report.elapsed.as_secs(),
        "monitoring finished"
    );
    debug!(url = %node.url(), "releasing node connection");

    Ok(())
}

fn init_logging(logging: &LoggingConfig) {
    // Logs go to stderr; stdout carries the event report.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));

    if logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use substrate_events::chain::ChainError;

    fn argv(args: &[&str]) -> Vec<String> {
        std::iter::once("substrate-events")
            .chain(args.iter().copied())
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_parse_args() {
        assert_eq!(parse_args(&argv(&[])).unwrap(), Args::default());
        assert_eq!(
            parse_args(&argv(&["--local", "--config", "node.toml"])).unwrap(),
            Args {
                local: true,
                config_path: Some(PathBuf::from("node.toml")),
            }
        );
    }

    #[test]
    fn test_config_flag_requires_path() {
        let err = parse_args(&argv(&["--config"])).unwrap_err();
        assert!(err.to_string().contains("--config requires a path"));
        assert!(parse_args(&argv(&["--verbose"])).is_err());
    }

    #[test]
    fn test_report_line_shows_cause_once() {
        let err = anyhow::Error::from(ChainError::Connection {
            url: "ws://127.0.0.1:1".to_string(),
            source: subxt::Error::Other("Connection refused".to_string()),
        });
        let line = report_line(&err);
        assert!(line.starts_with("error: connection to ws://127.0.0.1:1 failed"));
        assert_eq!(line.matches("Connection refused").count(), 1);
    }
}
