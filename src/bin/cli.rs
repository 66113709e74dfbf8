//! CLI for inspecting and driving locks

use anyhow::Context;
use clap::{Parser, Subcommand};
use kvlock::common::{format_nanos, parse_duration, validate_key};
use kvlock::lock::LeaseValue;
use kvlock::{Acquisition, Config, HolderToken, Lease, LeaseLock, LockStore, RedisStore, Release};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "kvlock")]
#[command(about = "Lease-based distributed locks on a key-value store")]
#[command(version)]
struct Cli {
    /// Config file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Store URL, overrides the config file
    #[arg(long)]
    url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Acquire a lock and print the lease
    Acquire {
        /// Lock key
        #[arg(value_parser = parse_key)]
        key: String,

        /// Lease length (e.g. "30s", "1500ms"); defaults to lock.lease_ms
        #[arg(long, value_parser = parse_duration)]
        lease: Option<Duration>,

        /// Attempts before giving up; defaults to lock.max_attempts
        #[arg(long, conflicts_with = "wait")]
        retries: Option<u32>,

        /// Retry until acquired (Ctrl-C to stop)
        #[arg(long)]
        wait: bool,
    },

    /// Release a lock
    Release {
        /// Lock key
        #[arg(value_parser = parse_key)]
        key: String,

        /// Safety margin (e.g. "100ms"); defaults to lock.safety_margin_ms
        #[arg(long, value_parser = parse_duration)]
        margin: Option<Duration>,

        /// Holder token printed by `acquire`; omit for an anonymous release
        #[arg(long)]
        token: Option<String>,
    },

    /// Show the lease stored under a key
    Inspect {
        /// Lock key
        #[arg(value_parser = parse_key)]
        key: String,
    },

    /// Acquire, run a command, release
    Run {
        /// Lock key
        #[arg(value_parser = parse_key)]
        key: String,

        #[arg(long, value_parser = parse_duration)]
        lease: Option<Duration>,

        /// Retry until acquired instead of giving up after lock.max_attempts
        #[arg(long)]
        wait: bool,

        /// Command and arguments
        #[arg(last = true, required = true)]
        command: Vec<String>,
    },
}

/// Operator-typed keys must be printable and at most 1024 bytes
fn parse_key(s: &str) -> kvlock::Result<String> {
    validate_key(s)?;
    Ok(s.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(url) = cli.url {
        config.store.url = url;
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let store = Arc::new(
        RedisStore::connect(&config.store)
            .await
            .with_context(|| format!("connecting to {}", config.store.url))?,
    );
    let lock = LeaseLock::new(store.clone()).with_options((&config.lock).into());

    let exit_code = execute(cli.command, &lock, &config).await;
    store.close().await?;

    match exit_code? {
        0 => Ok(()),
        code => std::process::exit(code),
    }
}

async fn execute(command: Commands, lock: &LeaseLock, config: &Config) -> anyhow::Result<i32> {
    match command {
        Commands::Acquire {
            key,
            lease,
            retries,
            wait,
        } => {
            let lease = lease.unwrap_or_else(|| config.lock.lease());
            match acquire(lock, &key, lease, retries, wait, config).await? {
                Some(held) => {
                    println!("{}", serde_json::to_string_pretty(&held)?);
                    Ok(0)
                }
                None => {
                    eprintln!("{} is held by someone else", key);
                    Ok(1)
                }
            }
        }

        Commands::Release { key, margin, token } => {
            let margin = margin.unwrap_or_else(|| config.lock.safety_margin());
            let outcome = match token {
                Some(token) => {
                    let lease = Lease::from_parts(key.clone(), 0, Some(HolderToken::from(token)));
                    lock.release_lease(&lease, margin).await?
                }
                None => lock.release(&key, margin).await?,
            };
            match outcome {
                Release::Released => {
                    println!("released {}", key);
                    Ok(0)
                }
                Release::NearExpiry { expiry_nanos } => {
                    eprintln!(
                        "{} expires at {}, inside the {:?} safety margin; leaving it to expire",
                        key,
                        format_nanos(expiry_nanos),
                        margin
                    );
                    Ok(2)
                }
                Release::NotOwner => {
                    eprintln!("{} is held under a different token", key);
                    Ok(3)
                }
                Release::Vanished => {
                    eprintln!("{} changed before it could be deleted", key);
                    Ok(4)
                }
            }
        }

        Commands::Inspect { key } => {
            let Some(raw) = lock.store().get(&key).await? else {
                println!("{}", json!({ "key": key, "present": false }));
                return Ok(1);
            };
            let now = lock.now_nanos();
            let report = match LeaseValue::parse(&key, &raw) {
                Ok(value) => json!({
                    "key": key,
                    "present": true,
                    "raw": raw,
                    "expiry_nanos": value.expiry_nanos,
                    "expires_at": format_nanos(value.expiry_nanos),
                    "token": value.token,
                    "live": value.is_live(now),
                }),
                Err(_) => json!({
                    "key": key,
                    "present": true,
                    "raw": raw,
                    "corrupt": true,
                }),
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(0)
        }

        Commands::Run {
            key,
            lease,
            wait,
            command,
        } => {
            let lease = lease.unwrap_or_else(|| config.lock.lease());
            let Some(held) = acquire(lock, &key, lease, None, wait, config).await? else {
                eprintln!("{} is held by someone else", key);
                return Ok(1);
            };

            let (program, args) = command
                .split_first()
                .context("missing command")?;
            let status = tokio::process::Command::new(program)
                .args(args)
                .status()
                .await
                .with_context(|| format!("running {}", program));

            match lock.release_lease(&held, config.lock.safety_margin()).await {
                Ok(Release::Released) => {}
                Ok(other) => tracing::warn!("Lock {} not released: {:?}", key, other),
                Err(e) => tracing::warn!("Lock {} not released: {}", key, e),
            }

            Ok(status?.code().unwrap_or(1))
        }
    }
}

async fn acquire(
    lock: &LeaseLock,
    key: &str,
    lease: Duration,
    retries: Option<u32>,
    wait: bool,
    config: &Config,
) -> anyhow::Result<Option<Lease>> {
    if wait {
        let cancel = CancellationToken::new();
        let on_signal = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                on_signal.cancel();
            }
        });
        return Ok(Some(lock.acquire_or_block(key, lease, &cancel).await?));
    }

    let attempts = retries.unwrap_or(config.lock.max_attempts);
    match lock.acquire_with_retries(key, lease, attempts).await? {
        Acquisition::Acquired(held) => Ok(Some(held)),
        _ => Ok(None),
    }
}
