//! quartz-explorer: projects the quartz consensus stream into the
//! external datastore.

mod subscribe;

use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::time::Duration;

use fs2::FileExt;
use quartz_chainstate::Explorer;
use quartz_consensus::{chain_params, Network};
use quartz_log::{log_debug, log_error, log_info, log_warn};
use quartz_primitives::ConsensusChange;
use quartz_storage::redis::RedisStore;

use crate::subscribe::ConsensusSubscription;

const DEFAULT_PERSISTENT_DIR: &str = "data";
const DEFAULT_REDIS_ADDR: &str = "localhost:6379";
const DEFAULT_REDIS_DB: i64 = 0;
const DEFAULT_RPC_ADDR: &str = "localhost:23112";
const LOCK_FILE_NAME: &str = "quartz-explorer.lock";
const STORE_RETRY_LIMIT: usize = 3;
const STORE_RETRY_DELAY_SECS: u64 = 2;

enum CliAction {
    PrintHelp,
    PrintVersion,
    Run(Config),
}

struct Config {
    network: Network,
    persistent_directory: PathBuf,
    redis_addr: String,
    redis_db: i64,
    rpc_addr: String,
    log_level: quartz_log::Level,
    log_format: quartz_log::Format,
    log_timestamps: bool,
}

fn parse_args() -> Result<CliAction, String> {
    parse_args_from(std::env::args().skip(1))
}

fn parse_args_from<I>(raw_args: I) -> Result<CliAction, String>
where
    I: IntoIterator<Item = String>,
{
    let mut network = Network::Standard;
    let mut persistent_directory = PathBuf::from(DEFAULT_PERSISTENT_DIR);
    let mut redis_addr = DEFAULT_REDIS_ADDR.to_string();
    let mut redis_db = DEFAULT_REDIS_DB;
    let mut rpc_addr = DEFAULT_RPC_ADDR.to_string();
    let mut log_level = quartz_log::Level::Info;
    let mut log_format = quartz_log::Format::Text;
    let mut log_timestamps = true;

    let mut args = raw_args.into_iter().peekable();

    if let Some(first) = args.peek().map(|value| value.as_str()) {
        match first {
            "help" => return Ok(CliAction::PrintHelp),
            "version" => return Ok(CliAction::PrintVersion),
            _ => {}
        }
    }

    while let Some(arg) = args.next() {
        let mut value_for = |flag: &str| {
            args.next()
                .ok_or_else(|| format!("{flag} requires a value"))
        };
        match arg.as_str() {
            "--network" => {
                let raw = value_for("--network")?;
                network = Network::parse(&raw)
                    .ok_or_else(|| format!("unknown network {raw:?} (standard, testnet)"))?;
            }
            "--persistent-directory" => {
                persistent_directory = PathBuf::from(value_for("--persistent-directory")?);
            }
            "--redis-addr" => {
                redis_addr = value_for("--redis-addr")?;
            }
            "--redis-db" => {
                let raw = value_for("--redis-db")?;
                redis_db = raw
                    .parse()
                    .map_err(|_| format!("invalid --redis-db value {raw:?}"))?;
            }
            "--rpc-addr" => {
                rpc_addr = value_for("--rpc-addr")?;
            }
            "--log-level" => {
                let raw = value_for("--log-level")?;
                log_level = quartz_log::Level::parse(&raw)
                    .ok_or_else(|| format!("unknown log level {raw:?}"))?;
            }
            "--log-format" => {
                let raw = value_for("--log-format")?;
                log_format = quartz_log::Format::parse(&raw)
                    .ok_or_else(|| format!("unknown log format {raw:?}"))?;
            }
            "--log-timestamps" => {
                let raw = value_for("--log-timestamps")?;
                log_timestamps = match raw.as_str() {
                    "true" | "on" => true,
                    "false" | "off" => false,
                    _ => return Err(format!("invalid --log-timestamps value {raw:?}")),
                };
            }
            other => return Err(format!("unknown argument {other:?}")),
        }
    }

    Ok(CliAction::Run(Config {
        network,
        persistent_directory,
        redis_addr,
        redis_db,
        rpc_addr,
        log_level,
        log_format,
        log_timestamps,
    }))
}

fn print_help() {
    println!(
        "quartz-explorer {}

Projects the quartz consensus stream into the external datastore.

USAGE:
    quartz-explorer [help | version] [FLAGS]

FLAGS:
    --network <standard|testnet>       chain network (default: standard)
    --persistent-directory <path>      daemon directory (default: {DEFAULT_PERSISTENT_DIR})
    --redis-addr <host:port>           datastore endpoint (default: {DEFAULT_REDIS_ADDR})
    --redis-db <int>                   datastore db slot (default: {DEFAULT_REDIS_DB})
    --rpc-addr <host:port>             consensus engine endpoint (default: {DEFAULT_RPC_ADDR})
    --log-level <error|warn|info|debug|trace>
    --log-format <text|json>
    --log-timestamps <true|false>",
        env!("CARGO_PKG_VERSION")
    );
}

fn print_version() {
    println!("quartz-explorer {}", env!("CARGO_PKG_VERSION"));
}

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    let action = match parse_args() {
        Ok(action) => action,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    };
    match action {
        CliAction::PrintHelp => print_help(),
        CliAction::PrintVersion => print_version(),
        CliAction::Run(config) => {
            if let Err(err) = run(config).await {
                log_error!("{err}");
                std::process::exit(1);
            }
        }
    }
}

async fn run(config: Config) -> Result<(), String> {
    quartz_log::init(quartz_log::LogConfig {
        level: config.log_level,
        format: config.log_format,
        timestamps: config.log_timestamps,
    });

    let params = chain_params(config.network);

    fs::create_dir_all(&config.persistent_directory).map_err(|err| {
        format!(
            "failed to create {}: {err}",
            config.persistent_directory.display()
        )
    })?;
    let lock_path = config.persistent_directory.join(LOCK_FILE_NAME);
    let lock_file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .open(&lock_path)
        .map_err(|err| format!("failed to open {}: {err}", lock_path.display()))?;
    lock_file
        .try_lock_exclusive()
        .map_err(|_| format!("another instance holds {}", lock_path.display()))?;

    let store = RedisStore::open(&config.redis_addr, config.redis_db)
        .map_err(|err| format!("failed to open datastore at {}: {err}", config.redis_addr))?;
    let mut explorer = Explorer::open(store, params)
        .map_err(|err| format!("failed to load explorer state: {err}"))?;
    log_info!(
        "{} explorer resumes at change {}",
        config.network.name(),
        explorer.current_change_id()
    );

    let mut subscription =
        ConsensusSubscription::connect(&config.rpc_addr, explorer.current_change_id())
            .await
            .map_err(|err| {
                format!(
                    "failed to subscribe to consensus engine at {}: {err}",
                    config.rpc_addr
                )
            })?;
    log_info!("subscribed to consensus engine at {}", config.rpc_addr);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            signal = &mut shutdown => {
                signal.map_err(|err| format!("failed to listen for shutdown: {err}"))?;
                log_info!("shutting down");
                break;
            }
            next = subscription.next_change() => {
                let change = match next {
                    Ok(Some(change)) => change,
                    Ok(None) => {
                        log_warn!("consensus engine closed the stream");
                        break;
                    }
                    Err(err) => return Err(format!("subscription failed: {err}")),
                };
                process_with_retry(&mut explorer, &change).await?;
                log_debug!(
                    "processed change {} (height {})",
                    change.id,
                    explorer.stats().block_height
                );
                subscription
                    .acknowledge(change.id)
                    .await
                    .map_err(|err| format!("failed to acknowledge change {}: {err}", change.id))?;
            }
        }
    }

    subscription.unsubscribe().await;
    Ok(())
}

/// Transient datastore errors get a bounded retry on the same change;
/// anything else aborts so the operator restarts from the persisted
/// change id.
async fn process_with_retry(
    explorer: &mut Explorer<RedisStore>,
    change: &ConsensusChange,
) -> Result<(), String> {
    let mut attempt = 0;
    loop {
        match explorer.process_consensus_change(change) {
            Ok(()) => return Ok(()),
            Err(err) if err.is_transient() && attempt + 1 < STORE_RETRY_LIMIT => {
                attempt += 1;
                log_warn!(
                    "datastore error on change {} (attempt {attempt}): {err}",
                    change.id
                );
                tokio::time::sleep(Duration::from_secs(STORE_RETRY_DELAY_SECS)).await;
            }
            Err(err) => {
                log_error!("aborting on change {}: {err}", change.id);
                return Err(err.to_string());
            }
        }
    }
}
