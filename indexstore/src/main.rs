//! Replays one store's log and prints its entries in key order.
//!
//! ```text
//! indexstore <name> <key-type> <value-type>
//! ```
//!
//! Types are one of `i64`, `u64`, `string` or `bytes`. The log is read from
//! `{INDEXSTORE_DIRECTORY}/{name}.log`.

use std::fmt::Debug;

use indexstore::config::StoreConfig;
use indexstore::storage::{Codec, Store, StoreError};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const USAGE: &str = "usage: indexstore <name> <key-type> <value-type> (types: i64, u64, string, bytes)";

#[derive(Debug, Clone, Copy)]
enum Kind {
    I64,
    U64,
    Text,
    Bytes,
}

impl Kind {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "i64" => Some(Self::I64),
            "u64" => Some(Self::U64),
            "string" => Some(Self::Text),
            "bytes" => Some(Self::Bytes),
            _ => None,
        }
    }
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "indexstore=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let [name, key, value] = args.as_slice() else {
        eprintln!("{USAGE}");
        std::process::exit(2);
    };
    let (Some(key), Some(value)) = (Kind::parse(key), Kind::parse(value)) else {
        eprintln!("{USAGE}");
        std::process::exit(2);
    };

    // Load configuration from environment variables
    let config = match StoreConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    let path = config.log_path(name);
    if !path.is_file() {
        tracing::error!("No log at {}", path.display());
        std::process::exit(1);
    }

    let result = match key {
        Kind::I64 => dump_with_key::<i64>(&config, name, value),
        Kind::U64 => dump_with_key::<u64>(&config, name, value),
        Kind::Text => dump_with_key::<String>(&config, name, value),
        Kind::Bytes => dump_with_key::<Vec<u8>>(&config, name, value),
    };
    match result {
        Ok(count) => tracing::info!("{count} entries in {}", path.display()),
        Err(e) => {
            tracing::error!("Failed to replay {}: {e}", path.display());
            std::process::exit(1);
        }
    }
}

fn dump_with_key<K>(config: &StoreConfig, name: &str, value: Kind) -> Result<usize, StoreError>
where
    K: Codec + Ord + Debug,
{
    match value {
        Kind::I64 => dump::<K, i64>(config, name),
        Kind::U64 => dump::<K, u64>(config, name),
        Kind::Text => dump::<K, String>(config, name),
        Kind::Bytes => dump::<K, Vec<u8>>(config, name),
    }
}

fn dump<K, V>(config: &StoreConfig, name: &str) -> Result<usize, StoreError>
where
    K: Codec + Ord + Debug,
    V: Codec + Debug,
{
    let store: Store<K, V> = Store::open(config, name)?;
    let recovery = store.recovery();
    tracing::info!(
        format = %recovery.format,
        inserts = recovery.inserts,
        deletes = recovery.deletes,
        updates = recovery.updates,
        misses = recovery.misses,
        torn_bytes = recovery.torn_bytes,
        "replayed log"
    );

    for (key, value) in store.all().with_keys() {
        println!("{key:?}\t{value:?}");
    }
    Ok(store.len())
}
