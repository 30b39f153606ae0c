//! Configuration for the arbiter server.
//!
//! Every tunable has a compile-time default and can be overridden at runtime
//! via a dedicated environment variable. Command-line flags in `main.rs` take
//! precedence over both.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default address the TCP gateway listens on.
const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:7878";

/// File name of the SQLite database inside the data directory.
const DEFAULT_DATABASE_FILE: &str = "arbiter.db";

const DEV_DATA_DIR: &str = "./data";

/// Default number of task workers.
const DEFAULT_WORKERS: usize = 4;

/// Default number of attempts for a retryable task, including the first.
const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default base delay before the first retry (in milliseconds).
const DEFAULT_RETRY_BACKOFF_MS: u64 = 200;

/// Default lease duration of a game or user lock (in milliseconds).
const DEFAULT_LOCK_LEASE_MS: u64 = 10_000;

/// Default time a task waits to acquire a lock (in milliseconds).
const DEFAULT_LOCK_WAIT_MS: u64 = 5_000;

/// Default time a writer waits for the SQLite write lock (in milliseconds).
const DEFAULT_DB_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Default delay between finalize and K-factor recomputation (in milliseconds).
const DEFAULT_K_FACTOR_DELAY_MS: u64 = 3_000;

/// Read `var` and parse it, falling back to `default` when unset or invalid.
fn env_or<T: FromStr>(var: &str, default: T) -> T {
    match std::env::var(var) {
        Ok(raw) => match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(var, value = %raw, "Ignoring unparseable environment override");
                default
            }
        },
        Err(_) => default,
    }
}

/// Get the gateway listen address.
///
/// Priority:
/// 1. `ARBITER_LISTEN_ADDR` env variable if set
/// 2. `127.0.0.1:7878` as fallback
pub fn get_listen_addr() -> String {
    std::env::var("ARBITER_LISTEN_ADDR").unwrap_or_else(|_| DEFAULT_LISTEN_ADDR.to_string())
}

/// Get the data directory for persistence.
///
/// Priority:
/// 1. `ARBITER_DATA_DIR` env variable if set
/// 2. The platform data directory (e.g. `~/.local/share/arbiter`)
/// 3. `./data` as fallback
pub fn get_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("ARBITER_DATA_DIR") {
        return PathBuf::from(dir);
    }

    if let Some(dirs) = directories::ProjectDirs::from("", "", "arbiter") {
        return dirs.data_dir().to_path_buf();
    }

    PathBuf::from(DEV_DATA_DIR)
}

/// Get the SQLite database path.
///
/// Priority:
/// 1. `ARBITER_DATABASE` env variable if set
/// 2. `arbiter.db` inside [`get_data_dir`]
pub fn get_database_path() -> PathBuf {
    if let Ok(path) = std::env::var("ARBITER_DATABASE") {
        return PathBuf::from(path);
    }

    get_data_dir().join(DEFAULT_DATABASE_FILE)
}

/// Get the number of task workers (`ARBITER_WORKERS`, default 4).
pub fn get_workers() -> usize {
    env_or("ARBITER_WORKERS", DEFAULT_WORKERS).max(1)
}

/// Get the attempt limit for retryable tasks (`ARBITER_MAX_ATTEMPTS`, default 5).
pub fn get_max_attempts() -> u32 {
    env_or("ARBITER_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS).max(1)
}

/// Get the base retry backoff (`ARBITER_RETRY_BACKOFF_MS`, default 200 ms).
pub fn get_retry_backoff() -> Duration {
    Duration::from_millis(env_or("ARBITER_RETRY_BACKOFF_MS", DEFAULT_RETRY_BACKOFF_MS))
}

/// Get the lock lease duration (`ARBITER_LOCK_LEASE_MS`, default 10 s).
pub fn get_lock_lease() -> Duration {
    Duration::from_millis(env_or("ARBITER_LOCK_LEASE_MS", DEFAULT_LOCK_LEASE_MS))
}

/// Get the lock acquisition timeout (`ARBITER_LOCK_WAIT_MS`, default 5 s).
pub fn get_lock_wait() -> Duration {
    Duration::from_millis(env_or("ARBITER_LOCK_WAIT_MS", DEFAULT_LOCK_WAIT_MS))
}

/// Get the K-factor recompute delay (`ARBITER_K_FACTOR_DELAY_MS`, default 3 s).
pub fn get_k_factor_delay() -> Duration {
    Duration::from_millis(env_or("ARBITER_K_FACTOR_DELAY_MS", DEFAULT_K_FACTOR_DELAY_MS))
}

/// Get the SQLite busy timeout (`ARBITER_DB_BUSY_TIMEOUT_MS`, default 5 s).
pub fn get_db_busy_timeout() -> Duration {
    Duration::from_millis(env_or("ARBITER_DB_BUSY_TIMEOUT_MS", DEFAULT_DB_BUSY_TIMEOUT_MS))
}

/// Resolved runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub listen_addr: String,
    pub database_path: PathBuf,
    pub workers: usize,
    pub max_attempts: u32,
    pub retry_backoff: Duration,
    pub lock_lease: Duration,
    pub lock_wait: Duration,
    pub k_factor_delay: Duration,
    pub db_busy_timeout: Duration,
}

impl Settings {
    pub fn from_env() -> Self {
        Self {
            listen_addr: get_listen_addr(),
            database_path: get_database_path(),
            workers: get_workers(),
            max_attempts: get_max_attempts(),
            retry_backoff: get_retry_backoff(),
            lock_lease: get_lock_lease(),
            lock_wait: get_lock_wait(),
            k_factor_delay: get_k_factor_delay(),
            db_busy_timeout: get_db_busy_timeout(),
        }
    }
}
