//! Connection bootstrap for the SQLite key-value medium.
//!
//! # Responsibility
//! - Open file or in-memory SQLite connections.
//! - Ensure `kv_entries` exists before handing out a store.
//!
//! # Invariants
//! - Returned stores have migrations fully applied.

use super::migrations::apply_migrations;
use super::{KvError, KvResult, SqliteKvStore};
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens (or creates) a key-value database file.
///
/// # Side effects
/// - Creates the file when missing and applies pending migrations.
/// - Emits `kv_open` logging events with duration and status.
pub fn open_kv(path: impl AsRef<Path>) -> KvResult<SqliteKvStore> {
    let started_at = Instant::now();
    info!("event=kv_open module=kv status=start mode=file");
    let result = Connection::open(path)
        .map_err(KvError::from)
        .and_then(bootstrap_connection);
    log_open_result("file", started_at, result)
}

/// Opens a private in-memory key-value database.
///
/// Every call returns an isolated medium, which makes it the default
/// choice for tests.
pub fn open_kv_in_memory() -> KvResult<SqliteKvStore> {
    let started_at = Instant::now();
    info!("event=kv_open module=kv status=start mode=memory");
    let result = Connection::open_in_memory()
        .map_err(KvError::from)
        .and_then(bootstrap_connection);
    log_open_result("memory", started_at, result)
}

fn bootstrap_connection(mut conn: Connection) -> KvResult<SqliteKvStore> {
    conn.busy_timeout(BUSY_TIMEOUT)?;
    apply_migrations(&mut conn)?;
    Ok(SqliteKvStore::new(conn))
}

fn log_open_result(
    mode: &str,
    started_at: Instant,
    result: KvResult<SqliteKvStore>,
) -> KvResult<SqliteKvStore> {
    match &result {
        Ok(_) => info!(
            "event=kv_open module=kv status=ok mode={} duration_ms={}",
            mode,
            started_at.elapsed().as_millis()
        ),
        Err(err) => error!(
            "event=kv_open module=kv status=error mode={} duration_ms={} error_code=kv_open_failed error={}",
            mode,
            started_at.elapsed().as_millis(),
            err
        ),
    }
    result
}
