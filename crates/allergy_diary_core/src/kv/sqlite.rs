//! SQLite implementation of [`KeyValueStore`].

use super::{KeyValueStore, KvResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// `kv_entries`-backed medium.
///
/// The connection sits behind a mutex so one medium can be shared by
/// several stores (and threads) through `Arc`.
pub struct SqliteKvStore {
    conn: Mutex<Connection>,
}

impl SqliteKvStore {
    /// Wraps an already bootstrapped connection.
    ///
    /// Prefer [`super::open_kv`] / [`super::open_kv_in_memory`], which
    /// apply migrations first.
    pub(crate) fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Returns all stored keys in lexical order.
    pub fn keys(&self) -> KvResult<Vec<String>> {
        let conn = self.lock();
        let mut stmt = conn.prepare("SELECT key FROM kv_entries ORDER BY key ASC;")?;
        let keys = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(keys)
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        // Statements are atomic; a poisoned guard still holds a usable connection.
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl KeyValueStore for SqliteKvStore {
    fn get(&self, key: &str) -> KvResult<Option<String>> {
        let value = self
            .lock()
            .query_row(
                "SELECT value FROM kv_entries WHERE key = ?1;",
                [key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> KvResult<()> {
        self.lock().execute(
            "INSERT INTO kv_entries (key, value, updated_at)
             VALUES (?1, ?2, (strftime('%s', 'now') * 1000))
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at;",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> KvResult<()> {
        self.lock()
            .execute("DELETE FROM kv_entries WHERE key = ?1;", [key])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::kv::{open_kv_in_memory, KeyValueStore};

    #[test]
    fn set_overwrites_existing_value() {
        let kv = open_kv_in_memory().unwrap();
        kv.set("profileType", "personal").unwrap();
        kv.set("profileType", "family").unwrap();

        assert_eq!(kv.get("profileType").unwrap().as_deref(), Some("family"));
        assert_eq!(kv.keys().unwrap(), vec!["profileType".to_string()]);
    }

    #[test]
    fn remove_missing_key_is_noop() {
        let kv = open_kv_in_memory().unwrap();
        kv.remove("absent").unwrap();
        assert_eq!(kv.get("absent").unwrap(), None);
    }

    #[test]
    fn empty_key_is_rejected_by_table_constraint() {
        let kv = open_kv_in_memory().unwrap();
        assert!(kv.set("", "value").is_err());
    }
}
