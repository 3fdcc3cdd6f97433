use allergy_diary_core::kv::migrations::latest_version;
use allergy_diary_core::kv::{open_kv, open_kv_in_memory, KeyValueStore, KvError};
use rusqlite::Connection;

#[test]
fn open_in_memory_applies_all_migrations() {
    let kv = open_kv_in_memory().unwrap();
    kv.set("probe", "1").unwrap();
    assert_eq!(kv.get("probe").unwrap().as_deref(), Some("1"));
}

#[test]
fn reopening_file_keeps_values_and_version() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("diary.sqlite3");

    let first = open_kv(&path).unwrap();
    first.set("profileType", "personal").unwrap();
    drop(first);

    let second = open_kv(&path).unwrap();
    assert_eq!(
        second.get("profileType").unwrap().as_deref(),
        Some("personal")
    );

    let conn = Connection::open(&path).unwrap();
    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "kv_entries");
}

#[test]
fn opening_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.sqlite3");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    match open_kv(&path) {
        Err(KvError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        }) => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("newer schema must be rejected"),
    }
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
