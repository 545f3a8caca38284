pub mod migrations;
pub mod queries;

use anyhow::Context;
use rusqlite::Connection;

pub fn init_db(path: &str) -> anyhow::Result<Connection> {
    let conn = Connection::open(path).context("failed to open database")?;

    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
        .context("failed to set database pragmas")?;

    migrations::run_migrations(&conn)?;

    Ok(conn)
}

/// Retry an idempotent read once if the store fails. Writes are never
/// retried here: a repeated insert could double-book.
pub fn read_with_retry<T>(mut read: impl FnMut() -> anyhow::Result<T>) -> anyhow::Result<T> {
    match read() {
        Ok(v) => Ok(v),
        Err(first) => {
            tracing::warn!(error = %first, "read failed, retrying once");
            read()
        }
    }
}
