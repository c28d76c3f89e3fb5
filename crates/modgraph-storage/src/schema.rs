//! Connection setup and schema migrations for the SQLite backend.
//!
//! Migrations live in `migrations/` and are embedded with `include_str!`.
//! `rusqlite_migration` tracks the applied version in SQLite's
//! `user_version` pragma.

use std::time::Duration;

use rusqlite::Connection;
use rusqlite_migration::{Migrations, M};

use crate::error::StorageError;

/// Schema version after every migration has been applied.
pub const SCHEMA_VERSION: u32 = 1;

/// How long a writer waits for a lock held by another connection.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Where a store's database lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location<'p> {
    File(&'p str),
    Memory,
}

fn migrations() -> Migrations<'static> {
    Migrations::new(vec![M::up(include_str!("migrations/001_initial_schema.sql"))])
}

/// Opens the database at `location`, configured and fully migrated.
pub fn open(location: Location<'_>) -> Result<Connection, StorageError> {
    let mut conn = match location {
        Location::File(path) => Connection::open(path)?,
        Location::Memory => Connection::open_in_memory()?,
    };

    // WAL keeps readers on the last committed graph while a rebuild writes.
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;

    migrations()
        .to_latest(&mut conn)
        .map_err(|e| StorageError::Migration(e.to_string()))?;
    Ok(conn)
}

/// The `user_version` recorded in `conn`.
pub fn schema_version(conn: &Connection) -> Result<u32, StorageError> {
    let version: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    Ok(version)
}
