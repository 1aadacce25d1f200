//! Version-row table operations.

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;
use crate::version::VersionStream;

/// The last-updated timestamp of `(owner, stream)`, if any writer ever
/// advanced it.
pub fn last_updated(conn: &Connection, owner_id: i64, stream: VersionStream) -> Result<Option<i64>> {
    let value = conn
        .query_row(
            "SELECT updated_at FROM user_versions WHERE owner_id = ? AND stream = ?",
            params![owner_id, stream.as_store_str()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value)
}

/// Advance `(owner, stream)` to `now`. Last writer wins on wall-clock.
pub fn touch(conn: &Connection, owner_id: i64, stream: VersionStream, now: i64) -> Result<()> {
    conn.execute(
        "INSERT INTO user_versions (owner_id, stream, updated_at) VALUES (?, ?, ?)
         ON CONFLICT (owner_id, stream) DO UPDATE SET updated_at = excluded.updated_at",
        params![owner_id, stream.as_store_str(), now],
    )?;
    Ok(())
}

/// Advance `(owner, stream)` for every owner in one statement.
pub fn touch_many(conn: &Connection, owner_ids: &[i64], stream: VersionStream, now: i64) -> Result<()> {
    if owner_ids.is_empty() {
        return Ok(());
    }
    let mut stmt = conn.prepare_cached(
        "INSERT INTO user_versions (owner_id, stream, updated_at) VALUES (?, ?, ?)
         ON CONFLICT (owner_id, stream) DO UPDATE SET updated_at = excluded.updated_at",
    )?;
    for owner_id in owner_ids {
        stmt.execute(params![owner_id, stream.as_store_str(), now])?;
    }
    Ok(())
}

