//! Directed-relationship table operations.

use rusqlite::{params, Connection};

use super::store::DeleteSummary;
use crate::error::Result;

/// Upsert the directed row `(owner, related)` as a friendship: clears any
/// block flag and refreshes the establishment date.
pub fn upsert_friend(conn: &Connection, owner_id: i64, related_user_id: i64, now: i64) -> Result<()> {
    conn.execute(
        "INSERT INTO user_relationships (owner_id, related_user_id, block_date, establishment_date)
         VALUES (?, ?, NULL, ?)
         ON CONFLICT (owner_id, related_user_id)
         DO UPDATE SET block_date = NULL, establishment_date = excluded.establishment_date",
        params![owner_id, related_user_id, now],
    )?;
    Ok(())
}

/// Upsert the directed row with an explicit block date (`None` unblocks).
pub fn upsert(
    conn: &Connection,
    owner_id: i64,
    related_user_id: i64,
    block_date: Option<i64>,
    establishment_date: i64,
) -> Result<()> {
    conn.execute(
        "INSERT INTO user_relationships (owner_id, related_user_id, block_date, establishment_date)
         VALUES (?, ?, ?, ?)
         ON CONFLICT (owner_id, related_user_id)
         DO UPDATE SET block_date = excluded.block_date,
                       establishment_date = excluded.establishment_date",
        params![owner_id, related_user_id, block_date, establishment_date],
    )?;
    Ok(())
}

/// Whether `owner` has blocked `related`.
pub fn is_blocked(conn: &Connection, owner_id: i64, related_user_id: i64) -> Result<bool> {
    let blocked: bool = conn.query_row(
        "SELECT EXISTS (
             SELECT 1 FROM user_relationships
             WHERE owner_id = ? AND related_user_id = ? AND block_date IS NOT NULL)",
        params![owner_id, related_user_id],
        |row| row.get(0),
    )?;
    Ok(blocked)
}

/// Whether the directed relationship row exists at all.
pub fn exists(conn: &Connection, owner_id: i64, related_user_id: i64) -> Result<bool> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS (
             SELECT 1 FROM user_relationships WHERE owner_id = ? AND related_user_id = ?)",
        params![owner_id, related_user_id],
        |row| row.get(0),
    )?;
    Ok(exists)
}

/// Delete the directed row `(owner, related)`.
pub fn delete(conn: &Connection, owner_id: i64, related_user_id: i64) -> Result<DeleteSummary> {
    let changed = conn.execute(
        "DELETE FROM user_relationships WHERE owner_id = ? AND related_user_id = ?",
        params![owner_id, related_user_id],
    )?;
    Ok(DeleteSummary::of(changed))
}
