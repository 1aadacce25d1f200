//! Friend-request table operations.

use rusqlite::{params, params_from_iter, Connection, OptionalExtension, ToSql};

use super::store::{sql_id_list, DeleteSummary, UpdateSummary};
use crate::error::{Error, Result};
use crate::friend_request::{FriendRequest, RequestSnapshot, RequestStatus, RequestUpdate};
use crate::time::DateRange;

const REQUEST_COLUMNS: &str =
    "id, content, status, reason, creation_date, response_date, requester_id, recipient_id";

/// Store-level filter over friend-request rows. Date ranges here address
/// concrete columns; the service folds derived ranges (expiration) into
/// `creation_date_range` before it gets here.
#[derive(Debug, Clone, Default)]
pub struct RequestRowFilter {
    /// Match these request IDs.
    pub ids: Option<Vec<i64>>,
    /// Match these requester IDs.
    pub requester_ids: Option<Vec<i64>>,
    /// Match these recipient IDs.
    pub recipient_ids: Option<Vec<i64>>,
    /// Match these stored statuses.
    pub statuses: Option<Vec<RequestStatus>>,
    /// Match rows created within this range.
    pub creation_date_range: Option<DateRange>,
    /// Match rows responded to within this range.
    pub response_date_range: Option<DateRange>,
    /// Zero-based page, meaningful with `size`.
    pub page: Option<u32>,
    /// Page size.
    pub size: Option<u32>,
}

/// Insert a new request row.
pub fn insert(conn: &Connection, request: &FriendRequest) -> Result<()> {
    conn.execute(
        "INSERT INTO friend_requests
         (id, content, status, reason, creation_date, response_date, requester_id, recipient_id)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            request.id,
            request.content,
            request.status.as_store_str(),
            request.reason,
            request.creation_date,
            request.response_date,
            request.requester_id,
            request.recipient_id,
        ],
    )?;
    Ok(())
}

/// Load a full request row.
pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<FriendRequest>> {
    let row = conn
        .query_row(
            &format!("SELECT {REQUEST_COLUMNS} FROM friend_requests WHERE id = ?"),
            params![id],
            raw_request_row,
        )
        .optional()?;
    row.map(request_from_raw).transpose()
}

/// The projection recall and handle authorise against: both parties, the
/// creation date, and the stored status.
pub fn find_snapshot(conn: &Connection, id: i64) -> Result<Option<RequestSnapshot>> {
    let row = conn
        .query_row(
            "SELECT id, requester_id, recipient_id, creation_date, status
             FROM friend_requests WHERE id = ?",
            params![id],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, String>(4)?,
                ))
            },
        )
        .optional()?;
    row.map(|(id, requester_id, recipient_id, creation_date, status)| {
        Ok(RequestSnapshot {
            id,
            requester_id,
            recipient_id,
            creation_date,
            status: parse_status(&status)?,
        })
    })
    .transpose()
}

/// The narrowest projection: who would receive the request.
pub fn find_recipient_id(conn: &Connection, id: i64) -> Result<Option<i64>> {
    let value = conn
        .query_row(
            "SELECT recipient_id FROM friend_requests WHERE id = ?",
            params![id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value)
}

/// The conditional update guarding every status transition: flip the row to
/// `status` only while it still reads PENDING. Sets the response date and,
/// when given, the reason. The caller tells a lost race by `modified == 0`.
pub fn update_status_if_pending(
    conn: &Connection,
    id: i64,
    status: RequestStatus,
    reason: Option<&str>,
    now: i64,
) -> Result<UpdateSummary> {
    let changed = conn.execute(
        "UPDATE friend_requests
         SET status = ?, response_date = ?, reason = COALESCE(?, reason)
         WHERE id = ? AND status = 'PENDING'",
        params![status.as_store_str(), now, reason, id],
    )?;
    Ok(UpdateSummary::of(changed))
}

/// Whether a PENDING request from `requester_id` to `recipient_id` exists.
/// With `expired_before` set, rows older than the threshold no longer count
/// (they read as EXPIRED).
pub fn has_pending(
    conn: &Connection,
    requester_id: i64,
    recipient_id: i64,
    expired_before: Option<i64>,
) -> Result<bool> {
    let exists: bool = match expired_before {
        Some(threshold) => conn.query_row(
            "SELECT EXISTS (
                 SELECT 1 FROM friend_requests
                 WHERE requester_id = ? AND recipient_id = ?
                   AND status = 'PENDING' AND creation_date >= ?)",
            params![requester_id, recipient_id, threshold],
            |row| row.get(0),
        )?,
        None => conn.query_row(
            "SELECT EXISTS (
                 SELECT 1 FROM friend_requests
                 WHERE requester_id = ? AND recipient_id = ? AND status = 'PENDING')",
            params![requester_id, recipient_id],
            |row| row.get(0),
        )?,
    };
    Ok(exists)
}

/// Whether any prohibiting request from `requester_id` to `recipient_id`
/// exists under the strict resend policy. A stored PENDING row counts even
/// when it would read as EXPIRED, and so do admin-written EXPIRED rows.
pub fn has_pending_or_declined_or_ignored_or_expired(
    conn: &Connection,
    requester_id: i64,
    recipient_id: i64,
) -> Result<bool> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS (
             SELECT 1 FROM friend_requests
             WHERE requester_id = ? AND recipient_id = ?
               AND status IN ('PENDING', 'DECLINED', 'IGNORED', 'EXPIRED'))",
        params![requester_id, recipient_id],
        |row| row.get(0),
    )?;
    Ok(exists)
}

/// All requests received by `recipient_id`.
pub fn find_by_recipient(conn: &Connection, recipient_id: i64) -> Result<Vec<FriendRequest>> {
    collect_requests(
        conn,
        &format!("SELECT {REQUEST_COLUMNS} FROM friend_requests WHERE recipient_id = ? ORDER BY id"),
        params![recipient_id],
    )
}

/// All requests sent by `requester_id`.
pub fn find_by_requester(conn: &Connection, requester_id: i64) -> Result<Vec<FriendRequest>> {
    collect_requests(
        conn,
        &format!("SELECT {REQUEST_COLUMNS} FROM friend_requests WHERE requester_id = ? ORDER BY id"),
        params![requester_id],
    )
}

/// Batched admin update of an arbitrary field subset.
pub fn update_requests(conn: &Connection, ids: &[i64], update: &RequestUpdate) -> Result<UpdateSummary> {
    let mut sets: Vec<String> = Vec::new();
    let mut values: Vec<Box<dyn ToSql>> = Vec::new();
    if let Some(requester_id) = update.requester_id {
        sets.push("requester_id = ?".to_string());
        values.push(Box::new(requester_id));
    }
    if let Some(recipient_id) = update.recipient_id {
        sets.push("recipient_id = ?".to_string());
        values.push(Box::new(recipient_id));
    }
    if let Some(content) = &update.content {
        sets.push("content = ?".to_string());
        values.push(Box::new(content.clone()));
    }
    if let Some(status) = update.status {
        sets.push("status = ?".to_string());
        values.push(Box::new(status.as_store_str()));
    }
    if let Some(reason) = &update.reason {
        sets.push("reason = ?".to_string());
        values.push(Box::new(reason.clone()));
    }
    if let Some(creation_date) = update.creation_date {
        sets.push("creation_date = ?".to_string());
        values.push(Box::new(creation_date));
    }
    if let Some(response_date) = update.response_date {
        sets.push("response_date = ?".to_string());
        values.push(Box::new(response_date));
    }
    if sets.is_empty() {
        return Ok(UpdateSummary::acknowledged());
    }
    let sql = format!(
        "UPDATE friend_requests SET {} WHERE id IN ({})",
        sets.join(", "),
        sql_id_list(ids)
    );
    let changed = conn.execute(&sql, params_from_iter(values.iter().map(|v| v.as_ref())))?;
    Ok(UpdateSummary::of(changed))
}

/// Delete the given request rows.
pub fn delete_by_ids(conn: &Connection, ids: &[i64]) -> Result<DeleteSummary> {
    let changed = conn.execute(
        &format!("DELETE FROM friend_requests WHERE id IN ({})", sql_id_list(ids)),
        [],
    )?;
    Ok(DeleteSummary::of(changed))
}

/// Housekeeping sweep: drop rows created before `threshold`.
pub fn delete_created_before(conn: &Connection, threshold: i64) -> Result<DeleteSummary> {
    let changed = conn.execute(
        "DELETE FROM friend_requests WHERE creation_date < ?",
        params![threshold],
    )?;
    Ok(DeleteSummary::of(changed))
}

/// Admin listing with arbitrary filters and paging.
pub fn find_filtered(conn: &Connection, filter: &RequestRowFilter) -> Result<Vec<FriendRequest>> {
    let (clause, values) = build_where(filter);
    let mut sql = format!("SELECT {REQUEST_COLUMNS} FROM friend_requests{clause} ORDER BY id");
    if let Some(size) = filter.size {
        sql.push_str(&format!(" LIMIT {size}"));
        if let Some(page) = filter.page {
            sql.push_str(&format!(" OFFSET {}", u64::from(page) * u64::from(size)));
        }
    }
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(values.iter().map(|v| v.as_ref())), raw_request_row)?;
    let mut requests = Vec::new();
    for row in rows {
        requests.push(request_from_raw(row?)?);
    }
    Ok(requests)
}

/// Admin count with the same filters as [`find_filtered`] (paging ignored).
pub fn count_filtered(conn: &Connection, filter: &RequestRowFilter) -> Result<u64> {
    let (clause, values) = build_where(filter);
    let count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM friend_requests{clause}"),
        params_from_iter(values.iter().map(|v| v.as_ref())),
        |row| row.get(0),
    )?;
    Ok(count as u64)
}

fn build_where(filter: &RequestRowFilter) -> (String, Vec<Box<dyn ToSql>>) {
    let mut clauses: Vec<String> = Vec::new();
    let mut values: Vec<Box<dyn ToSql>> = Vec::new();
    if let Some(ids) = &filter.ids {
        clauses.push(format!("id IN ({})", sql_id_list(ids)));
    }
    if let Some(requester_ids) = &filter.requester_ids {
        clauses.push(format!("requester_id IN ({})", sql_id_list(requester_ids)));
    }
    if let Some(recipient_ids) = &filter.recipient_ids {
        clauses.push(format!("recipient_id IN ({})", sql_id_list(recipient_ids)));
    }
    if let Some(statuses) = &filter.statuses {
        let list = statuses
            .iter()
            .map(|s| format!("'{}'", s.as_store_str()))
            .collect::<Vec<_>>()
            .join(",");
        clauses.push(format!("status IN ({list})"));
    }
    push_range(&mut clauses, &mut values, "creation_date", filter.creation_date_range);
    push_range(&mut clauses, &mut values, "response_date", filter.response_date_range);
    if clauses.is_empty() {
        (String::new(), values)
    } else {
        (format!(" WHERE {}", clauses.join(" AND ")), values)
    }
}

fn push_range(
    clauses: &mut Vec<String>,
    values: &mut Vec<Box<dyn ToSql>>,
    column: &str,
    range: Option<DateRange>,
) {
    if let Some(range) = range {
        if let Some(start) = range.start {
            clauses.push(format!("{column} >= ?"));
            values.push(Box::new(start));
        }
        if let Some(end) = range.end {
            clauses.push(format!("{column} < ?"));
            values.push(Box::new(end));
        }
    }
}

type RawRequestRow = (i64, String, String, Option<String>, i64, Option<i64>, i64, i64);

fn raw_request_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRequestRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

fn request_from_raw(raw: RawRequestRow) -> Result<FriendRequest> {
    let (id, content, status, reason, creation_date, response_date, requester_id, recipient_id) = raw;
    Ok(FriendRequest {
        id,
        content,
        status: parse_status(&status)?,
        reason,
        creation_date,
        response_date,
        requester_id,
        recipient_id,
    })
}

fn parse_status(value: &str) -> Result<RequestStatus> {
    RequestStatus::from_store_str(value)
        .ok_or_else(|| Error::Storage(format!("unknown request status: {value}")))
}

fn collect_requests(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<FriendRequest>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, raw_request_row)?;
    let mut requests = Vec::new();
    for row in rows {
        requests.push(request_from_raw(row?)?);
    }
    Ok(requests)
}
