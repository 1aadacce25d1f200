//! Relationship-group and group-member table operations.

use rusqlite::{params, params_from_iter, Connection, ToSql};

use super::store::{sql_id_list, DeleteSummary, UpdateSummary, UpsertOutcome};
use crate::error::Result;
use crate::relationship_group::{GroupKey, GroupMember, RelationshipGroup};
use crate::time::DateRange;

/// Store-level filter over group rows.
#[derive(Debug, Clone, Default)]
pub struct GroupRowFilter {
    /// Match these owners.
    pub owner_ids: Option<Vec<i64>>,
    /// Match these group indexes.
    pub indexes: Option<Vec<i32>>,
    /// Match these exact names.
    pub names: Option<Vec<String>>,
    /// Match rows created within this range.
    pub creation_date_range: Option<DateRange>,
    /// Zero-based page, meaningful with `size`.
    pub page: Option<u32>,
    /// Page size.
    pub size: Option<u32>,
}

/// Insert a group row; a duplicate `(owner, index)` surfaces as
/// [`crate::Error::DuplicateKey`].
pub fn insert_group(conn: &Connection, group: &RelationshipGroup) -> Result<()> {
    conn.execute(
        "INSERT INTO relationship_groups (owner_id, group_index, name, creation_date)
         VALUES (?, ?, ?, ?)",
        params![group.owner_id, group.group_index, group.name, group.creation_date],
    )?;
    Ok(())
}

/// Create the group row only if absent. Returns whether a row was inserted.
pub fn insert_group_ignore(
    conn: &Connection,
    owner_id: i64,
    group_index: i32,
    name: &str,
    creation_date: i64,
) -> Result<bool> {
    let changed = conn.execute(
        "INSERT OR IGNORE INTO relationship_groups (owner_id, group_index, name, creation_date)
         VALUES (?, ?, ?, ?)",
        params![owner_id, group_index, name, creation_date],
    )?;
    Ok(changed > 0)
}

/// All groups of one owner, default group first.
pub fn find_groups_by_owner(conn: &Connection, owner_id: i64) -> Result<Vec<RelationshipGroup>> {
    let mut stmt = conn.prepare(
        "SELECT owner_id, group_index, name, creation_date
         FROM relationship_groups WHERE owner_id = ? ORDER BY group_index",
    )?;
    let rows = stmt.query_map(params![owner_id], group_row)?;
    let mut groups = Vec::new();
    for row in rows {
        groups.push(row?);
    }
    Ok(groups)
}

/// Rename one group.
pub fn update_group_name(
    conn: &Connection,
    owner_id: i64,
    group_index: i32,
    name: &str,
) -> Result<UpdateSummary> {
    let changed = conn.execute(
        "UPDATE relationship_groups SET name = ? WHERE owner_id = ? AND group_index = ?",
        params![name, owner_id, group_index],
    )?;
    Ok(UpdateSummary::of(changed))
}

/// Batched admin update of group rows.
pub fn update_groups(
    conn: &Connection,
    keys: &[GroupKey],
    name: Option<&str>,
    creation_date: Option<i64>,
) -> Result<UpdateSummary> {
    let mut sets: Vec<String> = Vec::new();
    let mut values: Vec<Box<dyn ToSql>> = Vec::new();
    if let Some(name) = name {
        sets.push("name = ?".to_string());
        values.push(Box::new(name.to_string()));
    }
    if let Some(creation_date) = creation_date {
        sets.push("creation_date = ?".to_string());
        values.push(Box::new(creation_date));
    }
    if sets.is_empty() {
        return Ok(UpdateSummary::acknowledged());
    }
    let mut total = 0usize;
    let sql = format!(
        "UPDATE relationship_groups SET {} WHERE owner_id = ? AND group_index = ?",
        sets.join(", ")
    );
    let mut stmt = conn.prepare(&sql)?;
    for key in keys {
        let mut bound: Vec<&dyn ToSql> = values.iter().map(|v| v.as_ref()).collect();
        bound.push(&key.owner_id);
        bound.push(&key.group_index);
        total += stmt.execute(params_from_iter(bound))?;
    }
    Ok(UpdateSummary::of(total))
}

/// Delete one group row.
pub fn delete_group(conn: &Connection, owner_id: i64, group_index: i32) -> Result<DeleteSummary> {
    let changed = conn.execute(
        "DELETE FROM relationship_groups WHERE owner_id = ? AND group_index = ?",
        params![owner_id, group_index],
    )?;
    Ok(DeleteSummary::of(changed))
}

/// Delete group rows by composite key.
pub fn delete_groups_by_keys(conn: &Connection, keys: &[GroupKey]) -> Result<DeleteSummary> {
    let mut stmt = conn.prepare_cached(
        "DELETE FROM relationship_groups WHERE owner_id = ? AND group_index = ?",
    )?;
    let mut total = 0usize;
    for key in keys {
        total += stmt.execute(params![key.owner_id, key.group_index])?;
    }
    Ok(DeleteSummary::of(total))
}

/// Delete every group row of the given owners.
pub fn delete_groups_by_owners(conn: &Connection, owner_ids: &[i64]) -> Result<DeleteSummary> {
    let changed = conn.execute(
        &format!(
            "DELETE FROM relationship_groups WHERE owner_id IN ({})",
            sql_id_list(owner_ids)
        ),
        [],
    )?;
    Ok(DeleteSummary::of(changed))
}

/// Admin listing of groups.
pub fn find_filtered_groups(conn: &Connection, filter: &GroupRowFilter) -> Result<Vec<RelationshipGroup>> {
    let (clause, values) = build_group_where(filter);
    let mut sql = format!(
        "SELECT owner_id, group_index, name, creation_date FROM relationship_groups{clause}
         ORDER BY owner_id, group_index"
    );
    if let Some(size) = filter.size {
        sql.push_str(&format!(" LIMIT {size}"));
        if let Some(page) = filter.page {
            sql.push_str(&format!(" OFFSET {}", u64::from(page) * u64::from(size)));
        }
    }
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(values.iter().map(|v| v.as_ref())), group_row)?;
    let mut groups = Vec::new();
    for row in rows {
        groups.push(row?);
    }
    Ok(groups)
}

/// Admin count of groups (paging ignored).
pub fn count_filtered_groups(conn: &Connection, filter: &GroupRowFilter) -> Result<u64> {
    let (clause, values) = build_group_where(filter);
    let count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM relationship_groups{clause}"),
        params_from_iter(values.iter().map(|v| v.as_ref())),
        |row| row.get(0),
    )?;
    Ok(count as u64)
}

/// Upsert a member row. Reports whether a row was inserted, or an existing
/// row's join date was rewritten.
pub fn upsert_member(
    conn: &Connection,
    owner_id: i64,
    group_index: i32,
    related_user_id: i64,
    join_date: i64,
) -> Result<UpsertOutcome> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO relationship_group_members
         (owner_id, group_index, related_user_id, join_date)
         VALUES (?, ?, ?, ?)",
        params![owner_id, group_index, related_user_id, join_date],
    )? > 0;
    if inserted {
        return Ok(UpsertOutcome {
            inserted: true,
            modified: false,
        });
    }
    let modified = conn.execute(
        "UPDATE relationship_group_members SET join_date = ?
         WHERE owner_id = ? AND group_index = ? AND related_user_id = ? AND join_date <> ?",
        params![join_date, owner_id, group_index, related_user_id, join_date],
    )? > 0;
    Ok(UpsertOutcome {
        inserted: false,
        modified,
    })
}

/// Insert a member row; a duplicate key surfaces as
/// [`crate::Error::DuplicateKey`].
pub fn insert_member(conn: &Connection, member: &GroupMember) -> Result<()> {
    conn.execute(
        "INSERT INTO relationship_group_members
         (owner_id, group_index, related_user_id, join_date)
         VALUES (?, ?, ?, ?)",
        params![
            member.owner_id,
            member.group_index,
            member.related_user_id,
            member.join_date
        ],
    )?;
    Ok(())
}

/// Bulk-insert member rows, skipping duplicates (partial success is the
/// point: mirroring members into a group some already joined).
pub fn insert_members_ignore_duplicates(conn: &Connection, members: &[GroupMember]) -> Result<()> {
    let mut stmt = conn.prepare_cached(
        "INSERT OR IGNORE INTO relationship_group_members
         (owner_id, group_index, related_user_id, join_date)
         VALUES (?, ?, ?, ?)",
    )?;
    for member in members {
        stmt.execute(params![
            member.owner_id,
            member.group_index,
            member.related_user_id,
            member.join_date
        ])?;
    }
    Ok(())
}

/// Delete one member row.
pub fn delete_member(
    conn: &Connection,
    owner_id: i64,
    group_index: i32,
    related_user_id: i64,
) -> Result<DeleteSummary> {
    let changed = conn.execute(
        "DELETE FROM relationship_group_members
         WHERE owner_id = ? AND group_index = ? AND related_user_id = ?",
        params![owner_id, group_index, related_user_id],
    )?;
    Ok(DeleteSummary::of(changed))
}

/// Delete every member row of one group.
pub fn delete_members_of_group(
    conn: &Connection,
    owner_id: i64,
    group_index: i32,
) -> Result<DeleteSummary> {
    let changed = conn.execute(
        "DELETE FROM relationship_group_members WHERE owner_id = ? AND group_index = ?",
        params![owner_id, group_index],
    )?;
    Ok(DeleteSummary::of(changed))
}

/// Remove the given related users from every group of `owner_id`.
pub fn delete_members_from_all_groups(
    conn: &Connection,
    owner_id: i64,
    related_user_ids: &[i64],
) -> Result<DeleteSummary> {
    let changed = conn.execute(
        &format!(
            "DELETE FROM relationship_group_members
             WHERE owner_id = ? AND related_user_id IN ({})",
            sql_id_list(related_user_ids)
        ),
        params![owner_id],
    )?;
    Ok(DeleteSummary::of(changed))
}

/// All member rows of one group.
pub fn find_members_of_group(
    conn: &Connection,
    owner_id: i64,
    group_index: i32,
) -> Result<Vec<GroupMember>> {
    let mut stmt = conn.prepare(
        "SELECT owner_id, group_index, related_user_id, join_date
         FROM relationship_group_members
         WHERE owner_id = ? AND group_index = ? ORDER BY related_user_id",
    )?;
    let rows = stmt.query_map(params![owner_id, group_index], member_row)?;
    let mut members = Vec::new();
    for row in rows {
        members.push(row?);
    }
    Ok(members)
}

/// The related-user IDs in one group.
pub fn find_member_ids(conn: &Connection, owner_id: i64, group_index: i32) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare(
        "SELECT related_user_id FROM relationship_group_members
         WHERE owner_id = ? AND group_index = ? ORDER BY related_user_id",
    )?;
    let rows = stmt.query_map(params![owner_id, group_index], |row| row.get(0))?;
    let mut ids = Vec::new();
    for row in rows {
        ids.push(row?);
    }
    Ok(ids)
}

/// Admin listing of member IDs across owners and groups.
pub fn find_member_ids_filtered(
    conn: &Connection,
    owner_ids: Option<&[i64]>,
    group_indexes: Option<&[i32]>,
    page: Option<u32>,
    size: Option<u32>,
) -> Result<Vec<i64>> {
    let mut clauses: Vec<String> = Vec::new();
    if let Some(owner_ids) = owner_ids {
        clauses.push(format!("owner_id IN ({})", sql_id_list(owner_ids)));
    }
    if let Some(indexes) = group_indexes {
        clauses.push(format!("group_index IN ({})", sql_id_list(indexes)));
    }
    let mut sql = String::from("SELECT related_user_id FROM relationship_group_members");
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(" ORDER BY related_user_id");
    if let Some(size) = size {
        sql.push_str(&format!(" LIMIT {size}"));
        if let Some(page) = page {
            sql.push_str(&format!(" OFFSET {}", u64::from(page) * u64::from(size)));
        }
    }
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], |row| row.get(0))?;
    let mut ids = Vec::new();
    for row in rows {
        ids.push(row?);
    }
    Ok(ids)
}

/// The indexes of every group of `owner_id` containing `related_user_id`.
pub fn find_group_indexes(conn: &Connection, owner_id: i64, related_user_id: i64) -> Result<Vec<i32>> {
    let mut stmt = conn.prepare(
        "SELECT group_index FROM relationship_group_members
         WHERE owner_id = ? AND related_user_id = ? ORDER BY group_index",
    )?;
    let rows = stmt.query_map(params![owner_id, related_user_id], |row| row.get(0))?;
    let mut indexes = Vec::new();
    for row in rows {
        indexes.push(row?);
    }
    Ok(indexes)
}

/// Count the group memberships matching the given owners and related users.
pub fn count_groups_containing(
    conn: &Connection,
    owner_ids: Option<&[i64]>,
    related_user_ids: Option<&[i64]>,
) -> Result<u64> {
    let mut clauses: Vec<String> = Vec::new();
    if let Some(owner_ids) = owner_ids {
        clauses.push(format!("owner_id IN ({})", sql_id_list(owner_ids)));
    }
    if let Some(related_user_ids) = related_user_ids {
        clauses.push(format!("related_user_id IN ({})", sql_id_list(related_user_ids)));
    }
    let mut sql = String::from("SELECT COUNT(DISTINCT owner_id || ':' || group_index) FROM relationship_group_members");
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
    Ok(count as u64)
}

/// Count member rows matching the given owners and group indexes.
pub fn count_members(
    conn: &Connection,
    owner_ids: Option<&[i64]>,
    group_indexes: Option<&[i32]>,
) -> Result<u64> {
    let mut clauses: Vec<String> = Vec::new();
    if let Some(owner_ids) = owner_ids {
        clauses.push(format!("owner_id IN ({})", sql_id_list(owner_ids)));
    }
    if let Some(indexes) = group_indexes {
        clauses.push(format!("group_index IN ({})", sql_id_list(indexes)));
    }
    let mut sql = String::from("SELECT COUNT(*) FROM relationship_group_members");
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
    Ok(count as u64)
}

fn build_group_where(filter: &GroupRowFilter) -> (String, Vec<Box<dyn ToSql>>) {
    let mut clauses: Vec<String> = Vec::new();
    let mut values: Vec<Box<dyn ToSql>> = Vec::new();
    if let Some(owner_ids) = &filter.owner_ids {
        clauses.push(format!("owner_id IN ({})", sql_id_list(owner_ids)));
    }
    if let Some(indexes) = &filter.indexes {
        clauses.push(format!("group_index IN ({})", sql_id_list(indexes)));
    }
    if let Some(names) = &filter.names {
        let placeholders = vec!["?"; names.len()].join(",");
        clauses.push(format!("name IN ({placeholders})"));
        for name in names {
            values.push(Box::new(name.clone()));
        }
    }
    if let Some(range) = filter.creation_date_range {
        if let Some(start) = range.start {
            clauses.push("creation_date >= ?".to_string());
            values.push(Box::new(start));
        }
        if let Some(end) = range.end {
            clauses.push("creation_date < ?".to_string());
            values.push(Box::new(end));
        }
    }
    if clauses.is_empty() {
        (String::new(), values)
    } else {
        (format!(" WHERE {}", clauses.join(" AND ")), values)
    }
}

fn group_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RelationshipGroup> {
    Ok(RelationshipGroup {
        owner_id: row.get(0)?,
        group_index: row.get(1)?,
        name: row.get(2)?,
        creation_date: row.get(3)?,
    })
}

fn member_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<GroupMember> {
    Ok(GroupMember {
        owner_id: row.get(0)?,
        group_index: row.get(1)?,
        related_user_id: row.get(2)?,
        join_date: row.get(3)?,
    })
}
