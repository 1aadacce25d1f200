//! Per-user version registry for incremental sync.
//!
//! Each user carries one last-updated timestamp per stream. Writers advance
//! the timestamp after a successful mutation; readers compare a
//! client-supplied `last_updated_date` against it and short-circuit with
//! `ALREADY_UP_TO_DATE` when the client is current. Version rows are a
//! cache, not authoritative state: a failed advance is logged and swallowed,
//! never propagated to the mutation that triggered it.

use std::sync::Arc;

use rusqlite::Connection;
use tracing::error;

use crate::error::Result;
use crate::storage::{self, SocialStore};
use crate::time;

/// The four per-user timestamp streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VersionStream {
    /// Friend requests the user sent.
    SentFriendRequests,
    /// Friend requests the user received.
    ReceivedFriendRequests,
    /// The user's relationship groups.
    RelationshipGroups,
    /// Membership of the user's relationship groups.
    RelationshipGroupMembers,
}

impl VersionStream {
    /// Stable store representation.
    pub(crate) fn as_store_str(self) -> &'static str {
        match self {
            VersionStream::SentFriendRequests => "sent_friend_requests",
            VersionStream::ReceivedFriendRequests => "received_friend_requests",
            VersionStream::RelationshipGroups => "relationship_groups",
            VersionStream::RelationshipGroupMembers => "relationship_group_members",
        }
    }
}

impl std::fmt::Display for VersionStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_store_str())
    }
}

/// The version registry service.
pub struct UserVersionService {
    store: Arc<SocialStore>,
}

impl UserVersionService {
    /// Wrap the store handle.
    pub fn new(store: Arc<SocialStore>) -> Self {
        Self { store }
    }

    /// The current timestamp of `(owner, stream)`, or `None` when no writer
    /// ever advanced it.
    pub async fn query_version(&self, owner_id: i64, stream: VersionStream) -> Result<Option<i64>> {
        self.store
            .with_conn(|conn| storage::versions::last_updated(conn, owner_id, stream))
            .await
    }

    /// Advance `(owner, stream)` to now; returns the written timestamp.
    pub async fn update_version(&self, owner_id: i64, stream: VersionStream) -> Result<i64> {
        let now = time::now_millis();
        self.store
            .with_conn(|conn| storage::versions::touch(conn, owner_id, stream, now))
            .await?;
        Ok(now)
    }

    /// Advance `(owner, stream)` for every owner; returns the written
    /// timestamp.
    pub async fn update_versions(&self, owner_ids: &[i64], stream: VersionStream) -> Result<i64> {
        let now = time::now_millis();
        self.store
            .with_conn(|conn| storage::versions::touch_many(conn, owner_ids, stream, now))
            .await?;
        Ok(now)
    }

    /// Best-effort advance inside a caller-held connection or session.
    /// Failure is logged with the operation that triggered the bump and
    /// swallowed.
    pub(crate) fn touch_best_effort(
        &self,
        conn: &Connection,
        owner_id: i64,
        stream: VersionStream,
        context: &'static str,
    ) {
        if let Err(e) = storage::versions::touch(conn, owner_id, stream, time::now_millis()) {
            error!(
                owner = owner_id,
                stream = %stream,
                error = %e,
                "caught an error while updating the {stream} version of the user after {context}",
            );
        }
    }

    /// Best-effort multi-owner advance; logged and swallowed on failure.
    pub(crate) fn touch_many_best_effort(
        &self,
        conn: &Connection,
        owner_ids: &[i64],
        stream: VersionStream,
        context: &'static str,
    ) {
        if let Err(e) = storage::versions::touch_many(conn, owner_ids, stream, time::now_millis()) {
            error!(
                owners = ?owner_ids,
                stream = %stream,
                error = %e,
                "caught an error while updating the {stream} version of the users after {context}",
            );
        }
    }
}
