//! The slice of the relationship store the social-graph core touches.
//!
//! Relationships are directed rows: `(owner, related)` with an optional
//! block date. Befriending two users writes both directions and files each
//! user into the other's default relationship group, all inside the caller's
//! transaction — the ACCEPT path depends on that atomicity.

use std::sync::Arc;

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::relationship_group::{RelationshipGroupService, DEFAULT_GROUP_INDEX};
use crate::storage::{self, DeleteSummary, SocialStore};
use crate::time;
use crate::validation;

/// Composite key of a directed relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationshipKey {
    /// The user owning this side of the relationship.
    pub owner_id: i64,
    /// The user the owner relates to.
    pub related_user_id: i64,
}

impl RelationshipKey {
    /// A key for `(owner, related)`.
    pub fn new(owner_id: i64, related_user_id: i64) -> Self {
        Self {
            owner_id,
            related_user_id,
        }
    }
}

/// The relationship service surface this core consumes.
pub struct RelationshipService {
    store: Arc<SocialStore>,
    groups: Arc<RelationshipGroupService>,
}

impl RelationshipService {
    /// Wire the service to the store and the group service.
    pub fn new(store: Arc<SocialStore>, groups: Arc<RelationshipGroupService>) -> Self {
        Self { store, groups }
    }

    /// Whether `owner` has **not** blocked `related`. The request path calls
    /// this before letting a friend request through.
    pub async fn is_not_blocked(&self, owner_id: i64, related_user_id: i64) -> Result<bool> {
        self.store
            .with_conn(|conn| {
                Ok(!storage::relationships::is_blocked(
                    conn,
                    owner_id,
                    related_user_id,
                )?)
            })
            .await
    }

    /// Whether the directed relationship row exists.
    pub async fn has_relationship(&self, owner_id: i64, related_user_id: i64) -> Result<bool> {
        self.store
            .with_conn(|conn| storage::relationships::exists(conn, owner_id, related_user_id))
            .await
    }

    /// Establish or overwrite one directed relationship row. A block date
    /// marks the related user as blocked by the owner.
    pub async fn upsert_one_sided_relationship(
        &self,
        owner_id: i64,
        related_user_id: i64,
        block_date: Option<i64>,
    ) -> Result<()> {
        validation::not_self_relation(owner_id, related_user_id)?;
        let now = time::now_millis();
        self.store
            .with_conn(|conn| {
                storage::relationships::upsert(conn, owner_id, related_user_id, block_date, now)
            })
            .await
    }

    /// Befriend two users in a dedicated transaction. See
    /// [`Self::friend_two_users_in`] for the per-side group indexes.
    pub async fn friend_two_users(
        &self,
        user_one_id: i64,
        user_two_id: i64,
    ) -> Result<(Option<i32>, Option<i32>)> {
        validation::not_self_relation(user_one_id, user_two_id)?;
        self.store
            .in_transaction(|txn| self.friend_two_users_in(txn, user_one_id, user_two_id))
            .await
    }

    /// Befriend two users inside the caller's session: upsert both directed
    /// rows with the block flag cleared, make sure each default group row
    /// exists, and file each user into the other's default group. Returns,
    /// per side, the group index that received the relationship (`None` when
    /// the membership already existed unchanged).
    pub(crate) fn friend_two_users_in(
        &self,
        conn: &Connection,
        user_one_id: i64,
        user_two_id: i64,
    ) -> Result<(Option<i32>, Option<i32>)> {
        let now = time::now_millis();
        let mut indexes = [None, None];
        for (slot, (owner_id, related_user_id)) in [
            (user_one_id, user_two_id),
            (user_two_id, user_one_id),
        ]
        .into_iter()
        .enumerate()
        {
            storage::relationships::upsert_friend(conn, owner_id, related_user_id, now)?;
            storage::groups::insert_group_ignore(conn, owner_id, DEFAULT_GROUP_INDEX, "", now)?;
            let added =
                self.groups
                    .add_related_user_to_group_in(conn, owner_id, DEFAULT_GROUP_INDEX, related_user_id)?;
            indexes[slot] = added.then_some(DEFAULT_GROUP_INDEX);
        }
        Ok((indexes[0], indexes[1]))
    }

    /// Delete one directed relationship and its group memberships.
    pub async fn delete_one_sided_relationship(
        &self,
        owner_id: i64,
        related_user_id: i64,
    ) -> Result<DeleteSummary> {
        self.store
            .with_conn(|conn| self.delete_one_sided_relationship_in(conn, owner_id, related_user_id))
            .await
    }

    /// Session-threaded variant of [`Self::delete_one_sided_relationship`].
    pub(crate) fn delete_one_sided_relationship_in(
        &self,
        conn: &Connection,
        owner_id: i64,
        related_user_id: i64,
    ) -> Result<DeleteSummary> {
        let members = storage::groups::delete_members_from_all_groups(
            conn,
            owner_id,
            &[related_user_id],
        )?;
        let rows = storage::relationships::delete(conn, owner_id, related_user_id)?;
        Ok(members.merge(rows))
    }
}
