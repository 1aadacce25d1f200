//! User-owned relationship groups and their membership.
//!
//! Every user partitions confirmed relationships into labelled groups keyed
//! by `(owner, index)`. Index 0 is the default group: it exists for every
//! user and cannot be deleted. Moves insert into the target group before
//! deleting from the source so a related user is never absent from every
//! group of an owner.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, Weak};

use futures_util::future::try_join_all;
use rand::Rng;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::config::ConfigManager;
use crate::error::{Error, Result};
use crate::proto::{self, RelationshipGroupsWithVersion};
use crate::relationship::{RelationshipKey, RelationshipService};
use crate::storage::{self, DeleteSummary, SocialStore, UpdateSummary};
use crate::time::{self, is_after_or_same};
use crate::validation;
use crate::version::{UserVersionService, VersionStream};

pub use crate::storage::groups::GroupRowFilter;

/// The indestructible default group of every user.
pub const DEFAULT_GROUP_INDEX: i32 = 0;

/// A named bucket of an owner's relationships.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipGroup {
    /// The owning user.
    pub owner_id: i64,
    /// The 31-bit non-negative index naming the group.
    pub group_index: i32,
    /// Display name.
    pub name: String,
    /// Creation date, epoch milliseconds.
    pub creation_date: i64,
}

/// Composite key of a relationship group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupKey {
    /// The owning user.
    pub owner_id: i64,
    /// The group index.
    pub group_index: i32,
}

impl GroupKey {
    /// A key for `(owner, index)`.
    pub fn new(owner_id: i64, group_index: i32) -> Self {
        Self {
            owner_id,
            group_index,
        }
    }
}

/// One related user filed into one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMember {
    /// The owning user.
    pub owner_id: i64,
    /// The group the member is filed under.
    pub group_index: i32,
    /// The related user.
    pub related_user_id: i64,
    /// When the member joined this group, epoch milliseconds.
    pub join_date: i64,
}

/// The relationship-group service.
///
/// Holds a late-bound reference to the relationship service: the two
/// services depend on each other, so the provider is bound after
/// construction and resolved on first use.
pub struct RelationshipGroupService {
    store: Arc<SocialStore>,
    versions: Arc<UserVersionService>,
    config: Arc<ConfigManager>,
    relationships: OnceLock<Weak<RelationshipService>>,
}

impl RelationshipGroupService {
    /// Wire the service to the store, version registry, and configuration.
    pub fn new(
        store: Arc<SocialStore>,
        versions: Arc<UserVersionService>,
        config: Arc<ConfigManager>,
    ) -> Self {
        Self {
            store,
            versions,
            config,
            relationships: OnceLock::new(),
        }
    }

    /// Late-bind the relationship service (resolves the construction cycle
    /// between the two services). Only the first bind takes effect.
    pub fn bind_relationship_service(&self, service: &Arc<RelationshipService>) {
        let _ = self.relationships.set(Arc::downgrade(service));
    }

    fn relationship_service(&self) -> Option<Arc<RelationshipService>> {
        self.relationships.get().and_then(Weak::upgrade)
    }

    /// Create a group. Without an index, a random positive 31-bit index is
    /// drawn and redrawn until it does not collide.
    pub async fn create_group(
        &self,
        owner_id: i64,
        group_index: Option<i32>,
        name: &str,
        creation_date: Option<i64>,
    ) -> Result<RelationshipGroup> {
        let now = time::now_millis();
        validation::past_or_present(creation_date, "creation_date", now)?;
        let creation_date = creation_date.unwrap_or(now);
        if let Some(index) = group_index {
            validation::valid_group_index(index)?;
            let group = RelationshipGroup {
                owner_id,
                group_index: index,
                name: name.to_string(),
                creation_date,
            };
            self.store
                .with_conn(|conn| storage::groups::insert_group(conn, &group))
                .await?;
            return Ok(group);
        }
        loop {
            let group = RelationshipGroup {
                owner_id,
                group_index: random_group_index(),
                name: name.to_string(),
                creation_date,
            };
            match self
                .store
                .with_conn(|conn| storage::groups::insert_group(conn, &group))
                .await
            {
                Ok(()) => return Ok(group),
                Err(Error::DuplicateKey(_)) => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Session-threaded group creation. A constraint violation cannot be
    /// retried once a transaction has seen it, so a missing index gets a
    /// single random draw here and a collision is fatal.
    pub fn create_group_in(
        &self,
        conn: &Connection,
        owner_id: i64,
        group_index: Option<i32>,
        name: &str,
        creation_date: Option<i64>,
    ) -> Result<RelationshipGroup> {
        let now = time::now_millis();
        validation::past_or_present(creation_date, "creation_date", now)?;
        if let Some(index) = group_index {
            validation::valid_group_index(index)?;
        }
        let group = RelationshipGroup {
            owner_id,
            group_index: group_index.unwrap_or_else(random_group_index),
            name: name.to_string(),
            creation_date: creation_date.unwrap_or(now),
        };
        storage::groups::insert_group(conn, &group)?;
        Ok(group)
    }

    /// Make sure the owner's default group row exists.
    pub async fn create_default_group(&self, owner_id: i64) -> Result<()> {
        let now = time::now_millis();
        self.store
            .with_conn(|conn| {
                storage::groups::insert_group_ignore(conn, owner_id, DEFAULT_GROUP_INDEX, "", now)?;
                Ok(())
            })
            .await
    }

    /// All groups of one owner.
    pub async fn query_groups(&self, owner_id: i64) -> Result<Vec<RelationshipGroup>> {
        self.store
            .with_conn(|conn| storage::groups::find_groups_by_owner(conn, owner_id))
            .await
    }

    /// Incremental-sync read of an owner's groups. Fails with
    /// `ALREADY_UP_TO_DATE` when the client's `last_updated_date` is at or
    /// past the server version (or no version row exists yet).
    pub async fn query_groups_with_version(
        &self,
        owner_id: i64,
        last_updated_date: Option<i64>,
    ) -> Result<RelationshipGroupsWithVersion> {
        let version = self
            .versions
            .query_version(owner_id, VersionStream::RelationshipGroups)
            .await?
            .ok_or(Error::AlreadyUpToDate)?;
        if is_after_or_same(last_updated_date, version) {
            return Err(Error::AlreadyUpToDate);
        }
        let groups = self.query_groups(owner_id).await?;
        Ok(RelationshipGroupsWithVersion {
            last_updated_date: version,
            groups: groups.iter().map(proto::relationship_group_to_dto).collect(),
        })
    }

    /// The indexes of every group of `owner` containing `related`.
    pub async fn query_group_indexes(&self, owner_id: i64, related_user_id: i64) -> Result<Vec<i32>> {
        self.store
            .with_conn(|conn| storage::groups::find_group_indexes(conn, owner_id, related_user_id))
            .await
    }

    /// The member IDs of one group.
    pub async fn query_group_member_ids(&self, owner_id: i64, group_index: i32) -> Result<Vec<i64>> {
        self.store
            .with_conn(|conn| storage::groups::find_member_ids(conn, owner_id, group_index))
            .await
    }

    /// Admin listing of member IDs across owners and groups.
    pub async fn query_group_member_ids_filtered(
        &self,
        owner_ids: Option<Vec<i64>>,
        group_indexes: Option<Vec<i32>>,
        page: Option<u32>,
        size: Option<u32>,
    ) -> Result<Vec<i64>> {
        self.store
            .with_conn(|conn| {
                storage::groups::find_member_ids_filtered(
                    conn,
                    owner_ids.as_deref(),
                    group_indexes.as_deref(),
                    page,
                    size,
                )
            })
            .await
    }

    /// Rename one group and bump the owner's groups version.
    pub async fn update_group_name(
        &self,
        owner_id: i64,
        group_index: i32,
        name: &str,
    ) -> Result<UpdateSummary> {
        validation::valid_group_index(group_index)?;
        self.store
            .with_conn(|conn| {
                let summary = storage::groups::update_group_name(conn, owner_id, group_index, name)?;
                self.versions.touch_best_effort(
                    conn,
                    owner_id,
                    VersionStream::RelationshipGroups,
                    "updating a relationship group name",
                );
                Ok(summary)
            })
            .await
    }

    /// Batched admin update of group rows. An empty field set acknowledges
    /// without touching the store.
    pub async fn update_groups(
        &self,
        keys: &[GroupKey],
        name: Option<&str>,
        creation_date: Option<i64>,
    ) -> Result<UpdateSummary> {
        validation::not_empty(keys, "keys")?;
        for key in keys {
            validation::valid_group_index(key.group_index)?;
        }
        validation::past_or_present(creation_date, "creation_date", time::now_millis())?;
        if name.is_none() && creation_date.is_none() {
            return Ok(UpdateSummary::acknowledged());
        }
        self.store
            .with_conn(|conn| storage::groups::update_groups(conn, keys, name, creation_date))
            .await
    }

    /// File `related` under the owner's groups per the upsert table: add to
    /// `new_index`, move between indexes, or move back to the default group
    /// when only `delete_index` is given. Emits the index that received the
    /// relationship, or `None` when nothing changed.
    pub async fn upsert_group_member(
        &self,
        owner_id: i64,
        related_user_id: i64,
        new_index: Option<i32>,
        delete_index: Option<i32>,
    ) -> Result<Option<i32>> {
        self.store
            .with_conn(|conn| {
                self.upsert_group_member_in(conn, owner_id, related_user_id, new_index, delete_index)
            })
            .await
    }

    /// Session-threaded variant of [`Self::upsert_group_member`].
    pub fn upsert_group_member_in(
        &self,
        conn: &Connection,
        owner_id: i64,
        related_user_id: i64,
        new_index: Option<i32>,
        delete_index: Option<i32>,
    ) -> Result<Option<i32>> {
        match (new_index, delete_index) {
            (Some(new), Some(delete)) if new == delete => Ok(None),
            (Some(new), Some(delete)) => {
                self.move_related_user_to_group_in(conn, owner_id, related_user_id, delete, new, false)?;
                Ok(Some(new))
            }
            (Some(new), None) => {
                let added = self.add_related_user_to_group_in(conn, owner_id, new, related_user_id)?;
                Ok(added.then_some(new))
            }
            (None, Some(delete)) if delete == DEFAULT_GROUP_INDEX => Ok(None),
            (None, Some(delete)) => {
                if self.should_delete_relationship(conn, owner_id, related_user_id, delete)? {
                    if let Some(relationships) = self.relationship_service() {
                        relationships.delete_one_sided_relationship_in(conn, owner_id, related_user_id)?;
                        self.versions.touch_best_effort(
                            conn,
                            owner_id,
                            VersionStream::RelationshipGroups,
                            "deleting a relationship removed from its last group",
                        );
                        return Ok(None);
                    }
                    warn!(
                        owner = owner_id,
                        "the relationship service is unbound; moving the related user to the default group instead"
                    );
                }
                storage::groups::insert_group_ignore(
                    conn,
                    owner_id,
                    DEFAULT_GROUP_INDEX,
                    "",
                    time::now_millis(),
                )?;
                self.move_related_user_to_group_in(
                    conn,
                    owner_id,
                    related_user_id,
                    delete,
                    DEFAULT_GROUP_INDEX,
                    true,
                )?;
                Ok(Some(DEFAULT_GROUP_INDEX))
            }
            (None, None) => Ok(None),
        }
    }

    fn should_delete_relationship(
        &self,
        conn: &Connection,
        owner_id: i64,
        related_user_id: i64,
        delete_index: i32,
    ) -> Result<bool> {
        if !self
            .config
            .load()
            .relationship_group
            .delete_relationship_when_removed_from_all_groups
        {
            return Ok(false);
        }
        let indexes = storage::groups::find_group_indexes(conn, owner_id, related_user_id)?;
        Ok(!indexes
            .iter()
            .any(|&index| index != delete_index && index != DEFAULT_GROUP_INDEX))
    }

    /// Upsert `related` into one group. Returns whether the membership was
    /// inserted or rewritten (the caller skips the version bump otherwise).
    pub(crate) fn add_related_user_to_group_in(
        &self,
        conn: &Connection,
        owner_id: i64,
        group_index: i32,
        related_user_id: i64,
    ) -> Result<bool> {
        validation::valid_group_index(group_index)?;
        let outcome = storage::groups::upsert_member(
            conn,
            owner_id,
            group_index,
            related_user_id,
            time::now_millis(),
        )?;
        if !outcome.changed() {
            return Ok(false);
        }
        self.versions.touch_best_effort(
            conn,
            owner_id,
            VersionStream::RelationshipGroups,
            "adding a related user to a group",
        );
        Ok(true)
    }

    /// Move `related` from one group to another and bump the owner's groups
    /// version. With `suppress_duplicate`, an existing membership in the
    /// target group is tolerated, which makes the move idempotent.
    pub async fn move_related_user_to_group(
        &self,
        owner_id: i64,
        related_user_id: i64,
        current_index: i32,
        target_index: i32,
        suppress_duplicate: bool,
    ) -> Result<()> {
        self.store
            .with_conn(|conn| {
                self.move_related_user_to_group_in(
                    conn,
                    owner_id,
                    related_user_id,
                    current_index,
                    target_index,
                    suppress_duplicate,
                )
            })
            .await
    }

    /// Session-threaded variant of [`Self::move_related_user_to_group`].
    pub fn move_related_user_to_group_in(
        &self,
        conn: &Connection,
        owner_id: i64,
        related_user_id: i64,
        current_index: i32,
        target_index: i32,
        suppress_duplicate: bool,
    ) -> Result<()> {
        validation::valid_group_index(current_index)?;
        validation::valid_group_index(target_index)?;
        if current_index == target_index {
            return Ok(());
        }
        // Insert before delete: a concurrent reader must never find the
        // related user absent from every group.
        let member = GroupMember {
            owner_id,
            group_index: target_index,
            related_user_id,
            join_date: time::now_millis(),
        };
        match storage::groups::insert_member(conn, &member) {
            Ok(()) => {}
            Err(Error::DuplicateKey(_)) if suppress_duplicate => {}
            Err(e) => return Err(e),
        }
        storage::groups::delete_member(conn, owner_id, current_index, related_user_id)?;
        self.versions.touch_best_effort(
            conn,
            owner_id,
            VersionStream::RelationshipGroups,
            "moving a related user to a new group",
        );
        Ok(())
    }

    /// Delete a non-default group and refile its members into `new_index`.
    ///
    /// Deliberately not transactional: every step is idempotent, so rerunning
    /// after a partial failure converges.
    pub async fn delete_group_and_move_members(
        &self,
        owner_id: i64,
        delete_index: i32,
        new_index: i32,
    ) -> Result<()> {
        validation::valid_group_index(delete_index)?;
        validation::valid_group_index(new_index)?;
        if delete_index == DEFAULT_GROUP_INDEX {
            return Err(Error::IllegalArgument(
                "the default relationship group cannot be deleted".to_string(),
            ));
        }
        if delete_index == new_index {
            return Ok(());
        }
        self.store
            .with_conn(|conn| {
                let members = storage::groups::find_members_of_group(conn, owner_id, delete_index)?;
                if !members.is_empty() {
                    let now = time::now_millis();
                    let mirrored: Vec<GroupMember> = members
                        .iter()
                        .map(|member| GroupMember {
                            owner_id: member.owner_id,
                            group_index: new_index,
                            related_user_id: member.related_user_id,
                            join_date: now,
                        })
                        .collect();
                    storage::groups::insert_members_ignore_duplicates(conn, &mirrored)?;
                }
                storage::groups::delete_members_of_group(conn, owner_id, delete_index)?;
                storage::groups::delete_group(conn, owner_id, delete_index)?;
                self.versions.touch_best_effort(
                    conn,
                    owner_id,
                    VersionStream::RelationshipGroups,
                    "deleting a group and moving its members",
                );
                Ok(())
            })
            .await
    }

    /// Remove one related user from one group; bumps the owner's membership
    /// version only when a row was deleted.
    pub async fn delete_related_user_from_group(
        &self,
        owner_id: i64,
        related_user_id: i64,
        group_index: i32,
        update_version: bool,
    ) -> Result<DeleteSummary> {
        self.store
            .with_conn(|conn| {
                let summary =
                    storage::groups::delete_member(conn, owner_id, group_index, related_user_id)?;
                if update_version && summary.deleted > 0 {
                    self.versions.touch_best_effort(
                        conn,
                        owner_id,
                        VersionStream::RelationshipGroupMembers,
                        "deleting a related user from a group",
                    );
                }
                Ok(summary)
            })
            .await
    }

    /// Remove one related user from every group of the owner.
    pub async fn delete_related_user_from_all_groups(
        &self,
        owner_id: i64,
        related_user_id: i64,
        update_version: bool,
    ) -> Result<DeleteSummary> {
        self.delete_related_users_from_all_groups(
            &[RelationshipKey::new(owner_id, related_user_id)],
            update_version,
        )
        .await
    }

    /// Remove the given `(owner, related)` pairs from every group of their
    /// owners. Dispatches on size: one store call for a single owner,
    /// a concurrent fan-out with merged outcomes across many owners.
    pub async fn delete_related_users_from_all_groups(
        &self,
        keys: &[RelationshipKey],
        update_version: bool,
    ) -> Result<DeleteSummary> {
        validation::not_empty(keys, "keys")?;
        let summary = if let [key] = keys {
            // fast path
            self.delete_for_owner(key.owner_id, vec![key.related_user_id])
                .await?
        } else {
            let mut owner_to_related: HashMap<i64, Vec<i64>> = HashMap::new();
            for key in keys {
                owner_to_related
                    .entry(key.owner_id)
                    .or_default()
                    .push(key.related_user_id);
            }
            if owner_to_related.len() == 1 {
                match owner_to_related.into_iter().next() {
                    Some((owner_id, related)) => self.delete_for_owner(owner_id, related).await?,
                    None => DeleteSummary::default(),
                }
            } else {
                let deletes: Vec<_> = owner_to_related
                    .into_iter()
                    .map(|(owner_id, related)| self.delete_for_owner(owner_id, related))
                    .collect();
                try_join_all(deletes)
                    .await?
                    .into_iter()
                    .fold(DeleteSummary::default(), DeleteSummary::merge)
            }
        };
        if update_version {
            let mut owners: Vec<i64> = keys.iter().map(|key| key.owner_id).collect();
            owners.sort_unstable();
            owners.dedup();
            if let Err(e) = self
                .versions
                .update_versions(&owners, VersionStream::RelationshipGroups)
                .await
            {
                error!(
                    owners = ?owners,
                    error = %e,
                    "caught an error while updating the relationship groups version of the owners after deleting users from all groups",
                );
            }
        }
        Ok(summary)
    }

    /// Session-threaded variant of
    /// [`Self::delete_related_users_from_all_groups`] (serial, no version
    /// side-effects).
    pub fn delete_related_users_from_all_groups_in(
        &self,
        conn: &Connection,
        keys: &[RelationshipKey],
    ) -> Result<DeleteSummary> {
        let mut owner_to_related: HashMap<i64, Vec<i64>> = HashMap::new();
        for key in keys {
            owner_to_related
                .entry(key.owner_id)
                .or_default()
                .push(key.related_user_id);
        }
        let mut summary = DeleteSummary::default();
        for (owner_id, related) in owner_to_related {
            summary = summary.merge(storage::groups::delete_members_from_all_groups(
                conn, owner_id, &related,
            )?);
        }
        Ok(summary)
    }

    async fn delete_for_owner(&self, owner_id: i64, related: Vec<i64>) -> Result<DeleteSummary> {
        self.store
            .with_conn(move |conn| {
                storage::groups::delete_members_from_all_groups(conn, owner_id, &related)
            })
            .await
    }

    /// Admin delete of group rows by composite key.
    pub async fn delete_groups(&self, keys: &[GroupKey]) -> Result<DeleteSummary> {
        validation::not_empty(keys, "keys")?;
        self.store
            .with_conn(|conn| storage::groups::delete_groups_by_keys(conn, keys))
            .await
    }

    /// Delete every group row of the given owners.
    pub async fn delete_all_groups_of_owners(
        &self,
        owner_ids: &[i64],
        update_version: bool,
    ) -> Result<DeleteSummary> {
        validation::not_empty(owner_ids, "owner_ids")?;
        self.store
            .with_conn(|conn| {
                let summary = storage::groups::delete_groups_by_owners(conn, owner_ids)?;
                if update_version {
                    self.versions.touch_many_best_effort(
                        conn,
                        owner_ids,
                        VersionStream::RelationshipGroups,
                        "deleting all groups of the owners",
                    );
                }
                Ok(summary)
            })
            .await
    }

    /// Admin listing of groups.
    pub async fn query_filtered_groups(&self, filter: &GroupRowFilter) -> Result<Vec<RelationshipGroup>> {
        self.store
            .with_conn(|conn| storage::groups::find_filtered_groups(conn, filter))
            .await
    }

    /// Admin count of groups.
    pub async fn count_groups(&self, filter: &GroupRowFilter) -> Result<u64> {
        self.store
            .with_conn(|conn| storage::groups::count_filtered_groups(conn, filter))
            .await
    }

    /// Count the distinct group memberships matching owners and related
    /// users.
    pub async fn count_groups_containing(
        &self,
        owner_ids: Option<Vec<i64>>,
        related_user_ids: Option<Vec<i64>>,
    ) -> Result<u64> {
        self.store
            .with_conn(|conn| {
                storage::groups::count_groups_containing(
                    conn,
                    owner_ids.as_deref(),
                    related_user_ids.as_deref(),
                )
            })
            .await
    }

    /// Count member rows matching owners and group indexes.
    pub async fn count_members(
        &self,
        owner_ids: Option<Vec<i64>>,
        group_indexes: Option<Vec<i32>>,
    ) -> Result<u64> {
        self.store
            .with_conn(|conn| {
                storage::groups::count_members(conn, owner_ids.as_deref(), group_indexes.as_deref())
            })
            .await
    }
}

fn random_group_index() -> i32 {
    rand::thread_rng().gen_range(1..=i32::MAX)
}
