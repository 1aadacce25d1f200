//! End-to-end scenarios for the social-graph core: request lifecycle,
//! incremental sync, group membership, and the policies that bind them.

use roster_core::config::RosterConfig;
use roster_core::friend_request::{
    FriendRequestFilter, NewRequest, RequestStatus, RequestUpdate, ResponseAction,
};
use roster_core::relationship::RelationshipKey;
use roster_core::relationship_group::GroupKey;
use roster_core::storage::{self, StoreConfig};
use roster_core::time::{now_millis, DateRange};
use roster_core::version::VersionStream;
use roster_core::{Error, SocialGraph, DEFAULT_GROUP_INDEX};

fn open_graph(config: RosterConfig) -> SocialGraph {
    SocialGraph::open(&StoreConfig::in_memory(), config).expect("open graph")
}

fn default_graph() -> SocialGraph {
    open_graph(RosterConfig::default())
}

fn permissive_config() -> RosterConfig {
    let mut config = RosterConfig::default();
    config.friend_request.allow_recall_pending_friend_request_by_sender = true;
    config
}

#[tokio::test]
async fn test_create_then_query_round_trip() {
    let graph = default_graph();
    let created = graph
        .friend_requests
        .auth_and_create_request(7, 8, Some("hello there".to_string()), now_millis())
        .await
        .expect("create request");
    assert_eq!(created.status, RequestStatus::Pending);

    let received = graph
        .friend_requests
        .query_requests_with_version(8, false, None)
        .await
        .expect("query received");
    assert_eq!(received.requests.len(), 1);
    let dto = &received.requests[0];
    assert_eq!(dto.id, created.id);
    assert_eq!(dto.content, "hello there");
    assert_eq!(dto.status, RequestStatus::Pending);
    assert_eq!(dto.requester_id, 7);
    assert_eq!(dto.recipient_id, 8);

    let sent = graph
        .friend_requests
        .query_requests_with_version(7, true, None)
        .await
        .expect("query sent");
    assert_eq!(sent.requests.len(), 1);
}

#[tokio::test]
async fn test_null_content_normalises_to_empty_string() {
    let graph = default_graph();
    let created = graph
        .friend_requests
        .auth_and_create_request(1, 2, None, now_millis())
        .await
        .expect("create request");
    assert_eq!(created.content, "");
}

#[tokio::test]
async fn test_recall_accept_race_has_exactly_one_winner() {
    let graph = open_graph(permissive_config());
    graph
        .friend_requests
        .create_request(NewRequest {
            id: Some(1000),
            requester_id: 7,
            recipient_id: 8,
            ..NewRequest::default()
        })
        .await
        .expect("create request");

    let recaller = graph.friend_requests.clone();
    let handler = graph.friend_requests.clone();
    let recall = tokio::spawn(async move { recaller.auth_and_recall_request(7, 1000).await });
    let accept = tokio::spawn(async move {
        handler
            .auth_and_handle_request(1000, 8, ResponseAction::Accept, None)
            .await
    });

    let recall_result = recall.await.expect("recall task");
    let accept_result = accept.await.expect("accept task");

    match (recall_result, accept_result) {
        (Ok(_), Err(Error::UpdateNonPendingRequest(_))) => {
            let stored = graph
                .store
                .with_conn(|conn| storage::requests::find_by_id(conn, 1000))
                .await
                .expect("read row")
                .expect("row exists");
            assert_eq!(stored.status, RequestStatus::Canceled);
        }
        (Err(Error::RecallNonPendingRequest(_)), Ok(result)) => {
            assert_eq!(result.request.id, 1000);
            let stored = graph
                .store
                .with_conn(|conn| storage::requests::find_by_id(conn, 1000))
                .await
                .expect("read row")
                .expect("row exists");
            assert_eq!(stored.status, RequestStatus::Accepted);
        }
        (recall, accept) => panic!("exactly one side must win, got {recall:?} / {accept:?}"),
    }
}

#[tokio::test]
async fn test_projected_expiry_leaves_the_store_untouched() {
    let mut config = RosterConfig::default();
    config.friend_request.expire_after_seconds = 3_600;
    let graph = open_graph(config);

    let creation_date = now_millis() - 4_000_000;
    let created = graph
        .friend_requests
        .create_request(NewRequest {
            requester_id: 7,
            recipient_id: 8,
            creation_date: Some(creation_date),
            ..NewRequest::default()
        })
        .await
        .expect("create request");

    let received = graph
        .friend_requests
        .query_requests_with_version(8, false, None)
        .await
        .expect("query received");
    let dto = &received.requests[0];
    assert_eq!(dto.status, RequestStatus::Expired);
    assert_eq!(dto.response_date, Some(creation_date + 3_600_000));

    // A direct store read still sees PENDING.
    let stored = graph
        .store
        .with_conn(move |conn| storage::requests::find_by_id(conn, created.id))
        .await
        .expect("read row")
        .expect("row exists");
    assert_eq!(stored.status, RequestStatus::Pending);
    assert_eq!(stored.response_date, None);
}

#[tokio::test]
async fn test_expired_request_cannot_be_recalled_or_handled() {
    let mut config = permissive_config();
    config.friend_request.expire_after_seconds = 3_600;
    let graph = open_graph(config);

    graph
        .friend_requests
        .create_request(NewRequest {
            id: Some(5),
            requester_id: 1,
            recipient_id: 2,
            creation_date: Some(now_millis() - 4_000_000),
            ..NewRequest::default()
        })
        .await
        .expect("create request");

    match graph.friend_requests.auth_and_recall_request(1, 5).await {
        Err(Error::RecallNonPendingRequest(Some(RequestStatus::Expired))) => {}
        other => panic!("expected projected-expired recall failure, got {other:?}"),
    }
    match graph
        .friend_requests
        .auth_and_handle_request(5, 2, ResponseAction::Accept, None)
        .await
    {
        Err(Error::UpdateNonPendingRequest(Some(RequestStatus::Expired))) => {}
        other => panic!("expected projected-expired handle failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_resend_policy_follows_the_flag() {
    let graph = default_graph();
    let created = graph
        .friend_requests
        .auth_and_create_request(1, 2, None, now_millis())
        .await
        .expect("create request");
    graph
        .friend_requests
        .auth_and_handle_request(created.id, 2, ResponseAction::Decline, Some("not now".to_string()))
        .await
        .expect("decline");

    // Strict policy: the declined request still prohibits a new one.
    match graph
        .friend_requests
        .auth_and_create_request(1, 2, None, now_millis())
        .await
    {
        Err(Error::CreateExistingFriendRequest) => {}
        other => panic!("expected CREATE_EXISTING failure, got {other:?}"),
    }

    let mut config = RosterConfig::default();
    config.friend_request.allow_send_request_after_declined_or_ignored_or_expired = true;
    graph.config.store(config);

    graph
        .friend_requests
        .auth_and_create_request(1, 2, None, now_millis())
        .await
        .expect("resend after flag flip");
}

#[tokio::test]
async fn test_pending_request_always_prohibits_resend() {
    let mut config = RosterConfig::default();
    config.friend_request.allow_send_request_after_declined_or_ignored_or_expired = true;
    let graph = open_graph(config);

    graph
        .friend_requests
        .auth_and_create_request(1, 2, None, now_millis())
        .await
        .expect("create request");
    match graph
        .friend_requests
        .auth_and_create_request(1, 2, None, now_millis())
        .await
    {
        Err(Error::CreateExistingFriendRequest) => {}
        other => panic!("expected CREATE_EXISTING failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_blocked_requester_cannot_send() {
    let graph = default_graph();
    // Recipient 2 blocks requester 1.
    graph
        .relationships
        .upsert_one_sided_relationship(2, 1, Some(now_millis()))
        .await
        .expect("block");

    match graph
        .friend_requests
        .auth_and_create_request(1, 2, None, now_millis())
        .await
    {
        Err(Error::BlockedUserToSendFriendRequest) => {}
        other => panic!("expected blocked-user failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_recall_disabled_by_default() {
    let graph = default_graph();
    match graph.friend_requests.auth_and_recall_request(1, 99).await {
        Err(Error::RecallingFriendRequestDisabled) => {}
        other => panic!("expected recalling-disabled failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_party_checks_do_not_leak_existence() {
    let graph = open_graph(permissive_config());
    graph
        .friend_requests
        .create_request(NewRequest {
            id: Some(50),
            requester_id: 1,
            recipient_id: 2,
            ..NewRequest::default()
        })
        .await
        .expect("create request");

    // Missing request vs. foreign request: identical codes.
    let missing = graph
        .friend_requests
        .auth_and_recall_request(1, 777)
        .await
        .expect_err("missing request");
    let foreign = graph
        .friend_requests
        .auth_and_recall_request(3, 50)
        .await
        .expect_err("foreign request");
    assert_eq!(missing.code(), foreign.code());
    assert_eq!(missing.to_string(), foreign.to_string());

    let missing = graph
        .friend_requests
        .auth_and_handle_request(777, 2, ResponseAction::Decline, None)
        .await
        .expect_err("missing request");
    let foreign = graph
        .friend_requests
        .auth_and_handle_request(50, 3, ResponseAction::Decline, None)
        .await
        .expect_err("foreign request");
    assert_eq!(missing.code(), foreign.code());
    assert_eq!(missing.to_string(), foreign.to_string());
}

#[tokio::test]
async fn test_accept_befriends_both_sides_atomically() {
    let graph = default_graph();
    let created = graph
        .friend_requests
        .auth_and_create_request(7, 8, None, now_millis())
        .await
        .expect("create request");

    let result = graph
        .friend_requests
        .auth_and_handle_request(created.id, 8, ResponseAction::Accept, None)
        .await
        .expect("accept");
    assert_eq!(result.requester_group_index, Some(DEFAULT_GROUP_INDEX));
    assert_eq!(result.recipient_group_index, Some(DEFAULT_GROUP_INDEX));

    assert!(graph.relationships.has_relationship(7, 8).await.expect("query"));
    assert!(graph.relationships.has_relationship(8, 7).await.expect("query"));
    assert_eq!(
        graph
            .relationship_groups
            .query_group_member_ids(7, DEFAULT_GROUP_INDEX)
            .await
            .expect("members"),
        vec![8]
    );
    assert_eq!(
        graph
            .relationship_groups
            .query_group_member_ids(8, DEFAULT_GROUP_INDEX)
            .await
            .expect("members"),
        vec![7]
    );

    // The transition happened exactly once.
    match graph
        .friend_requests
        .auth_and_handle_request(created.id, 8, ResponseAction::Accept, None)
        .await
    {
        Err(Error::UpdateNonPendingRequest(Some(RequestStatus::Accepted))) => {}
        other => panic!("expected non-pending failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_decline_does_not_touch_relationships() {
    let graph = default_graph();
    let created = graph
        .friend_requests
        .auth_and_create_request(7, 8, None, now_millis())
        .await
        .expect("create request");
    let result = graph
        .friend_requests
        .auth_and_handle_request(created.id, 8, ResponseAction::Ignore, None)
        .await
        .expect("ignore");
    assert_eq!(result.requester_group_index, None);
    assert_eq!(result.recipient_group_index, None);
    assert!(!graph.relationships.has_relationship(7, 8).await.expect("query"));

    let stored = graph
        .store
        .with_conn(move |conn| storage::requests::find_by_id(conn, created.id))
        .await
        .expect("read row")
        .expect("row exists");
    assert_eq!(stored.status, RequestStatus::Ignored);
    assert!(stored.response_date.is_some());
}

#[tokio::test]
async fn test_version_gate_and_no_content() {
    let graph = default_graph();

    // No version row yet: the client is trivially current.
    match graph.friend_requests.query_requests_with_version(8, false, None).await {
        Err(Error::AlreadyUpToDate) => {}
        other => panic!("expected already-up-to-date, got {other:?}"),
    }

    let created = graph
        .friend_requests
        .auth_and_create_request(7, 8, None, now_millis())
        .await
        .expect("create request");

    let first = graph
        .friend_requests
        .query_requests_with_version(8, false, None)
        .await
        .expect("first query");

    // A client at the server version is told so.
    match graph
        .friend_requests
        .query_requests_with_version(8, false, Some(first.last_updated_date))
        .await
    {
        Err(Error::AlreadyUpToDate) => {}
        other => panic!("expected already-up-to-date, got {other:?}"),
    }

    // Admin deletes leave the version untouched, so a stale client sees an
    // empty stream rather than a short-circuit.
    graph
        .friend_requests
        .delete_requests(&[created.id])
        .await
        .expect("delete");
    match graph.friend_requests.query_requests_with_version(8, false, None).await {
        Err(Error::NoContent) => {}
        other => panic!("expected no-content, got {other:?}"),
    }
}

#[tokio::test]
async fn test_request_versions_advance_monotonically() {
    let graph = default_graph();
    let created = graph
        .friend_requests
        .auth_and_create_request(7, 8, None, now_millis())
        .await
        .expect("create request");

    let after_create = graph
        .versions
        .query_version(8, VersionStream::ReceivedFriendRequests)
        .await
        .expect("query version")
        .expect("version present");

    graph
        .friend_requests
        .auth_and_handle_request(created.id, 8, ResponseAction::Decline, None)
        .await
        .expect("decline");

    let after_decline = graph
        .versions
        .query_version(8, VersionStream::ReceivedFriendRequests)
        .await
        .expect("query version")
        .expect("version present");
    assert!(after_decline >= after_create);
}

#[tokio::test]
async fn test_group_move_is_idempotent() {
    let graph = default_graph();
    graph
        .relationship_groups
        .create_group(1, Some(3), "close", None)
        .await
        .expect("create group 3");
    graph
        .relationship_groups
        .create_group(1, Some(4), "closer", None)
        .await
        .expect("create group 4");
    graph
        .relationship_groups
        .upsert_group_member(1, 2, Some(3), None)
        .await
        .expect("add member");

    graph
        .relationship_groups
        .move_related_user_to_group(1, 2, 3, 4, true)
        .await
        .expect("first move");
    graph
        .relationship_groups
        .move_related_user_to_group(1, 2, 3, 4, true)
        .await
        .expect("second move");

    assert_eq!(
        graph.relationship_groups.query_group_indexes(1, 2).await.expect("indexes"),
        vec![4]
    );
}

#[tokio::test]
async fn test_deleting_the_default_group_is_forbidden() {
    let graph = default_graph();
    match graph
        .relationship_groups
        .delete_group_and_move_members(1, DEFAULT_GROUP_INDEX, 5)
        .await
    {
        Err(Error::IllegalArgument(_)) => {}
        other => panic!("expected illegal-argument failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_upsert_dispatch_table() {
    let graph = default_graph();
    let groups = &graph.relationship_groups;
    groups.create_group(1, Some(3), "a", None).await.expect("group 3");
    groups.create_group(1, Some(4), "b", None).await.expect("group 4");

    // Nothing to do.
    assert_eq!(groups.upsert_group_member(1, 2, None, None).await.expect("noop"), None);
    // Equal indexes: no-op.
    assert_eq!(
        groups.upsert_group_member(1, 2, Some(3), Some(3)).await.expect("noop"),
        None
    );
    // Plain add.
    assert_eq!(
        groups.upsert_group_member(1, 2, Some(3), None).await.expect("add"),
        Some(3)
    );
    // Move between groups.
    assert_eq!(
        groups.upsert_group_member(1, 2, Some(4), Some(3)).await.expect("move"),
        Some(4)
    );
    assert_eq!(groups.query_group_indexes(1, 2).await.expect("indexes"), vec![4]);
    // Delete from the default group: no-op.
    assert_eq!(
        groups
            .upsert_group_member(1, 2, None, Some(DEFAULT_GROUP_INDEX))
            .await
            .expect("noop"),
        None
    );
    // Delete from a non-default group: back to the default group.
    assert_eq!(
        groups.upsert_group_member(1, 2, None, Some(4)).await.expect("demote"),
        Some(DEFAULT_GROUP_INDEX)
    );
    assert_eq!(
        groups.query_group_indexes(1, 2).await.expect("indexes"),
        vec![DEFAULT_GROUP_INDEX]
    );
}

#[tokio::test]
async fn test_re_adding_a_member_refreshes_the_membership() {
    let graph = default_graph();
    let groups = &graph.relationship_groups;
    groups.create_group(1, Some(3), "a", None).await.expect("group 3");
    assert_eq!(
        groups.upsert_group_member(1, 2, Some(3), None).await.expect("add"),
        Some(3)
    );
    // A later re-add rewrites the join date, which counts as received.
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    assert_eq!(
        groups.upsert_group_member(1, 2, Some(3), None).await.expect("re-add"),
        Some(3)
    );
    assert_eq!(groups.query_group_indexes(1, 2).await.expect("indexes"), vec![3]);
}

#[tokio::test]
async fn test_delete_group_moves_members() {
    let graph = default_graph();
    let groups = &graph.relationship_groups;
    groups.create_group(1, Some(5), "old", None).await.expect("group 5");
    groups.create_group(1, Some(6), "new", None).await.expect("group 6");
    groups.upsert_group_member(1, 10, Some(5), None).await.expect("add 10");
    groups.upsert_group_member(1, 11, Some(5), None).await.expect("add 11");
    // 10 is already in the target group; the mirror tolerates it.
    groups.upsert_group_member(1, 10, Some(6), None).await.expect("add 10 to 6");

    groups.delete_group_and_move_members(1, 5, 6).await.expect("delete and move");

    assert_eq!(groups.query_group_member_ids(1, 6).await.expect("members"), vec![10, 11]);
    assert_eq!(groups.query_group_member_ids(1, 5).await.expect("members"), Vec::<i64>::new());
    let remaining = groups
        .query_filtered_groups(&roster_core::relationship_group::GroupRowFilter {
            owner_ids: Some(vec![1]),
            ..Default::default()
        })
        .await
        .expect("list groups");
    assert!(remaining.iter().all(|group| group.group_index != 5));

    // Deleting a group into itself is a no-op.
    groups.delete_group_and_move_members(1, 6, 6).await.expect("no-op");
    assert_eq!(groups.query_group_member_ids(1, 6).await.expect("members"), vec![10, 11]);
}

#[tokio::test]
async fn test_bulk_delete_from_all_groups_merges_outcomes() {
    let graph = default_graph();
    let groups = &graph.relationship_groups;
    groups.create_group(1, Some(3), "a", None).await.expect("group");
    groups.create_group(2, Some(3), "b", None).await.expect("group");
    groups.upsert_group_member(1, 10, Some(3), None).await.expect("add");
    groups.upsert_group_member(1, 10, Some(DEFAULT_GROUP_INDEX), None).await.expect("add");
    groups.upsert_group_member(2, 10, Some(3), None).await.expect("add");
    groups.upsert_group_member(2, 11, Some(3), None).await.expect("add");

    let summary = groups
        .delete_related_users_from_all_groups(
            &[
                RelationshipKey::new(1, 10),
                RelationshipKey::new(2, 10),
                RelationshipKey::new(2, 11),
            ],
            true,
        )
        .await
        .expect("bulk delete");
    assert_eq!(summary.deleted, 4);

    for owner in [1, 2] {
        assert!(graph
            .versions
            .query_version(owner, VersionStream::RelationshipGroups)
            .await
            .expect("query version")
            .is_some());
    }
}

#[tokio::test]
async fn test_remove_from_last_group_policy() {
    // Default policy: the member lands in the default group.
    let graph = default_graph();
    graph.relationships.friend_two_users(1, 2).await.expect("friend");
    graph
        .relationship_groups
        .create_group(1, Some(9), "digits", None)
        .await
        .expect("group 9");
    graph
        .relationship_groups
        .upsert_group_member(1, 2, Some(9), Some(DEFAULT_GROUP_INDEX))
        .await
        .expect("move to 9");
    graph
        .relationship_groups
        .upsert_group_member(1, 2, None, Some(9))
        .await
        .expect("remove from 9");
    assert_eq!(
        graph.relationship_groups.query_group_indexes(1, 2).await.expect("indexes"),
        vec![DEFAULT_GROUP_INDEX]
    );
    assert!(graph.relationships.has_relationship(1, 2).await.expect("query"));

    // Configured policy: the relationship itself goes away.
    let mut config = RosterConfig::default();
    config.relationship_group.delete_relationship_when_removed_from_all_groups = true;
    let graph = open_graph(config);
    graph.relationships.friend_two_users(1, 2).await.expect("friend");
    graph
        .relationship_groups
        .create_group(1, Some(9), "digits", None)
        .await
        .expect("group 9");
    graph
        .relationship_groups
        .upsert_group_member(1, 2, Some(9), Some(DEFAULT_GROUP_INDEX))
        .await
        .expect("move to 9");
    graph
        .relationship_groups
        .upsert_group_member(1, 2, None, Some(9))
        .await
        .expect("remove from 9");
    assert_eq!(
        graph.relationship_groups.query_group_indexes(1, 2).await.expect("indexes"),
        Vec::<i32>::new()
    );
    assert!(!graph.relationships.has_relationship(1, 2).await.expect("query"));
}

#[tokio::test]
async fn test_random_group_index_is_positive_and_unique() {
    let graph = default_graph();
    let group = graph
        .relationship_groups
        .create_group(1, None, "random", None)
        .await
        .expect("create");
    assert!(group.group_index > 0);

    match graph
        .relationship_groups
        .create_group(1, Some(group.group_index), "clash", None)
        .await
    {
        Err(Error::DuplicateKey(_)) => {}
        other => panic!("expected duplicate-key failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_group_rename_and_versioned_listing() {
    let graph = default_graph();
    let groups = &graph.relationship_groups;

    // No writer has bumped the stream yet.
    match groups.query_groups_with_version(1, None).await {
        Err(Error::AlreadyUpToDate) => {}
        other => panic!("expected already-up-to-date, got {other:?}"),
    }

    groups.create_group(1, Some(3), "pals", None).await.expect("create");
    let summary = groups.update_group_name(1, 3, "friends").await.expect("rename");
    assert_eq!(summary.modified, 1);

    let listed = groups.query_groups_with_version(1, None).await.expect("list");
    assert!(listed.groups.iter().any(|g| g.group_index == 3 && g.name == "friends"));

    match groups.query_groups_with_version(1, Some(listed.last_updated_date)).await {
        Err(Error::AlreadyUpToDate) => {}
        other => panic!("expected already-up-to-date, got {other:?}"),
    }
}

#[tokio::test]
async fn test_batch_group_updates() {
    let graph = default_graph();
    let groups = &graph.relationship_groups;
    groups.create_group(1, Some(3), "a", None).await.expect("create");
    groups.create_group(2, Some(4), "b", None).await.expect("create");

    // An empty field set acknowledges without touching the store.
    let summary = groups
        .update_groups(&[GroupKey::new(1, 3)], None, None)
        .await
        .expect("empty update");
    assert_eq!(summary.modified, 0);

    let summary = groups
        .update_groups(&[GroupKey::new(1, 3), GroupKey::new(2, 4)], Some("renamed"), None)
        .await
        .expect("update");
    assert_eq!(summary.modified, 2);

    let count = groups
        .count_groups(&roster_core::relationship_group::GroupRowFilter {
            names: Some(vec!["renamed".to_string()]),
            ..Default::default()
        })
        .await
        .expect("count");
    assert_eq!(count, 2);
}

#[tokio::test]
async fn test_admin_request_queries_and_batch_updates() {
    let graph = default_graph();
    let requests = &graph.friend_requests;
    let first = requests
        .create_request(NewRequest {
            id: Some(100),
            requester_id: 1,
            recipient_id: 2,
            content: "first".to_string(),
            ..NewRequest::default()
        })
        .await
        .expect("create");
    requests
        .create_request(NewRequest {
            id: Some(101),
            requester_id: 1,
            recipient_id: 3,
            content: "second".to_string(),
            ..NewRequest::default()
        })
        .await
        .expect("create");

    let listed = requests
        .query_requests(&FriendRequestFilter {
            requester_ids: Some(vec![1]),
            ..FriendRequestFilter::default()
        })
        .await
        .expect("list");
    assert_eq!(listed.len(), 2);

    let count = requests
        .count_requests(&FriendRequestFilter {
            statuses: Some(vec![RequestStatus::Pending]),
            ..FriendRequestFilter::default()
        })
        .await
        .expect("count");
    assert_eq!(count, 2);

    // An empty field subset acknowledges without touching anything.
    let summary = requests
        .update_requests(&[first.id], RequestUpdate::default())
        .await
        .expect("empty update");
    assert_eq!(summary.modified, 0);

    let summary = requests
        .update_requests(
            &[100, 101],
            RequestUpdate {
                status: Some(RequestStatus::Ignored),
                reason: Some("bulk".to_string()),
                ..RequestUpdate::default()
            },
        )
        .await
        .expect("batch update");
    assert_eq!(summary.modified, 2);

    let count = requests
        .count_requests(&FriendRequestFilter {
            statuses: Some(vec![RequestStatus::Ignored]),
            ..FriendRequestFilter::default()
        })
        .await
        .expect("count");
    assert_eq!(count, 2);
}

#[tokio::test]
async fn test_expiration_range_filter_translates_to_creation_dates() {
    let mut config = RosterConfig::default();
    config.friend_request.expire_after_seconds = 3_600;
    let graph = open_graph(config);

    let now = now_millis();
    graph
        .friend_requests
        .create_request(NewRequest {
            id: Some(200),
            requester_id: 1,
            recipient_id: 2,
            creation_date: Some(now - 4_000_000),
            ..NewRequest::default()
        })
        .await
        .expect("old request");
    graph
        .friend_requests
        .create_request(NewRequest {
            id: Some(201),
            requester_id: 1,
            recipient_id: 3,
            creation_date: Some(now),
            ..NewRequest::default()
        })
        .await
        .expect("fresh request");

    // Only the old request expires before now.
    let expired = graph
        .friend_requests
        .query_requests(&FriendRequestFilter {
            expiration_date_range: Some(DateRange::new(None, Some(now))),
            ..FriendRequestFilter::default()
        })
        .await
        .expect("filtered");
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].id, 200);
    // The admin listing applies the projection too.
    assert_eq!(expired[0].status, RequestStatus::Expired);
}

#[tokio::test]
async fn test_expired_cleanup_deletes_old_rows() {
    let mut config = RosterConfig::default();
    config.friend_request.expire_after_seconds = 3_600;
    config.friend_request.delete_expired_requests_when_cron_triggered = true;
    let graph = open_graph(config);

    graph
        .friend_requests
        .create_request(NewRequest {
            id: Some(300),
            requester_id: 1,
            recipient_id: 2,
            creation_date: Some(now_millis() - 4_000_000),
            ..NewRequest::default()
        })
        .await
        .expect("old request");
    graph
        .friend_requests
        .create_request(NewRequest {
            id: Some(301),
            requester_id: 1,
            recipient_id: 3,
            ..NewRequest::default()
        })
        .await
        .expect("fresh request");

    let summary = graph
        .friend_requests
        .remove_all_expired_requests()
        .await
        .expect("cleanup");
    assert_eq!(summary.deleted, 1);

    let remaining = graph
        .friend_requests
        .query_requests(&FriendRequestFilter::default())
        .await
        .expect("list");
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, 301);
}

#[tokio::test]
async fn test_cleanup_disabled_without_window() {
    let mut config = RosterConfig::default();
    config.friend_request.expire_after_seconds = 0;
    let graph = open_graph(config);
    graph
        .friend_requests
        .create_request(NewRequest {
            id: Some(400),
            requester_id: 1,
            recipient_id: 2,
            creation_date: Some(now_millis() - 4_000_000),
            ..NewRequest::default()
        })
        .await
        .expect("old request");

    let summary = graph
        .friend_requests
        .remove_all_expired_requests()
        .await
        .expect("cleanup");
    assert_eq!(summary.deleted, 0);
}

#[tokio::test]
async fn test_content_and_reason_bounds() {
    let mut config = RosterConfig::default();
    config.friend_request.max_content_length = 5;
    config.friend_request.max_response_reason_length = 5;
    let graph = open_graph(config);

    match graph
        .friend_requests
        .auth_and_create_request(1, 2, Some("too long for five".to_string()), now_millis())
        .await
    {
        Err(Error::IllegalArgument(_)) => {}
        other => panic!("expected illegal-argument failure, got {other:?}"),
    }

    let created = graph
        .friend_requests
        .auth_and_create_request(1, 2, Some("hi".to_string()), now_millis())
        .await
        .expect("create");
    match graph
        .friend_requests
        .auth_and_handle_request(created.id, 2, ResponseAction::Decline, Some("far too long".to_string()))
        .await
    {
        Err(Error::IllegalArgument(_)) => {}
        other => panic!("expected illegal-argument failure, got {other:?}"),
    }

    // Self-requests are rejected outright.
    match graph
        .friend_requests
        .auth_and_create_request(4, 4, None, now_millis())
        .await
    {
        Err(Error::IllegalArgument(_)) => {}
        other => panic!("expected illegal-argument failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_update_pending_status_rejects_pending_target() {
    let graph = default_graph();
    let created = graph
        .friend_requests
        .auth_and_create_request(1, 2, None, now_millis())
        .await
        .expect("create");
    match graph
        .friend_requests
        .update_pending_status(created.id, RequestStatus::Pending, None)
        .await
    {
        Err(Error::IllegalArgument(_)) => {}
        other => panic!("expected illegal-argument failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_member_listings_and_counts() {
    let graph = default_graph();
    let groups = &graph.relationship_groups;
    groups.create_default_group(1).await.expect("default group");
    groups.create_group(1, Some(3), "a", None).await.expect("group");
    groups.create_group(2, Some(3), "b", None).await.expect("group");
    groups.upsert_group_member(1, 10, Some(3), None).await.expect("add");
    groups.upsert_group_member(1, 11, Some(3), None).await.expect("add");
    groups.upsert_group_member(2, 10, Some(3), None).await.expect("add");

    let ids = groups
        .query_group_member_ids_filtered(Some(vec![1, 2]), Some(vec![3]), None, None)
        .await
        .expect("filtered ids");
    assert_eq!(ids, vec![10, 10, 11]);

    let paged = groups
        .query_group_member_ids_filtered(None, None, Some(0), Some(2))
        .await
        .expect("paged ids");
    assert_eq!(paged.len(), 2);

    assert_eq!(
        groups.count_members(Some(vec![1]), Some(vec![3])).await.expect("count"),
        2
    );
    assert_eq!(
        groups
            .count_groups_containing(None, Some(vec![10]))
            .await
            .expect("count groups"),
        2
    );
}

#[tokio::test]
async fn test_admin_group_deletes() {
    let graph = default_graph();
    let groups = &graph.relationship_groups;
    groups.create_group(1, Some(3), "a", None).await.expect("group");
    groups.create_group(1, Some(4), "b", None).await.expect("group");
    groups.create_group(2, Some(5), "c", None).await.expect("group");

    let summary = groups
        .delete_groups(&[GroupKey::new(1, 3)])
        .await
        .expect("delete by key");
    assert_eq!(summary.deleted, 1);

    let summary = groups
        .delete_all_groups_of_owners(&[1, 2], true)
        .await
        .expect("delete by owners");
    assert_eq!(summary.deleted, 2);
    assert!(graph
        .versions
        .query_version(1, VersionStream::RelationshipGroups)
        .await
        .expect("version")
        .is_some());
}

#[tokio::test]
async fn test_member_delete_bumps_membership_version_only_on_change() {
    let graph = default_graph();
    let groups = &graph.relationship_groups;
    groups.create_group(1, Some(3), "a", None).await.expect("group");
    groups.upsert_group_member(1, 10, Some(3), None).await.expect("add");

    // Deleting a missing member leaves the membership stream untouched.
    let summary = groups
        .delete_related_user_from_group(1, 99, 3, true)
        .await
        .expect("delete missing");
    assert_eq!(summary.deleted, 0);
    assert_eq!(
        graph
            .versions
            .query_version(1, VersionStream::RelationshipGroupMembers)
            .await
            .expect("version"),
        None
    );

    let summary = groups
        .delete_related_user_from_group(1, 10, 3, true)
        .await
        .expect("delete member");
    assert_eq!(summary.deleted, 1);
    assert!(graph
        .versions
        .query_version(1, VersionStream::RelationshipGroupMembers)
        .await
        .expect("version")
        .is_some());
}

#[tokio::test]
async fn test_update_pending_status_helper() {
    let graph = default_graph();
    let created = graph
        .friend_requests
        .auth_and_create_request(1, 2, None, now_millis())
        .await
        .expect("create");

    let summary = graph
        .friend_requests
        .update_pending_status(created.id, RequestStatus::Ignored, Some("quiet".to_string()))
        .await
        .expect("update");
    assert_eq!(summary.modified, 1);

    // The guard makes the transition single-shot.
    let summary = graph
        .friend_requests
        .update_pending_status(created.id, RequestStatus::Declined, None)
        .await
        .expect("second update");
    assert_eq!(summary.modified, 0);

    let stored = graph
        .store
        .with_conn(move |conn| storage::requests::find_by_id(conn, created.id))
        .await
        .expect("read")
        .expect("row");
    assert_eq!(stored.status, RequestStatus::Ignored);
    assert_eq!(stored.reason.as_deref(), Some("quiet"));
}

#[tokio::test]
async fn test_response_action_wire_decoding() {
    assert_eq!(ResponseAction::from_i32(0).expect("accept"), ResponseAction::Accept);
    assert_eq!(ResponseAction::from_i32(1).expect("decline"), ResponseAction::Decline);
    assert_eq!(ResponseAction::from_i32(2).expect("ignore"), ResponseAction::Ignore);
    match ResponseAction::from_i32(9) {
        Err(Error::IllegalArgument(_)) => {}
        other => panic!("expected illegal-argument failure, got {other:?}"),
    }
}
