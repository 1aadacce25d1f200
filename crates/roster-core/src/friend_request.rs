//! Friend-request lifecycle: creation, recall, handling, and queries.
//!
//! A request is born PENDING and mutates at most once, to exactly one of
//! ACCEPTED, DECLINED, IGNORED, or CANCELED, always through a conditional
//! update guarded on `status = PENDING`. The store never flips a request to
//! EXPIRED by itself: requests past the configured window are transformed
//! when returned to users or admins, which costs nothing at rest. An
//! optional leader-only cleanup task deletes long-expired rows for
//! housekeeping; correctness never depends on it.

use std::sync::Arc;
use std::time::Duration;

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error};

use crate::config::ConfigManager;
use crate::error::{Error, Result};
use crate::expiry;
use crate::node::{Node, ServiceKind};
use crate::proto::{self, FriendRequestsWithVersion};
use crate::relationship::RelationshipService;
use crate::storage::{self, DeleteSummary, SocialStore, UpdateSummary};
use crate::storage::requests::RequestRowFilter;
use crate::time::{self, is_after_or_same, DateRange};
use crate::validation;
use crate::version::{UserVersionService, VersionStream};

/// Lifecycle state of a friend request. PENDING is the only non-terminal
/// state; EXPIRED is projection-only and never written by the services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestStatus {
    /// Awaiting a response from the recipient.
    Pending,
    /// The recipient accepted; the users are friends.
    Accepted,
    /// The recipient declined.
    Declined,
    /// The recipient ignored the request.
    Ignored,
    /// The requester recalled the request.
    Canceled,
    /// The request outlived the expiry window (projection; admins may also
    /// write it explicitly).
    Expired,
}

impl RequestStatus {
    /// Stable store representation.
    pub fn as_store_str(self) -> &'static str {
        match self {
            RequestStatus::Pending => "PENDING",
            RequestStatus::Accepted => "ACCEPTED",
            RequestStatus::Declined => "DECLINED",
            RequestStatus::Ignored => "IGNORED",
            RequestStatus::Canceled => "CANCELED",
            RequestStatus::Expired => "EXPIRED",
        }
    }

    /// Parse the store representation.
    pub fn from_store_str(value: &str) -> Option<Self> {
        match value {
            "PENDING" => Some(RequestStatus::Pending),
            "ACCEPTED" => Some(RequestStatus::Accepted),
            "DECLINED" => Some(RequestStatus::Declined),
            "IGNORED" => Some(RequestStatus::Ignored),
            "CANCELED" => Some(RequestStatus::Canceled),
            "EXPIRED" => Some(RequestStatus::Expired),
            _ => None,
        }
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_store_str())
    }
}

/// How a recipient responds to a pending friend request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseAction {
    /// Accept and befriend the requester.
    Accept,
    /// Decline the request.
    Decline,
    /// Ignore the request.
    Ignore,
}

impl ResponseAction {
    /// Decode the wire representation; anything out of range is rejected.
    pub fn from_i32(value: i32) -> Result<Self> {
        match value {
            0 => Ok(ResponseAction::Accept),
            1 => Ok(ResponseAction::Decline),
            2 => Ok(ResponseAction::Ignore),
            _ => Err(Error::IllegalArgument(format!(
                "unrecognized response action: {value}"
            ))),
        }
    }
}

/// A stored friend request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FriendRequest {
    /// Globally unique, externally generated ID.
    pub id: i64,
    /// Message attached by the requester; may be empty.
    pub content: String,
    /// Stored lifecycle state.
    pub status: RequestStatus,
    /// The recipient's response reason, if any.
    pub reason: Option<String>,
    /// Creation date, epoch milliseconds; never in the future.
    pub creation_date: i64,
    /// When the request was responded to, if it was.
    pub response_date: Option<i64>,
    /// The proposing user.
    pub requester_id: i64,
    /// The proposed-to user.
    pub recipient_id: i64,
}

/// The projection the recall and handle paths authorise against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestSnapshot {
    /// Request ID.
    pub id: i64,
    /// The proposing user.
    pub requester_id: i64,
    /// The proposed-to user.
    pub recipient_id: i64,
    /// Creation date, epoch milliseconds.
    pub creation_date: i64,
    /// Stored status at read time.
    pub status: RequestStatus,
}

/// Outcome of handling a friend request. The group indexes are set only on
/// ACCEPT: per side, the group that received the new relationship.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandleRequestResult {
    /// The request as it read before the transition.
    pub request: RequestSnapshot,
    /// The group of the requester that received the recipient.
    pub requester_group_index: Option<i32>,
    /// The group of the recipient that received the requester.
    pub recipient_group_index: Option<i32>,
}

/// Parameters of an admin-path request creation.
#[derive(Debug, Clone, Default)]
pub struct NewRequest {
    /// Explicit ID; drawn from the ID generator when absent.
    pub id: Option<i64>,
    /// The proposing user.
    pub requester_id: i64,
    /// The proposed-to user.
    pub recipient_id: i64,
    /// Message attached by the requester.
    pub content: String,
    /// Initial status; PENDING when absent.
    pub status: Option<RequestStatus>,
    /// Creation date; now when absent, clamped to now when supplied.
    pub creation_date: Option<i64>,
    /// Response date; defaulted from the status when absent.
    pub response_date: Option<i64>,
    /// Response reason.
    pub reason: Option<String>,
}

/// Field subset of a batched admin update; `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct RequestUpdate {
    /// New requester.
    pub requester_id: Option<i64>,
    /// New recipient.
    pub recipient_id: Option<i64>,
    /// New content.
    pub content: Option<String>,
    /// New stored status.
    pub status: Option<RequestStatus>,
    /// New reason.
    pub reason: Option<String>,
    /// New creation date.
    pub creation_date: Option<i64>,
    /// New response date.
    pub response_date: Option<i64>,
}

impl RequestUpdate {
    /// Whether every field is absent.
    pub fn is_empty(&self) -> bool {
        self.requester_id.is_none()
            && self.recipient_id.is_none()
            && self.content.is_none()
            && self.status.is_none()
            && self.reason.is_none()
            && self.creation_date.is_none()
            && self.response_date.is_none()
    }
}

/// Admin query filter. The expiration range addresses the derived
/// expiration date (`creation + window`) and is folded into the creation
/// range before hitting the store.
#[derive(Debug, Clone, Default)]
pub struct FriendRequestFilter {
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
    /// Match rows expiring within this range; ignored when projection is
    /// disabled.
    pub expiration_date_range: Option<DateRange>,
    /// Zero-based page, meaningful with `size`.
    pub page: Option<u32>,
    /// Page size.
    pub size: Option<u32>,
}

/// The friend-request service.
pub struct FriendRequestService {
    store: Arc<SocialStore>,
    node: Arc<Node>,
    versions: Arc<UserVersionService>,
    relationships: Arc<RelationshipService>,
    config: Arc<ConfigManager>,
}

impl FriendRequestService {
    /// Wire the service to its collaborators.
    pub fn new(
        store: Arc<SocialStore>,
        node: Arc<Node>,
        versions: Arc<UserVersionService>,
        relationships: Arc<RelationshipService>,
        config: Arc<ConfigManager>,
    ) -> Self {
        Self {
            store,
            node,
            versions,
            relationships,
            config,
        }
    }

    /// Admin-path creation: any status, caller-supplied dates. On success
    /// both parties' request versions are bumped best-effort.
    pub async fn create_request(&self, new: NewRequest) -> Result<FriendRequest> {
        let config = self.config.load();
        validation::not_self_relation(new.requester_id, new.recipient_id)?;
        validation::max_length(Some(new.content.as_str()), "content", config.friend_request.content_limit())?;
        validation::max_length(new.reason.as_deref(), "reason", config.friend_request.reason_limit())?;
        let now = time::now_millis();
        validation::past_or_present(new.response_date, "response_date", now)?;

        let id = match new.id {
            Some(id) => id,
            None => self.node.next_large_gap_id(ServiceKind::FriendRequest),
        };
        // A supplied creation date is clamped so it never lies in the future.
        let creation_date = new.creation_date.map_or(now, |date| date.min(now));
        let response_date = expiry::response_date_for_new_record(
            now,
            new.status,
            new.response_date,
            creation_date,
            config.friend_request.expire_after_seconds,
        );
        let request = FriendRequest {
            id,
            content: new.content,
            status: new.status.unwrap_or(RequestStatus::Pending),
            reason: new.reason,
            creation_date,
            response_date,
            requester_id: new.requester_id,
            recipient_id: new.recipient_id,
        };
        self.store
            .with_conn(|conn| {
                storage::requests::insert(conn, &request)?;
                self.versions.touch_best_effort(
                    conn,
                    request.recipient_id,
                    VersionStream::ReceivedFriendRequests,
                    "creating a friend request",
                );
                self.versions.touch_best_effort(
                    conn,
                    request.requester_id,
                    VersionStream::SentFriendRequests,
                    "creating a friend request",
                );
                Ok(())
            })
            .await?;
        Ok(request)
    }

    /// User-path creation: blocked-user and resend-policy checks, then
    /// delegation to [`Self::create_request`] with null content normalised
    /// to the empty string.
    pub async fn auth_and_create_request(
        &self,
        requester_id: i64,
        recipient_id: i64,
        content: Option<String>,
        creation_date: i64,
    ) -> Result<FriendRequest> {
        let config = self.config.load();
        validation::not_self_relation(requester_id, recipient_id)?;
        validation::max_length(content.as_deref(), "content", config.friend_request.content_limit())?;

        if !self.relationships.is_not_blocked(recipient_id, requester_id).await? {
            return Err(Error::BlockedUserToSendFriendRequest);
        }
        // A previously accepted request never prohibits a new one: the
        // relationship may have been deleted and rebuilt since.
        let request_exists = if config
            .friend_request
            .allow_send_request_after_declined_or_ignored_or_expired
        {
            self.has_pending_request(requester_id, recipient_id).await?
        } else {
            self.has_pending_or_declined_or_ignored_or_expired_request(requester_id, recipient_id)
                .await?
        };
        if request_exists {
            return Err(Error::CreateExistingFriendRequest);
        }
        self.create_request(NewRequest {
            id: None,
            requester_id,
            recipient_id,
            content: content.unwrap_or_default(),
            status: Some(RequestStatus::Pending),
            creation_date: Some(creation_date),
            response_date: None,
            reason: None,
        })
        .await
    }

    /// Whether a live PENDING request from `requester` to `recipient`
    /// exists. A stored PENDING row past the expiry window reads as EXPIRED
    /// and does not count.
    pub async fn has_pending_request(&self, requester_id: i64, recipient_id: i64) -> Result<bool> {
        let expire_after = self.config.load().friend_request.expire_after_seconds;
        let threshold = expiry::expires_before(time::now_millis(), expire_after);
        self.store
            .with_conn(|conn| {
                storage::requests::has_pending(conn, requester_id, recipient_id, threshold)
            })
            .await
    }

    /// Whether any prohibiting request exists under the strict resend
    /// policy.
    pub async fn has_pending_or_declined_or_ignored_or_expired_request(
        &self,
        requester_id: i64,
        recipient_id: i64,
    ) -> Result<bool> {
        self.store
            .with_conn(|conn| {
                storage::requests::has_pending_or_declined_or_ignored_or_expired(
                    conn,
                    requester_id,
                    recipient_id,
                )
            })
            .await
    }

    /// Sender-side recall of a pending request.
    ///
    /// Authorisation comes first: whether the request is missing or owned by
    /// someone else, the caller sees the same code and learns nothing about
    /// existence or status. The transition itself is a conditional update;
    /// losing the race to a concurrent response or an admin delete surfaces
    /// as a non-pending failure without detail.
    pub async fn auth_and_recall_request(
        &self,
        requester_id: i64,
        request_id: i64,
    ) -> Result<RequestSnapshot> {
        let config = self.config.load();
        if !config.friend_request.allow_recall_pending_friend_request_by_sender {
            return Err(Error::RecallingFriendRequestDisabled);
        }
        let snapshot = self
            .store
            .with_conn(|conn| storage::requests::find_snapshot(conn, request_id))
            .await?
            .ok_or(Error::NotSenderToRecall)?;
        if snapshot.requester_id != requester_id {
            return Err(Error::NotSenderToRecall);
        }
        if snapshot.status != RequestStatus::Pending {
            return Err(Error::RecallNonPendingRequest(Some(snapshot.status)));
        }
        if expiry::is_expired(
            snapshot.creation_date,
            config.friend_request.expire_after_seconds,
            time::now_millis(),
        ) {
            return Err(Error::RecallNonPendingRequest(Some(RequestStatus::Expired)));
        }
        let summary = self
            .store
            .with_conn(|conn| {
                let summary = storage::requests::update_status_if_pending(
                    conn,
                    request_id,
                    RequestStatus::Canceled,
                    None,
                    time::now_millis(),
                )?;
                if summary.modified > 0 {
                    self.versions.touch_best_effort(
                        conn,
                        snapshot.recipient_id,
                        VersionStream::ReceivedFriendRequests,
                        "recalling a friend request",
                    );
                    self.versions.touch_best_effort(
                        conn,
                        snapshot.requester_id,
                        VersionStream::SentFriendRequests,
                        "recalling a friend request",
                    );
                }
                Ok(summary)
            })
            .await?;
        if summary.modified == 0 {
            return Err(Error::RecallNonPendingRequest(None));
        }
        Ok(snapshot)
    }

    /// Recipient-side handling of a pending request. The authorisation and
    /// expiry checks mirror recall, keyed on the recipient. ACCEPT runs in a
    /// store transaction spanning the status flip and the befriending, and
    /// is retried on transient transaction failures.
    pub async fn auth_and_handle_request(
        &self,
        request_id: i64,
        recipient_id: i64,
        action: ResponseAction,
        reason: Option<String>,
    ) -> Result<HandleRequestResult> {
        let config = self.config.load();
        validation::max_length(reason.as_deref(), "reason", config.friend_request.reason_limit())?;
        let snapshot = self
            .store
            .with_conn(|conn| storage::requests::find_snapshot(conn, request_id))
            .await?
            .ok_or(Error::NotRecipientToUpdate)?;
        if snapshot.recipient_id != recipient_id {
            return Err(Error::NotRecipientToUpdate);
        }
        if snapshot.status != RequestStatus::Pending {
            return Err(Error::UpdateNonPendingRequest(Some(snapshot.status)));
        }
        if expiry::is_expired(
            snapshot.creation_date,
            config.friend_request.expire_after_seconds,
            time::now_millis(),
        ) {
            return Err(Error::UpdateNonPendingRequest(Some(RequestStatus::Expired)));
        }
        match action {
            ResponseAction::Accept => {
                let (requester_group_index, recipient_group_index) = self
                    .store
                    .in_transaction(|txn| {
                        let summary = self.update_pending_status_in(
                            txn,
                            request_id,
                            RequestStatus::Accepted,
                            reason.as_deref(),
                        )?;
                        if summary.modified == 0 {
                            return Err(Error::UpdateNonPendingRequest(None));
                        }
                        self.relationships
                            .friend_two_users_in(txn, snapshot.requester_id, recipient_id)
                    })
                    .await?;
                Ok(HandleRequestResult {
                    request: snapshot,
                    requester_group_index,
                    recipient_group_index,
                })
            }
            ResponseAction::Decline => {
                self.respond_without_friending(request_id, RequestStatus::Declined, reason, snapshot)
                    .await
            }
            ResponseAction::Ignore => {
                self.respond_without_friending(request_id, RequestStatus::Ignored, reason, snapshot)
                    .await
            }
        }
    }

    async fn respond_without_friending(
        &self,
        request_id: i64,
        status: RequestStatus,
        reason: Option<String>,
        snapshot: RequestSnapshot,
    ) -> Result<HandleRequestResult> {
        let summary = self
            .store
            .with_conn(|conn| {
                self.update_pending_status_in(conn, request_id, status, reason.as_deref())
            })
            .await?;
        if summary.modified == 0 {
            return Err(Error::UpdateNonPendingRequest(None));
        }
        Ok(HandleRequestResult {
            request: snapshot,
            requester_group_index: None,
            recipient_group_index: None,
        })
    }

    /// Conditionally flip a pending request to a terminal status and bump
    /// the recipient's received version best-effort. PENDING is not a valid
    /// target.
    pub async fn update_pending_status(
        &self,
        request_id: i64,
        status: RequestStatus,
        reason: Option<String>,
    ) -> Result<UpdateSummary> {
        validation::max_length(
            reason.as_deref(),
            "reason",
            self.config.load().friend_request.reason_limit(),
        )?;
        self.store
            .with_conn(|conn| {
                self.update_pending_status_in(conn, request_id, status, reason.as_deref())
            })
            .await
    }

    /// Session-threaded variant of [`Self::update_pending_status`].
    pub(crate) fn update_pending_status_in(
        &self,
        conn: &Connection,
        request_id: i64,
        status: RequestStatus,
        reason: Option<&str>,
    ) -> Result<UpdateSummary> {
        if status == RequestStatus::Pending {
            return Err(Error::IllegalArgument(
                "the target status must not be PENDING".to_string(),
            ));
        }
        let summary = storage::requests::update_status_if_pending(
            conn,
            request_id,
            status,
            reason,
            time::now_millis(),
        )?;
        if summary.modified > 0 {
            if let Some(recipient_id) = storage::requests::find_recipient_id(conn, request_id)? {
                self.versions.touch_best_effort(
                    conn,
                    recipient_id,
                    VersionStream::ReceivedFriendRequests,
                    "updating a pending friend request",
                );
            }
        }
        Ok(summary)
    }

    /// Incremental-sync read of one user's sent or received requests.
    /// Short-circuits with `ALREADY_UP_TO_DATE` when the client is current
    /// and `NO_CONTENT` when the stream is empty; the expiry projection is
    /// applied to every returned request.
    pub async fn query_requests_with_version(
        &self,
        user_id: i64,
        are_sent_by_user: bool,
        last_updated_date: Option<i64>,
    ) -> Result<FriendRequestsWithVersion> {
        let stream = if are_sent_by_user {
            VersionStream::SentFriendRequests
        } else {
            VersionStream::ReceivedFriendRequests
        };
        let version = self
            .versions
            .query_version(user_id, stream)
            .await?
            .ok_or(Error::AlreadyUpToDate)?;
        if is_after_or_same(last_updated_date, version) {
            return Err(Error::AlreadyUpToDate);
        }
        let requests = self
            .store
            .with_conn(|conn| {
                if are_sent_by_user {
                    storage::requests::find_by_requester(conn, user_id)
                } else {
                    storage::requests::find_by_recipient(conn, user_id)
                }
            })
            .await?;
        if requests.is_empty() {
            return Err(Error::NoContent);
        }
        let expire_after = self.config.load().friend_request.expire_after_seconds;
        let now = time::now_millis();
        Ok(FriendRequestsWithVersion {
            last_updated_date: version,
            requests: requests
                .iter()
                .map(|request| proto::friend_request_to_dto(request, expire_after, now))
                .collect(),
        })
    }

    /// All stored requests received by `recipient_id`, unprojected.
    pub async fn query_requests_by_recipient(&self, recipient_id: i64) -> Result<Vec<FriendRequest>> {
        self.store
            .with_conn(|conn| storage::requests::find_by_recipient(conn, recipient_id))
            .await
    }

    /// All stored requests sent by `requester_id`, unprojected.
    pub async fn query_requests_by_requester(&self, requester_id: i64) -> Result<Vec<FriendRequest>> {
        self.store
            .with_conn(|conn| storage::requests::find_by_requester(conn, requester_id))
            .await
    }

    /// The recipient of one request.
    pub async fn query_recipient_id(&self, request_id: i64) -> Result<Option<i64>> {
        self.store
            .with_conn(|conn| storage::requests::find_recipient_id(conn, request_id))
            .await
    }

    /// Batched admin update of an arbitrary field subset. An empty subset
    /// acknowledges without touching the store. No version side-effects.
    pub async fn update_requests(&self, ids: &[i64], update: RequestUpdate) -> Result<UpdateSummary> {
        validation::not_empty(ids, "ids")?;
        let config = self.config.load();
        validation::max_length(update.content.as_deref(), "content", config.friend_request.content_limit())?;
        validation::max_length(update.reason.as_deref(), "reason", config.friend_request.reason_limit())?;
        let now = time::now_millis();
        validation::past_or_present(update.creation_date, "creation_date", now)?;
        validation::past_or_present(update.response_date, "response_date", now)?;
        if let (Some(requester_id), Some(recipient_id)) = (update.requester_id, update.recipient_id) {
            validation::not_self_relation(requester_id, recipient_id)?;
        }
        if update.is_empty() {
            return Ok(UpdateSummary::acknowledged());
        }
        self.store
            .with_conn(|conn| storage::requests::update_requests(conn, ids, &update))
            .await
    }

    /// Admin delete by ID set. No version side-effects.
    pub async fn delete_requests(&self, ids: &[i64]) -> Result<DeleteSummary> {
        validation::not_empty(ids, "ids")?;
        self.store
            .with_conn(|conn| storage::requests::delete_by_ids(conn, ids))
            .await
    }

    /// Admin listing with arbitrary filters; the expiry projection is
    /// applied to the returned rows.
    pub async fn query_requests(&self, filter: &FriendRequestFilter) -> Result<Vec<FriendRequest>> {
        let expire_after = self.config.load().friend_request.expire_after_seconds;
        let row_filter = to_row_filter(filter, expire_after);
        let mut requests = self
            .store
            .with_conn(|conn| storage::requests::find_filtered(conn, &row_filter))
            .await?;
        let now = time::now_millis();
        for request in &mut requests {
            expiry::project(request, expire_after, now);
        }
        Ok(requests)
    }

    /// Admin count with the same filters as [`Self::query_requests`].
    pub async fn count_requests(&self, filter: &FriendRequestFilter) -> Result<u64> {
        let expire_after = self.config.load().friend_request.expire_after_seconds;
        let row_filter = to_row_filter(filter, expire_after);
        self.store
            .with_conn(|conn| storage::requests::count_filtered(conn, &row_filter))
            .await
    }

    /// Housekeeping sweep: delete rows older than the expiry window.
    /// A disabled window deletes nothing.
    pub async fn remove_all_expired_requests(&self) -> Result<DeleteSummary> {
        let expire_after = self.config.load().friend_request.expire_after_seconds;
        let Some(threshold) = expiry::expires_before(time::now_millis(), expire_after) else {
            return Ok(DeleteSummary::default());
        };
        self.store
            .with_conn(|conn| storage::requests::delete_created_before(conn, threshold))
            .await
    }

    /// Spawn the periodic expired-request cleanup. Each tick runs only on
    /// the cluster leader and only while the config flag and the expiry
    /// window allow it; flag changes take effect on the next tick.
    pub fn spawn_expired_request_cleanup(self: &Arc<Self>) -> JoinHandle<()> {
        let service = Arc::clone(self);
        let period = Duration::from_secs(
            service
                .config
                .load()
                .friend_request
                .expired_requests_cleanup_interval_secs
                .max(1),
        );
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let config = service.config.load();
                if !service.node.is_local_node_leader()
                    || !config.friend_request.delete_expired_requests_when_cron_triggered
                {
                    continue;
                }
                match service.remove_all_expired_requests().await {
                    Ok(summary) if summary.deleted > 0 => {
                        debug!(deleted = summary.deleted, "removed expired friend requests");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!(error = %e, "caught an error while removing expired friend requests");
                    }
                }
            }
        })
    }
}

/// Fold the derived expiration range into the creation range the store
/// understands. With projection disabled there is no expiration date, so
/// the range cannot constrain anything and is dropped.
fn to_row_filter(filter: &FriendRequestFilter, expire_after_seconds: i64) -> RequestRowFilter {
    let mut creation_date_range = filter.creation_date_range;
    if let Some(expiration_range) = filter.expiration_date_range {
        if expire_after_seconds > 0 {
            let shifted = expiration_range.shift(-expire_after_seconds * 1_000);
            creation_date_range = Some(match creation_date_range {
                Some(range) => range.intersect(shifted),
                None => shifted,
            });
        }
    }
    RequestRowFilter {
        ids: filter.ids.clone(),
        requester_ids: filter.requester_ids.clone(),
        recipient_ids: filter.recipient_ids.clone(),
        statuses: filter.statuses.clone(),
        creation_date_range,
        response_date_range: filter.response_date_range,
        page: filter.page,
        size: filter.size,
    }
}
