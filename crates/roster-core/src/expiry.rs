//! Read-time expiry projection for friend requests.
//!
//! The store never holds an EXPIRED status written by this core: a PENDING
//! request older than the configured window merely *reads* as EXPIRED. The
//! projection happens in every path that returns request data, so
//! correctness never depends on a background sweep.

use crate::friend_request::{FriendRequest, RequestStatus};

/// The creation-date threshold below which a pending request counts as
/// expired, or `None` when projection is disabled (`expire_after_seconds <= 0`).
pub fn expires_before(now: i64, expire_after_seconds: i64) -> Option<i64> {
    (expire_after_seconds > 0).then(|| now - expire_after_seconds * 1_000)
}

/// Whether a request created at `creation_date` has outlived the window.
pub fn is_expired(creation_date: i64, expire_after_seconds: i64, now: i64) -> bool {
    match expires_before(now, expire_after_seconds) {
        Some(threshold) => creation_date < threshold,
        None => false,
    }
}

/// The status a stored request presents to readers.
pub fn project_status(
    status: RequestStatus,
    creation_date: i64,
    expire_after_seconds: i64,
    now: i64,
) -> RequestStatus {
    if status == RequestStatus::Pending && is_expired(creation_date, expire_after_seconds, now) {
        RequestStatus::Expired
    } else {
        status
    }
}

/// Rewrite `request` in place for presentation. A pending request past the
/// window reads as EXPIRED with a response date at the end of the window;
/// everything else passes through untouched.
pub fn project(request: &mut FriendRequest, expire_after_seconds: i64, now: i64) {
    if request.status == RequestStatus::Pending
        && is_expired(request.creation_date, expire_after_seconds, now)
    {
        request.status = RequestStatus::Expired;
        request.response_date = Some(request.creation_date + expire_after_seconds * 1_000);
    }
}

/// The response date to store for a newly created record.
///
/// A supplied date wins. Otherwise terminal statuses default to `now`,
/// EXPIRED to the end of the expiry window, and PENDING stays unset.
pub fn response_date_for_new_record(
    now: i64,
    status: Option<RequestStatus>,
    supplied: Option<i64>,
    creation_date: i64,
    expire_after_seconds: i64,
) -> Option<i64> {
    if supplied.is_some() {
        return supplied;
    }
    match status {
        None | Some(RequestStatus::Pending) => None,
        Some(RequestStatus::Expired) => {
            if expire_after_seconds > 0 {
                Some(creation_date + expire_after_seconds * 1_000)
            } else {
                Some(now)
            }
        }
        Some(_) => Some(now),
    }
}
