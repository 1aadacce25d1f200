//! Error types for the Roster social-graph core.
//!
//! Failures surfaced to clients form a closed set of response codes; each
//! failure is one code plus optional free-form detail. Operations that
//! require the caller to be a specific party on a friend request return the
//! same code for "no such request" and "you are not that party" so that the
//! error channel never leaks existence.

use thiserror::Error;

use crate::friend_request::RequestStatus;

/// Core error type for social-graph operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A supplied argument failed validation.
    #[error("illegal argument: {0}")]
    IllegalArgument(String),

    /// Storage operation failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// A unique-key constraint was violated. Distinct from [`Error::Storage`]
    /// so callers can retry with a fresh key or tolerate the duplicate.
    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    /// A transient transaction failure; retrying the whole transaction may
    /// succeed.
    #[error("transient transaction error: {0}")]
    TransientTransaction(String),

    /// The recipient has blocked the requester.
    #[error("the recipient has blocked the requester from sending a friend request")]
    BlockedUserToSendFriendRequest,

    /// A prohibiting friend request between the two users already exists.
    #[error("a friend request between the users already exists")]
    CreateExistingFriendRequest,

    /// Recalling pending friend requests is disabled by configuration.
    #[error("recalling a pending friend request is disabled")]
    RecallingFriendRequestDisabled,

    /// The caller is not the sender of the friend request, or the request
    /// does not exist. Intentionally one code for both cases.
    #[error("the caller is not the sender of the friend request")]
    NotSenderToRecall,

    /// The caller is not the recipient of the friend request, or the request
    /// does not exist. Intentionally one code for both cases.
    #[error("the caller is not the recipient of the friend request")]
    NotRecipientToUpdate,

    /// The friend request is no longer pending, so it cannot be recalled.
    #[error("cannot recall the friend request{}", status_suffix(.0))]
    RecallNonPendingRequest(Option<RequestStatus>),

    /// The friend request is no longer pending, so it cannot be handled.
    #[error("cannot update the friend request{}", status_suffix(.0))]
    UpdateNonPendingRequest(Option<RequestStatus>),

    /// The client's data is already up to date; nothing to fetch.
    #[error("already up to date")]
    AlreadyUpToDate,

    /// The query matched no records.
    #[error("no content")]
    NoContent,

    /// Encoding or decoding a payload failed.
    #[error("encoding error: {0}")]
    Encoding(String),
}

/// Result type alias using the core [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

fn status_suffix(status: &Option<RequestStatus>) -> String {
    match status {
        Some(status) => format!(": the request is under the status {status}"),
        None => String::new(),
    }
}

impl Error {
    /// The stable response code surfaced to clients for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Error::IllegalArgument(_) => "ILLEGAL_ARGUMENT",
            Error::Storage(_) => "STORAGE_ERROR",
            Error::DuplicateKey(_) => "DUPLICATE_KEY",
            Error::TransientTransaction(_) => "TRANSIENT_TRANSACTION",
            Error::BlockedUserToSendFriendRequest => "BLOCKED_USER_TO_SEND_FRIEND_REQUEST",
            Error::CreateExistingFriendRequest => "CREATE_EXISTING_FRIEND_REQUEST",
            Error::RecallingFriendRequestDisabled => "RECALLING_FRIEND_REQUEST_IS_DISABLED",
            Error::NotSenderToRecall => "NOT_SENDER_TO_RECALL_FRIEND_REQUEST",
            Error::NotRecipientToUpdate => "NOT_RECIPIENT_TO_UPDATE_FRIEND_REQUEST",
            Error::RecallNonPendingRequest(_) => "RECALL_NON_PENDING_FRIEND_REQUEST",
            Error::UpdateNonPendingRequest(_) => "UPDATE_NON_PENDING_FRIEND_REQUEST",
            Error::AlreadyUpToDate => "ALREADY_UP_TO_DATE",
            Error::NoContent => "NO_CONTENT",
            Error::Encoding(_) => "ENCODING_ERROR",
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Storage(e.to_string())
    }
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(failure, _) = &e {
            return match failure.code {
                rusqlite::ErrorCode::ConstraintViolation => Error::DuplicateKey(e.to_string()),
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked => {
                    Error::TransientTransaction(e.to_string())
                }
                _ => Error::Storage(e.to_string()),
            };
        }
        Error::Storage(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_leaking_codes_are_identical_for_missing_and_foreign() {
        // Both cases must surface through the same variant, so a single code
        // covers them by construction.
        assert_eq!(Error::NotSenderToRecall.code(), "NOT_SENDER_TO_RECALL_FRIEND_REQUEST");
        assert_eq!(
            Error::NotRecipientToUpdate.code(),
            "NOT_RECIPIENT_TO_UPDATE_FRIEND_REQUEST"
        );
    }

    #[test]
    fn test_status_detail_in_message() {
        let err = Error::RecallNonPendingRequest(Some(RequestStatus::Accepted));
        assert!(err.to_string().contains("ACCEPTED"));

        let bare = Error::RecallNonPendingRequest(None);
        assert!(!bare.to_string().contains("status"));
    }
}
