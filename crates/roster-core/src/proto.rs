//! Outbound data-transfer objects.
//!
//! Pure converters from stored records to the payloads handed to the
//! serialisation layer. The expiry projection is applied here, so no stored
//! PENDING-but-overdue request ever leaves the core unprojected.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::expiry;
use crate::friend_request::{FriendRequest, RequestStatus};
use crate::relationship_group::RelationshipGroup;

/// A friend request as presented to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FriendRequestDto {
    /// Request ID.
    pub id: i64,
    /// The proposing user.
    pub requester_id: i64,
    /// The proposed-to user.
    pub recipient_id: i64,
    /// Message attached by the requester.
    pub content: String,
    /// Presented status, expiry projection applied.
    pub status: RequestStatus,
    /// The recipient's response reason, if any.
    pub reason: Option<String>,
    /// Creation date, epoch milliseconds.
    pub creation_date: i64,
    /// Response date; projected for expired requests.
    pub response_date: Option<i64>,
    /// When the request expires, if projection is enabled.
    pub expiration_date: Option<i64>,
}

/// A relationship group as presented to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipGroupDto {
    /// The owning user.
    pub owner_id: i64,
    /// The group index.
    pub group_index: i32,
    /// Display name.
    pub name: String,
    /// Creation date, epoch milliseconds.
    pub creation_date: i64,
}

/// One user's friend requests plus the server version they were read at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FriendRequestsWithVersion {
    /// Server-side last-updated timestamp of the stream.
    pub last_updated_date: i64,
    /// The requests, expiry projection applied.
    pub requests: Vec<FriendRequestDto>,
}

/// One user's relationship groups plus the server version they were read at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipGroupsWithVersion {
    /// Server-side last-updated timestamp of the stream.
    pub last_updated_date: i64,
    /// The groups.
    pub groups: Vec<RelationshipGroupDto>,
}

/// Convert a stored request for presentation, applying the expiry
/// projection against `now`.
pub fn friend_request_to_dto(
    request: &FriendRequest,
    expire_after_seconds: i64,
    now: i64,
) -> FriendRequestDto {
    let mut projected = request.clone();
    expiry::project(&mut projected, expire_after_seconds, now);
    FriendRequestDto {
        id: projected.id,
        requester_id: projected.requester_id,
        recipient_id: projected.recipient_id,
        content: projected.content,
        status: projected.status,
        reason: projected.reason,
        creation_date: projected.creation_date,
        response_date: projected.response_date,
        expiration_date: (expire_after_seconds > 0)
            .then(|| projected.creation_date + expire_after_seconds * 1_000),
    }
}

/// Convert a stored group for presentation.
pub fn relationship_group_to_dto(group: &RelationshipGroup) -> RelationshipGroupDto {
    RelationshipGroupDto {
        owner_id: group.owner_id,
        group_index: group.group_index,
        name: group.name.clone(),
        creation_date: group.creation_date,
    }
}

impl FriendRequestsWithVersion {
    /// Serialise for the wire.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| Error::Encoding(e.to_string()))
    }

    /// Deserialise from the wire.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| Error::Encoding(e.to_string()))
    }
}

impl RelationshipGroupsWithVersion {
    /// Serialise for the wire.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| Error::Encoding(e.to_string()))
    }

    /// Deserialise from the wire.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| Error::Encoding(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(creation_date: i64) -> FriendRequest {
        FriendRequest {
            id: 10,
            content: "hello".to_string(),
            status: RequestStatus::Pending,
            reason: None,
            creation_date,
            response_date: None,
            requester_id: 1,
            recipient_id: 2,
        }
    }

    #[test]
    fn test_conversion_applies_projection() {
        let now = 50_000_000;
        let dto = friend_request_to_dto(&request(now - 4_000_000), 3_600, now);
        assert_eq!(dto.status, RequestStatus::Expired);
        assert_eq!(dto.response_date, Some(now - 4_000_000 + 3_600_000));
        assert_eq!(dto.expiration_date, Some(now - 4_000_000 + 3_600_000));
    }

    #[test]
    fn test_conversion_without_window() {
        let now = 50_000_000;
        let dto = friend_request_to_dto(&request(now - 4_000_000), 0, now);
        assert_eq!(dto.status, RequestStatus::Pending);
        assert_eq!(dto.expiration_date, None);
    }

    #[test]
    fn test_wire_round_trip() {
        let now = 50_000_000;
        let payload = FriendRequestsWithVersion {
            last_updated_date: now,
            requests: vec![friend_request_to_dto(&request(now - 1_000), 3_600, now)],
        };
        let bytes = payload.to_bytes().expect("serialise");
        let decoded = FriendRequestsWithVersion::from_bytes(&bytes).expect("deserialise");
        assert_eq!(decoded, payload);
    }
}
