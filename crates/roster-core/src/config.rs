//! Hot-reloadable configuration for the social-graph core.
//!
//! All services read a process-wide snapshot through [`ConfigManager::load`],
//! which is a single atomic read of the current `Arc`. Property reloads
//! replace the whole snapshot at once with [`ConfigManager::store`]; an
//! in-flight operation keeps the snapshot it started with.

use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

/// Friend-request behaviour knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FriendRequestConfig {
    /// Maximum friend-request content length in characters; `<= 0` means
    /// unbounded.
    pub max_content_length: i32,
    /// Maximum response-reason length in characters; `<= 0` means unbounded.
    pub max_response_reason_length: i32,
    /// When false, an existing DECLINED, IGNORED, or EXPIRED request also
    /// prohibits sending a new one; when true, only a PENDING request does.
    pub allow_send_request_after_declined_or_ignored_or_expired: bool,
    /// Whether the sender may recall a pending friend request.
    pub allow_recall_pending_friend_request_by_sender: bool,
    /// Whether the periodic cleanup deletes expired requests from the store.
    pub delete_expired_requests_when_cron_triggered: bool,
    /// Period of the expired-request cleanup task in seconds.
    pub expired_requests_cleanup_interval_secs: u64,
    /// Window after which a pending request reads as EXPIRED, in seconds;
    /// `<= 0` disables expiry projection entirely.
    pub expire_after_seconds: i64,
}

impl Default for FriendRequestConfig {
    fn default() -> Self {
        Self {
            max_content_length: 200,
            max_response_reason_length: 200,
            allow_send_request_after_declined_or_ignored_or_expired: false,
            allow_recall_pending_friend_request_by_sender: false,
            delete_expired_requests_when_cron_triggered: false,
            expired_requests_cleanup_interval_secs: 3_600,
            expire_after_seconds: 30 * 24 * 3_600,
        }
    }
}

impl FriendRequestConfig {
    /// The content length limit, or `None` when unbounded.
    pub fn content_limit(&self) -> Option<usize> {
        (self.max_content_length > 0).then_some(self.max_content_length as usize)
    }

    /// The response-reason length limit, or `None` when unbounded.
    pub fn reason_limit(&self) -> Option<usize> {
        (self.max_response_reason_length > 0).then_some(self.max_response_reason_length as usize)
    }
}

/// Relationship-group behaviour knobs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelationshipGroupConfig {
    /// When a related user is removed from their last non-default group,
    /// delete the relationship itself instead of moving the user to the
    /// default group.
    pub delete_relationship_when_removed_from_all_groups: bool,
}

/// One escalation level of the auto-block manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockLevel {
    /// How long a client entering this level stays blocked, in seconds.
    pub block_duration_seconds: u64,
    /// Trigger count at which a blocked client advances to the next level.
    pub go_next_level_trigger_times: u32,
    /// Every elapsed interval of this many milliseconds forgives one
    /// trigger; `0` disables decay.
    pub reduce_one_trigger_time_interval_millis: u64,
}

impl Default for BlockLevel {
    fn default() -> Self {
        Self {
            block_duration_seconds: 600,
            go_next_level_trigger_times: 1,
            reduce_one_trigger_time_interval_millis: 60_000,
        }
    }
}

/// Auto-block manager configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoBlockConfig {
    /// Master switch. A disabled manager is inert.
    pub enabled: bool,
    /// Trigger count at which an unblocked client enters level 0.
    pub block_trigger_times: u32,
    /// Escalation levels, ordered from mildest to harshest.
    pub block_levels: Vec<BlockLevel>,
}

impl Default for AutoBlockConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            block_trigger_times: 5,
            block_levels: vec![
                BlockLevel {
                    block_duration_seconds: 600,
                    ..BlockLevel::default()
                },
                BlockLevel {
                    block_duration_seconds: 1_800,
                    ..BlockLevel::default()
                },
                BlockLevel {
                    block_duration_seconds: 3_600,
                    ..BlockLevel::default()
                },
            ],
        }
    }
}

/// The process-wide configuration snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RosterConfig {
    /// Friend-request service settings.
    pub friend_request: FriendRequestConfig,
    /// Relationship-group service settings.
    pub relationship_group: RelationshipGroupConfig,
    /// Auto-block manager settings.
    pub auto_block: AutoBlockConfig,
}

/// Holder of the current configuration snapshot.
pub struct ConfigManager {
    current: RwLock<Arc<RosterConfig>>,
}

impl ConfigManager {
    /// Wrap an initial snapshot.
    pub fn new(config: RosterConfig) -> Self {
        Self {
            current: RwLock::new(Arc::new(config)),
        }
    }

    /// The current snapshot. Cheap; clones an `Arc`.
    pub fn load(&self) -> Arc<RosterConfig> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the snapshot atomically (property-reload notification).
    pub fn store(&self, config: RosterConfig) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(config);
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new(RosterConfig::default())
    }
}
