//! Wiring facade for the social-graph core.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::config::{ConfigManager, RosterConfig};
use crate::error::Result;
use crate::friend_request::FriendRequestService;
use crate::node::Node;
use crate::relationship::RelationshipService;
use crate::relationship_group::RelationshipGroupService;
use crate::storage::{SocialStore, StoreConfig};
use crate::version::UserVersionService;

/// The assembled social-graph core: one store, one configuration snapshot,
/// and the services wired together (including the lazy cycle between the
/// relationship and relationship-group services).
pub struct SocialGraph {
    /// The store handle.
    pub store: Arc<SocialStore>,
    /// The hot-reloadable configuration.
    pub config: Arc<ConfigManager>,
    /// Cluster-node facade.
    pub node: Arc<Node>,
    /// Version registry.
    pub versions: Arc<UserVersionService>,
    /// Relationship service.
    pub relationships: Arc<RelationshipService>,
    /// Relationship-group service.
    pub relationship_groups: Arc<RelationshipGroupService>,
    /// Friend-request service.
    pub friend_requests: Arc<FriendRequestService>,
}

impl SocialGraph {
    /// Open the store and wire every service.
    pub fn open(store_config: &StoreConfig, config: RosterConfig) -> Result<Self> {
        let store = Arc::new(SocialStore::open(store_config)?);
        let config = Arc::new(ConfigManager::new(config));
        let node = Arc::new(Node::new());
        let versions = Arc::new(UserVersionService::new(Arc::clone(&store)));
        let relationship_groups = Arc::new(RelationshipGroupService::new(
            Arc::clone(&store),
            Arc::clone(&versions),
            Arc::clone(&config),
        ));
        let relationships = Arc::new(RelationshipService::new(
            Arc::clone(&store),
            Arc::clone(&relationship_groups),
        ));
        relationship_groups.bind_relationship_service(&relationships);
        let friend_requests = Arc::new(FriendRequestService::new(
            Arc::clone(&store),
            Arc::clone(&node),
            Arc::clone(&versions),
            Arc::clone(&relationships),
            Arc::clone(&config),
        ));
        Ok(Self {
            store,
            config,
            node,
            versions,
            relationships,
            relationship_groups,
            friend_requests,
        })
    }

    /// Spawn the leader-only expired-request cleanup task.
    pub fn spawn_expired_request_cleanup(&self) -> JoinHandle<()> {
        self.friend_requests.spawn_expired_request_cleanup()
    }
}
