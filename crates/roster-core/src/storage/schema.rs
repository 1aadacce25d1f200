//! Database schema definitions.

/// Schema version for migrations.
pub const SCHEMA_VERSION: u32 = 1;

/// SQL to create the social-graph schema.
pub const CREATE_SCHEMA: &str = r#"
-- Friend requests. EXPIRED is never written by the services; it is a
-- read-time projection over PENDING rows.
CREATE TABLE IF NOT EXISTS friend_requests (
    id INTEGER PRIMARY KEY,
    content TEXT NOT NULL DEFAULT '',
    status TEXT NOT NULL DEFAULT 'PENDING',
    reason TEXT,
    creation_date INTEGER NOT NULL,
    response_date INTEGER,
    requester_id INTEGER NOT NULL,
    recipient_id INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_friend_requests_recipient ON friend_requests(recipient_id);
CREATE INDEX IF NOT EXISTS idx_friend_requests_requester ON friend_requests(requester_id);
CREATE INDEX IF NOT EXISTS idx_friend_requests_creation ON friend_requests(creation_date);

-- Directed one-sided relationships. A row with block_date set means the
-- owner has blocked the related user.
CREATE TABLE IF NOT EXISTS user_relationships (
    owner_id INTEGER NOT NULL,
    related_user_id INTEGER NOT NULL,
    block_date INTEGER,
    establishment_date INTEGER NOT NULL,
    PRIMARY KEY (owner_id, related_user_id)
);

-- User-owned relationship groups. Index 0 is the default group of every
-- owner and cannot be deleted.
CREATE TABLE IF NOT EXISTS relationship_groups (
    owner_id INTEGER NOT NULL,
    group_index INTEGER NOT NULL,
    name TEXT NOT NULL DEFAULT '',
    creation_date INTEGER NOT NULL,
    PRIMARY KEY (owner_id, group_index)
);

-- Group membership. The same related user may appear in several groups of
-- one owner.
CREATE TABLE IF NOT EXISTS relationship_group_members (
    owner_id INTEGER NOT NULL,
    group_index INTEGER NOT NULL,
    related_user_id INTEGER NOT NULL,
    join_date INTEGER NOT NULL,
    PRIMARY KEY (owner_id, group_index, related_user_id)
);

CREATE INDEX IF NOT EXISTS idx_group_members_related
    ON relationship_group_members(owner_id, related_user_id);

-- Per-user, per-stream last-updated timestamps for incremental sync.
CREATE TABLE IF NOT EXISTS user_versions (
    owner_id INTEGER NOT NULL,
    stream TEXT NOT NULL,
    updated_at INTEGER NOT NULL,
    PRIMARY KEY (owner_id, stream)
);
"#;
