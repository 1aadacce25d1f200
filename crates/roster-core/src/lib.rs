//! # Roster Core
//!
//! The social-graph core of the Roster instant-messaging backend: friend
//! requests, relationship groups, and the auto-block manager that defends
//! the request path against abusive traffic.
//!
//! ## Guarantees
//!
//! - A friend request's stored status only ever holds a non-projected value;
//!   EXPIRED is computed when data leaves the core, never written back.
//! - Accepting a request is transactional: either the request flips to
//!   ACCEPTED and both relationship rows exist, or nothing changed.
//! - A caller who is not a party to a request cannot learn whether the
//!   request exists.
//! - Group membership moves insert before they delete, so a related user is
//!   never absent from every group of an owner.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────┐
//! │                 SocialGraph                    │
//! ├──────────────────┬──────────────┬──────────────┤
//! │  friend_request  │ relationship │ relationship │
//! │                  │              │    _group    │
//! ├──────────────────┴──────────────┴──────────────┤
//! │        version  │  expiry  │  autoblock        │
//! ├────────────────────────────────────────────────┤
//! │                   storage                      │
//! └────────────────────────────────────────────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, clippy::all)]
#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod autoblock;
pub mod config;
pub mod error;
pub mod expiry;
pub mod friend_request;
pub mod graph;
pub mod node;
pub mod proto;
pub mod relationship;
pub mod relationship_group;
pub mod storage;
pub mod time;
pub mod version;

mod validation;

pub use error::{Error, Result};
pub use graph::SocialGraph;
pub use relationship_group::DEFAULT_GROUP_INDEX;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
