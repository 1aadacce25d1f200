//! Persistence layer for the social-graph core.
//!
//! The services treat this module as "the store": synchronous table
//! operations over `&Connection`, composed behind the async [`SocialStore`]
//! handle which owns the connection and the transaction/retry machinery.
//! A [`rusqlite::Transaction`] is the session handle — it dereferences to
//! `Connection`, so one set of table operations serves transactional and
//! plain call sites alike.

pub mod groups;
pub mod relationships;
pub mod requests;
mod schema;
mod store;
pub mod versions;

pub use schema::SCHEMA_VERSION;
pub use store::{DeleteSummary, SocialStore, StoreConfig, UpdateSummary, UpsertOutcome};
