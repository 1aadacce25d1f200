//! The store handle: connection ownership, transactions, retry policy.
//!
//! Table operations are synchronous functions over `&Connection` in the
//! sibling modules. A [`rusqlite::Transaction`] dereferences to `Connection`,
//! so the same functions run inside and outside a transaction; the
//! transaction value is the session handle that transactional call chains
//! thread through.

use std::fmt::Display;
use std::time::Duration;

use rusqlite::{Connection, OpenFlags, Transaction};
use tokio::sync::Mutex;
use tracing::debug;

use super::schema::CREATE_SCHEMA;
use crate::error::{Error, Result};

/// Bounded retry schedule for transient transaction failures.
const TRANSACTION_MAX_RETRIES: u32 = 3;
/// Base delay of the retry schedule; attempt `n` waits `n` times this.
const TRANSACTION_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Path to the database file.
    pub path: String,
    /// Whether to use an in-memory database (for testing).
    pub in_memory: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: "roster.db".to_string(),
            in_memory: false,
        }
    }
}

impl StoreConfig {
    /// An in-memory store, private to one handle.
    pub fn in_memory() -> Self {
        Self {
            path: String::new(),
            in_memory: true,
        }
    }
}

/// Handle to the social-graph store.
///
/// Every access suspends on the connection lock, which is the suspension
/// point the concurrency model promises at store I/O boundaries.
pub struct SocialStore {
    conn: Mutex<Connection>,
}

impl SocialStore {
    /// Open or create the store and initialise its schema.
    pub fn open(config: &StoreConfig) -> Result<Self> {
        let conn = if config.in_memory {
            Connection::open_in_memory()
        } else {
            Connection::open_with_flags(
                &config.path,
                OpenFlags::SQLITE_OPEN_READ_WRITE
                    | OpenFlags::SQLITE_OPEN_CREATE
                    | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )
        }
        .map_err(|e| Error::Storage(format!("failed to open the store: {e}")))?;

        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
            "#,
        )
        .map_err(|e| Error::Storage(format!("failed to set pragmas: {e}")))?;

        conn.execute_batch(CREATE_SCHEMA)
            .map_err(|e| Error::Storage(format!("failed to create the schema: {e}")))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run `f` against the connection outside any transaction.
    pub async fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.conn.lock().await;
        f(&conn)
    }

    /// Run `f` inside a transaction, committing on success and rolling back
    /// on error. Transient failures rerun the whole closure on a fixed
    /// bounded backoff schedule, so `f` must be safe to re-execute.
    pub async fn in_transaction<T>(
        &self,
        mut f: impl FnMut(&Transaction<'_>) -> Result<T>,
    ) -> Result<T> {
        let mut attempt = 0u32;
        loop {
            let result = {
                let mut conn = self.conn.lock().await;
                run_transaction(&mut conn, &mut f)
            };
            match result {
                Err(Error::TransientTransaction(detail)) if attempt < TRANSACTION_MAX_RETRIES => {
                    attempt += 1;
                    debug!(attempt, detail, "retrying a transient transaction failure");
                    tokio::time::sleep(TRANSACTION_RETRY_DELAY * attempt).await;
                }
                other => return other,
            }
        }
    }
}

fn run_transaction<T>(
    conn: &mut Connection,
    f: &mut impl FnMut(&Transaction<'_>) -> Result<T>,
) -> Result<T> {
    let txn = conn.transaction()?;
    let value = f(&txn)?;
    txn.commit()?;
    Ok(value)
}

/// Outcome of a conditional or batched update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateSummary {
    /// Rows matched by the filter.
    pub matched: u64,
    /// Rows actually modified.
    pub modified: u64,
}

impl UpdateSummary {
    /// An acknowledged update that touched nothing (empty field set).
    pub fn acknowledged() -> Self {
        Self::default()
    }

    pub(crate) fn of(changed: usize) -> Self {
        Self {
            matched: changed as u64,
            modified: changed as u64,
        }
    }
}

/// Outcome of a delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteSummary {
    /// Rows deleted.
    pub deleted: u64,
}

impl DeleteSummary {
    pub(crate) fn of(changed: usize) -> Self {
        Self {
            deleted: changed as u64,
        }
    }

    /// Combine the outcomes of fanned-out deletes.
    pub fn merge(self, other: DeleteSummary) -> Self {
        Self {
            deleted: self.deleted + other.deleted,
        }
    }
}

/// Outcome of a member upsert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertOutcome {
    /// A new row was inserted.
    pub inserted: bool,
    /// An existing row was rewritten.
    pub modified: bool,
}

impl UpsertOutcome {
    /// Whether the upsert changed the table at all.
    pub fn changed(&self) -> bool {
        self.inserted || self.modified
    }
}

/// Join numeric IDs for an `IN (...)` clause. Only ever used with integers,
/// which cannot carry injection.
pub(crate) fn sql_id_list<T: Display>(ids: &[T]) -> String {
    let mut out = String::new();
    for (i, id) in ids.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&id.to_string());
    }
    out
}
