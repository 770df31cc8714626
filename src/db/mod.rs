//! Database module providing the connection, transactions and the problem-patterns cache.
//!
//! Query functions live in one file per table and take the connection as their
//! first argument.

pub mod cache;
pub mod errors;
pub mod legacy_scenarios;
pub mod migrations;
pub mod problems;
pub mod scenarios;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, Row};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::{AppError, AppResult};

pub use cache::{CacheStats, ProblemPatternsCache};
pub use errors::{ErrorFilter, ErrorRow};

type AfterCommitHook = Box<dyn FnOnce() + Send>;

/// An open transaction of `DbPool::transaction`.
pub struct Transaction<'conn> {
    tx: rusqlite::Transaction<'conn>,
    problem_patterns_cache: ProblemPatternsCache,
    after_commit: Vec<AfterCommitHook>,
}

impl Transaction<'_> {
    /// Connection seeing the uncommitted changes of this transaction.
    pub fn connection(&self) -> &Connection {
        &self.tx
    }

    /// Run `hook` once the transaction is committed. Dropped on rollback.
    pub fn after_commit(&mut self, hook: impl FnOnce() + Send + 'static) {
        self.after_commit.push(Box::new(hook));
    }

    /// Evict the cached problem patterns of `error_ids` once committed.
    pub fn evict_problem_patterns_after_commit(&mut self, error_ids: Vec<i64>) {
        if error_ids.is_empty() {
            return;
        }
        let cache = self.problem_patterns_cache.clone();
        self.after_commit(move || cache.evict(&error_ids));
    }

    /// Pattern ids associated with an error, including uncommitted changes.
    ///
    /// Bypasses the cache, which only holds committed associations.
    pub fn problem_pattern_ids_of_error(&self, error_id: i64) -> AppResult<Vec<i64>> {
        problems::pattern_ids_of_error(&self.tx, error_id)
    }
}

/// Clears the transaction owner when the transaction ends, even by panic.
struct OwnerGuard<'a>(&'a Mutex<Option<ThreadId>>);

impl Drop for OwnerGuard<'_> {
    fn drop(&mut self) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

/// Database connection wrapper.
/// Uses a Mutex since rusqlite Connection is not thread-safe.
#[derive(Clone)]
pub struct DbPool {
    conn: Arc<Mutex<Connection>>,
    /// Thread running a transaction, if any
    transaction_owner: Arc<Mutex<Option<ThreadId>>>,
    problem_patterns_cache: ProblemPatternsCache,
}

impl DbPool {
    /// Open an in-memory database with the schema applied.
    pub fn new() -> AppResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AppError::Database(format!("Failed to open database: {}", e)))?;

        // LIKE patterns are matched case-sensitively
        conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA case_sensitive_like = ON;")
            .map_err(|e| AppError::Database(format!("Failed to set pragma: {}", e)))?;
        migrations::run_migrations(&conn)?;

        Ok(DbPool {
            conn: Arc::new(Mutex::new(conn)),
            transaction_owner: Arc::new(Mutex::new(None)),
            problem_patterns_cache: ProblemPatternsCache::default(),
        })
    }

    fn owned_by_current_thread(&self) -> bool {
        *self
            .transaction_owner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            == Some(thread::current().id())
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, Connection>> {
        if self.owned_by_current_thread() {
            return Err(AppError::Database(
                "the store is used by a transaction of this thread; use the transaction instead"
                    .to_string(),
            ));
        }
        self.conn
            .lock()
            .map_err(|_| AppError::Database("Database mutex poisoned".to_string()))
    }

    /// Run a query against the committed data.
    pub fn read<T>(&self, query: impl FnOnce(&Connection) -> AppResult<T>) -> AppResult<T> {
        let conn = self.lock()?;
        query(&*conn)
    }

    /// Run `work` in a database transaction.
    ///
    /// On `Ok` the transaction is committed, the connection released, then the
    /// after-commit hooks run in registration order. On `Err` it is rolled back
    /// and the hooks are dropped. Going through the pool from `work` fails
    /// instead of waiting on the connection held by `work`.
    pub fn transaction<T>(
        &self,
        work: impl FnOnce(&mut Transaction<'_>) -> AppResult<T>,
    ) -> AppResult<T> {
        let mut conn = self.lock()?;
        let (value, hooks) = {
            *self
                .transaction_owner
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = Some(thread::current().id());
            let _owner = OwnerGuard(&self.transaction_owner);
            self.run_transaction(&mut conn, work)?
        };
        drop(conn);

        debug!("Committed transaction, running {} hooks", hooks.len());
        for hook in hooks {
            hook();
        }
        Ok(value)
    }

    fn run_transaction<T>(
        &self,
        conn: &mut Connection,
        work: impl FnOnce(&mut Transaction<'_>) -> AppResult<T>,
    ) -> AppResult<(T, Vec<AfterCommitHook>)> {
        let mut tx = Transaction {
            tx: conn.transaction()?,
            problem_patterns_cache: self.problem_patterns_cache.clone(),
            after_commit: Vec::new(),
        };

        match work(&mut tx) {
            Ok(value) => {
                let Transaction {
                    tx, after_commit, ..
                } = tx;
                tx.commit()
                    .map_err(|e| AppError::Database(format!("Failed to commit: {}", e)))?;
                Ok((value, after_commit))
            }
            Err(e) => {
                if let Err(rollback_error) = tx.tx.rollback() {
                    warn!("Failed to roll back transaction: {}", rollback_error);
                }
                warn!("Rolled back transaction: {}", e);
                Err(e)
            }
        }
    }

    pub fn problem_patterns_cache(&self) -> &ProblemPatternsCache {
        &self.problem_patterns_cache
    }

    /// Pattern ids associated with an error, read through the cache.
    pub fn problem_pattern_ids_of_error(&self, error_id: i64) -> AppResult<Vec<i64>> {
        let conn = self.lock()?;
        if let Some(pattern_ids) = self.problem_patterns_cache.get(error_id) {
            return Ok(pattern_ids);
        }
        let pattern_ids = problems::pattern_ids_of_error(&conn, error_id)?;
        self.problem_patterns_cache.put(error_id, pattern_ids.clone());
        Ok(pattern_ids)
    }
}

/// Timestamps are stored as RFC 3339 text.
pub(crate) fn to_db_date(date: Option<DateTime<Utc>>) -> Option<String> {
    date.map(|date| date.to_rfc3339())
}

pub(crate) fn date_column(row: &Row<'_>, index: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let value: Option<String> = row.get(index)?;
    value
        .map(|value| {
            DateTime::parse_from_rfc3339(&value)
                .map(|date| date.with_timezone(&Utc))
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(e)))
        })
        .transpose()
}

pub(crate) fn json_column<T: DeserializeOwned>(row: &Row<'_>, index: usize) -> rusqlite::Result<T> {
    let value: String = row.get(index)?;
    serde_json::from_str(&value)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(e)))
}

/// True when `err` is a primary key or unique constraint failure.
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                || failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

/// Map a failed insert to `NotUnique` when it collided with an existing row.
pub(crate) fn insert_error(err: rusqlite::Error, what: impl FnOnce() -> String) -> AppError {
    if is_unique_violation(&err) {
        AppError::NotUnique(what())
    } else {
        AppError::Database(err.to_string())
    }
}

/// `?, ?, ?` with one placeholder per value.
pub(crate) fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}
