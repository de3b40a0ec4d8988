//! Statement execution over a shared SQLite connection.
//!
//! Every cache operation goes through [`StatementExecutor`]: it locks the shared
//! connection for the duration of one call, prepares (cached) statements, binds
//! parameters and returns affected-row counts or decoded rows.

use crate::error::{CacheError, Result};
use rusqlite::{Connection, OptionalExtension, Params, Row};
use std::sync::{Arc, Mutex, MutexGuard};

/// Executes statements against a caller-owned connection.
///
/// The executor never opens or closes the connection; it only borrows it per call.
#[derive(Debug, Clone)]
pub struct StatementExecutor {
    conn: Arc<Mutex<Connection>>,
}

/// Statement access while the connection lock is held.
pub struct Scope<'c> {
    conn: &'c Connection,
}

impl StatementExecutor {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// The underlying connection handle.
    pub fn connection(&self) -> &Arc<Mutex<Connection>> {
        &self.conn
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| CacheError::Database {
            message: format!("Failed to lock database: {}", e),
            source: None,
        })
    }

    /// Run `f` with the connection locked, outside any transaction.
    pub fn run<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Scope<'_>) -> Result<T>,
    {
        let conn = self.lock()?;
        let scope = Scope { conn: &*conn };
        f(&scope)
    }

    /// Run `f` inside a savepoint; commits on `Ok`, rolls back on `Err`.
    ///
    /// A savepoint nests inside a transaction the caller may already have open.
    pub fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Scope<'_>) -> Result<T>,
    {
        let mut conn = self.lock()?;
        let sp = conn
            .savepoint()
            .map_err(|e| CacheError::database("Failed to begin savepoint", e))?;

        let out = f(&Scope { conn: &*sp })?;

        sp.commit()
            .map_err(|e| CacheError::database("Failed to commit savepoint", e))?;
        Ok(out)
    }

    pub fn execute<P: Params>(&self, sql: &str, params: P) -> Result<usize> {
        self.run(|scope| scope.execute(sql, params))
    }

    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.run(|scope| scope.execute_batch(sql))
    }

    pub fn query_row<T, P, F>(&self, sql: &str, params: P, f: F) -> Result<Option<T>>
    where
        P: Params,
        F: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
    {
        self.run(|scope| scope.query_row(sql, params, f))
    }

    pub fn query_all<T, P, F>(&self, sql: &str, params: P, f: F) -> Result<Vec<T>>
    where
        P: Params,
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        self.run(|scope| scope.query_all(sql, params, f))
    }
}

impl Scope<'_> {
    /// Execute a write statement, returning the number of affected rows.
    pub fn execute<P: Params>(&self, sql: &str, params: P) -> Result<usize> {
        let mut stmt = self
            .conn
            .prepare_cached(sql)
            .map_err(|e| CacheError::database("Failed to prepare statement", e))?;
        let changed = stmt
            .execute(params)
            .map_err(|e| CacheError::database("Failed to execute statement", e))?;
        Ok(changed)
    }

    /// Execute one or more statements without parameters.
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.conn
            .execute_batch(sql)
            .map_err(|e| CacheError::database("Failed to execute batch", e))
    }

    /// Fetch at most one row.
    pub fn query_row<T, P, F>(&self, sql: &str, params: P, f: F) -> Result<Option<T>>
    where
        P: Params,
        F: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
    {
        let mut stmt = self
            .conn
            .prepare_cached(sql)
            .map_err(|e| CacheError::database("Failed to prepare query", e))?;
        let row = stmt
            .query_row(params, f)
            .optional()
            .map_err(|e| CacheError::database("Failed to query row", e))?;
        Ok(row)
    }

    /// Fetch every row.
    pub fn query_all<T, P, F>(&self, sql: &str, params: P, f: F) -> Result<Vec<T>>
    where
        P: Params,
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        let mut stmt = self
            .conn
            .prepare_cached(sql)
            .map_err(|e| CacheError::database("Failed to prepare query", e))?;
        let rows = stmt
            .query_map(params, f)
            .map_err(|e| CacheError::database("Failed to run query", e))?
            .collect::<rusqlite::Result<Vec<T>>>()
            .map_err(|e| CacheError::database("Failed to read rows", e))?;
        Ok(rows)
    }
}
