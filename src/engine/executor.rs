// SPDX-License-Identifier: Apache-2.0

//! Observed Pool
//!
//! A SQLx SQLite pool whose statements all pass through the execution hooks
//! before they reach the database. Hooks observe; they never change whether
//! or how the statement runs.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use sqlx::sqlite::{
    Sqlite, SqliteArguments, SqliteConnectOptions, SqliteJournalMode, SqlitePool,
    SqlitePoolOptions,
};
use sqlx::Row;
use tracing::{debug, info};

use super::error::{EngineError, EngineResult};
use super::hooks::ExecutionHooks;
use super::types::{ConnectionConfig, SessionId, Value};
use crate::observer::types::{ExecutionContext, StatementEvent};

const DRIVER_ID: &str = "sqlite";

#[derive(Clone)]
pub struct ObservedPool {
    pool: SqlitePool,
    hooks: Arc<ExecutionHooks>,
    session_id: SessionId,
    database: String,
}

impl ObservedPool {
    /// Opens the pool and checks it with `SELECT 1` (not dispatched to hooks)
    pub async fn connect(
        config: &ConnectionConfig,
        hooks: Arc<ExecutionHooks>,
    ) -> EngineResult<Self> {
        let opts = Self::build_connect_options(config);

        let mut pool_opts = SqlitePoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs));
        if config.is_memory() {
            // Every new connection would open a fresh empty database
            pool_opts = pool_opts.idle_timeout(None).max_lifetime(None);
        }

        let pool = pool_opts
            .connect_with(opts)
            .await
            .map_err(|e| EngineError::connection_failed(e.to_string()))?;

        sqlx::query("SELECT 1")
            .execute(&pool)
            .await
            .map_err(|e| EngineError::execution_error(e.to_string()))?;

        let session_id = SessionId::new();
        info!(session = %session_id.0, database = %config.path, "Observed pool connected");

        Ok(Self {
            pool,
            hooks,
            session_id,
            database: config.path.clone(),
        })
    }

    fn build_connect_options(config: &ConnectionConfig) -> SqliteConnectOptions {
        let conn_str = if config.is_memory() {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite:{}", config.path)
        };

        let opts = SqliteConnectOptions::from_str(&conn_str)
            .unwrap_or_else(|_| SqliteConnectOptions::new().filename(&config.path))
            .busy_timeout(Duration::from_secs(30));

        if config.is_memory() {
            opts
        } else {
            opts.create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
        }
    }

    pub fn hooks(&self) -> &Arc<ExecutionHooks> {
        &self.hooks
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    fn context(&self) -> ExecutionContext {
        ExecutionContext {
            session_id: self.session_id,
            driver_id: DRIVER_ID.to_string(),
            database: Some(self.database.clone()),
        }
    }

    /// Executes a statement without parameters, returning rows affected
    pub async fn execute(&self, sql: &str) -> EngineResult<u64> {
        self.execute_with(sql, Vec::new()).await
    }

    /// Executes a statement with positional parameters, returning rows affected
    pub async fn execute_with(&self, sql: &str, params: Vec<Value>) -> EngineResult<u64> {
        self.hooks
            .dispatch(&StatementEvent::new(sql, self.context()).with_params(params.clone()));

        let mut query = sqlx::query(sql);
        for value in &params {
            query = Self::bind_param(query, value);
        }

        let result = query
            .execute(&self.pool)
            .await
            .map_err(|e| EngineError::execution_error(e.to_string()))?;
        Ok(result.rows_affected())
    }

    /// Executes one statement for each parameter row inside a transaction.
    ///
    /// Hooks see a single batch event for the whole call.
    pub async fn execute_many(&self, sql: &str, rows: Vec<Vec<Value>>) -> EngineResult<u64> {
        self.hooks
            .dispatch(&StatementEvent::new(sql, self.context()).with_batch(rows.clone()));

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| EngineError::execution_error(e.to_string()))?;

        let mut affected = 0;
        for row in &rows {
            let mut query = sqlx::query(sql);
            for value in row {
                query = Self::bind_param(query, value);
            }
            affected += query
                .execute(&mut *tx)
                .await
                .map_err(|e| EngineError::execution_error(e.to_string()))?
                .rows_affected();
        }

        tx.commit()
            .await
            .map_err(|e| EngineError::execution_error(e.to_string()))?;

        debug!("Batch of {} rows executed", rows.len());
        Ok(affected)
    }

    /// Runs a query and returns the first column of every row as text
    pub async fn fetch_strings(
        &self,
        sql: &str,
        params: Vec<Value>,
    ) -> EngineResult<Vec<String>> {
        self.hooks
            .dispatch(&StatementEvent::new(sql, self.context()).with_params(params.clone()));

        let mut query = sqlx::query(sql);
        for value in &params {
            query = Self::bind_param(query, value);
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| EngineError::execution_error(e.to_string()))?;

        rows.iter()
            .map(|row| {
                row.try_get::<String, _>(0)
                    .map_err(|e| EngineError::execution_error(e.to_string()))
            })
            .collect()
    }

    /// Helper to bind a Value to a SQLite query
    fn bind_param<'q>(
        query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
        value: &'q Value,
    ) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
        match value {
            Value::Null => query.bind(Option::<String>::None),
            Value::Bool(b) => query.bind(b),
            Value::Int(i) => query.bind(i),
            Value::Float(f) => query.bind(f),
            Value::Text(s) => query.bind(s.as_str()),
            Value::Json(j) => query.bind(j.to_string()),
        }
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
