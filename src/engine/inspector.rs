// SPDX-License-Identifier: Apache-2.0

//! Schema Inspector
//!
//! Read-only table and column listing. The SQLite implementation goes through
//! the observed pool, so reflection queries are visible to observers too.

use async_trait::async_trait;

use super::error::{EngineError, EngineResult};
use super::executor::ObservedPool;
use super::types::Value;

#[async_trait]
pub trait SchemaInspector: Send + Sync {
    /// User tables, sorted by name
    async fn table_names(&self) -> EngineResult<Vec<String>>;

    /// Column names of `table` in declaration order; empty if the table does not exist
    async fn column_names(&self, table: &str) -> EngineResult<Vec<String>>;
}

pub struct SqliteInspector {
    pool: ObservedPool,
}

impl SqliteInspector {
    pub fn new(pool: ObservedPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SchemaInspector for SqliteInspector {
    async fn table_names(&self) -> EngineResult<Vec<String>> {
        let query = r#"
            SELECT name
            FROM sqlite_master
            WHERE type = 'table'
            AND name NOT LIKE 'sqlite_%'
            ORDER BY name
        "#;

        self.pool
            .fetch_strings(query, Vec::new())
            .await
            .map_err(|e| EngineError::inspection(e.to_string()))
    }

    async fn column_names(&self, table: &str) -> EngineResult<Vec<String>> {
        let query = "SELECT name FROM pragma_table_info(?1) ORDER BY cid";

        self.pool
            .fetch_strings(query, vec![Value::Text(table.to_string())])
            .await
            .map_err(|e| EngineError::inspection(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::hooks::ExecutionHooks;
    use crate::engine::types::ConnectionConfig;
    use std::sync::Arc;

    async fn memory_pool() -> ObservedPool {
        ObservedPool::connect(&ConnectionConfig::in_memory(), Arc::new(ExecutionHooks::new()))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_lists_tables_and_columns() {
        let pool = memory_pool().await;
        pool.execute("CREATE TABLE accounts (id INTEGER PRIMARY KEY, email TEXT, created_at TEXT)")
            .await
            .unwrap();
        pool.execute("CREATE TABLE apps (id INTEGER PRIMARY KEY)")
            .await
            .unwrap();

        let inspector = SqliteInspector::new(pool.clone());
        assert_eq!(
            inspector.table_names().await.unwrap(),
            vec!["accounts".to_string(), "apps".to_string()]
        );
        assert_eq!(
            inspector.column_names("accounts").await.unwrap(),
            vec!["id".to_string(), "email".to_string(), "created_at".to_string()]
        );
        assert!(inspector.column_names("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_closed_pool_reports_inspection_error() {
        let pool = memory_pool().await;
        let inspector = SqliteInspector::new(pool.clone());
        pool.close().await;

        assert!(matches!(
            inspector.table_names().await,
            Err(EngineError::InspectionError { .. })
        ));
    }
}
