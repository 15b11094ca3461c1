// SPDX-License-Identifier: Apache-2.0

//! Startup Schema Refresh
//!
//! Runs once when the process comes up:
//! 1. Installs the index-creation observer (idempotent)
//! 2. Reflects table metadata
//! 3. Skips automatic schema sync; migrations own the schema
//! 4. Verifies the column set of expected tables
//!
//! Nothing here is fatal. Inspection problems are logged and startup goes on.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{ExpectedTable, WatchConfig};
use crate::engine::executor::ObservedPool;
use crate::engine::hooks::{ExecutionHooks, StatementObserver};
use crate::engine::inspector::SchemaInspector;
use crate::observer::index_watch::{IndexCreationObserver, OBSERVER_KEY};

/// Outcome of a startup refresh
#[derive(Debug, Clone, Serialize)]
pub struct StartupReport {
    /// True only when this call installed the observer
    pub observer_installed: bool,
    /// Number of tables found, `None` if reflection failed
    pub tables_reflected: Option<usize>,
    /// Expected tables that exist but lack required columns
    pub missing_columns: BTreeMap<String, Vec<String>>,
    /// Checks that could not run, with the reason
    pub skipped_checks: Vec<String>,
    pub refreshed_at: DateTime<Utc>,
}

/// Installs the observer built by `make` on `hooks` unless it is already there
pub fn install_index_logging<F>(hooks: &ExecutionHooks, make: F) -> bool
where
    F: FnOnce() -> IndexCreationObserver,
{
    hooks.register_once(OBSERVER_KEY, || Arc::new(make()) as Arc<dyn StatementObserver>)
}

/// Startup refresh with the observer described by `config`
pub async fn refresh_schema_cache(
    pool: &ObservedPool,
    inspector: &dyn SchemaInspector,
    config: &WatchConfig,
) -> StartupReport {
    refresh_schema_cache_with(pool, inspector, config, || {
        IndexCreationObserver::from_config(config)
    })
    .await
}

/// Startup refresh with a caller-built observer
pub async fn refresh_schema_cache_with<F>(
    pool: &ObservedPool,
    inspector: &dyn SchemaInspector,
    config: &WatchConfig,
    make_observer: F,
) -> StartupReport
where
    F: FnOnce() -> IndexCreationObserver,
{
    let observer_installed = if config.enabled {
        let installed = install_index_logging(pool.hooks(), make_observer);
        if installed {
            info!("Index creation logging installed");
        }
        installed
    } else {
        info!("Index creation logging disabled by configuration");
        false
    };

    let mut report = StartupReport {
        observer_installed,
        tables_reflected: None,
        missing_columns: BTreeMap::new(),
        skipped_checks: Vec::new(),
        refreshed_at: Utc::now(),
    };

    let tables = match inspector.table_names().await {
        Ok(tables) => {
            debug!("Reflected {} tables", tables.len());
            report.tables_reflected = Some(tables.len());
            Some(tables)
        }
        Err(e) => {
            warn!("Metadata reflection failed: {}", e);
            None
        }
    };

    info!("Skipping automatic schema sync; the schema is created by migrations");

    match tables {
        Some(tables) => {
            for expected in &config.expected_tables {
                if !tables.contains(&expected.name) {
                    debug!("Expected table '{}' not present, skipping", expected.name);
                    continue;
                }
                verify_table(inspector, expected, &mut report).await;
            }
        }
        None => {
            for expected in &config.expected_tables {
                info!("Column check for '{}' skipped: inspector unavailable", expected.name);
                report
                    .skipped_checks
                    .push(format!("{}: inspector unavailable", expected.name));
            }
        }
    }

    info!("Schema model cache refreshed");
    report
}

async fn verify_table(
    inspector: &dyn SchemaInspector,
    expected: &ExpectedTable,
    report: &mut StartupReport,
) {
    let columns = match inspector.column_names(&expected.name).await {
        Ok(columns) => columns,
        Err(e) => {
            info!("Column check for '{}' skipped: {}", expected.name, e);
            report
                .skipped_checks
                .push(format!("{}: {}", expected.name, e));
            return;
        }
    };

    let missing: Vec<String> = expected
        .columns
        .iter()
        .filter(|c| !columns.contains(c))
        .cloned()
        .collect();

    if missing.is_empty() {
        info!("Table '{}' structure verified", expected.name);
    } else {
        warn!("Table '{}' is missing columns: {:?}", expected.name, missing);
        report.missing_columns.insert(expected.name.clone(), missing);
    }
}
