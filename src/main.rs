// SPDX-License-Identifier: Apache-2.0

use std::process::ExitCode;
use std::sync::Arc;

use schema_watch::config::{data_directory, WatchConfig};
use schema_watch::engine::{ConnectionConfig, ExecutionHooks, ObservedPool, SqliteInspector};
use schema_watch::{metrics, observability, startup};
use tracing::error;

const USAGE: &str = "usage: schema-watch <database> [statement ...]";

#[tokio::main]
async fn main() -> ExitCode {
    let mut args = std::env::args().skip(1);
    let Some(database) = args.next() else {
        eprintln!("{}", USAGE);
        return ExitCode::from(2);
    };
    let statements: Vec<String> = args.collect();

    let data_dir = data_directory();
    let _guard = observability::init_tracing(&observability::log_directory(&data_dir));

    let config = match WatchConfig::load(&data_dir) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let hooks = Arc::new(ExecutionHooks::new());
    let pool = match ObservedPool::connect(&ConnectionConfig::new(database), hooks).await {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let inspector = SqliteInspector::new(pool.clone());
    let report = startup::refresh_schema_cache(&pool, &inspector, &config).await;

    let mut failed = false;
    for statement in &statements {
        if let Err(e) = pool.execute(statement).await {
            error!("Statement failed: {}", e);
            eprintln!("{}", e);
            failed = true;
        }
    }
    pool.close().await;

    let summary = serde_json::json!({
        "startup": report,
        "metrics": metrics::snapshot(),
    });
    match serde_json::to_string_pretty(&summary) {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("Failed to render summary: {}", e),
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
