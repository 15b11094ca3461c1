// schema-watch - statement observer for schema index DDL
// Core library

pub mod config;
pub mod engine;
pub mod metrics;
pub mod observability;
pub mod observer;
pub mod startup;

pub use config::WatchConfig;
pub use engine::{EngineError, EngineResult, ExecutionHooks, ObservedPool, StatementObserver};
pub use observer::IndexCreationObserver;
pub use startup::{refresh_schema_cache, StartupReport};
