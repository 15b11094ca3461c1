// Data access layer
// SQLite pool with a "before execute" hook point and schema inspection

pub mod error;
pub mod executor;
pub mod hooks;
pub mod inspector;
pub mod types;

pub use error::{EngineError, EngineResult};
pub use executor::ObservedPool;
pub use hooks::{ExecutionHooks, StatementObserver};
pub use inspector::{SchemaInspector, SqliteInspector};
pub use types::*;
