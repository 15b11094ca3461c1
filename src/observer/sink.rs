//! Log sinks for diagnostic records.

use tracing::{error, warn};

use super::types::{DiagnosticRecord, Severity};

/// Leveled destination for diagnostic records. Emission never fails.
pub trait LogSink: Send + Sync {
    fn emit(&self, record: &DiagnosticRecord);
}

/// Forwards records to `tracing` under the `schema_watch::index` target
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn emit(&self, record: &DiagnosticRecord) {
        let rules = record.matched_rules.join(",");
        match record.level {
            Severity::Warning => warn!(
                target: "schema_watch::index",
                rules = %rules,
                statement = %record.statement,
                "{}",
                record.message
            ),
            Severity::Error => error!(
                target: "schema_watch::index",
                rules = %rules,
                frames = record.call_chain.len(),
                "{}",
                record.message
            ),
        }
    }
}
