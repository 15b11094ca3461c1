//! Observer Types
//!
//! Type definitions shared by the statement hooks and the index-creation observer.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::engine::types::{SessionId, Value};
use crate::observability::Sensitive;

/// Severity attached to a match rule and to the records it produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

impl Default for Severity {
    fn default() -> Self {
        Self::Warning
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A substring to look for in statement text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRule {
    /// Stable identifier, reported with every record the rule triggers
    pub id: String,
    /// Text searched for, case-insensitively
    pub pattern: String,
    /// Error-severity rules mark the statements that get the full stack dump
    #[serde(default)]
    pub severity: Severity,
}

impl MatchRule {
    pub fn new(id: impl Into<String>, pattern: impl Into<String>, severity: Severity) -> Self {
        Self {
            id: id.into(),
            pattern: pattern.into(),
            severity,
        }
    }
}

/// One level of the call chain active when a statement was issued
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallFrame {
    /// Source file, empty when the runtime could not resolve it
    pub source_location: String,
    pub line_number: u32,
    pub symbol_name: String,
}

impl CallFrame {
    pub fn new(
        source_location: impl Into<String>,
        line_number: u32,
        symbol_name: impl Into<String>,
    ) -> Self {
        Self {
            source_location: source_location.into(),
            line_number,
            symbol_name: symbol_name.into(),
        }
    }

    pub fn has_location(&self) -> bool {
        !self.source_location.is_empty()
    }
}

impl fmt::Display for CallFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.has_location() {
            return write!(f, "{}", self.symbol_name);
        }
        write!(
            f,
            "{}:{} in {}",
            self.source_location, self.line_number, self.symbol_name
        )
    }
}

/// Where a statement is being executed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub session_id: SessionId,
    /// Driver ID (sqlite, postgres, ...)
    pub driver_id: String,
    /// Database file or schema name
    #[serde(default)]
    pub database: Option<String>,
}

impl ExecutionContext {
    pub fn new(session_id: SessionId, driver_id: impl Into<String>) -> Self {
        Self {
            session_id,
            driver_id: driver_id.into(),
            database: None,
        }
    }
}

/// Bound values of a statement
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum StatementParams {
    #[default]
    None,
    Single(Vec<Value>),
    Batch(Vec<Vec<Value>>),
}

/// A statement about to be sent to the database
#[derive(Debug, Clone)]
pub struct StatementEvent {
    pub statement: String,
    /// Redacted whenever formatted; observers must not log bound values
    pub parameters: Sensitive<StatementParams>,
    pub context: ExecutionContext,
    pub is_batch: bool,
}

impl StatementEvent {
    pub fn new(statement: impl Into<String>, context: ExecutionContext) -> Self {
        Self {
            statement: statement.into(),
            parameters: Sensitive::new(StatementParams::None),
            context,
            is_batch: false,
        }
    }

    pub fn with_params(mut self, params: Vec<Value>) -> Self {
        self.parameters = Sensitive::new(StatementParams::Single(params));
        self
    }

    pub fn with_batch(mut self, rows: Vec<Vec<Value>>) -> Self {
        self.parameters = Sensitive::new(StatementParams::Batch(rows));
        self.is_batch = true;
        self
    }
}

/// A diagnostic produced for a matching statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticRecord {
    pub level: Severity,
    pub message: String,
    pub statement: String,
    /// IDs of every rule the statement matched, in registration order
    pub matched_rules: Vec<String>,
    /// Rendered frames, oldest first
    pub call_chain: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_frame_display() {
        let frame = CallFrame::new("src/startup.rs", 42, "schema_watch::startup::refresh");
        assert_eq!(
            frame.to_string(),
            "src/startup.rs:42 in schema_watch::startup::refresh"
        );

        let unlocated = CallFrame::new("", 0, "__rust_try");
        assert_eq!(unlocated.to_string(), "__rust_try");
    }

    #[test]
    fn test_batch_event_redacts_params() {
        let ctx = ExecutionContext::new(SessionId::new(), "sqlite");
        let event = StatementEvent::new("INSERT INTO t VALUES (?)", ctx)
            .with_batch(vec![vec![Value::Text("secret".to_string())]]);

        assert!(event.is_batch);
        let rendered = format!("{:?}", event);
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Error > Severity::Warning);
        assert_eq!(Severity::default(), Severity::Warning);
    }
}
