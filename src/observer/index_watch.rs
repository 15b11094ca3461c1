// SPDX-License-Identifier: Apache-2.0

//! Index Creation Observer
//!
//! Watches outgoing statements for index DDL and reports who issued it.
//! Migrations own index creation; anything else creating an index at runtime
//! should be visible in the logs together with its caller chain.
//!
//! For a matching statement the observer emits:
//! 1. one warning with the statement and the caller chain (last
//!    `warn_chain_depth` frames, library frames removed)
//! 2. if an error-severity rule matched, one error with the last
//!    `error_chain_depth` frames, unfiltered, one per line

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::warn;

use super::call_chain::{
    caller_chain, full_chain, BacktraceIntrospector, FrameFilter, NoIntrospection,
    StackIntrospector,
};
use super::rules::{highest_severity, RuleSet};
use super::sink::{LogSink, TracingSink};
use super::types::{CallFrame, DiagnosticRecord, MatchRule, Severity, StatementEvent};
use crate::config::WatchConfig;
use crate::engine::hooks::StatementObserver;
use crate::metrics;

/// Key under which the observer is installed on the execution hooks
pub const OBSERVER_KEY: &str = "index-creation-logging";

pub struct IndexCreationObserver {
    rules: RuleSet,
    filter: FrameFilter,
    warn_depth: usize,
    error_depth: usize,
    introspector: Arc<dyn StackIntrospector>,
    sink: Arc<dyn LogSink>,
}

impl IndexCreationObserver {
    /// Observer with the given rules and default depths and markers
    pub fn new(rules: RuleSet) -> Self {
        let defaults = WatchConfig::default();
        Self {
            rules,
            filter: FrameFilter::new(&defaults.library_markers, &defaults.dependency_markers),
            warn_depth: defaults.warn_chain_depth,
            error_depth: defaults.error_chain_depth,
            introspector: Arc::new(BacktraceIntrospector),
            sink: Arc::new(TracingSink),
        }
    }

    pub fn from_config(config: &WatchConfig) -> Self {
        let rules = RuleSet::new(config.rules.clone()).unwrap_or_else(|e| {
            warn!("Invalid match rules ({}); falling back to built-in rules", e);
            RuleSet::builtin()
        });

        let introspector: Arc<dyn StackIntrospector> = if config.capture_call_chain {
            Arc::new(BacktraceIntrospector)
        } else {
            Arc::new(NoIntrospection)
        };

        Self {
            rules,
            filter: FrameFilter::new(&config.library_markers, &config.dependency_markers),
            warn_depth: config.warn_chain_depth.max(1),
            error_depth: config.error_chain_depth.max(1),
            introspector,
            sink: Arc::new(TracingSink),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_introspector(mut self, introspector: Arc<dyn StackIntrospector>) -> Self {
        self.introspector = introspector;
        self
    }

    /// Records for `statement` given the stack at the time it was issued.
    ///
    /// `stack` is ordered oldest first; `None` means no stack was available and
    /// the records carry an empty call chain.
    pub fn inspect(&self, statement: &str, stack: Option<&[CallFrame]>) -> Vec<DiagnosticRecord> {
        let matched = self.rules.matching(statement);
        self.build_records(statement, &matched, stack)
    }

    fn build_records(
        &self,
        statement: &str,
        matched: &[&MatchRule],
        stack: Option<&[CallFrame]>,
    ) -> Vec<DiagnosticRecord> {
        let Some(highest) = highest_severity(matched) else {
            return Vec::new();
        };
        let rule_ids: Vec<String> = matched.iter().map(|r| r.id.clone()).collect();
        let frames = stack.unwrap_or(&[]);

        let callers = render_or_empty(|| caller_chain(frames, self.warn_depth, &self.filter));
        let mut records = vec![DiagnosticRecord {
            level: Severity::Warning,
            message: format!(
                "Watched statement detected [{}]: {} | caller chain: {}",
                rule_ids.join(", "),
                statement,
                callers.join(" -> ")
            ),
            statement: statement.to_string(),
            matched_rules: rule_ids.clone(),
            call_chain: callers,
        }];

        if highest == Severity::Error {
            let elevated: Vec<String> = matched
                .iter()
                .filter(|r| r.severity == Severity::Error)
                .map(|r| r.id.clone())
                .collect();
            let stack_lines = render_or_empty(|| full_chain(frames, self.error_depth));

            let mut message = format!(
                "Creation attempt on a migration-owned index [{}]. Call stack:",
                elevated.join(", ")
            );
            for line in &stack_lines {
                message.push_str("\n   ");
                message.push_str(line);
            }

            records.push(DiagnosticRecord {
                level: Severity::Error,
                message,
                statement: statement.to_string(),
                matched_rules: rule_ids,
                call_chain: stack_lines,
            });
        }

        records
    }

    fn capture_stack(&self) -> Option<Vec<CallFrame>> {
        catch_unwind(AssertUnwindSafe(|| self.introspector.capture()))
            .ok()
            .flatten()
    }
}

impl Default for IndexCreationObserver {
    fn default() -> Self {
        Self::new(RuleSet::builtin())
    }
}

impl StatementObserver for IndexCreationObserver {
    fn on_before_execute(&self, event: &StatementEvent) {
        metrics::record_observed();

        let matched = self.rules.matching(&event.statement);
        if matched.is_empty() {
            return;
        }

        let stack = self.capture_stack();
        if stack.is_none() {
            metrics::record_chain_unavailable();
        }

        let records = self.build_records(&event.statement, &matched, stack.as_deref());
        let mut errors = 0;
        for record in &records {
            if record.level == Severity::Error {
                errors += 1;
            }
            self.sink.emit(record);
        }
        metrics::record_match(records.len() as u64 - errors, errors);
    }
}

fn render_or_empty<F>(render: F) -> Vec<String>
where
    F: FnOnce() -> Vec<String>,
{
    catch_unwind(AssertUnwindSafe(render)).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::types::SessionId;
    use crate::observer::types::ExecutionContext;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingSink(Mutex<Vec<DiagnosticRecord>>);

    impl LogSink for RecordingSink {
        fn emit(&self, record: &DiagnosticRecord) {
            self.0.lock().push(record.clone());
        }
    }

    struct FixedStack(Vec<CallFrame>);

    impl StackIntrospector for FixedStack {
        fn capture(&self) -> Option<Vec<CallFrame>> {
            Some(self.0.clone())
        }
    }

    struct BrokenStack;

    impl StackIntrospector for BrokenStack {
        fn capture(&self) -> Option<Vec<CallFrame>> {
            panic!("unwinder unavailable");
        }
    }

    fn app_stack(len: u32) -> Vec<CallFrame> {
        (0..len)
            .map(|i| {
                if i % 3 == 0 {
                    CallFrame::new(
                        format!("/home/ci/.cargo/registry/src/sqlx-core/src/m{i}.rs"),
                        i,
                        "sqlx_core::run",
                    )
                } else {
                    CallFrame::new(format!("src/app/mod_{i}.rs"), i, format!("app::step{i}"))
                }
            })
            .collect()
    }

    fn observer_with(stack: Vec<CallFrame>) -> (IndexCreationObserver, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let observer = IndexCreationObserver::default()
            .with_sink(sink.clone())
            .with_introspector(Arc::new(FixedStack(stack)));
        (observer, sink)
    }

    fn event(sql: &str) -> StatementEvent {
        StatementEvent::new(sql, ExecutionContext::new(SessionId::new(), "sqlite"))
    }

    #[test]
    fn test_created_at_idx_emits_warning_and_error() {
        let (observer, sink) = observer_with(app_stack(30));
        let sql = "CREATE INDEX IF NOT EXISTS created_at_idx ON t(created_at)";
        observer.on_before_execute(&event(sql));

        let records = sink.0.lock();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].level, Severity::Warning);
        assert!(records[0].message.contains(sql));
        assert_eq!(records[1].level, Severity::Error);
        assert_eq!(records[1].call_chain.len(), 15);
        assert_eq!(
            records[1].matched_rules,
            vec!["create-index".to_string(), "created-at-index".to_string()]
        );
    }

    #[test]
    fn test_select_emits_nothing() {
        let (observer, sink) = observer_with(app_stack(30));
        observer.on_before_execute(&event("SELECT * FROM upload_files"));
        assert!(sink.0.lock().is_empty());
    }

    #[test]
    fn test_generic_index_emits_single_warning() {
        let (observer, sink) = observer_with(app_stack(30));
        observer.on_before_execute(&event("create unique index ix_name on accounts(name)"));

        let records = sink.0.lock();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].level, Severity::Warning);
    }

    #[test]
    fn test_warning_chain_excludes_library_frames() {
        let observer = IndexCreationObserver::default();
        let stack = app_stack(30);
        let records = observer.inspect("CREATE INDEX ix ON t(a)", Some(&stack));

        let chain = &records[0].call_chain;
        // last ten frames are 20..=29; 21, 24 and 27 are registry frames
        assert_eq!(chain.len(), 7);
        assert!(chain.iter().all(|f| !f.contains(".cargo/registry")));
        assert_eq!(chain.last().unwrap(), "src/app/mod_29.rs:29 in app::step29");
        assert!(records[0].message.contains(" -> "));
    }

    #[test]
    fn test_error_chain_is_unfiltered_and_line_separated() {
        let observer = IndexCreationObserver::default();
        let stack = app_stack(30);
        let records = observer.inspect("CREATE INDEX created_at_idx ON t(a)", Some(&stack));

        let error = &records[1];
        assert!(error.call_chain.iter().any(|f| f.contains(".cargo/registry")));
        assert_eq!(error.message.lines().count(), 16);
    }

    #[test]
    fn test_short_stack_caps_at_available_frames() {
        let observer = IndexCreationObserver::default();
        let stack = app_stack(4);
        let records = observer.inspect("CREATE INDEX created_at_idx ON t(a)", Some(&stack));
        assert_eq!(records[1].call_chain.len(), 4);
    }

    #[test]
    fn test_missing_stack_degrades_to_statement_only() {
        let sink = Arc::new(RecordingSink::default());
        let observer = IndexCreationObserver::default()
            .with_sink(sink.clone())
            .with_introspector(Arc::new(NoIntrospection));

        observer.on_before_execute(&event("CREATE INDEX created_at_idx ON t(a)"));

        let records = sink.0.lock();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.call_chain.is_empty()));
        assert!(records[0].message.contains("created_at_idx"));
    }

    #[test]
    fn test_panicking_introspector_degrades() {
        let sink = Arc::new(RecordingSink::default());
        let observer = IndexCreationObserver::default()
            .with_sink(sink.clone())
            .with_introspector(Arc::new(BrokenStack));

        observer.on_before_execute(&event("CREATE INDEX ix ON t(a)"));

        let records = sink.0.lock();
        assert_eq!(records.len(), 1);
        assert!(records[0].call_chain.is_empty());
    }

    #[test]
    fn test_from_config_respects_depths_and_rules() {
        let mut config = WatchConfig::default();
        config.warn_chain_depth = 3;
        config.error_chain_depth = 5;
        config.rules = vec![MatchRule::new("drop-index", "DROP INDEX", Severity::Error)];

        let observer = IndexCreationObserver::from_config(&config);
        let stack = app_stack(30);

        assert!(observer.inspect("CREATE INDEX ix ON t(a)", Some(&stack)).is_empty());

        let records = observer.inspect("drop index ix", Some(&stack));
        assert_eq!(records.len(), 2);
        // frames 27..=29, 27 is a registry frame
        assert_eq!(records[0].call_chain.len(), 2);
        assert_eq!(records[1].call_chain.len(), 5);
    }
}
