//! Statement Observer
//!
//! Watches statements on their way to the database and logs the ones that
//! match configured rules, together with the call chain that issued them:
//! - **Rules**: case-insensitive substring rules with a severity
//! - **Call chain**: best-effort stack capture, trimmed of library frames
//! - **Sinks**: where diagnostic records end up (`tracing` by default)
//!
//! The observer never blocks, rejects or rewrites a statement.

pub mod call_chain;
pub mod index_watch;
pub mod rules;
pub mod sink;
pub mod types;

pub use call_chain::{BacktraceIntrospector, FrameFilter, NoIntrospection, StackIntrospector};
pub use index_watch::{IndexCreationObserver, OBSERVER_KEY};
pub use rules::RuleSet;
pub use sink::{LogSink, TracingSink};
pub use types::*;
