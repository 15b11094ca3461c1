// SPDX-License-Identifier: Apache-2.0

//! Call Chain Capture
//!
//! Stack introspection is a capability the runtime may not have. Capturing
//! returns `None` in that case and callers log without a chain.

use std::backtrace::{Backtrace, BacktraceStatus};
use std::sync::OnceLock;

use regex::Regex;

use super::types::CallFrame;

/// Source of the call stack active at the time of a statement
pub trait StackIntrospector: Send + Sync {
    /// Frames ordered oldest first (most recent last), or `None` when unavailable
    fn capture(&self) -> Option<Vec<CallFrame>>;
}

/// Introspection backed by `std::backtrace`
#[derive(Debug, Default, Clone, Copy)]
pub struct BacktraceIntrospector;

impl StackIntrospector for BacktraceIntrospector {
    fn capture(&self) -> Option<Vec<CallFrame>> {
        let backtrace = Backtrace::force_capture();
        if backtrace.status() != BacktraceStatus::Captured {
            return None;
        }

        let mut frames = trim_observer_frames(parse_backtrace(&backtrace.to_string()));
        frames.reverse();
        Some(frames)
    }
}

/// Hook entry point. Everything more recent belongs to dispatch and the observer.
const DISPATCH_SYMBOL: &str = "ExecutionHooks::dispatch";

/// Cuts printed-order frames (most recent first) down to the code that issued
/// the statement: only frames older than the outermost hook dispatch survive.
///
/// When the observer was invoked without going through the hooks there is no
/// dispatch frame, and only the capture frames are dropped.
fn trim_observer_frames(mut frames: Vec<CallFrame>) -> Vec<CallFrame> {
    match frames
        .iter()
        .rposition(|f| f.symbol_name.contains(DISPATCH_SYMBOL))
    {
        Some(outermost) => frames.split_off(outermost + 1),
        None => {
            frames.retain(|f| !is_capture_frame(f));
            frames
        }
    }
}

/// Runtime without stack introspection
#[derive(Debug, Default, Clone, Copy)]
pub struct NoIntrospection;

impl StackIntrospector for NoIntrospection {
    fn capture(&self) -> Option<Vec<CallFrame>> {
        None
    }
}

/// Frames of the backtrace machinery and of the observer itself
fn is_capture_frame(frame: &CallFrame) -> bool {
    frame.symbol_name.starts_with("std::backtrace")
        || frame.symbol_name.starts_with("<std::backtrace")
        || frame.symbol_name.contains("schema_watch::observer::")
}

fn symbol_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(?:\d+:\s+)?(\S.*?)\s*$").expect("valid regex"))
}

fn location_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*at\s+(.+?):(\d+)(?::\d+)?\s*$").expect("valid regex")
    })
}

/// Parses rendered backtrace text into frames, in the order they were printed
/// (most recent first).
///
/// Each symbol line starts a frame; an `at file:line[:col]` line directly
/// below it fills in the location. Frames without one keep an empty location.
pub fn parse_backtrace(text: &str) -> Vec<CallFrame> {
    let mut frames: Vec<CallFrame> = Vec::new();
    let mut awaiting_location = false;

    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }

        if let Some(caps) = location_line().captures(line) {
            if awaiting_location {
                if let Some(frame) = frames.last_mut() {
                    frame.source_location = caps[1].to_string();
                    frame.line_number = caps[2].parse().unwrap_or(0);
                }
                awaiting_location = false;
            }
            continue;
        }
        if line.trim_start().starts_with("at ") {
            continue;
        }

        if let Some(caps) = symbol_line().captures(line) {
            frames.push(CallFrame::new("", 0, &caps[1]));
            awaiting_location = true;
        }
    }

    frames
}

/// Decides which frames are library noise
#[derive(Debug, Clone, Default)]
pub struct FrameFilter {
    /// Compared case-insensitively against the source location
    library_markers: Vec<String>,
    /// Compared verbatim against the source location
    dependency_markers: Vec<String>,
}

impl FrameFilter {
    pub fn new(library_markers: &[String], dependency_markers: &[String]) -> Self {
        Self {
            library_markers: library_markers.iter().map(|m| m.to_lowercase()).collect(),
            dependency_markers: dependency_markers.to_vec(),
        }
    }

    pub fn is_excluded(&self, frame: &CallFrame) -> bool {
        if !frame.has_location() {
            return true;
        }
        let lowered = frame.source_location.to_lowercase();
        self.library_markers.iter().any(|m| lowered.contains(m))
            || self
                .dependency_markers
                .iter()
                .any(|m| frame.source_location.contains(m.as_str()))
    }
}

/// The last `depth` frames, with library frames dropped, rendered oldest first
pub fn caller_chain(frames: &[CallFrame], depth: usize, filter: &FrameFilter) -> Vec<String> {
    tail(frames, depth)
        .iter()
        .filter(|f| !filter.is_excluded(f))
        .map(|f| f.to_string())
        .collect()
}

/// The last `depth` frames, unfiltered, rendered oldest first
pub fn full_chain(frames: &[CallFrame], depth: usize) -> Vec<String> {
    tail(frames, depth).iter().map(|f| f.to_string()).collect()
}

fn tail(frames: &[CallFrame], depth: usize) -> &[CallFrame] {
    &frames[frames.len().saturating_sub(depth)..]
}
