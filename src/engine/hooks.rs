// SPDX-License-Identifier: Apache-2.0

//! Execution Hooks
//!
//! The "before execute" extension point of the data access layer. Observers
//! are handed in explicitly and see every statement right before it runs.
//! They cannot veto or rewrite it.

use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::observer::types::StatementEvent;

/// Callback invoked immediately before a statement is executed
pub trait StatementObserver: Send + Sync {
    fn on_before_execute(&self, event: &StatementEvent);
}

/// Ordered set of statement observers
pub struct ExecutionHooks {
    /// Replaced wholesale on registration so dispatch works on a snapshot
    observers: RwLock<Arc<[Arc<dyn StatementObserver>]>>,
    /// Keys already claimed through `register_once`
    installed: Mutex<HashSet<String>>,
}

impl ExecutionHooks {
    pub fn new() -> Self {
        Self {
            observers: RwLock::new(Arc::from(Vec::new())),
            installed: Mutex::new(HashSet::new()),
        }
    }

    /// Appends an observer unconditionally
    pub fn register(&self, observer: Arc<dyn StatementObserver>) {
        let mut observers = self.observers.write();
        let mut next: Vec<Arc<dyn StatementObserver>> = observers.iter().cloned().collect();
        next.push(observer);
        *observers = Arc::from(next);
        debug!("Statement observer registered ({} total)", observers.len());
    }

    /// Registers the observer built by `make` unless `key` was already installed.
    ///
    /// Returns `true` only for the call that performed the installation.
    /// `make` is not invoked when the key is taken.
    pub fn register_once<F>(&self, key: &str, make: F) -> bool
    where
        F: FnOnce() -> Arc<dyn StatementObserver>,
    {
        // Held across the push so a concurrent caller cannot observe the key
        // claimed before the observer is visible.
        let mut installed = self.installed.lock();
        if installed.contains(key) {
            debug!("Statement observer '{}' already installed", key);
            return false;
        }

        self.register(make());
        installed.insert(key.to_string());
        info!("Statement observer '{}' installed", key);
        true
    }

    pub fn is_installed(&self, key: &str) -> bool {
        self.installed.lock().contains(key)
    }

    pub fn len(&self) -> usize {
        self.observers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs every observer on `event`. Observer panics are logged and swallowed.
    pub fn dispatch(&self, event: &StatementEvent) {
        let snapshot = Arc::clone(&*self.observers.read());

        for observer in snapshot.iter() {
            let outcome = catch_unwind(AssertUnwindSafe(|| observer.on_before_execute(event)));
            if outcome.is_err() {
                warn!(
                    session = %event.context.session_id.0,
                    "Statement observer panicked; statement continues"
                );
            }
        }
    }
}

impl Default for ExecutionHooks {
    fn default() -> Self {
        Self::new()
    }
}
