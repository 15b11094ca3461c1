// SPDX-License-Identifier: Apache-2.0

//! Engine Types
//!
//! Identifiers and values shared by the observed pool and the statement hooks.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a pool session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Value bound to a statement placeholder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Json(serde_json::Value),
}

/// Connection settings for the observed pool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// File path of the SQLite database, or `:memory:`
    pub path: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    5
}

fn default_acquire_timeout() -> u64 {
    30
}

impl ConnectionConfig {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            max_connections: default_max_connections(),
            acquire_timeout_secs: default_acquire_timeout(),
        }
    }

    /// In-memory database; a single connection so every statement sees the same data.
    pub fn in_memory() -> Self {
        Self {
            max_connections: 1,
            ..Self::new(":memory:")
        }
    }

    pub fn is_memory(&self) -> bool {
        self.path == ":memory:"
    }
}
