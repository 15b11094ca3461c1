// SPDX-License-Identifier: Apache-2.0

//! Normalized error types for the schema-watch data access layer
//!
//! SQLx, filesystem and serde failures are mapped to these variants so callers
//! see one error type regardless of where the failure came from.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for data access and configuration operations
#[derive(Debug, Error, Serialize, Deserialize)]
pub enum EngineError {
    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Statement execution error: {message}")]
    ExecutionError { message: String },

    #[error("Schema inspection error: {message}")]
    InspectionError { message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl EngineError {
    pub fn connection_failed(msg: impl Into<String>) -> Self {
        Self::ConnectionFailed { message: msg.into() }
    }

    pub fn execution_error(msg: impl Into<String>) -> Self {
        Self::ExecutionError { message: msg.into() }
    }

    pub fn inspection(msg: impl Into<String>) -> Self {
        Self::InspectionError { message: msg.into() }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError { message: msg.into() }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal { message: msg.into() }
    }
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
