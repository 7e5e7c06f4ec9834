// SPDX-License-Identifier: Apache-2.0

//! Normalized error types for the execution engine.
//!
//! Driver-specific errors are mapped to these unified variants so that
//! per-target diagnostics look the same regardless of the backing database.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for all engine operations.
#[derive(Debug, Error, Serialize, Deserialize)]
pub enum EngineError {
    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Query syntax error: {message}")]
    SyntaxError { message: String },

    #[error("Query execution error: {message}")]
    ExecutionError { message: String },

    #[error("Operation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Driver not found: {driver_id}")]
    DriverNotFound { driver_id: String },

    #[error("SSH tunnel error: {message}")]
    SshError { message: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl EngineError {
    pub fn connection_failed(msg: impl Into<String>) -> Self {
        Self::ConnectionFailed { message: msg.into() }
    }

    pub fn auth_failed(msg: impl Into<String>) -> Self {
        Self::AuthenticationFailed { message: msg.into() }
    }

    pub fn syntax_error(msg: impl Into<String>) -> Self {
        Self::SyntaxError { message: msg.into() }
    }

    pub fn execution_error(msg: impl Into<String>) -> Self {
        Self::ExecutionError { message: msg.into() }
    }

    pub fn driver_not_found(id: impl Into<String>) -> Self {
        Self::DriverNotFound { driver_id: id.into() }
    }

    pub fn ssh_error(msg: impl Into<String>) -> Self {
        Self::SshError { message: msg.into() }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal { message: msg.into() }
    }
}

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Phase of a per-target execution attempt in which a failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionPhase {
    Tunnel,
    Connect,
    Execute,
}

impl std::fmt::Display for ExecutionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tunnel => write!(f, "tunnel"),
            Self::Connect => write!(f, "connect"),
            Self::Execute => write!(f, "execute"),
        }
    }
}

/// A failure attributed to one resolved target.
///
/// One target's error never aborts its siblings; the fan-out collects these
/// as values alongside successful outcomes.
#[derive(Debug, Error, Serialize, Deserialize)]
#[error("target '{alias}' failed during {phase}: {source}")]
pub struct TargetError {
    pub alias: String,
    pub phase: ExecutionPhase,
    #[source]
    pub source: EngineError,
}

impl TargetError {
    pub fn new(alias: impl Into<String>, phase: ExecutionPhase, source: EngineError) -> Self {
        Self {
            alias: alias.into(),
            phase,
            source,
        }
    }
}
