//! DataEngine trait definition
//!
//! The abstraction every database driver implements. Unlike a session-based
//! client, a fan-out execution is one-shot: the driver opens a connection for
//! the given target, runs the statement, and closes the connection before
//! returning, whatever the outcome.

use async_trait::async_trait;

use crate::engine::error::EngineResult;
use crate::engine::types::{QueryOutcome, TargetConfig};

/// One-shot statement executor for a single database engine.
#[async_trait]
pub trait DataEngine: Send + Sync {
    /// Unique identifier for this driver (e.g., "postgres", "mysql").
    /// Matched against [`TargetConfig::driver`].
    fn driver_id(&self) -> &'static str;

    /// Human-readable name for this driver.
    fn driver_name(&self) -> &'static str;

    /// Executes a statement against the target described by `config`.
    ///
    /// `config.host`/`config.port` are already resolved — when the target is
    /// tunneled, the caller has rewritten them to the tunnel's local bind.
    /// The connection must be closed before returning, success or not.
    /// Commit is whatever the driver's autocommit does; the engine manages
    /// no transactions of its own.
    async fn execute(&self, config: &TargetConfig, sql: &str) -> EngineResult<QueryOutcome>;
}
