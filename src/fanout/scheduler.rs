//! Fan-out scheduling.
//!
//! Runs one per-target execution per resolved target, concurrently by
//! default, and returns only when every worker has finished (a full join
//! barrier, never streaming). Workers share nothing: each task returns its
//! outcome through its join handle and the results are collected in
//! resolved-target order, so no locking is involved. One target's failure
//! never cancels its siblings.

use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio::time::timeout_at;
use tokio_util::sync::CancellationToken;

use crate::engine::error::{EngineError, ExecutionPhase, TargetError};
use crate::engine::registry::DriverRegistry;
use crate::engine::types::QueryOutcome;
use crate::fanout::diagnostics::{Diagnostic, DiagnosticsSink};
use crate::fanout::executor::execute_on_target;
use crate::fanout::resolver::TargetSet;

/// Cap on simultaneously executing targets in concurrent mode.
const DEFAULT_MAX_IN_FLIGHT: usize = 16;

/// Scheduling knobs for one dispatch.
#[derive(Debug, Clone)]
pub struct DispatchOptions {
    /// Concurrent (default) or strict resolved-order sequential execution.
    /// Sequential exists for statements with related side effects across
    /// neighboring targets.
    pub concurrent: bool,
    /// Concurrency cap for concurrent mode.
    pub max_in_flight: usize,
    /// Per-call deadline. Targets not finished when it expires resolve to
    /// `Timeout` outcomes; finished siblings keep their results.
    pub timeout_ms: Option<u64>,
    /// Cooperative cancellation; cancelled targets resolve to `Cancelled`.
    pub cancel: CancellationToken,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            concurrent: true,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            timeout_ms: None,
            cancel: CancellationToken::new(),
        }
    }
}

/// Result of one target's execution attempt, tagged with its alias.
#[derive(Debug)]
pub struct TargetOutcome {
    pub alias: String,
    pub result: Result<QueryOutcome, TargetError>,
    pub elapsed_ms: f64,
}

impl TargetOutcome {
    /// The row set, when the attempt succeeded and returned rows.
    pub fn row_set(&self) -> Option<&crate::engine::types::RowSet> {
        self.result.as_ref().ok().and_then(|o| o.rows())
    }
}

/// Dispatches `sql` to every resolved target and waits for all of them.
///
/// The returned vector is in resolved-target order regardless of completion
/// order, one entry per target. Failures are reported to `sink` and kept as
/// values; nothing is silently swallowed.
pub async fn dispatch(
    registry: Arc<DriverRegistry>,
    targets: &TargetSet,
    sql: &str,
    options: &DispatchOptions,
    sink: &dyn DiagnosticsSink,
) -> Vec<TargetOutcome> {
    let deadline = options
        .timeout_ms
        .map(|ms| tokio::time::Instant::now() + std::time::Duration::from_millis(ms));

    let outcomes = if options.concurrent {
        let semaphore = Arc::new(Semaphore::new(options.max_in_flight.max(1)));
        let mut handles = Vec::with_capacity(targets.len());

        for target in targets {
            let registry = Arc::clone(&registry);
            let semaphore = Arc::clone(&semaphore);
            let cancel = options.cancel.clone();
            let alias = target.alias.clone();
            let config = target.config.clone();
            let sql = sql.to_string();
            let timeout_ms = options.timeout_ms;

            handles.push(tokio::spawn(async move {
                // A closed semaphore is impossible here; treat failure as
                // cancellation rather than panicking in a worker.
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return TargetOutcome {
                            result: Err(TargetError::new(
                                &alias,
                                ExecutionPhase::Execute,
                                EngineError::Cancelled,
                            )),
                            alias,
                            elapsed_ms: 0.0,
                        }
                    }
                };
                run_one(&registry, alias, &config, &sql, deadline, timeout_ms, &cancel).await
            }));
        }

        // Join barrier: nothing is visible to the caller until every worker
        // has finished.
        join_all(handles)
            .await
            .into_iter()
            .zip(targets)
            .map(|(joined, target)| {
                joined.unwrap_or_else(|e| TargetOutcome {
                    alias: target.alias.clone(),
                    result: Err(TargetError::new(
                        &target.alias,
                        ExecutionPhase::Execute,
                        EngineError::internal(format!("worker panicked: {e}")),
                    )),
                    elapsed_ms: 0.0,
                })
            })
            .collect()
    } else {
        let mut outcomes = Vec::with_capacity(targets.len());
        for target in targets {
            outcomes.push(
                run_one(
                    &registry,
                    target.alias.clone(),
                    &target.config,
                    sql,
                    deadline,
                    options.timeout_ms,
                    &options.cancel,
                )
                .await,
            );
        }
        outcomes
    };

    for outcome in &outcomes {
        if let Err(ref err) = outcome.result {
            sink.emit(Diagnostic::TargetFailed {
                alias: err.alias.clone(),
                phase: err.phase,
                message: err.source.to_string(),
            });
        }
    }

    outcomes
}

async fn run_one(
    registry: &DriverRegistry,
    alias: String,
    config: &crate::engine::types::TargetConfig,
    sql: &str,
    deadline: Option<tokio::time::Instant>,
    timeout_ms: Option<u64>,
    cancel: &CancellationToken,
) -> TargetOutcome {
    let start = Instant::now();

    let execution = async {
        match deadline {
            Some(deadline) => match timeout_at(deadline, execute_on_target(registry, &alias, config, sql)).await {
                Ok(result) => result,
                Err(_) => Err(TargetError::new(
                    &alias,
                    ExecutionPhase::Execute,
                    EngineError::Timeout {
                        timeout_ms: timeout_ms.unwrap_or_default(),
                    },
                )),
            },
            None => execute_on_target(registry, &alias, config, sql).await,
        }
    };

    let result = tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(TargetError::new(
            &alias,
            ExecutionPhase::Execute,
            EngineError::Cancelled,
        )),
        result = execution => result,
    };

    TargetOutcome {
        elapsed_ms: start.elapsed().as_secs_f64() * 1000.0,
        alias,
        result,
    }
}
