// SPDX-License-Identifier: Apache-2.0

//! Fan-out query engine.
//!
//! One SQL statement, many databases, one merged result: resolve the
//! requested targets, execute on each of them (concurrently, through SSH
//! tunnels where configured), and concatenate the row sets in resolution
//! order.

pub mod diagnostics;
pub mod executor;
pub mod merge;
pub mod names;
pub mod resolver;
pub mod scheduler;

pub use diagnostics::{CollectingSink, Diagnostic, DiagnosticsSink, TracingSink};
pub use merge::Provenance;
pub use resolver::{ResolvedTarget, Selection, TargetSet};
pub use scheduler::{DispatchOptions, TargetOutcome};

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::config::Connections;
use crate::engine::error::TargetError;
use crate::engine::registry::DriverRegistry;
use crate::engine::types::{DispatchId, RowSet};

/// Call-site flags for one fan-out execution.
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Stamp each merged row with the alias of its originating target.
    pub insert_provenance: bool,
    /// Column index for the provenance column; appended when `None`.
    pub provenance_position: Option<usize>,
    /// Name of the provenance column.
    pub provenance_column: String,
    /// Concurrent (default) or sequential execution.
    pub concurrent: bool,
    /// Cap on simultaneously executing targets.
    pub max_in_flight: usize,
    /// Per-call deadline in milliseconds.
    pub timeout_ms: Option<u64>,
    /// Cooperative cancellation signal for in-flight targets.
    pub cancel: CancellationToken,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        let scheduling = DispatchOptions::default();
        Self {
            insert_provenance: false,
            provenance_position: None,
            provenance_column: "base".to_string(),
            concurrent: scheduling.concurrent,
            max_in_flight: scheduling.max_in_flight,
            timeout_ms: scheduling.timeout_ms,
            cancel: scheduling.cancel,
        }
    }
}

/// Everything one fan-out execution produced.
///
/// `merged` is `None` when no target returned rows — per-target outcomes
/// tell whether that was "no data" or failures.
#[derive(Debug)]
pub struct FanoutReport {
    pub merged: Option<RowSet>,
    pub outcomes: Vec<TargetOutcome>,
}

impl FanoutReport {
    /// Per-target failures, in resolved-target order.
    pub fn errors(&self) -> impl Iterator<Item = &TargetError> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().err())
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }
}

/// Fan-out entry point: a connections registry plus the driver registry and
/// diagnostics sink the dispatch runs with.
pub struct Fanout {
    connections: Connections,
    registry: Arc<DriverRegistry>,
    sink: Arc<dyn DiagnosticsSink>,
}

impl Fanout {
    /// Builds a fan-out over `connections` with the built-in drivers and a
    /// tracing-backed diagnostics sink.
    pub fn new(connections: Connections) -> Self {
        Self {
            connections,
            registry: Arc::new(DriverRegistry::with_builtin_drivers()),
            sink: Arc::new(TracingSink),
        }
    }

    /// Replaces the driver registry (e.g., to add a custom engine).
    pub fn with_registry(mut self, registry: Arc<DriverRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Replaces the diagnostics sink (e.g., a [`CollectingSink`] to surface
    /// warnings alongside results).
    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticsSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Executes `sql` on the targets selected from `instance`.
    ///
    /// Always returns a report: resolution warnings and per-target failures
    /// are emitted to the sink and kept in `outcomes`, never raised.
    #[instrument(skip_all, fields(instance = %instance, query_len = sql.len()))]
    pub async fn execute(
        &self,
        sql: &str,
        instance: &str,
        selection: &Selection,
        options: &ExecuteOptions,
    ) -> FanoutReport {
        let dispatch_id = DispatchId::new();
        let targets = resolver::resolve(&self.connections, instance, selection, self.sink.as_ref());

        tracing::debug!(
            %dispatch_id,
            targets = targets.len(),
            concurrent = options.concurrent,
            "dispatching"
        );

        let scheduling = DispatchOptions {
            concurrent: options.concurrent,
            max_in_flight: options.max_in_flight,
            timeout_ms: options.timeout_ms,
            cancel: options.cancel.clone(),
        };

        let outcomes = scheduler::dispatch(
            Arc::clone(&self.registry),
            &targets,
            sql,
            &scheduling,
            self.sink.as_ref(),
        )
        .await;

        let provenance = options.insert_provenance.then(|| Provenance {
            column: options.provenance_column.clone(),
            position: options.provenance_position,
        });
        let merged = merge::merge(&outcomes, provenance.as_ref());

        tracing::debug!(
            %dispatch_id,
            merged_rows = merged.as_ref().map(|m| m.row_count()).unwrap_or(0),
            failures = outcomes.iter().filter(|o| o.result.is_err()).count(),
            "dispatch finished"
        );

        FanoutReport { merged, outcomes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_resolution_yields_empty_report() {
        let sink = Arc::new(CollectingSink::new());
        let fanout =
            Fanout::new(Connections::default()).with_sink(Arc::clone(&sink) as Arc<dyn DiagnosticsSink>);

        let report = fanout
            .execute(
                "SELECT 1",
                "replica",
                &Selection::one("repA"),
                &ExecuteOptions::default(),
            )
            .await;

        assert!(report.merged.is_none());
        assert!(report.outcomes.is_empty());
        assert!(!report.has_errors());
        assert_eq!(
            sink.drain(),
            vec![Diagnostic::InstanceMissing {
                instance: "replica".into(),
            }]
        );
    }
}
