//! Structured diagnostics for one fan-out invocation.
//!
//! Warnings and per-target failures are emitted to an injected sink instead
//! of a process-wide logger, so callers and tests can capture them
//! deterministically per call. The default sink forwards to `tracing`.

use serde::Serialize;

use crate::engine::error::ExecutionPhase;

/// A non-fatal event raised while resolving or executing targets.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// The requested instance does not exist in the registry.
    InstanceMissing { instance: String },
    /// A requested target name is absent from the instance; it was skipped.
    TargetMissing { instance: String, name: String },
    /// One target's execution attempt failed; siblings were unaffected.
    TargetFailed {
        alias: String,
        phase: ExecutionPhase,
        message: String,
    },
}

/// Receiver for [`Diagnostic`] events. Implementations must be cheap —
/// emission happens on the dispatch path.
pub trait DiagnosticsSink: Send + Sync {
    fn emit(&self, diagnostic: Diagnostic);
}

/// Default sink: structured `tracing` warnings.
pub struct TracingSink;

impl DiagnosticsSink for TracingSink {
    fn emit(&self, diagnostic: Diagnostic) {
        match &diagnostic {
            Diagnostic::InstanceMissing { instance } => {
                tracing::warn!(instance = %instance, "instance not found in registry");
            }
            Diagnostic::TargetMissing { instance, name } => {
                tracing::warn!(instance = %instance, name = %name, "target not found, skipping");
            }
            Diagnostic::TargetFailed { alias, phase, message } => {
                tracing::warn!(alias = %alias, phase = %phase, message = %message, "target failed");
            }
        }
    }
}

/// Sink that records events for later inspection. Used by tests and by
/// callers that surface warnings alongside results.
#[derive(Default)]
pub struct CollectingSink {
    events: parking_lot::Mutex<Vec<Diagnostic>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn snapshot(&self) -> Vec<Diagnostic> {
        self.events.lock().clone()
    }
}

impl DiagnosticsSink for CollectingSink {
    fn emit(&self, diagnostic: Diagnostic) {
        self.events.lock().push(diagnostic);
    }
}
