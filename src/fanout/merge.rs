//! Result merging.
//!
//! Concatenates per-target row sets in resolved-target order into one
//! unified table, optionally stamping each row with the alias of the target
//! it came from.

use crate::engine::types::{ColumnInfo, RowSet, Value};
use crate::fanout::scheduler::TargetOutcome;

/// Provenance column settings for the merged result.
#[derive(Debug, Clone)]
pub struct Provenance {
    /// Name of the inserted column.
    pub column: String,
    /// Column index to insert at; appended as the last column when `None`.
    pub position: Option<usize>,
}

impl Default for Provenance {
    fn default() -> Self {
        Self {
            column: "base".to_string(),
            position: None,
        }
    }
}

/// Merges per-target outcomes into one table.
///
/// Outcomes are visited in their given (resolved) order; errored targets,
/// affected-count outcomes, and empty row sets contribute nothing. Returns
/// `None` when no target contributed rows — the caller can tell "no data"
/// apart from both an error and an empty table. Columns of the unified
/// result come from the first contributing target.
pub fn merge(outcomes: &[TargetOutcome], provenance: Option<&Provenance>) -> Option<RowSet> {
    let mut merged: Option<RowSet> = None;

    for outcome in outcomes {
        let Some(rs) = outcome.row_set() else { continue };
        if rs.is_empty() {
            continue;
        }

        let mut part = rs.clone();
        if let Some(provenance) = provenance {
            stamp(&mut part, &outcome.alias, provenance);
        }

        match merged {
            Some(ref mut table) => table.rows.extend(part.rows),
            None => merged = Some(part),
        }
    }

    merged
}

/// Inserts the provenance column into one target's table, every row holding
/// that target's alias.
fn stamp(table: &mut RowSet, alias: &str, provenance: &Provenance) {
    let position = provenance
        .position
        .unwrap_or(table.columns.len())
        .min(table.columns.len());

    table
        .columns
        .insert(position, ColumnInfo::text(&provenance.column));
    for row in &mut table.rows {
        row.values.insert(position, Value::Text(alias.to_string()));
    }
}
