// fanquery - fan-out SQL dispatcher
// Core library

//! Dispatch a single SQL statement to a set of independently configured
//! database targets — optionally reached through per-target SSH tunnels —
//! run them concurrently, and merge the per-target results into one unified
//! table tagged by origin.
//!
//! ```no_run
//! use fanquery::config::Connections;
//! use fanquery::fanout::{ExecuteOptions, Fanout, Selection};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let connections = Connections::load_default()?;
//! let fanout = Fanout::new(connections);
//!
//! let report = fanout
//!     .execute(
//!         "SELECT id, status FROM orders WHERE status = 'stuck'",
//!         "replica",
//!         &Selection::aliased([("repA", "Replica A"), ("repB", "Replica B")]),
//!         &ExecuteOptions {
//!             insert_provenance: true,
//!             ..Default::default()
//!         },
//!     )
//!     .await;
//!
//! if let Some(table) = report.merged {
//!     println!("{} rows from {} targets", table.row_count(), report.outcomes.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod fanout;
pub mod observability;

pub use config::Connections;
pub use engine::{DriverRegistry, EngineError, ExecutionPhase, TargetError};
pub use fanout::{ExecuteOptions, Fanout, FanoutReport, Selection};
pub use observability::Sensitive;
