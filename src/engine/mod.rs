// Execution engine module
// Driver abstraction, registry, and SSH tunneling for reaching targets

pub mod drivers;
pub mod error;
pub mod registry;
pub mod ssh_tunnel;
pub mod traits;
pub mod types;

pub use error::{EngineError, ExecutionPhase, TargetError};
pub use registry::DriverRegistry;
pub use ssh_tunnel::SshTunnel;
pub use traits::DataEngine;
pub use types::*;
