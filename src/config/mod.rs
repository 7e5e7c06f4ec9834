//! Connections registry loaded from JSON.
//!
//! The on-disk layout is the legacy one: instance name -> target name ->
//! target fields, with the original field spellings accepted (see
//! [`TargetConfig`]). This module is the config collaborator for the fan-out
//! core: it only produces the resolved registry of target descriptors.
//!
//! ```json
//! {
//!     "replica": {
//!         "repA": { "server": "10.0.0.5", "user": "ro", "password": "", "base": "app" },
//!         "repB": { "server": "10.0.0.6", "user": "ro", "password": "", "base": "app" }
//!     }
//! }
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::engine::types::TargetConfig;

/// A named group of targets: target name -> descriptor.
pub type Instance = HashMap<String, TargetConfig>;

/// Default location of the connections file, relative to the home directory.
const CONNECTIONS_FILE: &str = ".fanquery/connections.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read connections file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse connections file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("home directory not found")]
    NoHomeDir,
}

/// The full registry: instance name -> named targets.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct Connections {
    pub instances: HashMap<String, Instance>,
}

impl Connections {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Loads `~/.fanquery/connections.json`.
    pub fn load_default() -> Result<Self, ConfigError> {
        Self::from_file(Self::default_path()?)
    }

    pub fn default_path() -> Result<PathBuf, ConfigError> {
        dirs::home_dir()
            .map(|home| home.join(CONNECTIONS_FILE))
            .ok_or(ConfigError::NoHomeDir)
    }

    pub fn instance(&self, name: &str) -> Option<&Instance> {
        self.instances.get(name)
    }

    /// Rewrites bare (path-less) SSH private-key file names to live under
    /// `base_dir`, so a connections file can name keys stored next to it.
    /// Keys that already carry a path are left alone.
    pub fn resolve_key_paths(&mut self, base_dir: impl AsRef<Path>) {
        let base_dir = base_dir.as_ref();
        for instance in self.instances.values_mut() {
            for target in instance.values_mut() {
                if let Some(ref mut ssh) = target.ssh_tunnel {
                    if let Some(ref key) = ssh.private_key_path {
                        let key_path = Path::new(key);
                        if key_path.parent() == Some(Path::new("")) {
                            ssh.private_key_path =
                                Some(base_dir.join(key_path).to_string_lossy().into_owned());
                        }
                    }
                }
            }
        }
    }
}
