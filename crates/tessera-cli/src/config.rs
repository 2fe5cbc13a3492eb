//! CLI configuration, read from RON.
//!
//! ```ron
//! (
//!     node_name: "node-1",
//!     realm_name: "corp_ldap",
//!     realm_type: "ldap",
//! )
//! ```
//!
//! Every field is optional. Without `--config`, the file is looked up at
//! `$XDG_CONFIG_HOME/tessera/config.ron`, and a missing file means defaults.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Node name recorded in issued realm origins.
    pub node_name: String,
    /// Realm used for issued identities unless overridden.
    pub realm_name: String,
    pub realm_type: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            node_name: default_node_name(),
            realm_name: "default_file".into(),
            realm_type: "file".into(),
        }
    }
}

fn default_node_name() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .unwrap_or_else(|| "localhost".into())
}

impl Config {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("tessera").join("config.ron"))
    }

    /// Load from `path`, or from the default location when `None`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Config = ron::from_str(&text)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        tracing::debug!(path = %path.display(), ?config, "loaded config");
        Ok(config)
    }
}

// ============================================================================
// Tests
// ============================================================================
