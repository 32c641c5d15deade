//! Persisted installation state.

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::environment::Environment;
use crate::runtime::Runtime;

pub const DEFAULT_REPOSITORY: &str =
    "https://raw.githubusercontent.com/gopu-inc/initlang-packages/main";

/// Version recorded for packages installed from a local directory, which
/// carry no index entry to take a version from.
pub const DEFAULT_LOCAL_VERSION: &str = "1.0.0";

/// Where an installed package came from.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    #[default]
    Github,
    Local,
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Source::Github => write!(f, "github"),
            Source::Local => write!(f, "local"),
        }
    }
}

/// Snapshot of one successful install. Replaced wholesale on reinstall and
/// removed on uninstall; never mutated in place.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct InstalledEntry {
    pub version: String,
    pub path: PathBuf,
    #[serde(default)]
    pub source: Source,
}

/// The on-disk record of truth: configured repository plus the installed set.
///
/// Unknown top-level keys found in the file are kept across a load/save round
/// trip, so state written by a newer version of the tool survives being
/// touched by an older one.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PersistentState {
    #[serde(default = "default_repository")]
    pub repository: String,
    #[serde(default)]
    pub installed_packages: BTreeMap<String, InstalledEntry>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_repository() -> String {
    DEFAULT_REPOSITORY.to_string()
}

impl Default for PersistentState {
    fn default() -> Self {
        Self {
            repository: default_repository(),
            installed_packages: BTreeMap::new(),
            extra: serde_json::Map::new(),
        }
    }
}

impl PersistentState {
    /// Read the state file. Absence and corruption both degrade to the
    /// default state; "no state yet" is never an error.
    #[tracing::instrument(skip(runtime, env))]
    pub fn load<R: Runtime>(runtime: &R, env: &Environment) -> Self {
        let state_file = env.state_file();
        if !runtime.exists(&state_file) {
            return Self::default();
        }

        match runtime
            .read_to_string(&state_file)
            .and_then(|body| serde_json::from_str(&body).map_err(Into::into))
        {
            Ok(state) => state,
            Err(e) => {
                debug!(
                    "State file {:?} is unreadable, starting fresh: {:#}",
                    state_file, e
                );
                Self::default()
            }
        }
    }

    /// Write the full state. Goes through a sibling temp file and a rename so
    /// a concurrent reader never observes a torn file.
    #[tracing::instrument(skip(self, runtime, env))]
    pub fn save<R: Runtime>(&self, runtime: &R, env: &Environment) -> Result<()> {
        let state_file = env.state_file();
        let json = serde_json::to_string_pretty(self).context("Failed to serialize state")?;

        let tmp_path = state_file.with_extension("json.tmp");
        runtime
            .write(&tmp_path, json.as_bytes())
            .with_context(|| format!("Failed to write state to {:?}", tmp_path))?;
        runtime
            .rename(&tmp_path, &state_file)
            .with_context(|| format!("Failed to move state into place at {:?}", state_file))?;
        Ok(())
    }
}
