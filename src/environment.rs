//! Application directory layout.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::runtime::Runtime;

/// Locations of everything initpkg keeps on disk, rooted at a single
/// application directory (`~/.initlang` unless overridden).
///
/// Constructed once per invocation and passed into every component; there are
/// no process-wide path constants.
#[derive(Debug, Clone, PartialEq)]
pub struct Environment {
    root: PathBuf,
}

impl Environment {
    /// Resolve the application directory and make sure its subdirectories
    /// exist. Being unable to create them is the one unrecoverable error
    /// class in the tool.
    #[tracing::instrument(skip(runtime, root))]
    pub fn new<R: Runtime>(runtime: &R, root: Option<PathBuf>) -> Result<Self> {
        let root = match root {
            Some(path) => path,
            None => runtime
                .home_dir()
                .context("Could not determine home directory")?
                .join(".initlang"),
        };

        let env = Self { root };
        for dir in [env.root.clone(), env.packages_dir(), env.cache_dir()] {
            runtime
                .create_dir_all(&dir)
                .with_context(|| format!("Failed to create application directory {:?}", dir))?;
        }
        Ok(env)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// One subdirectory per installed package.
    pub fn packages_dir(&self) -> PathBuf {
        self.root.join("packages")
    }

    pub fn package_dir(&self, name: &str) -> PathBuf {
        self.packages_dir().join(name)
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.root.join("cache")
    }

    /// Last successfully fetched copy of the remote index.
    pub fn index_cache_file(&self) -> PathBuf {
        self.cache_dir().join("index.json")
    }

    /// Serialized [`crate::state::PersistentState`].
    pub fn state_file(&self) -> PathBuf {
        self.root.join("packages.json")
    }
}
