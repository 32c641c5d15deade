//! The install state machine: reconciles requested names against the index
//! and the installed set, and drives artifact fetches to completion or
//! reported failure.

use anyhow::{Context, Result};
use log::{debug, warn};
use std::path::Path;

use crate::environment::Environment;
use crate::index::{self, PackageIndex, PackageRecord};
use crate::repository::{Artifact, FetchPackages};
use crate::runtime::Runtime;
use crate::state::{DEFAULT_LOCAL_VERSION, InstalledEntry, PersistentState, Source};

pub mod config;

pub use config::Config;

/// Terminal state of one package's install attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    /// Fetched, written to disk and recorded.
    Installed,
    /// Name already present in the installed set; nothing touched.
    AlreadyInstalled,
    /// Name absent from the index; reported with the available names.
    NotFound,
    /// Artifact fetch failed; reported, dependencies not attempted.
    FetchFailed,
}

pub struct Installer<R: Runtime, S: FetchPackages> {
    pub runtime: R,
    pub source: S,
    pub env: Environment,
}

impl<R: Runtime, S: FetchPackages> Installer<R, S> {
    pub fn new(runtime: R, source: S, env: Environment) -> Self {
        Self {
            runtime,
            source,
            env,
        }
    }

    /// Install the requested packages from the repository.
    ///
    /// Each name is handled independently; a failure for one never aborts its
    /// siblings. Dependencies are resolved depth-first against the same index
    /// snapshot.
    #[tracing::instrument(skip(self, names, state))]
    pub async fn install(&self, names: &[String], state: &mut PersistentState) -> Result<()> {
        let index =
            index::load_index(&self.runtime, &self.source, &self.env, &state.repository).await;

        if index.is_empty() {
            println!("Error: Cannot connect to package repository");
            return Ok(());
        }

        for name in names {
            self.install_with_deps(name, &index, state).await?;
        }
        Ok(())
    }

    /// Depth-first walk over a package and its declared dependencies.
    ///
    /// An entry is recorded in the installed set before its dependencies are
    /// visited, so the already-installed check terminates dependency cycles.
    async fn install_with_deps(
        &self,
        name: &str,
        index: &PackageIndex,
        state: &mut PersistentState,
    ) -> Result<()> {
        let mut pending = vec![name.to_string()];

        while let Some(current) = pending.pop() {
            let outcome = self.install_one(&current, index, state).await?;
            if outcome != InstallOutcome::Installed {
                continue;
            }

            if let Some(record) = index.get(&current) {
                // Reversed so the stack pops dependencies in declared order.
                for dependency in record.dependencies.iter().rev() {
                    if !state.installed_packages.contains_key(dependency) {
                        pending.push(dependency.clone());
                    }
                }
            }
        }
        Ok(())
    }

    async fn install_one(
        &self,
        name: &str,
        index: &PackageIndex,
        state: &mut PersistentState,
    ) -> Result<InstallOutcome> {
        if state.installed_packages.contains_key(name) {
            println!("Package '{}' is already installed", name);
            return Ok(InstallOutcome::AlreadyInstalled);
        }

        let Some(record) = index.get(name) else {
            println!("Package '{}' not found in repository", name);
            let available: Vec<&str> = index.keys().map(String::as_str).collect();
            println!("Available packages: {}", available.join(", "));
            return Ok(InstallOutcome::NotFound);
        };

        println!("  installing {} v{}", name, record.version);
        let artifact = match self.source.fetch_artifact(&state.repository, name).await {
            Ok(artifact) => artifact,
            Err(e) => {
                warn!("Fetch of '{}' failed: {:#}", name, e);
                println!("Failed to install '{}': {:#}", name, e);
                return Ok(InstallOutcome::FetchFailed);
            }
        };

        let package_dir = self.write_package(name, record, &artifact)?;

        state.installed_packages.insert(
            name.to_string(),
            InstalledEntry {
                version: record.version.clone(),
                path: package_dir,
                source: Source::Github,
            },
        );
        // Saved per package, not batched: a crash mid-run keeps prior
        // successes durable.
        state.save(&self.runtime, &self.env)?;

        println!("   installed {} v{}", name, record.version);
        Ok(InstallOutcome::Installed)
    }

    /// Write a fetched package under the managed packages directory,
    /// replacing any stale directory of the same name. On a write failure the
    /// directory is removed again; a package is either fully present or
    /// absent.
    fn write_package(
        &self,
        name: &str,
        record: &PackageRecord,
        artifact: &Artifact,
    ) -> Result<std::path::PathBuf> {
        let package_dir = self.env.package_dir(name);

        // Replace, don't merge.
        if self.runtime.exists(&package_dir) {
            self.runtime.remove_dir_all(&package_dir)?;
        }
        self.runtime.create_dir_all(&package_dir)?;

        if let Err(e) = self.write_package_files(&package_dir, record, artifact) {
            debug!("Write failed, cleaning up {:?}", package_dir);
            let _ = self.runtime.remove_dir_all(&package_dir);
            return Err(e);
        }
        Ok(package_dir)
    }

    fn write_package_files(
        &self,
        package_dir: &Path,
        record: &PackageRecord,
        artifact: &Artifact,
    ) -> Result<()> {
        self.runtime
            .write(&package_dir.join("main.init"), &artifact.content)?;

        // The repository's package.json when it serves one, otherwise the
        // index entry we already hold.
        let metadata = artifact.metadata.as_ref().unwrap_or(record);
        let json = serde_json::to_string_pretty(metadata)
            .context("Failed to serialize package metadata")?;
        self.runtime
            .write(&package_dir.join("package.json"), json.as_bytes())?;
        Ok(())
    }

    /// Install a package from a directory on this machine. The directory must
    /// contain `main.init`; its whole tree is copied under the managed
    /// packages directory, replacing any existing directory of the same name.
    /// Local packages are leaves: no dependency resolution.
    #[tracing::instrument(skip(self, path, state))]
    pub fn install_local(&self, path: &Path, state: &mut PersistentState) -> Result<()> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("Invalid package directory name: {:?}", path))?;

        if !self.runtime.exists(&path.join("main.init")) {
            println!("No main.init found in {}", path.display());
            return Ok(());
        }

        let package_dir = self.env.package_dir(name);
        if self.runtime.exists(&package_dir) {
            self.runtime.remove_dir_all(&package_dir)?;
        }
        copy_dir_all(&self.runtime, path, &package_dir)?;

        state.installed_packages.insert(
            name.to_string(),
            InstalledEntry {
                version: DEFAULT_LOCAL_VERSION.to_string(),
                path: package_dir,
                source: Source::Local,
            },
        );
        state.save(&self.runtime, &self.env)?;

        println!("   installed {} (local)", name);
        Ok(())
    }

    /// Remove packages from disk and from the installed set. Unknown names
    /// are reported no-ops. Dependents of a removed package are not checked.
    #[tracing::instrument(skip(self, names, state))]
    pub fn uninstall(&self, names: &[String], state: &mut PersistentState) -> Result<()> {
        for name in names {
            match state.installed_packages.remove(name) {
                Some(entry) => {
                    if self.runtime.exists(&entry.path) {
                        self.runtime.remove_dir_all(&entry.path)?;
                    }
                    state.save(&self.runtime, &self.env)?;
                    println!(" uninstalled {}", name);
                }
                None => {
                    println!("Package '{}' is not installed", name);
                }
            }
        }
        Ok(())
    }

    /// Refresh the cached index and report installed packages whose
    /// advertised version has moved. Does not reinstall anything.
    #[tracing::instrument(skip(self, state))]
    pub async fn update(&self, state: &PersistentState) -> Result<()> {
        index::invalidate(&self.runtime, &self.env)?;
        let index =
            index::load_index(&self.runtime, &self.source, &self.env, &state.repository).await;

        if index.is_empty() {
            println!("Error: Cannot connect to package repository");
            return Ok(());
        }

        println!(
            "Package index updated ({} packages available)",
            index.len()
        );

        let mut updates = 0;
        for (name, entry) in &state.installed_packages {
            if entry.source != Source::Github {
                continue;
            }
            if let Some(record) = index.get(name) {
                if record.version != entry.version {
                    println!(
                        "{}: v{} installed, v{} available",
                        name, entry.version, record.version
                    );
                    updates += 1;
                }
            }
        }

        if updates == 0 {
            println!("All installed packages are up to date");
        }
        Ok(())
    }
}

/// Recursive directory copy through the runtime.
fn copy_dir_all<R: Runtime>(runtime: &R, from: &Path, to: &Path) -> Result<()> {
    runtime.create_dir_all(to)?;
    for entry in runtime.read_dir(from)? {
        let file_name = entry
            .file_name()
            .with_context(|| format!("Unreadable entry name in {:?}", from))?;
        let dest = to.join(file_name);
        if runtime.is_dir(&entry) {
            copy_dir_all(runtime, &entry, &dest)?;
        } else {
            runtime.copy(&entry, &dest)?;
        }
    }
    Ok(())
}
