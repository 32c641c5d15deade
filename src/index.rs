//! The remote package index and its local cache.

use anyhow::Result;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::environment::Environment;
use crate::repository::FetchPackages;
use crate::runtime::Runtime;

/// One entry of the repository index: the latest advertised metadata for a
/// package, keyed by name in [`PackageIndex`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PackageRecord {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub license: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub keywords: Option<Vec<String>>,
}

pub type PackageIndex = BTreeMap<String, PackageRecord>;

/// Load the package index, network first.
///
/// On a successful fetch the cache file is overwritten with the raw response
/// body and the parsed mapping is returned. On any failure (connectivity,
/// non-2xx, malformed payload) the last cached copy is used instead; with no
/// usable cache the result is an empty mapping. Errors never cross this
/// boundary.
#[tracing::instrument(skip(runtime, source, env))]
pub async fn load_index<R: Runtime, S: FetchPackages>(
    runtime: &R,
    source: &S,
    env: &Environment,
    repository: &str,
) -> PackageIndex {
    match source.fetch_index(repository).await {
        Ok(body) => match serde_json::from_str::<PackageIndex>(&body) {
            Ok(index) => {
                if let Err(e) = runtime.write(&env.index_cache_file(), body.as_bytes()) {
                    warn!("Could not update the index cache: {:#}", e);
                }
                index
            }
            Err(e) => {
                warn!("Package index from {} is malformed: {}", repository, e);
                load_cached(runtime, env).unwrap_or_default()
            }
        },
        Err(e) => {
            warn!("Could not fetch the package index: {:#}", e);
            load_cached(runtime, env).unwrap_or_default()
        }
    }
}

/// Read the cached index file, if present and parseable.
#[tracing::instrument(skip(runtime, env))]
pub fn load_cached<R: Runtime>(runtime: &R, env: &Environment) -> Option<PackageIndex> {
    let cache_file = env.index_cache_file();
    if !runtime.exists(&cache_file) {
        return None;
    }

    debug!("Falling back to cached index at {:?}", cache_file);
    let body = match runtime.read_to_string(&cache_file) {
        Ok(body) => body,
        Err(e) => {
            debug!("Could not read cached index: {:#}", e);
            return None;
        }
    };

    match serde_json::from_str(&body) {
        Ok(index) => Some(index),
        Err(e) => {
            debug!("Cached index is malformed, ignoring it: {}", e);
            None
        }
    }
}

/// Delete the cached index so the next load goes to the network.
#[tracing::instrument(skip(runtime, env))]
pub fn invalidate<R: Runtime>(runtime: &R, env: &Environment) -> Result<()> {
    let cache_file = env.index_cache_file();
    if runtime.exists(&cache_file) {
        runtime.remove_file(&cache_file)?;
    }
    Ok(())
}
