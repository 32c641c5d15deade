//! HTTP access to a package repository.
//!
//! A repository is any static file host serving `index.json` at its base URL,
//! plus `packages/{name}/main.init` and an optional
//! `packages/{name}/package.json` per package.

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use reqwest::Client;

use crate::index::PackageRecord;

/// The fetched content of a single package.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    /// Raw bytes of `main.init`. Opaque to the package manager.
    pub content: Vec<u8>,
    /// Parsed `package.json`, when the repository serves one.
    pub metadata: Option<PackageRecord>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FetchPackages: Send + Sync {
    /// Retrieve the raw body of `{repository}/index.json`.
    async fn fetch_index(&self, repository: &str) -> Result<String>;

    /// Retrieve one package's artifact. The primary file is required; the
    /// metadata file is best-effort and its absence is not an error.
    async fn fetch_artifact(&self, repository: &str, name: &str) -> Result<Artifact>;
}

pub struct HttpRepository {
    client: Client,
}

impl HttpRepository {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FetchPackages for HttpRepository {
    #[tracing::instrument(skip(self))]
    async fn fetch_index(&self, repository: &str) -> Result<String> {
        let url = format!("{}/index.json", repository);
        debug!("Fetching package index from {}...", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to send request to the package repository")?;
        let response = response
            .error_for_status()
            .context("Package repository returned an error for the index")?;

        response
            .text()
            .await
            .context("Failed to read the package index body")
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_artifact(&self, repository: &str, name: &str) -> Result<Artifact> {
        let url = format!("{}/packages/{}/main.init", repository, name);
        debug!("Downloading {}...", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to send request for package '{}'", name))?;
        let response = response
            .error_for_status()
            .with_context(|| format!("Package repository has no content for '{}'", name))?;
        let content = response
            .bytes()
            .await
            .with_context(|| format!("Failed to read content of package '{}'", name))?
            .to_vec();

        let meta_url = format!("{}/packages/{}/package.json", repository, name);
        let metadata = match self.client.get(&meta_url).send().await {
            Ok(response) => match response.error_for_status() {
                Ok(response) => match response.json::<PackageRecord>().await {
                    Ok(record) => Some(record),
                    Err(e) => {
                        debug!("Metadata for '{}' is malformed, ignoring it: {}", name, e);
                        None
                    }
                },
                Err(e) => {
                    debug!("No metadata served for '{}': {}", name, e);
                    None
                }
            },
            Err(e) => {
                debug!("Metadata request for '{}' failed: {}", name, e);
                None
            }
        };

        Ok(Artifact { content, metadata })
    }
}
