use anyhow::Result;
use reqwest::Client;
use std::path::PathBuf;

use crate::environment::Environment;
use crate::repository::{FetchPackages, HttpRepository};
use crate::runtime::{RealRuntime, Runtime};

/// Wiring for one invocation: the runtime, the repository access and the
/// resolved application directory.
pub struct Config<R: Runtime, S: FetchPackages> {
    pub runtime: R,
    pub source: S,
    pub env: Environment,
}

impl Config<RealRuntime, HttpRepository> {
    pub fn new(root: Option<PathBuf>) -> Result<Self> {
        let runtime = RealRuntime;
        let env = Environment::new(&runtime, root)?;

        let client = Client::builder().user_agent("initpkg-cli").build()?;
        let source = HttpRepository::new(client);

        Ok(Self {
            runtime,
            source,
            env,
        })
    }
}
