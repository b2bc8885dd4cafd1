use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;

use crate::config::HarnessConfig;
use crate::error::FixtureError;
use crate::sources::Promise;

/// Resolves named JSON fixtures from a directory.
#[derive(Debug, Clone)]
pub struct Fixtures {
    dir: PathBuf,
}

impl Fixtures {
    /// Fixture set rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn from_config(config: &HarnessConfig) -> Self {
        Self::new(config.fixture_dir.clone())
    }

    /// Directory fixtures are read from.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Location of the fixture called `name` (without extension).
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    /// Producer that reads and decodes `<name>.json` on a worker thread once
    /// subscribed, emitting the decoded value exactly once.
    pub fn resolve<T>(&self, name: &str) -> Promise<T, FixtureError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let name = name.to_string();
        let path = self.path_for(&name);
        Promise::named(format!("fixture:{name}"), move |resolver| {
            resolver.resolve(load(&name, &path))
        })
    }
}

impl Default for Fixtures {
    fn default() -> Self {
        Self::from_config(&HarnessConfig::default())
    }
}

fn load<T: DeserializeOwned>(name: &str, path: &Path) -> Result<T, FixtureError> {
    let bytes = fs::read(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            FixtureError::NotFound {
                name: name.to_string(),
            }
        } else {
            FixtureError::Read {
                name: name.to_string(),
                source,
            }
        }
    })?;

    let value = serde_json::from_slice(&bytes).map_err(|source| FixtureError::Decode {
        name: name.to_string(),
        source,
    })?;
    tracing::debug!(fixture = name, path = %path.display(), "fixture decoded");
    Ok(value)
}
