//! Request payload resources
//!
//! Payloads are plain files below a configured directory. They are read while
//! the plan is assembled so a missing file stops assembly instead of surfacing
//! as a failed request mid-run.

use std::io;
use std::path::{Component, Path, PathBuf};

use bytes::Bytes;

use crate::config::PayloadConfig;
use crate::error::{PlanError, PlanResult};

/// Read-only view over a payload directory.
#[derive(Debug, Clone)]
pub struct PayloadStore {
    root: PathBuf,
}

impl PayloadStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn from_config(config: &PayloadConfig) -> Self {
        Self::new(config.dir.clone())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Reads the resource `name`, relative to the store root.
    pub fn load(&self, name: &str) -> PlanResult<Bytes> {
        let path = self.resolve(name)?;
        let data = std::fs::read(&path).map_err(|source| PlanError::payload_load(name, source))?;

        tracing::debug!(payload = name, path = %path.display(), bytes = data.len(), "loaded payload");
        Ok(Bytes::from(data))
    }

    /// Reads the resource `name` as UTF-8 text.
    pub fn load_string(&self, name: &str) -> PlanResult<String> {
        let bytes = self.load(name)?;
        String::from_utf8(bytes.to_vec()).map_err(|err| {
            PlanError::payload_load(name, io::Error::new(io::ErrorKind::InvalidData, err))
        })
    }

    fn resolve(&self, name: &str) -> PlanResult<PathBuf> {
        let relative = Path::new(name);
        let escapes = name.trim().is_empty()
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));

        if escapes {
            return Err(PlanError::payload_load(
                name,
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "payload names must be relative paths inside the payload directory",
                ),
            ));
        }

        Ok(self.root.join(relative))
    }
}
