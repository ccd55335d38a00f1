//! Engine home bootstrap
//!
//! The engine expects a home directory holding `bin/engine.properties`. When
//! none is configured a throwaway home is created and removed again when the
//! [`EngineHome`] is dropped.

use std::fs;
use std::path::{Path, PathBuf};

use perfplan_core::config::EngineConfig;
use tempfile::TempDir;

use crate::error::{EngineError, EngineResult};

pub const PROPERTIES_FILE: &str = "engine.properties";

/// Prepared engine environment for one run.
#[derive(Debug)]
pub struct EngineHome {
    path: PathBuf,
    // Keeps a generated home alive until the run ends.
    temp: Option<TempDir>,
}

impl EngineHome {
    /// Uses the configured home, or creates a temporary one.
    pub fn prepare(config: &EngineConfig) -> EngineResult<Self> {
        match &config.home {
            Some(home) => Self::existing(home),
            None => Self::temporary(config),
        }
    }

    fn existing(home: &Path) -> EngineResult<Self> {
        let metadata = fs::metadata(home)
            .map_err(|err| EngineError::bootstrap_io(format!("engine home `{}` is not accessible", home.display()), err))?;

        if !metadata.is_dir() {
            return Err(EngineError::bootstrap(format!(
                "engine home `{}` is not a directory",
                home.display()
            )));
        }

        tracing::debug!(home = %home.display(), "using configured engine home");
        Ok(Self {
            path: home.to_path_buf(),
            temp: None,
        })
    }

    fn temporary(config: &EngineConfig) -> EngineResult<Self> {
        let temp = tempfile::Builder::new()
            .prefix("perfplan-home-")
            .tempdir()
            .map_err(|err| EngineError::bootstrap_io("failed to create temporary engine home", err))?;

        let bin = temp.path().join("bin");
        fs::create_dir_all(&bin).map_err(|err| EngineError::bootstrap_io("failed to create engine bin directory", err))?;

        let properties = format!(
            "# generated by perfplan\nsummariser.name={}\nresults.log={}\nresponse.logging={}\n",
            config.summariser_name,
            config.results_log.display(),
            config.response_logging
        );
        fs::write(bin.join(PROPERTIES_FILE), properties)
            .map_err(|err| EngineError::bootstrap_io("failed to write engine properties", err))?;

        tracing::info!(home = %temp.path().display(), "created temporary engine home");
        Ok(Self {
            path: temp.path().to_path_buf(),
            temp: Some(temp),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn properties_path(&self) -> PathBuf {
        self.path.join("bin").join(PROPERTIES_FILE)
    }

    pub fn is_temporary(&self) -> bool {
        self.temp.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temporary_home_is_created_and_removed() {
        let config = EngineConfig::default();
        let home = EngineHome::prepare(&config).unwrap();
        assert!(home.is_temporary());

        let properties = fs::read_to_string(home.properties_path()).unwrap();
        assert!(properties.contains("summariser.name=summary"));

        let path = home.path().to_path_buf();
        drop(home);
        assert!(!path.exists());
    }

    #[test]
    fn test_configured_home_must_be_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig {
            home: Some(dir.path().to_path_buf()),
            ..EngineConfig::default()
        };
        let home = EngineHome::prepare(&config).unwrap();
        assert!(!home.is_temporary());
        assert_eq!(home.path(), dir.path());

        let file = dir.path().join("not-a-dir");
        fs::write(&file, "x").unwrap();
        let config = EngineConfig {
            home: Some(file),
            ..EngineConfig::default()
        };
        assert!(matches!(EngineHome::prepare(&config), Err(EngineError::Bootstrap { .. })));

        let config = EngineConfig {
            home: Some(dir.path().join("missing")),
            ..EngineConfig::default()
        };
        assert!(matches!(
            EngineHome::prepare(&config),
            Err(EngineError::Bootstrap { source: Some(_), .. })
        ));
    }
}
