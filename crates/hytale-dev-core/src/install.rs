//! Lookup of the local Hytale installation

use crate::error::{HytaleDevError, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Path from the application-data root to the per-version game folders
pub const GAME_DIR: &str = "Hytale/install/release/package/game";

/// Asset archive, relative to a version folder
pub const ASSETS_ZIP: &str = "Assets.zip";

/// Server jar, relative to a version folder
pub const SERVER_JAR: &str = "Server/HytaleServer.jar";

/// Environment variable naming the application-data root on this platform
#[cfg(windows)]
pub const DATA_ROOT_VAR: &str = "APPDATA";
#[cfg(target_os = "macos")]
pub const DATA_ROOT_VAR: &str = "HOME";
#[cfg(all(unix, not(target_os = "macos")))]
pub const DATA_ROOT_VAR: &str = "XDG_DATA_HOME";

/// Resolve the application-data root using `lookup` for environment access
pub fn data_root_with<F>(lookup: F) -> Option<PathBuf>
where
    F: Fn(&str) -> Option<OsString>,
{
    let non_empty = |name: &str| lookup(name).filter(|v| !v.is_empty()).map(PathBuf::from);

    #[cfg(windows)]
    {
        non_empty("APPDATA")
    }

    #[cfg(target_os = "macos")]
    {
        non_empty("HOME").map(|home| home.join("Library/Application Support"))
    }

    #[cfg(all(unix, not(target_os = "macos")))]
    {
        non_empty("XDG_DATA_HOME").or_else(|| non_empty("HOME").map(|home| home.join(".local/share")))
    }
}

/// A validated game installation for one version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Installation {
    dir: PathBuf,
    version: String,
}

impl Installation {
    /// Version folder, e.g. `.../game/latest`
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn assets_zip(&self) -> PathBuf {
        self.dir.join(ASSETS_ZIP)
    }

    pub fn server_jar(&self) -> PathBuf {
        self.dir.join(SERVER_JAR)
    }
}

/// Finds game installations below an application-data root
#[derive(Debug, Clone)]
pub struct InstallationLocator {
    data_root: Option<PathBuf>,
}

impl InstallationLocator {
    /// Locator rooted at the platform's application-data directory
    pub fn from_env() -> Self {
        Self {
            data_root: data_root_with(|name| std::env::var_os(name)),
        }
    }

    /// Locator rooted at an explicit application-data directory
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: Some(root.into()),
        }
    }

    /// Expected version folder, if the data root is known
    pub fn game_dir(&self, version: &str) -> Option<PathBuf> {
        self.data_root
            .as_ref()
            .map(|root| root.join(GAME_DIR).join(version))
    }

    /// Find and validate the installation for `version`
    pub fn locate(&self, version: &str) -> Result<Installation> {
        let not_found = |searched: String, reason: String| HytaleDevError::InstallationNotFound {
            version: version.to_string(),
            searched,
            reason,
        };

        let Some(dir) = self.game_dir(version) else {
            return Err(not_found(
                format!("${}/{}/{}", DATA_ROOT_VAR, GAME_DIR, version),
                format!("{} is not set", DATA_ROOT_VAR),
            ));
        };

        debug!("Looking for Hytale {} in {}", version, dir.display());
        if !dir.is_dir() {
            return Err(not_found(
                dir.display().to_string(),
                "directory does not exist".into(),
            ));
        }

        let installation = Installation {
            dir,
            version: version.to_string(),
        };

        for required in [installation.assets_zip(), installation.server_jar()] {
            if !required.is_file() {
                return Err(not_found(
                    installation.dir.display().to_string(),
                    format!("missing {}", required.display()),
                ));
            }
        }

        info!(
            "Found Hytale installation for version '{}' at: {}",
            version,
            installation.dir.display()
        );
        Ok(installation)
    }
}
