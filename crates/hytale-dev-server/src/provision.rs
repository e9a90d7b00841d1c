//! Run directory preparation
//!
//! Game files are fetched once and kept across runs; the plugin jar is
//! replaced on every run so the server always loads the latest build.

use hytale_dev_core::install::ASSETS_ZIP;
use hytale_dev_core::{HytaleDevError, Installation, Result, SERVER_JAR_NAME};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

/// Run directory, relative to the project directory
pub const RUN_DIR: &str = "run";

/// Paths of the tool-managed run directory tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLayout {
    root: PathBuf,
}

impl RunLayout {
    pub fn new(project_dir: &Path) -> Self {
        Self {
            root: project_dir.join(RUN_DIR),
        }
    }

    /// `run/`
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `run/server/`, the server's working directory
    pub fn server_dir(&self) -> PathBuf {
        self.root.join("server")
    }

    pub fn mods_dir(&self) -> PathBuf {
        self.server_dir().join("mods")
    }

    pub fn plugins_dir(&self) -> PathBuf {
        self.server_dir().join("plugins")
    }

    pub fn assets_zip(&self) -> PathBuf {
        self.mods_dir().join(ASSETS_ZIP)
    }

    pub fn server_jar(&self) -> PathBuf {
        self.server_dir().join(SERVER_JAR_NAME)
    }
}

/// Result of a copy-once step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyOutcome {
    Copied,
    AlreadyPresent,
}

/// Result of deploying the plugin artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginOutcome {
    /// Copied to the contained path
    Deployed(PathBuf),
    /// No artifact was available
    Missing,
}

/// What `provision` did to the run directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionReport {
    pub cleaned: bool,
    pub assets: CopyOutcome,
    pub server_jar: CopyOutcome,
    pub plugin: PluginOutcome,
}

/// Prepare the run directory for one server run.
///
/// With `clean` set the whole run directory is removed first.
pub async fn provision(
    layout: &RunLayout,
    installation: &Installation,
    plugin: Option<&Path>,
    clean: bool,
) -> Result<ProvisionReport> {
    let cleaned = clean && exists(layout.root()).await?;
    if cleaned {
        if let Some(plugin) = plugin {
            if is_within(plugin, layout.root()).await {
                return Err(HytaleDevError::Configuration(format!(
                    "plugin {} is inside {}, which a clean run deletes",
                    plugin.display(),
                    layout.root().display()
                )));
            }
        }
        info!("Cleaning up previous run in {}", layout.root().display());
        fs::remove_dir_all(layout.root())
            .await
            .map_err(|e| HytaleDevError::io(layout.root(), e))?;
    }

    for dir in [layout.server_dir(), layout.mods_dir(), layout.plugins_dir()] {
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| HytaleDevError::io(&dir, e))?;
    }

    let assets = copy_if_absent(&installation.assets_zip(), &layout.assets_zip()).await?;
    let server_jar = copy_if_absent(&installation.server_jar(), &layout.server_jar()).await?;
    let plugin = deploy_plugin(plugin, &layout.plugins_dir()).await?;

    Ok(ProvisionReport {
        cleaned,
        assets,
        server_jar,
        plugin,
    })
}

async fn exists(path: &Path) -> Result<bool> {
    fs::try_exists(path)
        .await
        .map_err(|e| HytaleDevError::io(path, e))
}

async fn copy_if_absent(source: &Path, dest: &Path) -> Result<CopyOutcome> {
    let name = display_name(dest);
    if exists(dest).await? {
        info!("{} already exists. Skipping copy.", name);
        return Ok(CopyOutcome::AlreadyPresent);
    }

    info!("{} not found in run directory. Copying from local Hytale installation...", name);
    let bytes = fs::copy(source, dest)
        .await
        .map_err(|e| HytaleDevError::io(source, e))?;
    debug!("Copied {} bytes to {}", bytes, dest.display());
    info!("{} copied.", name);
    Ok(CopyOutcome::Copied)
}

async fn deploy_plugin(plugin: Option<&Path>, plugins_dir: &Path) -> Result<PluginOutcome> {
    let Some(source) = plugin else {
        warn!("No plugin artifact found, starting the server without it");
        return Ok(PluginOutcome::Missing);
    };

    let Some(file_name) = source.file_name() else {
        warn!("Plugin path {} has no file name, skipping it", source.display());
        return Ok(PluginOutcome::Missing);
    };

    let dest = plugins_dir.join(file_name);
    if same_file(source, &dest).await {
        info!("Plugin already in place: {}", dest.display());
        return Ok(PluginOutcome::Deployed(dest));
    }

    fs::copy(source, &dest)
        .await
        .map_err(|e| HytaleDevError::io(source, e))?;
    info!("Plugin copied to: {}", dest.display());
    Ok(PluginOutcome::Deployed(dest))
}

/// Both paths exist and resolve to the same file
async fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a).await, fs::canonicalize(b).await) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

async fn is_within(path: &Path, dir: &Path) -> bool {
    match (fs::canonicalize(path).await, fs::canonicalize(dir).await) {
        (Ok(path), Ok(dir)) => path.starts_with(dir),
        _ => false,
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
