//! # hytale-dev-server
//!
//! Runs a local Hytale server with the plugin under development.
//!
//! This crate provides:
//! - Plugin artifact and Java runtime lookup
//! - Run directory provisioning (`run/server`)
//! - Process supervision with stdio forwarding and the post-boot login command

pub mod forward;
pub mod java;
pub mod plugin;
pub mod provision;
pub mod supervisor;

pub use provision::{ProvisionReport, RunLayout, provision};
pub use supervisor::{LaunchSpec, ProcessState, ServerSupervisor, ShutdownSignal};

use hytale_dev_core::{
    CONFIG_FILE_NAME, DEBUG_PORT, InstallationLocator, Result, ServerConfig, launch_args,
    server_args,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Default wait at each step of stopping the server
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(10);

/// Options for one `run` invocation
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Plugin project; `run/` and `build/libs/` live here
    pub project_dir: PathBuf,
    /// Path of `local.properties`
    pub config_path: PathBuf,
    /// Delete the run directory before provisioning
    pub clean: bool,
    /// Attach the JDWP agent
    pub debug: bool,
    /// Plugin jar to deploy instead of the newest build output
    pub plugin: Option<PathBuf>,
    /// Java executable to use instead of JAVA_HOME/PATH lookup
    pub java: Option<PathBuf>,
    /// Application-data root to use instead of the platform variable
    pub data_root: Option<PathBuf>,
    pub stop_timeout: Duration,
}

impl RunOptions {
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        let project_dir = project_dir.into();
        Self {
            config_path: project_dir.join(CONFIG_FILE_NAME),
            project_dir,
            clean: false,
            debug: false,
            plugin: None,
            java: None,
            data_root: None,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }

    fn locator(&self) -> InstallationLocator {
        match &self.data_root {
            Some(root) => InstallationLocator::with_root(root),
            None => InstallationLocator::from_env(),
        }
    }
}

/// Load config, find the game, provision `run/server` and supervise the
/// server until it exits. Returns the server's exit code.
pub async fn run_server(options: &RunOptions) -> Result<Option<i32>> {
    let config = ServerConfig::load_or_init(&options.config_path)?;
    let installation = options.locator().locate(&config.version)?;

    let plugin =
        plugin::resolve_plugin_artifact(&options.project_dir, options.plugin.as_deref());
    let layout = RunLayout::new(&options.project_dir);
    provision(&layout, &installation, plugin.as_deref(), options.clean).await?;

    let spec = launch_spec(&config, options, &layout)?;

    info!(
        "Starting Hytale server with args: {}",
        server_args(&config).join(" ")
    );
    if options.debug {
        info!("Debug mode enabled. Connect debugger to port {}", DEBUG_PORT);
    }
    info!("Press Ctrl+C to stop the server");

    let mut supervisor = ServerSupervisor::new(spec);
    supervisor.run().await
}

fn launch_spec(
    config: &ServerConfig,
    options: &RunOptions,
    layout: &RunLayout,
) -> Result<LaunchSpec> {
    Ok(LaunchSpec {
        program: java::resolve_java(options.java.as_deref())?,
        args: launch_args(config, options.debug),
        working_dir: layout.server_dir(),
        auth_mode: config.auth_mode,
        stop_timeout: options.stop_timeout,
    })
}

/// `local.properties` next to the project, unless overridden
pub fn default_config_path(project_dir: &Path) -> PathBuf {
    project_dir.join(CONFIG_FILE_NAME)
}
