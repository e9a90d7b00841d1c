//! Command-line construction for the server process

use crate::config::ServerConfig;

/// Name of the server jar inside the run directory
pub const SERVER_JAR_NAME: &str = "HytaleServer.jar";

/// Port the JDWP agent listens on in debug mode
pub const DEBUG_PORT: u16 = 5005;

/// JVM argument that lets a debugger attach on [`DEBUG_PORT`]
pub const DEBUG_AGENT_ARG: &str = "-agentlib:jdwp=transport=dt_socket,server=y,suspend=n,address=5005";

/// Server arguments derived from the configuration.
///
/// Order is fixed: `--auth-mode <mode>`, then the singleplayer flags when
/// enabled.
pub fn server_args(config: &ServerConfig) -> Vec<String> {
    let mut args = vec!["--auth-mode".to_string(), config.auth_mode.to_string()];

    if let Some(owner) = &config.singleplayer {
        args.extend([
            "--singleplayer".to_string(),
            "--owner-name".to_string(),
            owner.name.clone(),
            "--owner-uuid".to_string(),
            owner.uuid.clone(),
        ]);
    }

    args
}

/// Full argument list for the Java runtime
pub fn launch_args(config: &ServerConfig, debug: bool) -> Vec<String> {
    let mut args = Vec::new();
    if debug {
        args.push(DEBUG_AGENT_ARG.to_string());
    }
    args.push("-jar".to_string());
    args.push(SERVER_JAR_NAME.to_string());
    args.extend(server_args(config));
    args
}
