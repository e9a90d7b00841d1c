//! hytale-dev: run a local Hytale server with your plugin
//!
//! Finds the installed game, prepares `run/server` in the project directory,
//! deploys the latest plugin build and attaches the server console to this
//! terminal. Settings live in `local.properties`, created on first run.

use anyhow::Result;
use clap::error::ErrorKind;
use clap::parser::ValueSource;
use clap::{Args, CommandFactory, FromArgMatches, Parser, Subcommand};
use hytale_dev_core::ServerConfig;
use hytale_dev_server::{RunOptions, default_config_path, run_server};
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "hytale-dev", version, about)]
struct Cli {
    /// Plugin project directory
    #[arg(long, global = true, value_name = "DIR", default_value = ".")]
    project_dir: PathBuf,

    /// Configuration file [default: <project-dir>/local.properties]
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    run: RunArgs,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Provision the run directory and start the server (default)
    Run(RunArgs),
    /// Print the effective configuration as JSON
    Config,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Delete the run directory before starting
    #[arg(long)]
    clean: bool,

    /// Let a debugger attach on port 5005
    #[arg(long)]
    debug: bool,

    /// Plugin jar to deploy [default: newest jar in build/libs]
    #[arg(long, value_name = "JAR")]
    plugin: Option<PathBuf>,

    /// Java executable [default: JAVA_HOME, then PATH]
    #[arg(long, value_name = "PATH")]
    java: Option<PathBuf>,

    /// Application-data root containing the Hytale installation
    #[arg(long, value_name = "DIR", env = "HYTALE_DATA_ROOT")]
    data_root: Option<PathBuf>,

    /// Seconds to wait for the server to stop before escalating
    #[arg(long, value_name = "SECS", default_value_t = 10)]
    stop_timeout: u64,
}

/// Ids of the top-level copy of [`RunArgs`]
const RUN_ARG_IDS: [&str; 6] = ["clean", "debug", "plugin", "java", "data_root", "stop_timeout"];

/// Parse the command line. Run options belong either before or after `run`,
/// never both, so options given before an explicit `run` are rejected.
fn parse_cli<I, T>(args: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let mut cmd = Cli::command();
    let matches = cmd.try_get_matches_from_mut(args)?;

    if matches.subcommand_name() == Some("run") {
        let misplaced = RUN_ARG_IDS
            .iter()
            .find(|id| matches.value_source(id) == Some(ValueSource::CommandLine));
        if let Some(id) = misplaced {
            return Err(cmd.error(
                ErrorKind::ArgumentConflict,
                format!("--{} must be given after 'run'", id.replace('_', "-")),
            ));
        }
    }

    Cli::from_arg_matches(&matches)
}

fn init_tracing(verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn run_options(cli: &Cli, args: &RunArgs) -> RunOptions {
    let mut options = RunOptions::new(&cli.project_dir);
    if let Some(config) = &cli.config {
        options.config_path = config.clone();
    }
    options.clean = args.clean;
    options.debug = args.debug;
    options.plugin = args.plugin.clone();
    options.java = args.java.clone();
    options.data_root = args.data_root.clone();
    options.stop_timeout = Duration::from_secs(args.stop_timeout);
    options
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = parse_cli(std::env::args_os()).unwrap_or_else(|e| e.exit());
    init_tracing(cli.verbose)?;

    let args = match &cli.command {
        Some(Commands::Config) => {
            let path = cli
                .config
                .clone()
                .unwrap_or_else(|| default_config_path(&cli.project_dir));
            let config = ServerConfig::load_or_init(&path)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            return Ok(());
        }
        Some(Commands::Run(args)) => args,
        None => &cli.run,
    };

    let code = run_server(&run_options(&cli, args)).await?;

    // The terminal reader blocks on a read that cannot be cancelled, so exit
    // here instead of waiting for the runtime to shut down
    std::process::exit(code.unwrap_or(1));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_bare_invocation_runs() {
        let cli = parse_cli(["hytale-dev", "--clean", "--debug"]).unwrap();
        assert!(cli.command.is_none());
        let options = run_options(&cli, &cli.run);
        assert!(options.clean);
        assert!(options.debug);
        assert_eq!(options.config_path, PathBuf::from("./local.properties"));
        assert_eq!(options.stop_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_run_subcommand() {
        let cli = parse_cli([
            "hytale-dev",
            "--project-dir",
            "/work/plugin",
            "run",
            "--plugin",
            "out/plugin.jar",
            "--stop-timeout",
            "3",
        ])
        .unwrap();
        let Some(Commands::Run(args)) = &cli.command else {
            panic!("Expected run subcommand, got {:?}", cli.command);
        };
        let options = run_options(&cli, args);
        assert_eq!(options.project_dir, PathBuf::from("/work/plugin"));
        assert_eq!(options.config_path, PathBuf::from("/work/plugin/local.properties"));
        assert_eq!(options.plugin, Some(PathBuf::from("out/plugin.jar")));
        assert_eq!(options.stop_timeout, Duration::from_secs(3));
        assert!(!options.clean);
    }

    #[test]
    fn test_config_override() {
        let cli = parse_cli(["hytale-dev", "config", "--config", "/tmp/x.properties"])
            .unwrap();
        assert!(matches!(cli.command, Some(Commands::Config)));
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/x.properties")));
    }

    #[test]
    fn test_global_options_after_run() {
        let cli = parse_cli(["hytale-dev", "run", "--project-dir", "/work/plugin", "-v"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Run(_))));
        assert_eq!(cli.project_dir, PathBuf::from("/work/plugin"));
        assert!(cli.verbose);
    }

    #[test]
    fn test_run_options_before_run_rejected() {
        let err = parse_cli(["hytale-dev", "--clean", "run"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);

        let err = parse_cli(["hytale-dev", "--stop-timeout", "3", "run", "--debug"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
    }
}
