//! Server process lifecycle
//!
//! The supervisor owns the child for its whole life: it spawns it with piped
//! stdio, runs the three forwarders, and waits for the process to exit or for
//! a shutdown signal.

use crate::forward::{AutoLogin, ServerInput, forward_stderr, forward_stdin, forward_stdout};
use hytale_dev_core::{AuthMode, HytaleDevError, Result};
use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

/// How long to wait for the output forwarders to drain after exit
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Lifecycle of the supervised process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    NotStarted,
    Running { pid: Option<u32> },
    /// Exit code, `None` when the process was ended by a signal
    Exited(Option<i32>),
}

/// Signal that asked the supervisor to stop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// Ctrl+C; the terminal delivers it to the server as well
    Interrupt,
    /// SIGTERM sent to the supervisor only
    Terminate,
}

/// Everything needed to start the server process
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    /// Java executable
    pub program: PathBuf,
    /// Arguments after the program
    pub args: Vec<String>,
    /// Working directory (`run/server`)
    pub working_dir: PathBuf,
    /// Decides whether the login command is sent after boot
    pub auth_mode: AuthMode,
    /// How long each shutdown step waits before escalating
    pub stop_timeout: Duration,
}

/// Supervises one server process
pub struct ServerSupervisor {
    spec: LaunchSpec,
    state: ProcessState,
}

impl ServerSupervisor {
    pub fn new(spec: LaunchSpec) -> Self {
        Self {
            spec,
            state: ProcessState::NotStarted,
        }
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// Run attached to this process's stdio until the server exits.
    /// Returns the server's exit code.
    pub async fn run(&mut self) -> Result<Option<i32>> {
        self.run_with(
            tokio::io::stdin(),
            tokio::io::stdout(),
            tokio::io::stderr(),
            shutdown_signal(),
        )
        .await
    }

    /// Run with the given console streams, stopping the server when
    /// `shutdown` resolves
    pub async fn run_with<I, O, E, S>(
        &mut self,
        console_in: I,
        console_out: O,
        console_err: E,
        shutdown: S,
    ) -> Result<Option<i32>>
    where
        I: AsyncRead + Unpin + Send + 'static,
        O: AsyncWrite + Unpin + Send + 'static,
        E: AsyncWrite + Unpin + Send + 'static,
        S: Future<Output = ShutdownSignal>,
    {
        let mut child = self.spawn()?;
        let pid = child.id();
        self.state = ProcessState::Running { pid };
        debug!("Server process started (pid {:?})", pid);

        let (Some(stdin), Some(stdout), Some(stderr)) =
            (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            return Err(HytaleDevError::Launch(
                "server stdio was not captured".into(),
            ));
        };

        let input = ServerInput::new(stdin);
        let stdout_task = tokio::spawn(forward_stdout(
            BufReader::new(stdout),
            console_out,
            input.clone(),
            AutoLogin::new(self.spec.auth_mode),
        ));
        let stderr_task = tokio::spawn(forward_stderr(BufReader::new(stderr), console_err));
        let stdin_task = tokio::spawn(forward_stdin(BufReader::new(console_in), input));

        let waited = tokio::select! {
            status = child.wait() => status,
            signal = shutdown => stop(&mut child, signal, self.spec.stop_timeout).await,
        };
        let status = waited.map_err(|e| HytaleDevError::io(&self.spec.program, e))?;

        let code = status.code();
        self.state = ProcessState::Exited(code);

        // Output still buffered in the pipes is echoed before returning
        let drained = tokio::time::timeout(DRAIN_TIMEOUT, async {
            let _ = stdout_task.await;
            let _ = stderr_task.await;
        })
        .await;
        if drained.is_err() {
            debug!("Output forwarders still running after exit, leaving them");
        }
        stdin_task.abort();

        report_exit(&status);
        Ok(code)
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.spec.program);
        cmd.args(&self.spec.args)
            .current_dir(&self.spec.working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Covers unwinding and early returns of the supervisor
            .kill_on_drop(true);
        cmd
    }

    fn spawn(&self) -> Result<Child> {
        self.command().spawn().map_err(|e| {
            HytaleDevError::Launch(format!(
                "could not start {} in {}: {}",
                self.spec.program.display(),
                self.spec.working_dir.display(),
                e
            ))
        })
    }
}

/// Stop the child after a shutdown signal and wait for it to exit.
///
/// After Ctrl+C the server already got SIGINT from the terminal, so it is
/// given `grace` to exit on its own first. Then it is asked to terminate and
/// given `grace` again before being killed.
async fn stop(
    child: &mut Child,
    signal: ShutdownSignal,
    grace: Duration,
) -> io::Result<ExitStatus> {
    info!("Stopping server...");

    if signal == ShutdownSignal::Interrupt {
        if let Ok(status) = tokio::time::timeout(grace, child.wait()).await {
            return status;
        }
        debug!("Server still running {:?} after Ctrl+C", grace);
    }

    if let Some(pid) = child.id() {
        if request_termination(pid).await {
            match tokio::time::timeout(grace, child.wait()).await {
                Ok(status) => return status,
                Err(_) => warn!("Server did not stop within {:?}, killing it", grace),
            }
        }
    }

    if child.try_wait()?.is_none() {
        child.start_kill()?;
    }
    child.wait().await
}

/// Send SIGTERM so the server can run its shutdown hooks.
/// Returns false when no request could be delivered.
#[cfg(unix)]
async fn request_termination(pid: u32) -> bool {
    let sent = Command::new("kill")
        .args(["-TERM", &pid.to_string()])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;

    match sent {
        Ok(status) if status.success() => true,
        Ok(status) => {
            debug!("kill -TERM {} exited with {}", pid, status);
            false
        }
        Err(e) => {
            warn!("Failed to send SIGTERM to the server: {}", e);
            false
        }
    }
}

/// No termination request short of killing exists here
#[cfg(not(unix))]
async fn request_termination(_pid: u32) -> bool {
    false
}

fn report_exit(status: &ExitStatus) {
    match status.code() {
        Some(code) => info!("Server exited with code {}", code),
        None => warn!("Server was terminated by a signal"),
    }
}

/// Resolves on Ctrl+C, or on SIGTERM where supported
pub async fn shutdown_signal() -> ShutdownSignal {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    interrupt = ctrl_c() => interrupt,
                    _ = sigterm.recv() => ShutdownSignal::Terminate,
                }
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                ctrl_c().await
            }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c().await
    }
}

async fn ctrl_c() -> ShutdownSignal {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    ShutdownSignal::Interrupt
}
