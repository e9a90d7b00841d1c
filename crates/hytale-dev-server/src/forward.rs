//! Line forwarding between the terminal and the server process
//!
//! Three independent loops, one per stream:
//! - server stdout -> our stdout, watching for the boot marker
//! - server stderr -> our stderr
//! - our stdin -> server stdin
//!
//! Each loop ends when its source reaches end-of-stream.

use hytale_dev_core::AuthMode;
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Log line the server prints once it accepts commands
pub const BOOT_MARKER: &str = "Hytale Server Booted!";

/// Command sent after boot in authenticated mode
pub const AUTO_LOGIN_COMMAND: &str = "/auth login device";

/// Shared writer for the server's stdin.
///
/// Both the stdout forwarder (scripted login) and the stdin forwarder write
/// here; the lock keeps each line in one piece.
pub struct ServerInput<W> {
    writer: Arc<Mutex<W>>,
}

impl<W> Clone for ServerInput<W> {
    fn clone(&self) -> Self {
        Self {
            writer: Arc::clone(&self.writer),
        }
    }
}

impl<W: AsyncWrite + Unpin> ServerInput<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Arc::new(Mutex::new(writer)),
        }
    }

    /// Write `line` followed by a newline and flush
    pub async fn send_line(&self, line: &str) -> io::Result<()> {
        let mut data = String::with_capacity(line.len() + 1);
        data.push_str(line);
        data.push('\n');

        let mut writer = self.writer.lock().await;
        writer.write_all(data.as_bytes()).await?;
        writer.flush().await
    }
}

/// One-shot trigger for the login command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoLogin {
    armed: bool,
}

impl AutoLogin {
    /// Armed only in authenticated mode
    pub fn new(auth_mode: AuthMode) -> Self {
        Self {
            armed: auth_mode == AuthMode::Authenticated,
        }
    }

    /// True for the first boot-marker line while armed; disarms itself
    pub fn triggered_by(&mut self, line: &str) -> bool {
        if self.armed && line.contains(BOOT_MARKER) {
            self.armed = false;
            true
        } else {
            false
        }
    }
}

/// Read one line without its terminator. Invalid UTF-8 is replaced.
async fn next_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    if reader.read_until(b'\n', buf).await? == 0 {
        return Ok(None);
    }
    if buf.ends_with(b"\n") {
        buf.pop();
        if buf.ends_with(b"\r") {
            buf.pop();
        }
    }
    Ok(Some(String::from_utf8_lossy(buf).into_owned()))
}

async fn echo<O>(out: &mut O, line: &str) -> io::Result<()>
where
    O: AsyncWrite + Unpin,
{
    out.write_all(line.as_bytes()).await?;
    out.write_all(b"\n").await?;
    out.flush().await
}

/// Echo server stdout, sending the login command once after boot.
/// Returns the number of lines forwarded.
pub async fn forward_stdout<R, O, W>(
    mut reader: R,
    mut out: O,
    input: ServerInput<W>,
    mut login: AutoLogin,
) -> usize
where
    R: AsyncBufRead + Unpin,
    O: AsyncWrite + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = Vec::new();
    let mut lines = 0;
    let mut echo_failed = false;

    loop {
        let line = match next_line(&mut reader, &mut buf).await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                error!("Failed to read server output: {}", e);
                break;
            }
        };
        lines += 1;

        // Keep draining the pipe even if our own stdout is gone
        if let Err(e) = echo(&mut out, &line).await {
            if !echo_failed {
                warn!("Failed to echo server output: {}", e);
                echo_failed = true;
            }
        }

        if login.triggered_by(&line) {
            info!("Server has booted. Sending '{}'", AUTO_LOGIN_COMMAND);
            match input.send_line(AUTO_LOGIN_COMMAND).await {
                Ok(()) => info!("Command sent. Follow the authentication steps below."),
                Err(e) => error!("Error sending automatic command: {}", e),
            }
        }
    }

    debug!("Server stdout closed after {} lines", lines);
    lines
}

/// Echo server stderr. Returns the number of lines forwarded.
pub async fn forward_stderr<R, O>(mut reader: R, mut out: O) -> usize
where
    R: AsyncBufRead + Unpin,
    O: AsyncWrite + Unpin,
{
    let mut buf = Vec::new();
    let mut lines = 0;

    while let Ok(Some(line)) = next_line(&mut reader, &mut buf).await {
        lines += 1;
        if let Err(e) = echo(&mut out, &line).await {
            debug!("Failed to echo server error output: {}", e);
        }
    }

    debug!("Server stderr closed after {} lines", lines);
    lines
}

/// Pass terminal input to the server, line by line.
///
/// Stops quietly on the first read or write error; a closed server stdin is
/// expected once the process exits.
pub async fn forward_stdin<R, W>(mut reader: R, input: ServerInput<W>) -> usize
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = Vec::new();
    let mut lines = 0;

    loop {
        match next_line(&mut reader, &mut buf).await {
            Ok(Some(line)) => {
                if let Err(e) = input.send_line(&line).await {
                    debug!("Server stdin closed: {}", e);
                    break;
                }
                lines += 1;
            }
            Ok(None) => break,
            Err(e) => {
                debug!("Terminal input closed: {}", e);
                break;
            }
        }
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    async fn written<W: Clone>(input: &ServerInput<W>) -> W {
        input.writer.lock().await.clone()
    }

    #[test]
    fn test_auto_login_latch() {
        let mut login = AutoLogin::new(AuthMode::Authenticated);
        assert!(!login.triggered_by("[INFO] Loading world"));
        assert!(login.triggered_by("[INFO] Hytale Server Booted! (3.2s)"));
        assert!(!login.triggered_by("[INFO] Hytale Server Booted! (3.2s)"));

        for mode in [AuthMode::Offline, AuthMode::Insecure] {
            let mut login = AutoLogin::new(mode);
            assert!(!login.triggered_by(BOOT_MARKER));
        }
    }

    #[tokio::test]
    async fn test_login_sent_once() {
        let server_out: &[u8] = b"Starting\nHytale Server Booted!\nTick\nHytale Server Booted!\n";
        let mut terminal = Vec::new();
        let input = ServerInput::new(Vec::new());

        let lines = forward_stdout(
            BufReader::new(server_out),
            &mut terminal,
            input.clone(),
            AutoLogin::new(AuthMode::Authenticated),
        )
        .await;

        assert_eq!(lines, 4);
        assert_eq!(terminal, server_out);
        assert_eq!(written(&input).await, b"/auth login device\n");
    }

    #[tokio::test]
    async fn test_no_login_outside_authenticated_mode() {
        let server_out: &[u8] = b"Hytale Server Booted!\n";
        let input = ServerInput::new(Vec::new());

        forward_stdout(
            BufReader::new(server_out),
            tokio::io::sink(),
            input.clone(),
            AutoLogin::new(AuthMode::Offline),
        )
        .await;

        assert!(written(&input).await.is_empty());
    }

    #[tokio::test]
    async fn test_stdout_normalizes_line_endings() {
        let server_out: &[u8] = b"crlf line\r\nbad \xff byte\nno newline";
        let mut terminal = Vec::new();

        let lines = forward_stdout(
            BufReader::new(server_out),
            &mut terminal,
            ServerInput::new(tokio::io::sink()),
            AutoLogin::new(AuthMode::Offline),
        )
        .await;

        assert_eq!(lines, 3);
        assert_eq!(
            String::from_utf8(terminal).unwrap(),
            "crlf line\nbad \u{fffd} byte\nno newline\n"
        );
    }

    #[tokio::test]
    async fn test_login_write_failure_keeps_forwarding() {
        let server_out: &[u8] = b"Hytale Server Booted!\nafter boot\n";
        let broken = tokio_test::io::Builder::new()
            .write_error(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
            .build();
        let mut terminal = Vec::new();

        let lines = forward_stdout(
            BufReader::new(server_out),
            &mut terminal,
            ServerInput::new(broken),
            AutoLogin::new(AuthMode::Authenticated),
        )
        .await;

        assert_eq!(lines, 2);
        assert_eq!(terminal, b"Hytale Server Booted!\nafter boot\n");
    }

    #[tokio::test]
    async fn test_stderr_echo() {
        let server_err: &[u8] = b"WARN one\nWARN two\n";
        let mut terminal = Vec::new();

        let lines = forward_stderr(BufReader::new(server_err), &mut terminal).await;

        assert_eq!(lines, 2);
        assert_eq!(terminal, server_err);
    }

    #[tokio::test]
    async fn test_stdin_forwarding() {
        let server_in = tokio_test::io::Builder::new()
            .write(b"/help\n")
            .write(b"/stop\n")
            .build();
        let typed: &[u8] = b"/help\r\n/stop\n";

        let lines = forward_stdin(BufReader::new(typed), ServerInput::new(server_in)).await;

        assert_eq!(lines, 2);
    }

    #[tokio::test]
    async fn test_stdin_stops_on_closed_server() {
        let server_in = tokio_test::io::Builder::new()
            .write(b"first\n")
            .write_error(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
            .build();
        let typed: &[u8] = b"first\nsecond\nthird\n";

        let lines = forward_stdin(BufReader::new(typed), ServerInput::new(server_in)).await;

        assert_eq!(lines, 1);
    }
}
