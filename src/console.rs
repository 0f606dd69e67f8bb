//! Operator console — the controller-side command surface.
//!
//! Each submitted line is compiled and, when a program results, delivered
//! fire-and-forget: probe first, then a detached send so the console loop
//! never blocks on channel I/O. Transport failures come back as `Notice`
//! values on a channel the loop drains and shows the operator; no fault
//! ever escapes into the input loop itself.

use std::time::Duration;

use chrono::Local;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::info;

use crate::compiler::compile;
use crate::transport::{Channel, TransportError};

/// Operator-visible notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// No agent is listening on the channel.
    AgentUnreachable,
    /// A send reached the channel but failed; raw diagnostic included.
    TransportFailed(String),
}

impl Notice {
    pub fn message(&self) -> String {
        match self {
            Notice::AgentUnreachable => "Please inject before executing!".to_string(),
            Notice::TransportFailed(detail) => format!("Pipe error: {}", detail),
        }
    }

    fn from_transport(error: TransportError) -> Self {
        match error {
            TransportError::NotFound => Notice::AgentUnreachable,
            other => Notice::TransportFailed(other.to_string()),
        }
    }
}

pub struct Console {
    channel: Channel,
    timeout: Duration,
    notices: UnboundedSender<Notice>,
    history: Vec<String>,
}

impl Console {
    /// Create a console bound to a channel. The receiver carries
    /// notifications produced by detached sends.
    pub fn new(channel: Channel, timeout: Duration) -> (Self, UnboundedReceiver<Notice>) {
        let (tx, rx) = unbounded_channel();
        (
            Self {
                channel,
                timeout,
                notices: tx,
                history: Vec::new(),
            },
            rx,
        )
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }

    fn log(&mut self, message: &str) -> String {
        let line = format!("[{}] {}", Local::now().format("%H:%M:%S"), message);
        self.history.push(line.clone());
        line
    }

    /// Process one submitted command line. Returns the console lines this
    /// submission produced (echo, help, immediate notices); asynchronous
    /// transport failures arrive later on the notice channel.
    pub fn submit(&mut self, line: &str) -> Vec<String> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Vec::new();
        }

        let mut output = vec![self.log(&format!("> {}", trimmed))];
        info!(command = %trimmed, "command submitted");

        let compiled = compile(trimmed);
        for help_line in &compiled.console {
            output.push(self.log(help_line));
        }
        if compiled.program.is_empty() {
            return output;
        }

        // Probe before every send; liveness is never cached.
        if !self.channel.probe() {
            let notice = Notice::AgentUnreachable;
            output.push(self.log(&notice.message()));
            let _ = self.notices.send(notice);
            return output;
        }

        let notices = self.notices.clone();
        self.channel
            .send_detached(compiled.program, self.timeout, move |e| {
                let _ = notices.send(Notice::from_transport(e));
            });
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::CONNECT_TIMEOUT;
    use tokio::io::AsyncReadExt;
    use tokio::net::UnixListener;

    fn scratch_channel(dir: &tempfile::TempDir) -> Channel {
        Channel::at(dir.path().join("chan.sock"))
    }

    #[tokio::test]
    async fn test_submit_without_agent_notifies() {
        let dir = tempfile::tempdir().unwrap();
        let (mut console, mut notices) = Console::new(scratch_channel(&dir), CONNECT_TIMEOUT);

        let output = console.submit("speed 50");
        assert!(output.iter().any(|l| l.contains("Please inject")));
        assert_eq!(notices.recv().await, Some(Notice::AgentUnreachable));
    }

    #[tokio::test]
    async fn test_console_survives_failed_command() {
        let dir = tempfile::tempdir().unwrap();
        let (mut console, _notices) = Console::new(scratch_channel(&dir), CONNECT_TIMEOUT);

        console.submit("speed 50");
        // Next command still compiles and logs normally.
        let output = console.submit("cmds");
        assert!(output.iter().any(|l| l.contains("Available Commands")));
    }

    #[tokio::test]
    async fn test_submit_sends_program() {
        let dir = tempfile::tempdir().unwrap();
        let channel = scratch_channel(&dir);
        let listener = UnixListener::bind(channel.path()).unwrap();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = String::new();
            stream.read_to_string(&mut buf).await.unwrap();
            buf
        });

        let (mut console, _notices) = Console::new(channel, CONNECT_TIMEOUT);
        console.submit("esp true");

        assert_eq!(server.await.unwrap(), "overlay on");
    }

    #[tokio::test]
    async fn test_help_is_local_only() {
        let dir = tempfile::tempdir().unwrap();
        let (mut console, mut notices) = Console::new(scratch_channel(&dir), CONNECT_TIMEOUT);

        let output = console.submit("cmds");
        // Help produced locally even with no agent, and no notice raised.
        assert!(output.len() > 1);
        assert!(notices.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_empty_line_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let (mut console, _notices) = Console::new(scratch_channel(&dir), CONNECT_TIMEOUT);

        assert!(console.submit("   ").is_empty());
        assert!(console.history().is_empty());
    }

    #[tokio::test]
    async fn test_history_is_timestamped() {
        let dir = tempfile::tempdir().unwrap();
        let (mut console, _notices) = Console::new(scratch_channel(&dir), CONNECT_TIMEOUT);

        console.submit("cmds");
        assert!(console.history()[0].starts_with('['));
        assert!(console.history()[0].contains("> cmds"));
    }
}
