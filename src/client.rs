use crate::protocol::*;
use crate::touchpad::ErrorKind;
use anyhow::{Context, Result};
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::sync::Mutex;
use tracing::debug;

/// Error returned by the manager for a touchpad command
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{kind:?}: {message}")]
pub struct RemoteError {
    pub kind: ErrorKind,
    pub message: String,
}

/// Client for a running touchpad manager
pub struct TouchpadClient {
    stream: Mutex<BufReader<UnixStream>>,
}

impl TouchpadClient {
    /// Connect to a manager socket
    pub async fn connect(socket_path: impl AsRef<Path>) -> Result<Self> {
        let socket_path = socket_path.as_ref();
        let stream = UnixStream::connect(socket_path)
            .await
            .with_context(|| format!("Failed to connect to manager at {}", socket_path.display()))?;

        debug!("Connected to touchpad manager at {}", socket_path.display());

        Ok(Self {
            stream: Mutex::new(BufReader::new(stream)),
        })
    }

    /// Check that the manager is alive
    pub async fn ping(&self) -> Result<()> {
        match self.send_command(ControlCommand::Ping).await? {
            ControlResult::Pong => Ok(()),
            other => Self::expect_ok(other),
        }
    }

    pub async fn attach(&self) -> Result<()> {
        let result = self.send_command(ControlCommand::Attach).await?;
        Self::expect_ok(result)
    }

    pub async fn detach(&self) -> Result<()> {
        let result = self.send_command(ControlCommand::Detach).await?;
        Self::expect_ok(result)
    }

    pub async fn touch(&self, touchpad: usize, x: f32, y: f32, pressure: f32) -> Result<()> {
        let result = self
            .send_command(ControlCommand::Touch {
                touchpad,
                x,
                y,
                pressure,
            })
            .await?;
        Self::expect_ok(result)
    }

    pub async fn button_state(&self, touchpad: usize, buttons: u32) -> Result<()> {
        let result = self
            .send_command(ControlCommand::ButtonState { touchpad, buttons })
            .await?;
        Self::expect_ok(result)
    }

    pub async fn scroll(&self, touchpad: usize, x: f32, y: f32) -> Result<()> {
        let result = self
            .send_command(ControlCommand::Scroll { touchpad, x, y })
            .await?;
        Self::expect_ok(result)
    }

    /// Fetch the manager's diagnostic dump
    pub async fn dump(&self) -> Result<String> {
        match self.send_command(ControlCommand::Dump).await? {
            ControlResult::Dump { text } => Ok(text),
            other => Self::expect_ok(other).map(|()| String::new()),
        }
    }

    fn expect_ok(result: ControlResult) -> Result<()> {
        match result {
            ControlResult::Ok => Ok(()),
            ControlResult::Error { kind, message } => Err(RemoteError { kind, message }.into()),
            other => anyhow::bail!("Unexpected response: {:?}", other),
        }
    }

    /// Send a command to the manager and wait for its response
    pub async fn send_command(&self, command: ControlCommand) -> Result<ControlResult> {
        let id = ulid::Ulid::new().to_string();
        let message = ControlMessage {
            id: id.clone(),
            command,
        };
        let message_json = serde_json::to_string(&message)?;

        let mut stream = self.stream.lock().await;

        stream.get_mut().write_all(message_json.as_bytes()).await?;
        stream.get_mut().write_all(b"\n").await?;

        let mut response_line = String::new();
        if stream.read_line(&mut response_line).await? == 0 {
            anyhow::bail!("Manager closed the connection");
        }

        let response: ControlResponse = serde_json::from_str(&response_line)
            .with_context(|| format!("Failed to parse response: {}", response_line))?;

        if response.id != id {
            anyhow::bail!("Response ID mismatch: expected {}, got {}", id, response.id);
        }

        Ok(response.result)
    }
}
