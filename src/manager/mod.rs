use crate::protocol::*;
use crate::touchpad::{ErrorKind, TouchpadArray};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Mutex;
use tracing::{debug, error, info, trace, warn};

mod lock;

pub use lock::SocketLock;

type SharedTouchpads = Arc<Mutex<TouchpadArray<'static>>>;

/// Serves a touchpad array over a Unix control socket.
pub struct Manager {
    /// Socket path for control commands
    control_socket_path: PathBuf,
    /// Keeps a second manager off the same socket
    _lock: SocketLock,
    /// Every command is serialized through this lock
    touchpads: SharedTouchpads,
}

impl Manager {
    /// Create a manager for `touchpads`, listening on `socket_path` once run
    pub fn new(
        socket_path: impl AsRef<Path>,
        touchpads: TouchpadArray<'static>,
    ) -> anyhow::Result<Self> {
        let socket_path = socket_path.as_ref();
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let lock = SocketLock::for_socket(socket_path)?;

        info!(
            "Manager initialized at {} with {} touchpads",
            socket_path.display(),
            touchpads.len()
        );

        Ok(Self {
            control_socket_path: socket_path.to_path_buf(),
            _lock: lock,
            touchpads: Arc::new(Mutex::new(touchpads)),
        })
    }

    /// Run until Ctrl-C, then detach every touchpad and remove the socket
    pub async fn run(&self) -> anyhow::Result<()> {
        // Remove a stale socket if present
        let _ = std::fs::remove_file(&self.control_socket_path);

        let listener = UnixListener::bind(&self.control_socket_path)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(
                &self.control_socket_path,
                std::fs::Permissions::from_mode(0o666),
            )?;
        }

        info!(
            "Manager listening on {}",
            self.control_socket_path.display()
        );

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, _addr)) => {
                        let touchpads = Arc::clone(&self.touchpads);
                        tokio::spawn(async move {
                            if let Err(e) = Self::handle_client(stream, touchpads).await {
                                error!("Client handler error: {}", e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                    }
                },
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutting down");
                    break;
                }
            }
        }

        self.touchpads.lock().await.reset();
        let _ = std::fs::remove_file(&self.control_socket_path);
        Ok(())
    }

    /// Handle a single client connection
    async fn handle_client(
        stream: UnixStream,
        touchpads: SharedTouchpads,
    ) -> anyhow::Result<()> {
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);
        let mut line = String::new();

        loop {
            line.clear();
            match reader.read_line(&mut line).await {
                Ok(0) => break,
                Ok(_) => {
                    let response = match serde_json::from_str::<ControlMessage>(&line) {
                        Ok(message) => {
                            trace!("Received command: {:?}", message.command);
                            let result = Self::process_command(message.command, &touchpads).await;
                            ControlResponse {
                                id: message.id,
                                result,
                            }
                        }
                        Err(e) => {
                            warn!("Failed to parse message: {}", e);
                            Self::rejection(&line, e)
                        }
                    };
                    let mut response_json = serde_json::to_string(&response)?;
                    response_json.push('\n');

                    if let Err(e) = writer.write_all(response_json.as_bytes()).await {
                        if e.kind() == std::io::ErrorKind::BrokenPipe {
                            break;
                        }
                        return Err(e.into());
                    }
                }
                Err(e) => {
                    error!("Error reading from client: {}", e);
                    break;
                }
            }
        }

        debug!("Client disconnected");
        Ok(())
    }

    /// Reply to a line that is not a valid command, echoing its id if it has one
    fn rejection(line: &str, error: serde_json::Error) -> ControlResponse {
        let id = serde_json::from_str::<serde_json::Value>(line)
            .ok()
            .and_then(|value| value.get("id")?.as_str().map(str::to_owned))
            .unwrap_or_default();
        ControlResponse {
            id,
            result: ControlResult::Error {
                kind: ErrorKind::InvalidArgument,
                message: format!("Malformed command: {}", error),
            },
        }
    }

    /// Apply one command to the touchpads
    async fn process_command(
        command: ControlCommand,
        touchpads: &SharedTouchpads,
    ) -> ControlResult {
        let mut touchpads = touchpads.lock().await;
        match command {
            ControlCommand::Ping => ControlResult::Pong,
            ControlCommand::Attach => touchpads.attach().into(),
            ControlCommand::Detach => touchpads.detach().into(),
            ControlCommand::Touch {
                touchpad,
                x,
                y,
                pressure,
            } => touchpads.touch(touchpad, x, y, pressure).into(),
            ControlCommand::ButtonState { touchpad, buttons } => {
                touchpads.button_state(touchpad, buttons).into()
            }
            ControlCommand::Scroll { touchpad, x, y } => touchpads.scroll(touchpad, x, y).into(),
            ControlCommand::Dump => ControlResult::Dump {
                text: touchpads.to_string(),
            },
        }
    }
}
