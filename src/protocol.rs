//! JSON-lines control protocol spoken between the manager and its clients.

use crate::touchpad::{ErrorKind, TouchpadError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ControlCommand {
    Ping,
    Attach,
    Detach,
    Touch {
        touchpad: usize,
        x: f32,
        y: f32,
        pressure: f32,
    },
    ButtonState {
        touchpad: usize,
        buttons: u32,
    },
    Scroll {
        touchpad: usize,
        x: f32,
        y: f32,
    },
    Dump,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ControlResult {
    Pong,
    Ok,
    Dump { text: String },
    Error { kind: ErrorKind, message: String },
}

impl From<Result<(), TouchpadError>> for ControlResult {
    fn from(result: Result<(), TouchpadError>) -> Self {
        match result {
            Ok(()) => ControlResult::Ok,
            Err(e) => ControlResult::Error {
                kind: e.kind(),
                message: e.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlMessage {
    pub id: String,
    pub command: ControlCommand,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlResponse {
    pub id: String,
    pub result: ControlResult,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_wire_format() {
        let message = ControlMessage {
            id: "01J".to_string(),
            command: ControlCommand::ButtonState {
                touchpad: 1,
                buttons: 8,
            },
        };
        assert_eq!(
            serde_json::to_string(&message).unwrap(),
            r#"{"id":"01J","command":{"ButtonState":{"touchpad":1,"buttons":8}}}"#
        );

        let ping: ControlMessage = serde_json::from_str(r#"{"id":"a","command":"Ping"}"#).unwrap();
        assert_eq!(ping.command, ControlCommand::Ping);
    }

    #[test]
    fn errors_carry_kind() {
        let result = ControlResult::from(Err(TouchpadError::NotAttached(0)));
        assert_eq!(
            result,
            ControlResult::Error {
                kind: ErrorKind::Sequencing,
                message: "touchpad 0 is not attached".to_string(),
            }
        );
        assert_eq!(
            serde_json::to_string(&result).unwrap(),
            r#"{"Error":{"kind":"Sequencing","message":"touchpad 0 is not attached"}}"#
        );
    }
}
