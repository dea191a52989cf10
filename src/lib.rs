//! vtouchpad - Virtual VR Touchpad Library
//!
//! This library emulates multi-touch touchpads on Linux through uinput,
//! translating normalized VR touch, button and scroll samples into
//! protocol-correct evdev frames.

pub mod client;
pub mod config;
pub mod input;
pub mod manager;
pub mod protocol;
pub mod sink;
pub mod touchpad;
pub mod uinput;

// Re-export commonly used types
pub use config::TouchpadConfig;
pub use protocol::{ControlCommand, ControlMessage, ControlResponse, ControlResult};
pub use sink::{EventSink, RecordingSink, SinkError, SinkFactory, UinputSink};
pub use touchpad::{
    BUTTON_BACK, ErrorKind, TouchTransition, TouchpadArray, TouchpadError, TouchpadSnapshot,
};

pub use client::TouchpadClient;
pub use manager::Manager;
