//! The injection capability that materializes a virtual evdev device.
//!
//! An [`EventSink`] is driven in two phases. A configuration bracket
//! (`configure_begin` .. `configure_end`) declares the device identity and
//! capabilities; after that the per-event primitives emit input frames.
//! Primitives do not return a result. A sink latches the first failure and
//! reports it through [`EventSink::status`] until [`EventSink::reset_status`]
//! is called, so a caller can issue a whole frame and check once.

use std::fmt;
use std::sync::Arc;
use thiserror::Error;

mod recording;
mod uinput;

pub use recording::{RecordingSink, SinkCall};
pub use uinput::{UinputFactory, UinputSink};

/// Identity reported to the host for a virtual device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub name: String,
    pub bustype: u16,
    pub vendor: u16,
    pub product: u16,
    pub version: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    Release,
    Press,
}

impl KeyState {
    pub fn value(self) -> i32 {
        match self {
            KeyState::Release => 0,
            KeyState::Press => 1,
        }
    }
}

impl From<bool> for KeyState {
    fn from(pressed: bool) -> Self {
        if pressed {
            KeyState::Press
        } else {
            KeyState::Release
        }
    }
}

/// Failure latched by a sink.
#[derive(Debug, Clone, Error)]
pub enum SinkError {
    #[error("sink operation issued out of sequence")]
    Sequencing,
    #[error("device name is {0} bytes, longer than uinput allows")]
    NameTooLong(usize),
    #[error("key code {0:#x} out of range")]
    KeyRange(u16),
    #[error("absolute axis {0:#x} out of range")]
    AbsRange(u16),
    #[error("relative axis {0:#x} out of range")]
    RelRange(u16),
    #[error("input property {0:#x} out of range")]
    PropertyRange(u16),
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: Arc<std::io::Error>,
    },
}

impl SinkError {
    pub(crate) fn io(context: &'static str, source: std::io::Error) -> Self {
        SinkError::Io {
            context,
            source: Arc::new(source),
        }
    }
}

/// Operations a touchpad needs from the device injector.
pub trait EventSink {
    /// Open the configuration bracket for a new device.
    fn configure_begin(&mut self, identity: &DeviceIdentity);
    fn configure_input_property(&mut self, property: u16);
    fn configure_key(&mut self, key: u16);
    fn configure_rel(&mut self, axis: u16);
    /// Declare the multi-touch position axes with inclusive ranges.
    fn configure_multi_touch_xy(&mut self, x0: i32, y0: i32, x1: i32, y1: i32);
    /// Declare the number of simultaneous touch slots.
    fn configure_abs_slots(&mut self, slots: i32);
    /// Close the bracket and create the device.
    fn configure_end(&mut self);

    fn send_key(&mut self, key: u16, state: KeyState);
    fn send_rel(&mut self, axis: u16, delta: i32);
    /// Report a contact position in `slot` carrying `tracking_id`.
    fn send_multi_touch_xy(&mut self, slot: i32, tracking_id: i32, x: i32, y: i32);
    /// Terminate the contact in `slot`.
    fn send_multi_touch_lift(&mut self, slot: i32);
    fn send_syn_report(&mut self);

    /// Tear down the device. Calling it again is a no-op.
    fn close(&mut self);

    /// First failure since the last reset, if any.
    fn status(&self) -> Result<(), SinkError>;
    fn reset_status(&mut self);

    fn dump(&self, out: &mut dyn fmt::Write) -> fmt::Result;
}

/// Produces sinks for touchpads that were not lent one.
pub trait SinkFactory: Send {
    fn create(&mut self) -> Box<dyn EventSink + Send>;
}

impl<F> SinkFactory for F
where
    F: FnMut() -> Box<dyn EventSink + Send> + Send,
{
    fn create(&mut self) -> Box<dyn EventSink + Send> {
        self()
    }
}
