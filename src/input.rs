//! Linux input event codes and the on-wire `input_event` record.

use std::mem::size_of;

// Event types
pub const EV_SYN: u16 = 0x00;
pub const EV_KEY: u16 = 0x01;
pub const EV_REL: u16 = 0x02;
pub const EV_ABS: u16 = 0x03;

pub const SYN_REPORT: u16 = 0x00;

// Keys
pub const BTN_BACK: u16 = 0x116;
pub const BTN_TOUCH: u16 = 0x14a;
pub const KEY_MAX: u16 = 0x2ff;

// Relative axes
pub const REL_HWHEEL: u16 = 0x06;
pub const REL_WHEEL: u16 = 0x08;
pub const REL_MAX: u16 = 0x0f;

// Absolute axes
pub const ABS_MT_SLOT: u16 = 0x2f;
pub const ABS_MT_POSITION_X: u16 = 0x35;
pub const ABS_MT_POSITION_Y: u16 = 0x36;
pub const ABS_MT_TRACKING_ID: u16 = 0x39;
pub const ABS_MAX: u16 = 0x3f;

// Input properties
pub const INPUT_PROP_DIRECT: u16 = 0x01;
pub const INPUT_PROP_MAX: u16 = 0x1f;

pub const BUS_VIRTUAL: u16 = 0x06;

/// Size of one `struct input_event` on this architecture.
pub const INPUT_EVENT_SIZE: usize = size_of::<libc::timeval>() + 2 + 2 + 4;

/// A single evdev event as written to a uinput node.
///
/// The timestamp is left zero; the kernel stamps uinput events itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinuxInputEvent {
    pub event_type: u16,
    pub code: u16,
    pub value: i32,
}

impl LinuxInputEvent {
    pub fn new(event_type: u16, code: u16, value: i32) -> Self {
        Self {
            event_type,
            code,
            value,
        }
    }

    pub fn syn_report() -> Self {
        Self::new(EV_SYN, SYN_REPORT, 0)
    }

    /// Encode as the native-endian `struct input_event` layout.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = vec![0u8; size_of::<libc::timeval>()];
        buf.extend_from_slice(&self.event_type.to_ne_bytes());
        buf.extend_from_slice(&self.code.to_ne_bytes());
        buf.extend_from_slice(&self.value.to_ne_bytes());
        buf
    }
}
