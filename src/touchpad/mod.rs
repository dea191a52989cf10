//! Virtual touchpads for VR input.
//!
//! A [`TouchpadArray`] holds a fixed number of touchpads. Each one turns
//! normalized touch, button and scroll samples into multi-touch protocol
//! frames on its [`EventSink`], emitting only when the observable state
//! changes and closing every frame with exactly one SYN_REPORT.

use crate::config::TouchpadConfig;
use crate::input::*;
use crate::sink::{DeviceIdentity, EventSink, KeyState, SinkError, SinkFactory, UinputFactory};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

mod state;

pub use state::{SinkHandle, SinkOwnership, TouchTransition, TouchpadSnapshot, TouchpadState};

/// Motion event button mask bit for "back"
pub const BUTTON_BACK: u32 = 1 << 3;
/// Every button bit a touchpad understands
pub const SUPPORTED_BUTTONS: u32 = BUTTON_BACK;

const DEVICE_VERSION: u16 = 0x0001;
// Only one contact is tracked; the other declared slots are spare.
const TOUCH_SLOT: i32 = 0;
const TRACKING_ID: i32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    InvalidArgument,
    NotSupported,
    Sequencing,
    Sink,
}

#[derive(Debug, Clone, Error)]
pub enum TouchpadError {
    #[error("touchpad {0} does not exist")]
    NoSuchTouchpad(usize),
    #[error("{axis} = {value} is outside {range}")]
    OutOfRange {
        axis: &'static str,
        value: f32,
        range: &'static str,
    },
    #[error("unsupported buttons 0x{0:X}")]
    UnsupportedButtons(u32),
    #[error("touchpad {0} is not attached")]
    NotAttached(usize),
    #[error("sink failed: {0}")]
    Sink(#[from] SinkError),
}

impl TouchpadError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TouchpadError::NoSuchTouchpad(_) | TouchpadError::OutOfRange { .. } => {
                ErrorKind::InvalidArgument
            }
            TouchpadError::UnsupportedButtons(_) => ErrorKind::NotSupported,
            TouchpadError::NotAttached(_) => ErrorKind::Sequencing,
            TouchpadError::Sink(_) => ErrorKind::Sink,
        }
    }
}

fn check_position(axis: &'static str, value: f32) -> Result<(), TouchpadError> {
    if (0.0..1.0).contains(&value) {
        Ok(())
    } else {
        Err(TouchpadError::OutOfRange {
            axis,
            value,
            range: "[0, 1)",
        })
    }
}

fn check_scroll(axis: &'static str, value: f32) -> Result<(), TouchpadError> {
    if (-1.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(TouchpadError::OutOfRange {
            axis,
            value,
            range: "[-1, 1]",
        })
    }
}

/// Map a normalized scroll amount to wheel detents.
///
/// The host applies a fixed unit-scale wheel acceleration and a physical
/// wheel reports about ±1 per notch (up to ±4 spinning fast), so the full
/// range maps to ±4. Any nonzero input yields at least one detent.
pub fn scale_relative_scroll(value: f32) -> i32 {
    (4.0 * value).abs().ceil().copysign(value) as i32
}

/// Fixed-size set of virtual touchpads sharing one configuration.
pub struct TouchpadArray<'a> {
    config: TouchpadConfig,
    factory: Box<dyn SinkFactory + 'a>,
    touchpads: Box<[TouchpadState<'a>]>,
}

impl<'a> TouchpadArray<'a> {
    /// Create `config.devices` unattached touchpads. Sinks are created by
    /// `factory` on attach unless one was lent first.
    /// Axis sizes and slot counts below one are raised to one.
    pub fn new(mut config: TouchpadConfig, factory: impl SinkFactory + 'a) -> Self {
        if config.width < 1 || config.height < 1 || config.slots < 1 {
            warn!(
                "Touchpad size {}x{} with {} slots is out of range, clamping to at least 1",
                config.width, config.height, config.slots
            );
            config.width = config.width.max(1);
            config.height = config.height.max(1);
            config.slots = config.slots.max(1);
        }
        let touchpads = (0..config.devices).map(|_| TouchpadState::default()).collect();
        let mut array = Self {
            config,
            factory: Box::new(factory),
            touchpads,
        };
        array.reset();
        array
    }

    /// Touchpads backed by the configured uinput node.
    pub fn with_uinput(config: TouchpadConfig) -> Self {
        let factory = UinputFactory::new(&config.uinput_path);
        Self::new(config, factory)
    }

    pub fn len(&self) -> usize {
        self.touchpads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.touchpads.is_empty()
    }

    pub fn config(&self) -> &TouchpadConfig {
        &self.config
    }

    fn touchpad_mut(&mut self, id: usize) -> Result<&mut TouchpadState<'a>, TouchpadError> {
        self.touchpads
            .get_mut(id)
            .ok_or(TouchpadError::NoSuchTouchpad(id))
    }

    /// Use `sink` for touchpad `id` instead of creating one. The caller
    /// keeps ownership; detach closes it but never drops it.
    pub fn lend_sink(
        &mut self,
        id: usize,
        sink: &'a mut (dyn EventSink + Send + 'a),
    ) -> Result<(), TouchpadError> {
        let touchpad = self.touchpad_mut(id)?;
        touchpad.sink = Some(SinkHandle::Borrowed(sink));
        Ok(())
    }

    /// Close every sink and return all touchpads to their initial state.
    pub fn reset(&mut self) {
        for touchpad in self.touchpads.iter_mut() {
            touchpad.reset();
        }
    }

    /// Create and configure the device for every touchpad.
    ///
    /// All touchpads are attempted; the first failure is returned.
    pub fn attach(&mut self) -> Result<(), TouchpadError> {
        let mut first_error = None;

        for (index, touchpad) in self.touchpads.iter_mut().enumerate() {
            let handle = touchpad
                .sink
                .get_or_insert_with(|| SinkHandle::Owned(self.factory.create()));
            let identity = DeviceIdentity {
                name: self.config.device_name(index),
                bustype: BUS_VIRTUAL,
                // Zero vendor and product mark an internal device, so the
                // host does not match configuration meant for real hardware.
                vendor: 0,
                product: 0,
                version: DEVICE_VERSION,
            };

            let sink = handle.get();
            sink.reset_status();
            sink.configure_begin(&identity);
            sink.configure_input_property(INPUT_PROP_DIRECT);
            sink.configure_multi_touch_xy(0, 0, self.config.width - 1, self.config.height - 1);
            sink.configure_abs_slots(self.config.slots);
            sink.configure_key(BTN_TOUCH);
            sink.configure_key(BTN_BACK);
            sink.configure_rel(REL_HWHEEL);
            sink.configure_rel(REL_WHEEL);
            sink.configure_end();

            match sink.status() {
                Ok(()) => info!("Attached touchpad {} as {}", index, identity.name),
                Err(e) => {
                    warn!("Failed to configure touchpad {}: {}", index, e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    /// Tear down every touchpad.
    pub fn detach(&mut self) -> Result<(), TouchpadError> {
        self.reset();
        info!("Detached {} touchpads", self.touchpads.len());
        Ok(())
    }

    /// Report a touch sample. `x` and `y` are in [0, 1); any positive
    /// `pressure` counts as contact.
    pub fn touch(&mut self, id: usize, x: f32, y: f32, pressure: f32) -> Result<(), TouchpadError> {
        let (width, height) = (self.config.width, self.config.height);
        let touchpad = self.touchpad_mut(id)?;
        check_position("x", x)?;
        check_position("y", y)?;

        let device_x = ((x * width as f32) as i32).min(width - 1);
        let device_y = ((y * height as f32) as i32).min(height - 1);
        touchpad.transition = touchpad.transition.next(pressure > 0.0);
        trace!(
            "touchpad {}: ({}, {}) {} -> ({}, {}) {:?}",
            id, x, y, pressure, device_x, device_y, touchpad.transition
        );

        let Some(handle) = touchpad.sink.as_mut() else {
            return Err(TouchpadError::NotAttached(id));
        };
        let sink = handle.get();
        sink.reset_status();

        let moved = touchpad.last_position != Some((device_x, device_y));
        match touchpad.transition {
            TouchTransition::Hovering | TouchTransition::Continuing => {
                if moved {
                    sink.send_multi_touch_xy(TOUCH_SLOT, TRACKING_ID, device_x, device_y);
                    sink.send_syn_report();
                }
            }
            TouchTransition::Begin => {
                // Position first so the host has coordinates at contact.
                sink.send_multi_touch_xy(TOUCH_SLOT, TRACKING_ID, device_x, device_y);
                sink.send_key(BTN_TOUCH, KeyState::Press);
                sink.send_syn_report();
            }
            TouchTransition::End => {
                sink.send_key(BTN_TOUCH, KeyState::Release);
                sink.send_multi_touch_lift(TOUCH_SLOT);
                sink.send_syn_report();
            }
        }
        // Recorded even when nothing was sent or the sink failed.
        touchpad.last_position = Some((device_x, device_y));

        Ok(sink.status()?)
    }

    /// Report the set of pressed buttons as a mask of `BUTTON_*` bits.
    pub fn button_state(&mut self, id: usize, buttons: u32) -> Result<(), TouchpadError> {
        let touchpad = self.touchpad_mut(id)?;
        let changes = touchpad.last_buttons ^ buttons;
        if changes == 0 {
            return Ok(());
        }
        if buttons & !SUPPORTED_BUTTONS != 0 {
            return Err(TouchpadError::UnsupportedButtons(buttons));
        }
        debug!(
            "touchpad {}: buttons change {:X} from {:X} to {:X}",
            id, changes, touchpad.last_buttons, buttons
        );

        let Some(handle) = touchpad.sink.as_mut() else {
            return Err(TouchpadError::NotAttached(id));
        };
        let sink = handle.get();
        sink.reset_status();
        if changes & BUTTON_BACK != 0 {
            sink.send_key(BTN_BACK, KeyState::from(buttons & BUTTON_BACK != 0));
            sink.send_syn_report();
        }
        touchpad.last_buttons = buttons;

        Ok(sink.status()?)
    }

    /// Report a scroll sample; each axis is in [-1, 1].
    pub fn scroll(&mut self, id: usize, x: f32, y: f32) -> Result<(), TouchpadError> {
        let touchpad = self.touchpad_mut(id)?;
        check_scroll("x", x)?;
        check_scroll("y", y)?;

        let Some(handle) = touchpad.sink.as_mut() else {
            return Err(TouchpadError::NotAttached(id));
        };
        let sink = handle.get();
        sink.reset_status();

        let scaled_x = scale_relative_scroll(x);
        let scaled_y = scale_relative_scroll(y);
        trace!("touchpad {}: scroll ({}, {}) -> ({}, {})", id, x, y, scaled_x, scaled_y);
        if scaled_x != 0 {
            sink.send_rel(REL_HWHEEL, scaled_x);
        }
        if scaled_y != 0 {
            sink.send_rel(REL_WHEEL, scaled_y);
        }
        if scaled_x != 0 || scaled_y != 0 {
            sink.send_syn_report();
        }

        Ok(sink.status()?)
    }

    pub fn snapshot(&self, id: usize) -> Option<TouchpadSnapshot> {
        self.touchpads.get(id).map(TouchpadState::snapshot)
    }

    /// Write a human-readable description of every touchpad and its sink.
    pub fn dump(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        for (index, touchpad) in self.touchpads.iter().enumerate() {
            writeln!(out, "[virtual touchpad {}]", index)?;
            let Some(handle) = touchpad.sink.as_ref() else {
                writeln!(out, "sink = none")?;
                writeln!(out)?;
                continue;
            };
            let ownership = match handle.ownership() {
                SinkOwnership::Owned => "owned",
                SinkOwnership::Lent => "lent",
            };
            writeln!(out, "sink = {}", ownership)?;
            writeln!(out, "touches = {}", touchpad.transition.bits())?;
            match touchpad.last_position {
                Some((x, y)) => writeln!(out, "last_position = ({}, {})", x, y)?,
                None => writeln!(out, "last_position = none")?,
            }
            writeln!(out, "last_buttons = 0x{:X}", touchpad.last_buttons)?;
            handle.get_ref().dump(out)?;
            writeln!(out)?;
        }
        Ok(())
    }
}

impl fmt::Display for TouchpadArray<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.dump(f)
    }
}
