use super::{DeviceIdentity, EventSink, KeyState, SinkError};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// One call observed by a [`RecordingSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkCall {
    ConfigureBegin(DeviceIdentity),
    ConfigureInputProperty(u16),
    ConfigureKey(u16),
    ConfigureRel(u16),
    ConfigureMultiTouchXY { x0: i32, y0: i32, x1: i32, y1: i32 },
    ConfigureAbsSlots(i32),
    ConfigureEnd,
    Key { key: u16, state: KeyState },
    Rel { axis: u16, delta: i32 },
    MultiTouchXY { slot: i32, tracking_id: i32, x: i32, y: i32 },
    MultiTouchLift { slot: i32 },
    SynReport,
    Close,
}

#[derive(Debug, Default)]
struct Log {
    calls: Vec<SinkCall>,
    status: Option<SinkError>,
    fail_with: Option<SinkError>,
}

/// Sink that records every call instead of touching the kernel.
///
/// Clones share one log, so a test can lend one handle to a touchpad and
/// inspect the calls through another.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    log: Arc<Mutex<Log>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latch `error` on every subsequent call until cleared with `None`.
    pub fn fail_with(&self, error: Option<SinkError>) {
        self.lock().fail_with = error;
    }

    pub fn calls(&self) -> Vec<SinkCall> {
        self.lock().calls.clone()
    }

    /// Drain the recorded calls.
    pub fn take_calls(&self) -> Vec<SinkCall> {
        std::mem::take(&mut self.lock().calls)
    }

    fn lock(&self) -> MutexGuard<'_, Log> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&mut self, call: SinkCall) {
        let mut log = self.lock();
        log.calls.push(call);
        if log.status.is_none() {
            log.status = log.fail_with.clone();
        }
    }
}

impl EventSink for RecordingSink {
    fn configure_begin(&mut self, identity: &DeviceIdentity) {
        self.record(SinkCall::ConfigureBegin(identity.clone()));
    }

    fn configure_input_property(&mut self, property: u16) {
        self.record(SinkCall::ConfigureInputProperty(property));
    }

    fn configure_key(&mut self, key: u16) {
        self.record(SinkCall::ConfigureKey(key));
    }

    fn configure_rel(&mut self, axis: u16) {
        self.record(SinkCall::ConfigureRel(axis));
    }

    fn configure_multi_touch_xy(&mut self, x0: i32, y0: i32, x1: i32, y1: i32) {
        self.record(SinkCall::ConfigureMultiTouchXY { x0, y0, x1, y1 });
    }

    fn configure_abs_slots(&mut self, slots: i32) {
        self.record(SinkCall::ConfigureAbsSlots(slots));
    }

    fn configure_end(&mut self) {
        self.record(SinkCall::ConfigureEnd);
    }

    fn send_key(&mut self, key: u16, state: KeyState) {
        self.record(SinkCall::Key { key, state });
    }

    fn send_rel(&mut self, axis: u16, delta: i32) {
        self.record(SinkCall::Rel { axis, delta });
    }

    fn send_multi_touch_xy(&mut self, slot: i32, tracking_id: i32, x: i32, y: i32) {
        self.record(SinkCall::MultiTouchXY {
            slot,
            tracking_id,
            x,
            y,
        });
    }

    fn send_multi_touch_lift(&mut self, slot: i32) {
        self.record(SinkCall::MultiTouchLift { slot });
    }

    fn send_syn_report(&mut self) {
        self.record(SinkCall::SynReport);
    }

    fn close(&mut self) {
        self.lock().calls.push(SinkCall::Close);
    }

    fn status(&self) -> Result<(), SinkError> {
        match &self.lock().status {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn reset_status(&mut self) {
        self.lock().status = None;
    }

    fn dump(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        let log = self.lock();
        writeln!(out, "recording sink: {} calls", log.calls.len())?;
        if let Some(error) = &log.status {
            writeln!(out, "status = {}", error)?;
        }
        Ok(())
    }
}
