use super::{DeviceIdentity, EventSink, KeyState, SinkError, SinkFactory};
use crate::input::*;
use crate::uinput::*;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    New,
    Configuring,
    Ready,
    Closed,
}

/// Capabilities collected inside the configuration bracket
#[derive(Debug, Default)]
struct PendingConfig {
    identity: Option<DeviceIdentity>,
    properties: Vec<u16>,
    keys: Vec<u16>,
    rel_axes: Vec<u16>,
    abs_axes: Vec<(u16, input_absinfo)>,
}

/// Event sink backed by a kernel uinput node.
pub struct UinputSink {
    path: PathBuf,
    lifecycle: Lifecycle,
    config: PendingConfig,
    file: Option<File>,
    /// Events of the frame being built, written out at SYN_REPORT
    frame: Vec<LinuxInputEvent>,
    latest_slot: Option<i32>,
    status: Option<SinkError>,
}

impl UinputSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lifecycle: Lifecycle::New,
            config: PendingConfig::default(),
            file: None,
            frame: Vec::new(),
            latest_slot: None,
            status: None,
        }
    }

    fn latch(&mut self, error: SinkError) {
        warn!("uinput sink {}: {}", self.path.display(), error);
        if self.status.is_none() {
            self.status = Some(error);
        }
    }

    fn require(&mut self, lifecycle: Lifecycle) -> bool {
        if self.lifecycle == lifecycle {
            true
        } else {
            self.latch(SinkError::Sequencing);
            false
        }
    }

    fn configure_abs(&mut self, code: u16, minimum: i32, maximum: i32) {
        if !self.require(Lifecycle::Configuring) {
            return;
        }
        if code > ABS_MAX {
            self.latch(SinkError::AbsRange(code));
            return;
        }
        let absinfo = input_absinfo {
            minimum,
            maximum,
            ..Default::default()
        };
        match self.config.abs_axes.iter_mut().find(|(c, _)| *c == code) {
            Some((_, existing)) => *existing = absinfo,
            None => self.config.abs_axes.push((code, absinfo)),
        }
    }

    fn queue(&mut self, event_type: u16, code: u16, value: i32) {
        self.frame.push(LinuxInputEvent::new(event_type, code, value));
    }

    fn send_multi_touch_slot(&mut self, slot: i32) {
        if self.latest_slot != Some(slot) {
            self.queue(EV_ABS, ABS_MT_SLOT, slot);
            self.latest_slot = Some(slot);
        }
    }

    fn create_device(&self) -> Result<File, SinkError> {
        let identity = self.config.identity.as_ref().ok_or(SinkError::Sequencing)?;

        let file = OpenOptions::new()
            .write(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(&self.path)
            .map_err(|e| SinkError::io("open uinput node", e))?;
        let fd = file.as_raw_fd();

        ioctl_int(fd, UI_SET_EVBIT, EV_SYN, "UI_SET_EVBIT")?;
        if !self.config.keys.is_empty() {
            ioctl_int(fd, UI_SET_EVBIT, EV_KEY, "UI_SET_EVBIT")?;
        }
        if !self.config.rel_axes.is_empty() {
            ioctl_int(fd, UI_SET_EVBIT, EV_REL, "UI_SET_EVBIT")?;
        }
        if !self.config.abs_axes.is_empty() {
            ioctl_int(fd, UI_SET_EVBIT, EV_ABS, "UI_SET_EVBIT")?;
        }
        for &property in &self.config.properties {
            ioctl_int(fd, UI_SET_PROPBIT, property, "UI_SET_PROPBIT")?;
        }
        for &key in &self.config.keys {
            ioctl_int(fd, UI_SET_KEYBIT, key, "UI_SET_KEYBIT")?;
        }
        for &axis in &self.config.rel_axes {
            ioctl_int(fd, UI_SET_RELBIT, axis, "UI_SET_RELBIT")?;
        }
        for &(code, absinfo) in &self.config.abs_axes {
            ioctl_int(fd, UI_SET_ABSBIT, code, "UI_SET_ABSBIT")?;
            let setup = uinput_abs_setup { code, absinfo };
            ioctl_ptr(fd, UI_ABS_SETUP, &setup, "UI_ABS_SETUP")?;
        }

        let mut setup = uinput_setup {
            id: input_id {
                bustype: identity.bustype,
                vendor: identity.vendor,
                product: identity.product,
                version: identity.version,
            },
            name: [0; UINPUT_MAX_NAME_SIZE],
            ff_effects_max: 0,
        };
        let name = identity.name.as_bytes();
        setup.name[..name.len()].copy_from_slice(name);
        ioctl_ptr(fd, UI_DEV_SETUP, &setup, "UI_DEV_SETUP")?;

        // SAFETY: UI_DEV_CREATE takes no argument.
        if unsafe { libc::ioctl(fd, UI_DEV_CREATE as _) } < 0 {
            return Err(SinkError::io(
                "UI_DEV_CREATE",
                std::io::Error::last_os_error(),
            ));
        }

        Ok(file)
    }
}

fn ioctl_int(
    fd: RawFd,
    request: libc::c_ulong,
    value: u16,
    context: &'static str,
) -> Result<(), SinkError> {
    // SAFETY: the UI_SET_*BIT requests take a plain int argument.
    if unsafe { libc::ioctl(fd, request as _, libc::c_int::from(value)) } < 0 {
        return Err(SinkError::io(context, std::io::Error::last_os_error()));
    }
    Ok(())
}

fn ioctl_ptr<T>(
    fd: RawFd,
    request: libc::c_ulong,
    arg: &T,
    context: &'static str,
) -> Result<(), SinkError> {
    // SAFETY: `arg` is the repr(C) struct whose size is encoded in `request`.
    if unsafe { libc::ioctl(fd, request as _, arg as *const T) } < 0 {
        return Err(SinkError::io(context, std::io::Error::last_os_error()));
    }
    Ok(())
}

impl EventSink for UinputSink {
    fn configure_begin(&mut self, identity: &DeviceIdentity) {
        if !self.require(Lifecycle::New) {
            return;
        }
        if identity.name.len() >= UINPUT_MAX_NAME_SIZE {
            self.latch(SinkError::NameTooLong(identity.name.len()));
            return;
        }
        debug!(
            "Configuring {} (bus=0x{:02x}, vendor=0x{:04x}, product=0x{:04x})",
            identity.name, identity.bustype, identity.vendor, identity.product
        );
        self.config = PendingConfig {
            identity: Some(identity.clone()),
            ..Default::default()
        };
        self.lifecycle = Lifecycle::Configuring;
    }

    fn configure_input_property(&mut self, property: u16) {
        if !self.require(Lifecycle::Configuring) {
            return;
        }
        if property > INPUT_PROP_MAX {
            self.latch(SinkError::PropertyRange(property));
            return;
        }
        if !self.config.properties.contains(&property) {
            self.config.properties.push(property);
        }
    }

    fn configure_key(&mut self, key: u16) {
        if !self.require(Lifecycle::Configuring) {
            return;
        }
        if key > KEY_MAX {
            self.latch(SinkError::KeyRange(key));
            return;
        }
        if !self.config.keys.contains(&key) {
            self.config.keys.push(key);
        }
    }

    fn configure_rel(&mut self, axis: u16) {
        if !self.require(Lifecycle::Configuring) {
            return;
        }
        if axis > REL_MAX {
            self.latch(SinkError::RelRange(axis));
            return;
        }
        if !self.config.rel_axes.contains(&axis) {
            self.config.rel_axes.push(axis);
        }
    }

    fn configure_multi_touch_xy(&mut self, x0: i32, y0: i32, x1: i32, y1: i32) {
        self.configure_abs(ABS_MT_POSITION_X, x0, x1);
        self.configure_abs(ABS_MT_POSITION_Y, y0, y1);
    }

    fn configure_abs_slots(&mut self, slots: i32) {
        self.configure_abs(ABS_MT_SLOT, 0, slots - 1);
        self.configure_abs(ABS_MT_TRACKING_ID, 0, u16::MAX as i32);
    }

    fn configure_end(&mut self) {
        if !self.require(Lifecycle::Configuring) {
            return;
        }
        if self.status.is_some() {
            // Do not create a half-declared device.
            self.lifecycle = Lifecycle::Closed;
            return;
        }
        match self.create_device() {
            Ok(file) => {
                debug!("Created uinput device from {}", self.path.display());
                self.file = Some(file);
                self.lifecycle = Lifecycle::Ready;
            }
            Err(e) => {
                self.lifecycle = Lifecycle::Closed;
                self.latch(e);
            }
        }
    }

    fn send_key(&mut self, key: u16, state: KeyState) {
        if !self.require(Lifecycle::Ready) {
            return;
        }
        if key > KEY_MAX {
            self.latch(SinkError::KeyRange(key));
            return;
        }
        self.queue(EV_KEY, key, state.value());
    }

    fn send_rel(&mut self, axis: u16, delta: i32) {
        if !self.require(Lifecycle::Ready) {
            return;
        }
        if axis > REL_MAX {
            self.latch(SinkError::RelRange(axis));
            return;
        }
        self.queue(EV_REL, axis, delta);
    }

    fn send_multi_touch_xy(&mut self, slot: i32, tracking_id: i32, x: i32, y: i32) {
        if !self.require(Lifecycle::Ready) {
            return;
        }
        self.send_multi_touch_slot(slot);
        self.queue(EV_ABS, ABS_MT_TRACKING_ID, tracking_id);
        self.queue(EV_ABS, ABS_MT_POSITION_X, x);
        self.queue(EV_ABS, ABS_MT_POSITION_Y, y);
    }

    fn send_multi_touch_lift(&mut self, slot: i32) {
        if !self.require(Lifecycle::Ready) {
            return;
        }
        self.send_multi_touch_slot(slot);
        self.queue(EV_ABS, ABS_MT_TRACKING_ID, -1);
    }

    fn send_syn_report(&mut self) {
        if !self.require(Lifecycle::Ready) {
            return;
        }
        self.frame.push(LinuxInputEvent::syn_report());

        let mut data = Vec::with_capacity(self.frame.len() * INPUT_EVENT_SIZE);
        for event in self.frame.drain(..) {
            data.extend_from_slice(&event.to_bytes());
        }
        trace!("Writing {} bytes to {}", data.len(), self.path.display());

        let Some(file) = self.file.as_mut() else {
            self.latch(SinkError::Sequencing);
            return;
        };
        if let Err(e) = file.write_all(&data) {
            self.latch(SinkError::io("write uinput frame", e));
        }
    }

    fn close(&mut self) {
        if let Some(file) = self.file.take() {
            // SAFETY: UI_DEV_DESTROY takes no argument.
            if unsafe { libc::ioctl(file.as_raw_fd(), UI_DEV_DESTROY as _) } < 0 {
                warn!(
                    "UI_DEV_DESTROY failed: {}",
                    std::io::Error::last_os_error()
                );
            }
            debug!("Destroyed uinput device from {}", self.path.display());
        }
        self.frame.clear();
        self.latest_slot = None;
        self.lifecycle = Lifecycle::Closed;
    }

    fn status(&self) -> Result<(), SinkError> {
        match &self.status {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn reset_status(&mut self) {
        self.status = None;
    }

    fn dump(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        writeln!(out, "uinput = {}", self.path.display())?;
        writeln!(out, "state = {:?}", self.lifecycle)?;
        if let Some(identity) = &self.config.identity {
            writeln!(out, "name = {}", identity.name)?;
        }
        match &self.status {
            Some(error) => writeln!(out, "status = {}", error)?,
            None => writeln!(out, "status = ok")?,
        }
        match self.latest_slot {
            Some(slot) => writeln!(out, "latest_slot = {}", slot)?,
            None => writeln!(out, "latest_slot = none")?,
        }
        let keys: Vec<String> = self
            .config
            .keys
            .iter()
            .map(|k| format!("0x{:03x}", k))
            .collect();
        writeln!(out, "keys = [{}]", keys.join(", "))
    }
}

impl Drop for UinputSink {
    fn drop(&mut self) {
        self.close();
    }
}

/// Creates a [`UinputSink`] on the given node for every touchpad.
#[derive(Debug, Clone)]
pub struct UinputFactory {
    path: PathBuf,
}

impl UinputFactory {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl SinkFactory for UinputFactory {
    fn create(&mut self) -> Box<dyn EventSink + Send> {
        Box::new(UinputSink::new(&self.path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MISSING_NODE: &str = "/nonexistent/vtouchpad/uinput";

    fn identity(name: &str) -> DeviceIdentity {
        DeviceIdentity {
            name: name.to_string(),
            bustype: BUS_VIRTUAL,
            vendor: 0,
            product: 0,
            version: 1,
        }
    }

    #[test]
    fn send_before_configuration_is_sequencing_error() {
        let mut sink = UinputSink::new(MISSING_NODE);
        sink.send_key(BTN_TOUCH, KeyState::Press);
        assert!(matches!(sink.status(), Err(SinkError::Sequencing)));

        sink.reset_status();
        assert!(sink.status().is_ok());
    }

    #[test]
    fn first_error_wins() {
        let mut sink = UinputSink::new(MISSING_NODE);
        sink.configure_begin(&identity("pad"));
        sink.configure_key(0x300);
        sink.configure_rel(0x20);
        assert!(matches!(sink.status(), Err(SinkError::KeyRange(0x300))));
    }

    #[test]
    fn missing_node_fails_at_configure_end() {
        let mut sink = UinputSink::new(MISSING_NODE);
        sink.configure_begin(&identity("pad"));
        sink.configure_input_property(INPUT_PROP_DIRECT);
        sink.configure_multi_touch_xy(0, 0, 0xffff, 0xffff);
        sink.configure_abs_slots(2);
        sink.configure_key(BTN_TOUCH);
        assert!(sink.status().is_ok());

        sink.configure_end();
        assert!(matches!(sink.status(), Err(SinkError::Io { .. })));
        assert_eq!(sink.lifecycle, Lifecycle::Closed);
    }

    #[test]
    fn overlong_name_is_rejected() {
        let mut sink = UinputSink::new(MISSING_NODE);
        sink.configure_begin(&identity(&"x".repeat(UINPUT_MAX_NAME_SIZE)));
        assert!(matches!(
            sink.status(),
            Err(SinkError::NameTooLong(n)) if n == UINPUT_MAX_NAME_SIZE
        ));
        assert_eq!(sink.lifecycle, Lifecycle::New);
    }

    #[test]
    fn slot_axes_use_inclusive_ranges() {
        let mut sink = UinputSink::new(MISSING_NODE);
        sink.configure_begin(&identity("pad"));
        sink.configure_abs_slots(2);
        let slot = sink
            .config
            .abs_axes
            .iter()
            .find(|(code, _)| *code == ABS_MT_SLOT)
            .map(|(_, info)| *info)
            .unwrap();
        assert_eq!((slot.minimum, slot.maximum), (0, 1));
    }

    #[test]
    fn begin_twice_is_sequencing_error() {
        let mut sink = UinputSink::new(MISSING_NODE);
        sink.configure_begin(&identity("pad"));
        assert!(sink.status().is_ok());
        sink.configure_begin(&identity("pad"));
        assert!(matches!(sink.status(), Err(SinkError::Sequencing)));
    }

    #[test]
    fn close_is_idempotent() {
        let mut sink = UinputSink::new(MISSING_NODE);
        sink.close();
        sink.close();
        assert_eq!(sink.lifecycle, Lifecycle::Closed);
        assert!(sink.status().is_ok());
    }

    #[test]
    fn dump_reports_state_and_status() {
        let mut sink = UinputSink::new(MISSING_NODE);
        sink.configure_begin(&identity("vr-virtual-touchpad-0"));
        sink.configure_key(BTN_TOUCH);
        let mut text = String::new();
        sink.dump(&mut text).unwrap();
        assert!(text.contains("state = Configuring"));
        assert!(text.contains("name = vr-virtual-touchpad-0"));
        assert!(text.contains("status = ok"));
        assert!(text.contains("keys = [0x14a]"));
    }
}
