use crate::sink::EventSink;

/// How a touchpad holds its sink.
pub enum SinkHandle<'a> {
    /// Created by the touchpad array; dropped (and so destroyed) with it.
    Owned(Box<dyn EventSink + Send + 'a>),
    /// Lent by the caller, who keeps ownership.
    Borrowed(&'a mut (dyn EventSink + Send + 'a)),
}

impl<'a> SinkHandle<'a> {
    pub fn get(&mut self) -> &mut (dyn EventSink + Send + 'a) {
        match self {
            SinkHandle::Owned(sink) => sink.as_mut(),
            SinkHandle::Borrowed(sink) => &mut **sink,
        }
    }

    pub fn get_ref(&self) -> &(dyn EventSink + Send + 'a) {
        match self {
            SinkHandle::Owned(sink) => sink.as_ref(),
            SinkHandle::Borrowed(sink) => &**sink,
        }
    }

    pub fn ownership(&self) -> SinkOwnership {
        match self {
            SinkHandle::Owned(_) => SinkOwnership::Owned,
            SinkHandle::Borrowed(_) => SinkOwnership::Lent,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkOwnership {
    Owned,
    Lent,
}

/// Contact change between the previous sample and the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TouchTransition {
    /// Not pressed before or now.
    #[default]
    Hovering,
    /// Pressed now, not before.
    Begin,
    /// Pressed before, not now.
    End,
    /// Pressed before and now.
    Continuing,
}

impl TouchTransition {
    /// Transition for a new sample, given only the last one.
    pub fn next(self, pressed: bool) -> Self {
        match (self.is_pressed(), pressed) {
            (false, false) => TouchTransition::Hovering,
            (false, true) => TouchTransition::Begin,
            (true, false) => TouchTransition::End,
            (true, true) => TouchTransition::Continuing,
        }
    }

    /// Whether the most recent sample was a contact.
    pub fn is_pressed(self) -> bool {
        matches!(self, TouchTransition::Begin | TouchTransition::Continuing)
    }

    /// Two-bit history: previous sample in bit 1, current in bit 0.
    pub fn bits(self) -> u8 {
        match self {
            TouchTransition::Hovering => 0b00,
            TouchTransition::Begin => 0b01,
            TouchTransition::End => 0b10,
            TouchTransition::Continuing => 0b11,
        }
    }
}

#[derive(Default)]
pub struct TouchpadState<'a> {
    pub(crate) sink: Option<SinkHandle<'a>>,
    /// Last coordinates sent to the sink; `None` forces the next send
    pub(crate) last_position: Option<(i32, i32)>,
    pub(crate) transition: TouchTransition,
    pub(crate) last_buttons: u32,
}

impl TouchpadState<'_> {
    /// Close the sink and return to the unattached default.
    pub(crate) fn reset(&mut self) {
        if let Some(sink) = self.sink.as_mut() {
            sink.get().close();
        }
        *self = Self::default();
    }

    pub fn snapshot(&self) -> TouchpadSnapshot {
        TouchpadSnapshot {
            sink: self.sink.as_ref().map(SinkHandle::ownership),
            transition: self.transition,
            last_position: self.last_position,
            last_buttons: self.last_buttons,
        }
    }
}

/// Read-only copy of one touchpad's tracked state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TouchpadSnapshot {
    pub sink: Option<SinkOwnership>,
    pub transition: TouchTransition,
    pub last_position: Option<(i32, i32)>,
    pub last_buttons: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{RecordingSink, SinkCall};

    #[test]
    fn transition_table() {
        use TouchTransition::*;
        let cases = [
            (Hovering, false, Hovering),
            (Hovering, true, Begin),
            (Begin, true, Continuing),
            (Begin, false, End),
            (Continuing, true, Continuing),
            (Continuing, false, End),
            (End, false, Hovering),
            (End, true, Begin),
        ];
        for (from, pressed, to) in cases {
            assert_eq!(from.next(pressed), to, "{:?} + {}", from, pressed);
        }
    }

    #[test]
    fn bits_match_rolling_history() {
        let mut bits = 0u8;
        let mut transition = TouchTransition::default();
        for pressed in [true, true, false, false, true, false] {
            bits = ((bits & 1) << 1) | pressed as u8;
            transition = transition.next(pressed);
            assert_eq!(transition.bits(), bits);
        }
    }

    #[test]
    fn reset_closes_lent_sink_and_clears_state() {
        let mut sink = RecordingSink::new();
        let log = sink.clone();
        let mut state = TouchpadState {
            sink: Some(SinkHandle::Borrowed(&mut sink)),
            last_position: Some((1, 2)),
            transition: TouchTransition::Continuing,
            last_buttons: 8,
        };
        state.reset();
        assert_eq!(state.snapshot(), TouchpadSnapshot::default());
        assert_eq!(log.calls(), vec![SinkCall::Close]);
    }
}
