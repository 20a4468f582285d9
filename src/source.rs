//! The boundary between the decoder and whatever produces raw events.
//!
//! Real screens come from [`crate::input`]; [`ScriptedSource`] replays a
//! fixed event list and is what the tests drive.

use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::event::RawEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Slot,
    PositionX,
    PositionY,
}

/// Calibrated range of one absolute axis, queried once at attach time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisCalibration {
    pub min: f32,
    pub max: f32,
}

impl AxisCalibration {
    pub fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }
}

/// One raw multitouch input device.
///
/// Dropping the value releases the device; nothing else closes it.
pub trait TouchSource {
    /// Stable hardware identifier, used as the screen identity.
    fn identity(&self) -> &str;

    /// True when the device advertises slot, tracking id, X and Y.
    fn supports_multitouch(&self) -> bool;

    fn axis_range(&self, axis: Axis) -> io::Result<AxisCalibration>;

    /// Non-blocking check for unread events.
    fn has_event_pending(&mut self) -> io::Result<bool>;

    /// Read the next event, blocking if none is buffered.
    fn next_event(&mut self) -> io::Result<RawEvent>;
}

impl<S: TouchSource + ?Sized> TouchSource for Box<S> {
    fn identity(&self) -> &str {
        (**self).identity()
    }

    fn supports_multitouch(&self) -> bool {
        (**self).supports_multitouch()
    }

    fn axis_range(&self, axis: Axis) -> io::Result<AxisCalibration> {
        (**self).axis_range(axis)
    }

    fn has_event_pending(&mut self) -> io::Result<bool> {
        (**self).has_event_pending()
    }

    fn next_event(&mut self) -> io::Result<RawEvent> {
        (**self).next_event()
    }
}

/// In-memory source replaying a queued event script.
#[derive(Debug)]
pub struct ScriptedSource {
    identity: String,
    multitouch: bool,
    slots: Option<AxisCalibration>,
    x: AxisCalibration,
    y: AxisCalibration,
    queue: VecDeque<RawEvent>,
    released: Arc<AtomicBool>,
}

impl ScriptedSource {
    /// A full-capability screen with 10 slots and a 0..=1024 range on both axes.
    pub fn new(identity: &str) -> Self {
        Self {
            identity: identity.to_string(),
            multitouch: true,
            slots: Some(AxisCalibration::new(0.0, 9.0)),
            x: AxisCalibration::new(0.0, 1024.0),
            y: AxisCalibration::new(0.0, 1024.0),
            queue: VecDeque::new(),
            released: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Pretend the device is missing one of the required MT capabilities.
    pub fn without_multitouch(mut self) -> Self {
        self.multitouch = false;
        self
    }

    pub fn with_slots(mut self, count: u32) -> Self {
        self.slots = Some(AxisCalibration::new(0.0, count as f32 - 1.0));
        self
    }

    pub fn with_range(mut self, x: AxisCalibration, y: AxisCalibration) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    pub fn with_events(mut self, events: impl IntoIterator<Item = RawEvent>) -> Self {
        self.queue.extend(events);
        self
    }

    /// Queue more events on an already attached source.
    pub fn push(&mut self, events: impl IntoIterator<Item = RawEvent>) {
        self.queue.extend(events);
    }

    /// Flag that flips to true once this source is dropped.
    pub fn released_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.released)
    }
}

impl TouchSource for ScriptedSource {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn supports_multitouch(&self) -> bool {
        self.multitouch
    }

    fn axis_range(&self, axis: Axis) -> io::Result<AxisCalibration> {
        match axis {
            Axis::Slot => self
                .slots
                .ok_or_else(|| io::Error::new(io::ErrorKind::Unsupported, "no slot axis")),
            Axis::PositionX => Ok(self.x),
            Axis::PositionY => Ok(self.y),
        }
    }

    fn has_event_pending(&mut self) -> io::Result<bool> {
        Ok(!self.queue.is_empty())
    }

    fn next_event(&mut self) -> io::Result<RawEvent> {
        self.queue
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "event script exhausted"))
    }
}

impl Drop for ScriptedSource {
    fn drop(&mut self) {
        self.released.store(true, Ordering::SeqCst);
    }
}
