//! Per-slot touch tracking for one device (multitouch protocol type B).

use log::{debug, warn};

use crate::error::{Error, Result};
use crate::event::{EventCode, EventDomain, RawEvent};
use crate::source::{AxisCalibration, TouchSource};

/// Slot count used when a device does not report its `ABS_MT_SLOT` range.
pub const DEFAULT_SLOTS: usize = 10;

/// Upper bound on the slot table, whatever `ABS_MT_SLOT` claims.
pub const MAX_SLOTS: usize = 64;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TouchSlot {
    /// `None` while no finger is assigned to the slot.
    pub tracking_id: Option<i32>,
    pub x: f32,
    pub y: f32,
}

impl TouchSlot {
    pub fn is_active(&self) -> bool {
        self.tracking_id.is_some()
    }
}

/// Counters for conditions the decoder tolerates instead of failing on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackerStats {
    pub packets: u64,
    pub resyncs: u64,
    pub out_of_range_events: u64,
}

/// What the caller should do after feeding one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Continue,
    EndOfPacket,
}

#[derive(Debug, Clone)]
pub struct Tracker {
    slots: Vec<TouchSlot>,
    cur_slot: i32,
    cal_x: AxisCalibration,
    cal_y: AxisCalibration,
    // set by SYN_DROPPED, cleared by the next SYN_REPORT
    discarding: bool,
    stats: TrackerStats,
}

impl Tracker {
    pub fn new(slot_count: usize, cal_x: AxisCalibration, cal_y: AxisCalibration) -> Self {
        Self {
            slots: vec![TouchSlot::default(); slot_count],
            cur_slot: 0,
            cal_x,
            cal_y,
            discarding: false,
            stats: TrackerStats::default(),
        }
    }

    pub fn slots(&self) -> &[TouchSlot] {
        &self.slots
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn current_slot(&self) -> i32 {
        self.cur_slot
    }

    pub fn calibration(&self) -> (AxisCalibration, AxisCalibration) {
        (self.cal_x, self.cal_y)
    }

    pub fn stats(&self) -> TrackerStats {
        self.stats
    }

    /// Feed a single event.
    pub fn apply(&mut self, ev: RawEvent) -> Step {
        if ev.ends_packet() {
            self.on_syn_report();
            return Step::EndOfPacket;
        }
        if ev.code == EventCode::Dropped {
            self.on_syn_dropped();
            return Step::Continue;
        }
        if self.discarding || ev.domain != EventDomain::Absolute {
            return Step::Continue;
        }
        match ev.code {
            EventCode::Slot => self.on_slot(ev.value),
            EventCode::TrackingId => self.on_tracking_id(ev.value),
            EventCode::PositionX => self.on_pos_x(ev.value),
            EventCode::PositionY => self.on_pos_y(ev.value),
            _ => {}
        }
        Step::Continue
    }

    /// Consume one packet from `src`, up to and including its `SYN_REPORT`.
    pub fn pump<S: TouchSource + ?Sized>(&mut self, src: &mut S) -> Result<()> {
        loop {
            let ev = src.next_event().map_err(|source| Error::ReadFailed {
                identity: src.identity().to_string(),
                source,
            })?;
            if self.apply(ev) == Step::EndOfPacket {
                return Ok(());
            }
        }
    }

    /// Pump packets until `src` has nothing pending. Returns how many were read.
    pub fn drain<S: TouchSource + ?Sized>(&mut self, src: &mut S) -> Result<usize> {
        let mut packets = 0;
        loop {
            let pending = src.has_event_pending().map_err(|source| Error::ReadFailed {
                identity: src.identity().to_string(),
                source,
            })?;
            if !pending {
                return Ok(packets);
            }
            self.pump(src)?;
            packets += 1;
        }
    }

    fn on_slot(&mut self, slot: i32) {
        self.cur_slot = slot;
    }

    fn current_mut(&mut self) -> Option<&mut TouchSlot> {
        let idx = usize::try_from(self.cur_slot).ok()?;
        if idx >= self.slots.len() {
            return None;
        }
        Some(&mut self.slots[idx])
    }

    fn on_tracking_id(&mut self, tracking_id: i32) {
        let id = (tracking_id >= 0).then_some(tracking_id);
        match self.current_mut() {
            Some(s) => s.tracking_id = id,
            None => self.out_of_range(),
        }
    }

    // Positions are divided by the calibrated maximum only, not by max - min.
    fn on_pos_x(&mut self, raw: i32) {
        let nx = raw as f32 / self.cal_x.max;
        match self.current_mut() {
            Some(s) => s.x = nx,
            None => self.out_of_range(),
        }
    }

    fn on_pos_y(&mut self, raw: i32) {
        let ny = raw as f32 / self.cal_y.max;
        match self.current_mut() {
            Some(s) => s.y = ny,
            None => self.out_of_range(),
        }
    }

    fn on_syn_report(&mut self) {
        self.discarding = false;
        self.stats.packets += 1;
    }

    fn on_syn_dropped(&mut self) {
        self.stats.resyncs += 1;
        self.discarding = true;
        warn!(
            "input buffer overrun, discarding rest of packet (resync #{})",
            self.stats.resyncs
        );
    }

    fn out_of_range(&mut self) {
        self.stats.out_of_range_events += 1;
        debug!(
            "slot {} outside 0..{}, event dropped",
            self.cur_slot,
            self.slots.len()
        );
    }
}
