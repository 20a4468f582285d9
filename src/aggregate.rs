//! Merging per-screen touch tables into one fixed-capacity frame.
//!
//! With `n` attached screens and capacity `N`, screen `i` owns external
//! slots `i * (N / n) .. (i + 1) * (N / n)`. The mapping never depends on
//! which fingers are down, so a consumer can tell which screen a slot
//! belongs to even while it is empty. Internal slots past a screen's share
//! are not exposed; each frame counts the active ones it had to leave out.

use log::warn;
use serde::Serialize;

use crate::screen::{ScreenId, ScreenList};
use crate::select::DeviceContext;
use crate::source::TouchSource;
use crate::tracker::TrackerStats;

/// Tracking id reported for an empty slot at the process boundary.
pub const INACTIVE_TRACKING_ID: i32 = -1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TouchPoint {
    pub screen: ScreenId,
    pub tracking_id: Option<i32>,
    pub x: f32,
    pub y: f32,
}

impl TouchPoint {
    pub fn is_active(&self) -> bool {
        self.tracking_id.is_some()
    }

    pub fn wire_tracking_id(&self) -> i32 {
        self.tracking_id.unwrap_or(INACTIVE_TRACKING_ID)
    }
}

/// One snapshot of every external slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    pub points: Vec<TouchPoint>,
    /// Active touches this frame that fell outside their screen's share.
    pub dropped: usize,
}

impl Frame {
    pub fn empty(capacity: usize) -> Self {
        Self {
            points: vec![TouchPoint::default(); capacity],
            dropped: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.points.len()
    }

    pub fn active(&self) -> impl Iterator<Item = (usize, &TouchPoint)> {
        self.points.iter().enumerate().filter(|(_, p)| p.is_active())
    }
}

/// Build a frame from the current touch tables. Reads only.
pub fn aggregate<S: TouchSource>(devices: &[DeviceContext<S>], capacity: usize) -> Frame {
    let mut frame = Frame::empty(capacity);
    if devices.is_empty() {
        return frame;
    }
    let per_device = capacity / devices.len();

    for (i, dev) in devices.iter().enumerate() {
        let base = i * per_device;
        let screen = dev.identity();
        let table = dev.tracker().slots();

        for j in 0..per_device {
            let out = &mut frame.points[base + j];
            out.screen = screen;
            if let Some(src) = table.get(j).filter(|s| s.is_active()) {
                out.tracking_id = src.tracking_id;
                out.x = src.x;
                out.y = src.y;
            }
        }

        frame.dropped += table.iter().skip(per_device).filter(|s| s.is_active()).count();
    }
    frame
}

/// The set of attached screens and the external capacity they share.
#[derive(Debug)]
pub struct TouchMux<S> {
    devices: Vec<DeviceContext<S>>,
    capacity: usize,
    // tracking ids each screen had hidden at the last update
    hidden: Vec<Vec<i32>>,
    dropped_total: u64,
}

impl<S: TouchSource> TouchMux<S> {
    pub fn from_devices(devices: Vec<DeviceContext<S>>, capacity: usize) -> Self {
        if !devices.is_empty() {
            let per_device = capacity / devices.len();
            for dev in &devices {
                let slots = dev.tracker().slot_count();
                if slots > per_device {
                    warn!(
                        "screen '{}' has {slots} slots but only {per_device} external slots; touches beyond that are dropped",
                        dev.identity()
                    );
                }
            }
        }
        Self {
            hidden: vec![Vec::new(); devices.len()],
            devices,
            capacity,
            dropped_total: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn screen_count(&self) -> usize {
        self.devices.len()
    }

    pub fn screen_ids(&self) -> ScreenList {
        ScreenList {
            ids: self.devices.iter().map(|d| d.identity()).collect(),
        }
    }

    pub fn devices(&self) -> &[DeviceContext<S>] {
        &self.devices
    }

    pub fn devices_mut(&mut self) -> &mut [DeviceContext<S>] {
        &mut self.devices
    }

    pub fn device_stats(&self) -> Vec<(ScreenId, TrackerStats)> {
        self.devices
            .iter()
            .map(|d| (d.identity(), d.stats()))
            .collect()
    }

    /// Number of distinct touches the capacity split has hidden so far.
    /// A finger held on a hidden slot is counted once, not once per update.
    pub fn dropped_touches(&self) -> u64 {
        self.dropped_total
    }

    /// Snapshot without reading any new events.
    pub fn aggregate(&self) -> Frame {
        aggregate(&self.devices, self.capacity)
    }

    /// Drain pending events on every screen, then snapshot.
    pub fn update(&mut self) -> crate::Result<Frame> {
        for dev in &mut self.devices {
            dev.drain()?;
        }
        let frame = self.aggregate();
        if !self.devices.is_empty() {
            let per_device = self.capacity / self.devices.len();
            for (dev, seen) in self.devices.iter().zip(self.hidden.iter_mut()) {
                let now: Vec<i32> = dev
                    .tracker()
                    .slots()
                    .iter()
                    .skip(per_device)
                    .filter_map(|s| s.tracking_id)
                    .collect();
                self.dropped_total += now.iter().filter(|id| !seen.contains(id)).count() as u64;
                *seen = now;
            }
        }
        Ok(frame)
    }

    /// Release every screen.
    pub fn close(self) {
        for dev in self.devices {
            dev.close();
        }
    }
}
