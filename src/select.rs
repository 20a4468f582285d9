//! Picking the multitouch screens to attach.

use log::{debug, info, warn};

use crate::error::{Error, Result};
use crate::screen::ScreenId;
use crate::source::{Axis, AxisCalibration, TouchSource};
use crate::tracker::{DEFAULT_SLOTS, MAX_SLOTS, Tracker, TrackerStats};

/// An attached screen: the source it reads from and its decoded touch table.
#[derive(Debug)]
pub struct DeviceContext<S> {
    identity: ScreenId,
    source: S,
    tracker: Tracker,
}

impl<S: TouchSource> DeviceContext<S> {
    /// Capture calibration and set up an all-inactive touch table.
    pub fn attach(source: S) -> Result<Self> {
        let name = source.identity().to_string();
        if !source.supports_multitouch() {
            return Err(Error::UnsupportedDevice(format!(
                "{name}: missing multitouch slot capabilities"
            )));
        }
        let cal_x = source
            .axis_range(Axis::PositionX)
            .map_err(|e| Error::UnsupportedDevice(format!("{name}: no X range: {e}")))?;
        let cal_y = source
            .axis_range(Axis::PositionY)
            .map_err(|e| Error::UnsupportedDevice(format!("{name}: no Y range: {e}")))?;
        if cal_x.max <= 0.0 || cal_y.max <= 0.0 {
            return Err(Error::UnsupportedDevice(format!(
                "{name}: non-positive axis maximum (x {}, y {})",
                cal_x.max, cal_y.max
            )));
        }
        let slots = slot_count(&source);
        Ok(Self {
            identity: ScreenId::new(&name),
            source,
            tracker: Tracker::new(slots, cal_x, cal_y),
        })
    }

    pub fn identity(&self) -> ScreenId {
        self.identity
    }

    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    pub fn stats(&self) -> TrackerStats {
        self.tracker.stats()
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Consume exactly one packet.
    pub fn pump(&mut self) -> Result<()> {
        self.tracker.pump(&mut self.source)
    }

    /// Consume every pending packet without blocking between packets.
    pub fn drain(&mut self) -> Result<usize> {
        self.tracker.drain(&mut self.source)
    }

    /// Release the underlying device.
    pub fn close(self) {
        debug!("releasing {}", self.identity);
    }
}

fn slot_count<S: TouchSource>(source: &S) -> usize {
    match source.axis_range(Axis::Slot) {
        Ok(AxisCalibration { max, .. }) if max >= MAX_SLOTS as f32 => {
            warn!(
                "{}: reports {} slots, capping at {MAX_SLOTS}",
                source.identity(),
                max as f64 + 1.0
            );
            MAX_SLOTS
        }
        Ok(AxisCalibration { max, .. }) if max >= 0.0 => max as usize + 1,
        _ => DEFAULT_SLOTS,
    }
}

/// Attach every qualifying candidate, or only those whose identity equals
/// `requested`. Everything else is dropped, which releases it.
pub fn select<S, I>(candidates: I, requested: Option<&str>) -> Result<Vec<DeviceContext<S>>>
where
    S: TouchSource,
    I: IntoIterator<Item = S>,
{
    let mut selected = Vec::new();
    for candidate in candidates {
        let identity = candidate.identity().to_string();
        if !candidate.supports_multitouch() {
            debug!("{identity}: no multitouch slot support, released");
            continue;
        }
        if let Some(want) = requested {
            if identity != want {
                debug!("{identity}: not the requested screen '{want}', released");
                continue;
            }
        }
        match DeviceContext::attach(candidate) {
            Ok(dev) => {
                info!(
                    "attached screen '{identity}' ({} slots)",
                    dev.tracker.slot_count()
                );
                selected.push(dev);
            }
            Err(e) => debug!("{e}, released"),
        }
    }

    if requested.is_some() && selected.len() > 1 {
        warn!(
            "{} screens share the requested identity; keeping all in enumeration order",
            selected.len()
        );
    }
    if selected.is_empty() {
        return Err(Error::NoCompatibleDevice);
    }
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::RawEvent;
    use crate::source::ScriptedSource;
    use std::sync::atomic::Ordering;

    fn ids<S: TouchSource>(devs: &[DeviceContext<S>]) -> Vec<String> {
        devs.iter().map(|d| d.identity().to_string()).collect()
    }

    #[test]
    fn selects_all_capable_without_request() {
        let a = ScriptedSource::new("S1");
        let b = ScriptedSource::new("B").without_multitouch();
        let c = ScriptedSource::new("S2");
        let flags = [a.released_flag(), b.released_flag(), c.released_flag()];

        let devs = select(vec![a, b, c], None).unwrap();
        assert_eq!(ids(&devs), ["S1", "S2"]);
        assert!(!flags[0].load(Ordering::SeqCst));
        assert!(flags[1].load(Ordering::SeqCst));
        assert!(!flags[2].load(Ordering::SeqCst));
    }

    #[test]
    fn requested_identity_releases_the_rest() {
        let a = ScriptedSource::new("S1");
        let b = ScriptedSource::new("B").without_multitouch();
        let c = ScriptedSource::new("S2");
        let flags = [a.released_flag(), b.released_flag(), c.released_flag()];

        let devs = select(vec![a, b, c], Some("S2")).unwrap();
        assert_eq!(ids(&devs), ["S2"]);
        assert!(flags[0].load(Ordering::SeqCst));
        assert!(flags[1].load(Ordering::SeqCst));
        assert!(!flags[2].load(Ordering::SeqCst));
    }

    #[test]
    fn duplicate_identities_keep_enumeration_order() {
        let first = ScriptedSource::new("dup").with_slots(2);
        let second = ScriptedSource::new("dup").with_slots(3);
        let devs = select(vec![first, second], Some("dup")).unwrap();
        assert_eq!(devs.len(), 2);
        assert_eq!(devs[0].tracker().slot_count(), 2);
        assert_eq!(devs[1].tracker().slot_count(), 3);
    }

    #[test]
    fn nothing_selected_is_reported() {
        let a = ScriptedSource::new("S1").without_multitouch();
        let flag = a.released_flag();
        let err = select(vec![a], None).unwrap_err();
        assert!(matches!(err, Error::NoCompatibleDevice));
        assert!(flag.load(Ordering::SeqCst));

        let err = select(vec![ScriptedSource::new("S1")], Some("S9")).unwrap_err();
        assert!(matches!(err, Error::NoCompatibleDevice));

        let err = select(Vec::<ScriptedSource>::new(), None).unwrap_err();
        assert!(matches!(err, Error::NoCompatibleDevice));
    }

    #[test]
    fn zero_maximum_is_unsupported() {
        let flat = || {
            ScriptedSource::new("flat").with_range(
                AxisCalibration::new(0.0, 0.0),
                AxisCalibration::new(0.0, 1024.0),
            )
        };
        assert!(matches!(
            DeviceContext::attach(flat()),
            Err(Error::UnsupportedDevice(_))
        ));

        let bad = flat();
        let flag = bad.released_flag();
        assert!(matches!(
            select(vec![bad], None),
            Err(Error::NoCompatibleDevice)
        ));
        assert!(flag.load(Ordering::SeqCst));
    }

    #[test]
    fn attach_starts_inactive_with_captured_calibration() {
        let src = ScriptedSource::new("S1")
            .with_slots(5)
            .with_range(AxisCalibration::new(0.0, 4095.0), AxisCalibration::new(0.0, 2047.0));
        let dev = DeviceContext::attach(src).unwrap();
        assert_eq!(dev.tracker().slot_count(), 5);
        assert!(dev.tracker().slots().iter().all(|s| !s.is_active()));
        let (x, y) = dev.tracker().calibration();
        assert_eq!(x.max, 4095.0);
        assert_eq!(y.max, 2047.0);
    }

    #[test]
    fn bogus_slot_range_is_capped() {
        let dev = DeviceContext::attach(ScriptedSource::new("S1").with_slots(u32::MAX)).unwrap();
        assert_eq!(dev.tracker().slot_count(), MAX_SLOTS);

        let dev = DeviceContext::attach(ScriptedSource::new("S2").with_slots(MAX_SLOTS as u32)).unwrap();
        assert_eq!(dev.tracker().slot_count(), MAX_SLOTS);
    }

    #[test]
    fn rejected_candidate_is_released_before_the_next_is_opened() {
        let a = ScriptedSource::new("A").without_multitouch();
        let b = ScriptedSource::new("B");
        let a_released = a.released_flag();
        let mut a = Some(a);
        let mut b = Some(b);
        let mut seen_at_b = None;

        let candidates = std::iter::from_fn(|| {
            if let Some(a) = a.take() {
                return Some(a);
            }
            seen_at_b = Some(a_released.load(Ordering::SeqCst));
            b.take()
        });
        let devs = select(candidates, None).unwrap();
        assert_eq!(ids(&devs), ["B"]);
        assert_eq!(seen_at_b, Some(true));
    }

    #[test]
    fn close_releases_once() {
        let src = ScriptedSource::new("S1").with_events([RawEvent::tracking_id(1), RawEvent::report()]);
        let flag = src.released_flag();
        let mut dev = DeviceContext::attach(src).unwrap();
        dev.pump().unwrap();
        assert!(!flag.load(Ordering::SeqCst));
        dev.close();
        assert!(flag.load(Ordering::SeqCst));
    }
}
