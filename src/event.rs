//! Raw kernel input events, reduced to what the slot protocol needs.

use evdev::{AbsoluteAxisCode, EventType, SynchronizationCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventDomain {
    Absolute,
    Sync,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventCode {
    Slot,
    TrackingId,
    PositionX,
    PositionY,
    /// End of packet.
    Report,
    /// The kernel buffer overflowed and events were lost.
    Dropped,
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEvent {
    pub domain: EventDomain,
    pub code: EventCode,
    pub value: i32,
}

impl RawEvent {
    pub fn new(domain: EventDomain, code: EventCode, value: i32) -> Self {
        Self {
            domain,
            code,
            value,
        }
    }

    pub fn slot(slot: i32) -> Self {
        Self::new(EventDomain::Absolute, EventCode::Slot, slot)
    }

    pub fn tracking_id(id: i32) -> Self {
        Self::new(EventDomain::Absolute, EventCode::TrackingId, id)
    }

    pub fn position_x(x: i32) -> Self {
        Self::new(EventDomain::Absolute, EventCode::PositionX, x)
    }

    pub fn position_y(y: i32) -> Self {
        Self::new(EventDomain::Absolute, EventCode::PositionY, y)
    }

    pub fn report() -> Self {
        Self::new(EventDomain::Sync, EventCode::Report, 0)
    }

    pub fn dropped() -> Self {
        Self::new(EventDomain::Sync, EventCode::Dropped, 0)
    }

    /// Classify a `(type, code, value)` triple as read from an evdev node.
    ///
    /// Codes are only meaningful inside their event type, so e.g. a key
    /// event whose code happens to equal `ABS_MT_SLOT` is `Ignored`.
    pub fn from_kernel(event_type: u16, code: u16, value: i32) -> Self {
        if event_type == EventType::ABSOLUTE.0 {
            let code = match code {
                c if c == AbsoluteAxisCode::ABS_MT_SLOT.0 => EventCode::Slot,
                c if c == AbsoluteAxisCode::ABS_MT_TRACKING_ID.0 => EventCode::TrackingId,
                c if c == AbsoluteAxisCode::ABS_MT_POSITION_X.0 => EventCode::PositionX,
                c if c == AbsoluteAxisCode::ABS_MT_POSITION_Y.0 => EventCode::PositionY,
                _ => EventCode::Ignored,
            };
            Self::new(EventDomain::Absolute, code, value)
        } else if event_type == EventType::SYNCHRONIZATION.0 {
            let code = match code {
                c if c == SynchronizationCode::SYN_REPORT.0 => EventCode::Report,
                c if c == SynchronizationCode::SYN_DROPPED.0 => EventCode::Dropped,
                _ => EventCode::Ignored,
            };
            Self::new(EventDomain::Sync, code, value)
        } else {
            Self::new(EventDomain::Other, EventCode::Ignored, value)
        }
    }

    pub fn ends_packet(&self) -> bool {
        self.code == EventCode::Report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_mt_axes() {
        let ev = RawEvent::from_kernel(0x03, 0x2f, 4);
        assert_eq!(ev, RawEvent::slot(4));
        assert_eq!(RawEvent::from_kernel(0x03, 0x39, -1), RawEvent::tracking_id(-1));
        assert_eq!(RawEvent::from_kernel(0x03, 0x35, 100).code, EventCode::PositionX);
        assert_eq!(RawEvent::from_kernel(0x03, 0x36, 100).code, EventCode::PositionY);
        // ABS_PRESSURE is not part of the slot protocol we track
        assert_eq!(RawEvent::from_kernel(0x03, 0x18, 30).code, EventCode::Ignored);
    }

    #[test]
    fn classifies_sync_markers() {
        assert!(RawEvent::from_kernel(0x00, 0x00, 0).ends_packet());
        assert_eq!(RawEvent::from_kernel(0x00, 0x03, 0).code, EventCode::Dropped);
        assert_eq!(RawEvent::from_kernel(0x00, 0x02, 0).code, EventCode::Ignored);
    }

    #[test]
    fn codes_are_scoped_to_their_type() {
        // EV_KEY with a code numerically equal to ABS_MT_SLOT
        let ev = RawEvent::from_kernel(0x01, 0x2f, 1);
        assert_eq!(ev.domain, EventDomain::Other);
        assert_eq!(ev.code, EventCode::Ignored);
        // EV_KEY code 0 must not be read as SYN_REPORT
        assert!(!RawEvent::from_kernel(0x01, 0x00, 1).ends_packet());
    }
}
