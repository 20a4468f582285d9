//! Input device discovery & event stream (evdev 0.13.2 compatible)

use std::collections::VecDeque;
use std::fs;
use std::io;
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use evdev::raw_stream::RawDevice;
use evdev::{AbsoluteAxisCode, EventType};
use log::{debug, info, warn};
use serde::Serialize;

use crate::aggregate::TouchMux;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::event::RawEvent;
use crate::select;
use crate::source::{Axis, AxisCalibration, TouchSource};

// sleep between reads while next_event waits on an idle device
const BLOCKING_POLL: Duration = Duration::from_millis(1);

/// An opened `/dev/input/eventN` node.
///
/// Reads go through the unsynchronized stream so `SYN_DROPPED` reaches the
/// tracker as [`EventCode::Dropped`](crate::event::EventCode::Dropped).
pub struct EvdevSource {
    path: PathBuf,
    identity: String,
    device: RawDevice,
    multitouch: bool,
    slot_range: Option<AxisCalibration>,
    x_range: Option<AxisCalibration>,
    y_range: Option<AxisCalibration>,
    pending: VecDeque<RawEvent>,
}

impl EvdevSource {
    pub fn open(path: &Path) -> Result<Self> {
        let open_failed = |source: io::Error| Error::DeviceOpenFailed {
            path: path.display().to_string(),
            source,
        };
        let mut device = RawDevice::open(path).map_err(open_failed)?;
        device.set_nonblocking(true).map_err(open_failed)?;

        let multitouch = supports_mt_events(&device);
        let (mut slot_range, mut x_range, mut y_range) = (None, None, None);
        if multitouch {
            for (code, abs) in device.get_absinfo().map_err(open_failed)? {
                let cal = AxisCalibration::new(abs.minimum() as f32, abs.maximum() as f32);
                match code {
                    AbsoluteAxisCode::ABS_MT_SLOT => slot_range = Some(cal),
                    AbsoluteAxisCode::ABS_MT_POSITION_X => x_range = Some(cal),
                    AbsoluteAxisCode::ABS_MT_POSITION_Y => y_range = Some(cal),
                    _ => {}
                }
            }
        }

        let identity = device_identity(&device, path);
        Ok(Self {
            path: path.to_path_buf(),
            identity,
            device,
            multitouch,
            slot_range,
            x_range,
            y_range,
            pending: VecDeque::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        self.device.name().unwrap_or("unknown")
    }

    /// Move whatever the kernel has buffered into `pending`.
    fn fetch(&mut self) -> io::Result<()> {
        match self.device.fetch_events() {
            Ok(events) => {
                self.pending.extend(
                    events.map(|ev| RawEvent::from_kernel(ev.event_type().0, ev.code(), ev.value())),
                );
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(()),
            Err(e) => Err(e),
        }
    }
}

impl TouchSource for EvdevSource {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn supports_multitouch(&self) -> bool {
        self.multitouch
    }

    fn axis_range(&self, axis: Axis) -> io::Result<AxisCalibration> {
        let range = match axis {
            Axis::Slot => self.slot_range,
            Axis::PositionX => self.x_range,
            Axis::PositionY => self.y_range,
        };
        range.ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::Unsupported,
                format!("{}: no {axis:?} axis", self.path.display()),
            )
        })
    }

    fn has_event_pending(&mut self) -> io::Result<bool> {
        if self.pending.is_empty() {
            self.fetch()?;
        }
        Ok(!self.pending.is_empty())
    }

    fn next_event(&mut self) -> io::Result<RawEvent> {
        loop {
            if let Some(ev) = self.pending.pop_front() {
                return Ok(ev);
            }
            self.fetch()?;
            if self.pending.is_empty() {
                thread::sleep(BLOCKING_POLL);
            }
        }
    }
}

impl std::fmt::Debug for EvdevSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvdevSource")
            .field("path", &self.path)
            .field("identity", &self.identity)
            .field("multitouch", &self.multitouch)
            .finish_non_exhaustive()
    }
}

fn supports_mt_events(dev: &RawDevice) -> bool {
    let has_abs = dev.supported_events().contains(EventType::ABSOLUTE);
    let has_mt = dev.supported_absolute_axes().is_some_and(|a| {
        a.contains(AbsoluteAxisCode::ABS_MT_SLOT)
            && a.contains(AbsoluteAxisCode::ABS_MT_TRACKING_ID)
            && a.contains(AbsoluteAxisCode::ABS_MT_POSITION_X)
            && a.contains(AbsoluteAxisCode::ABS_MT_POSITION_Y)
    });
    has_abs && has_mt
}

// uniq is the stable hardware id but many drivers leave it empty
fn device_identity(dev: &RawDevice, path: &Path) -> String {
    [dev.unique_name(), dev.physical_path(), dev.name()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string())
}

/// Character-special `eventN` nodes under `dir`, ordered by N.
pub fn candidate_paths(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut out: Vec<(u32, PathBuf)> = vec![];
    for e in fs::read_dir(dir)?.flatten() {
        let p = e.path();
        let Some(n) = p
            .file_name()
            .and_then(|s| s.to_str())
            .and_then(|s| s.strip_prefix("event"))
            .and_then(|n| n.parse::<u32>().ok())
        else {
            continue;
        };
        match fs::metadata(&p) {
            Ok(md) if md.file_type().is_char_device() => out.push((n, p)),
            Ok(_) => debug!("{} is not a character device, skipped", p.display()),
            Err(e) => warn!("cannot stat {}: {e}", p.display()),
        }
    }
    out.sort();
    Ok(out.into_iter().map(|(_, p)| p).collect())
}

/// Candidate sources under `dir`, opened one at a time as the iterator is
/// pulled. Nodes that fail to open are logged and skipped.
pub fn discover(dir: &Path) -> Result<impl Iterator<Item = EvdevSource>> {
    let paths = candidate_paths(dir).map_err(|source| Error::DeviceOpenFailed {
        path: dir.display().to_string(),
        source,
    })?;
    Ok(paths.into_iter().filter_map(|p| match EvdevSource::open(&p) {
        Ok(src) => {
            debug!(
                "{}: '{}' multitouch={}",
                p.display(),
                src.name(),
                src.multitouch
            );
            Some(src)
        }
        Err(e) => {
            warn!("{e}");
            None
        }
    }))
}

/// Diagnostic view of one candidate node.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateReport {
    pub path: String,
    pub name: Option<String>,
    pub identity: Option<String>,
    pub multitouch: bool,
    pub error: Option<String>,
}

pub fn inspect(dir: &Path) -> io::Result<Vec<CandidateReport>> {
    let paths = candidate_paths(dir)?;
    Ok(paths
        .into_iter()
        .map(|p| match EvdevSource::open(&p) {
            Ok(src) => CandidateReport {
                path: p.display().to_string(),
                name: Some(src.name().to_string()),
                identity: Some(src.identity.clone()),
                multitouch: src.multitouch,
                error: None,
            },
            Err(e) => CandidateReport {
                path: p.display().to_string(),
                name: None,
                identity: None,
                multitouch: false,
                error: Some(e.to_string()),
            },
        })
        .collect())
}

impl TouchMux<EvdevSource> {
    /// Discover, select and attach screens according to `cfg`.
    pub fn open(cfg: &Config) -> Result<Self> {
        let candidates = discover(&cfg.device_dir)?;
        let devices = select::select(candidates, cfg.screen.as_deref())?;
        info!(
            "{} screen(s) attached, {} external slots",
            devices.len(),
            cfg.capacity
        );
        Ok(TouchMux::from_devices(devices, cfg.capacity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::Tracker;
    use evdev::SynchronizationCode;

    #[test]
    fn candidate_paths_skips_regular_files() {
        let dir = std::env::temp_dir().join(format!("touchmux-input-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("event0"), b"").unwrap();
        fs::write(dir.join("mouse0"), b"").unwrap();

        let found = candidate_paths(&dir).unwrap();
        assert!(found.is_empty());
        assert_eq!(discover(&dir).unwrap().count(), 0);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_dir_is_an_open_failure() {
        let err = discover(Path::new("/nonexistent/touchmux/input")).err();
        assert!(matches!(err, Some(Error::DeviceOpenFailed { .. })));
    }

    #[test]
    fn overrun_marker_reaches_the_tracker() {
        let mut t = Tracker::new(
            4,
            AxisCalibration::new(0.0, 100.0),
            AxisCalibration::new(0.0, 100.0),
        );
        let syn = EventType::SYNCHRONIZATION.0;
        t.apply(RawEvent::from_kernel(syn, SynchronizationCode::SYN_DROPPED.0, 0));
        t.apply(RawEvent::from_kernel(syn, SynchronizationCode::SYN_REPORT.0, 0));
        assert_eq!(t.stats().resyncs, 1);
        assert_eq!(t.stats().packets, 1);
    }
}
