//! Unified multitouch feed over one or more evdev touchscreens.
//!
//! Each screen's raw slot protocol is decoded into a per-screen touch table
//! ([`tracker`]); the tables of all attached screens are then merged into a
//! fixed-capacity frame where every screen owns a disjoint range of slots
//! ([`aggregate`]).
//!
//! ```no_run
//! use touchmux::{Config, TouchMux};
//!
//! let mut mux = TouchMux::open(&Config::default())?;
//! let frame = mux.update()?;
//! for (slot, p) in frame.active() {
//!     println!("[{slot}] {} {:?} {:.2} {:.2}", p.screen, p.tracking_id, p.x, p.y);
//! }
//! mux.close();
//! # Ok::<(), touchmux::Error>(())
//! ```

pub mod aggregate;
pub mod config;
pub mod error;
pub mod event;
pub mod input;
pub mod screen;
pub mod select;
pub mod source;
pub mod tracker;

pub use aggregate::{Frame, TouchMux, TouchPoint};
pub use config::Config;
pub use error::{Error, Result};
pub use screen::{ScreenId, ScreenList};
