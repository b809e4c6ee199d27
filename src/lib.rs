//! bseat - seat session, hotplug and input plumbing for DRM/KMS hosts
//!
//! ```text
//! libseat ──┐
//! udev    ──┼──▶ SessionManager ──▶ SessionEvents / DeviceEvents
//! libinput ─┘         │                 Keyboard / Mouse facets
//!                     └── DeviceBridge (libinput open/close via the seat)
//! ```
//!
//! Single-threaded. The host waits on `pollable_descriptors()` and calls
//! the matching dispatch method; nothing in here blocks.

pub mod config;
pub mod constants;
pub mod drm;
pub mod error;
pub mod input;
pub mod session;
pub mod signal;

pub use error::{Result, SessionError};
pub use session::{SessionManager, SystemBackends};
