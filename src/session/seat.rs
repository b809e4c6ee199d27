//! Seat arbiter interface
//!
//! The session never opens device nodes on its own: every open/close goes
//! through a `SeatBackend`, which owns exclusive access to the seat.

use std::os::fd::{OwnedFd, RawFd};
use std::path::Path;

use crate::error::Result;

/// Notification delivered by the seat arbiter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeatNotification {
    /// Session enabled (VT acquired)
    Enable,
    /// Session disabled (VT released); must be acknowledged
    Disable,
}

/// Device node opened through the seat
#[derive(Debug)]
pub struct OpenedDevice {
    /// Seat-side device ID, passed back on close
    pub device_id: i32,
    /// File descriptor (owned)
    pub fd: OwnedFd,
}

pub trait SeatBackend {
    /// Seat name, used to bind the input engine to the same seat
    fn name(&self) -> &str;

    /// Pollable descriptor for event loop integration
    fn fd(&self) -> RawFd;

    /// Dispatch pending seat events without blocking and return them in order
    fn dispatch(&mut self) -> Result<Vec<SeatNotification>>;

    /// Open a device node with seat-level permission and exclusivity
    fn open_device(&mut self, path: &Path) -> Result<OpenedDevice>;

    fn close_device(&mut self, device_id: i32) -> Result<()>;

    /// Acknowledge a `Disable` notification
    fn acknowledge_disable(&mut self) -> Result<()>;

    /// Request a VT switch; the effect arrives later as Disable/Enable
    fn switch_session(&mut self, session: i32) -> Result<()>;
}
