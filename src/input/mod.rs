//! Input handling
//!
//! The input engine reports raw events per physical device; the session
//! keeps a registry of those devices and republishes their events through
//! keyboard and pointer facets.

pub mod device;
pub mod events;
#[cfg(target_os = "linux")]
pub mod libinput;
pub mod translate;

use std::os::unix::io::RawFd;

use crate::error::Result;

pub use device::{DeviceRegistry, InputDevice, Keyboard, KeyboardEvents, Mouse, PointerEvents};
pub use events::{
    AxisEvent, AxisRelativeDirection, AxisSource, ButtonEvent, DeviceCapabilities, DeviceInfo,
    DeviceKey, KeyEvent, MotionEvent, PointerAxis, RawInputEvent, ScrollAxis, ScrollSource, Vec2,
    WarpEvent,
};
#[cfg(target_os = "linux")]
pub use libinput::LibinputContext;
pub use translate::InputRouter;

/// Input engine bound to the session's seat
pub trait InputBackend {
    /// Pollable descriptor
    fn fd(&self) -> RawFd;

    /// Read pending kernel events into the engine's queue
    fn dispatch(&mut self) -> std::io::Result<()>;

    /// Pop the next queued event
    fn next_event(&mut self) -> Option<RawInputEvent>;

    /// Release every device (session disabled)
    fn suspend(&mut self);

    /// Reopen devices after `suspend`
    fn resume(&mut self) -> Result<()>;
}
