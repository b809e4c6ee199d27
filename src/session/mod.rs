//! Seat session management
//!
//! The seat arbiter (libseat, via seatd or logind) hands out device nodes
//! and activate/deactivate notifications. `SessionManager` ties it to the
//! DRM hotplug monitor and the input engine.

mod backends;
mod broker;
mod device;
mod manager;
mod seat;
#[cfg(all(target_os = "linux", feature = "seatd"))]
mod seatd;

#[cfg(test)]
pub(crate) mod mock;

pub use backends::{Backends, SystemBackends};
pub use broker::DeviceBridge;
pub use device::{DeviceChangeEvent, DeviceEvents, SessionDevice};
pub use manager::{AddDrmCardEvent, SessionEvents, SessionManager};
pub use seat::{OpenedDevice, SeatBackend, SeatNotification};
#[cfg(all(target_os = "linux", feature = "seatd"))]
pub use seatd::LibseatBackend;
