//! Collaborator factory used by bootstrap
//!
//! `SessionManager::bootstrap` acquires seat, hotplug monitor and input
//! engine in that order through a `Backends` implementation.

use super::broker::DeviceBridge;
use super::seat::SeatBackend;
use crate::drm::{DrmKmsProbe, HotplugSource, KmsProbe};
use crate::error::Result;
use crate::input::InputBackend;

pub trait Backends {
    fn open_seat(&mut self) -> Result<Box<dyn SeatBackend>>;

    /// Hotplug monitor filtered to `subsystem`
    fn open_hotplug(&mut self, subsystem: &str) -> Result<Box<dyn HotplugSource>>;

    /// Input engine bound to `seat_name`, opening nodes through `bridge`
    fn open_input(&mut self, seat_name: &str, bridge: DeviceBridge)
        -> Result<Box<dyn InputBackend>>;

    fn kms_probe(&self) -> Box<dyn KmsProbe>;
}

/// libseat + udev + libinput + DRM ioctls
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBackends;

impl Backends for SystemBackends {
    #[cfg(all(target_os = "linux", feature = "seatd"))]
    fn open_seat(&mut self) -> Result<Box<dyn SeatBackend>> {
        Ok(Box::new(super::seatd::LibseatBackend::open()?))
    }

    #[cfg(not(all(target_os = "linux", feature = "seatd")))]
    fn open_seat(&mut self) -> Result<Box<dyn SeatBackend>> {
        Err(crate::error::SessionError::Unsupported(
            "built without the seatd feature",
        ))
    }

    #[cfg(target_os = "linux")]
    fn open_hotplug(&mut self, subsystem: &str) -> Result<Box<dyn HotplugSource>> {
        Ok(Box::new(crate::drm::UdevMonitor::new(subsystem)?))
    }

    #[cfg(not(target_os = "linux"))]
    fn open_hotplug(&mut self, _subsystem: &str) -> Result<Box<dyn HotplugSource>> {
        Err(crate::error::SessionError::Unsupported("udev is linux-only"))
    }

    #[cfg(target_os = "linux")]
    fn open_input(
        &mut self,
        seat_name: &str,
        bridge: DeviceBridge,
    ) -> Result<Box<dyn InputBackend>> {
        Ok(Box::new(crate::input::LibinputContext::new(seat_name, bridge)?))
    }

    #[cfg(not(target_os = "linux"))]
    fn open_input(
        &mut self,
        _seat_name: &str,
        _bridge: DeviceBridge,
    ) -> Result<Box<dyn InputBackend>> {
        Err(crate::error::SessionError::Unsupported("libinput is linux-only"))
    }

    fn kms_probe(&self) -> Box<dyn KmsProbe> {
        Box::new(DrmKmsProbe)
    }
}
