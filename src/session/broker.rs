//! Seat handle plus the devices opened through it
//!
//! `SessionCore` is shared between the session and the input engine's
//! open/close bridge. Only the session holds a strong reference; the
//! bridge and every `SessionDevice` hold `Weak`s.

use std::cell::RefCell;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::path::Path;
use std::rc::{Rc, Weak};

use log::{debug, trace, warn};

use super::device::SessionDevice;
use super::seat::SeatBackend;
use crate::drm::KmsProbe;

pub(crate) struct SessionCore {
    pub(crate) seat: RefCell<Box<dyn SeatBackend>>,
    pub(crate) devices: RefCell<Vec<Rc<SessionDevice>>>,
    pub(crate) kms: Box<dyn KmsProbe>,
}

impl SessionCore {
    pub(crate) fn new(seat: Box<dyn SeatBackend>, kms: Box<dyn KmsProbe>) -> Rc<Self> {
        Rc::new(Self {
            seat: RefCell::new(seat),
            devices: RefCell::new(Vec::new()),
            kms,
        })
    }

    pub(crate) fn track(&self, device: SessionDevice) -> Rc<SessionDevice> {
        let device = Rc::new(device);
        self.devices.borrow_mut().push(device.clone());
        device
    }

    pub(crate) fn find_by_devnum(&self, devnum: libc::dev_t) -> Option<Rc<SessionDevice>> {
        self.devices
            .borrow()
            .iter()
            .find(|d| d.is_open() && d.devnum() == devnum)
            .cloned()
    }

    pub(crate) fn find_by_path(&self, path: &Path) -> Option<Rc<SessionDevice>> {
        self.devices
            .borrow()
            .iter()
            .find(|d| d.is_open() && d.path() == path)
            .cloned()
    }

    pub(crate) fn snapshot(&self) -> Vec<Rc<SessionDevice>> {
        self.devices.borrow().clone()
    }

    /// Untrack the device owning `fd`, notify its subscribers, then release it
    ///
    /// Returns false (and emits nothing) when no tracked device matches.
    pub(crate) fn close_by_fd(&self, fd: RawFd) -> bool {
        let removed = {
            let mut devices = self.devices.borrow_mut();
            devices
                .iter()
                .position(|d| d.matches_fd(fd))
                .map(|index| devices.remove(index))
        };

        match removed {
            Some(device) => {
                debug!("libseat: closing {} (fd={})", device.path().display(), fd);
                device.events.remove.emit(&());
                device.release();
                true
            }
            None => {
                trace!("libseat: no tracked device for fd={}", fd);
                false
            }
        }
    }

    /// Release every tracked device, each notified before release
    pub(crate) fn release_all(&self) {
        let devices = std::mem::take(&mut *self.devices.borrow_mut());
        for device in devices {
            device.events.remove.emit(&());
            device.release();
        }
    }
}

/// Open/close bridge handed to the input engine
///
/// The engine never opens nodes itself; it asks the bridge, which brokers
/// the request through the seat and tracks the result as a `SessionDevice`.
pub struct DeviceBridge {
    core: Weak<SessionCore>,
}

impl DeviceBridge {
    pub(crate) fn new(core: &Rc<SessionCore>) -> Self {
        Self {
            core: Rc::downgrade(core),
        }
    }

    /// Open `path` through the seat
    ///
    /// Errors are negative errno values, as the input engine expects.
    pub fn open_restricted(&mut self, path: &Path) -> Result<OwnedFd, i32> {
        let Some(core) = self.core.upgrade() else {
            warn!("libseat: open of {} after session teardown", path.display());
            return Err(-libc::ENODEV);
        };

        let device = SessionDevice::open(&core, path);
        if !device.is_open() {
            return Err(-libc::EACCES);
        }

        let fd = device.lend_fd().map_err(|e| {
            warn!("libseat: Cannot dup fd for {}: {}", path.display(), e);
            -e.raw_os_error().unwrap_or(libc::EIO)
        })?;

        core.track(device);
        Ok(fd)
    }

    /// Close the device behind `fd`; unknown descriptors are a no-op
    pub fn close_restricted(&mut self, fd: OwnedFd) {
        if let Some(core) = self.core.upgrade() {
            core.close_by_fd(fd.as_raw_fd());
        }
        drop(fd);
    }
}
