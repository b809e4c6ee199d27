//! Device nodes brokered through the seat
//!
//! A `SessionDevice` records the node's device number right after open.
//! Hotplug notifications only carry the device number, and paths can be
//! reused by the time a remove arrives, so correlation goes through it.

use std::cell::{Cell, RefCell};
use std::os::fd::{AsFd, AsRawFd, OwnedFd, RawFd};
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};

use log::{debug, error, trace, warn};
use nix::sys::stat::{fstat, major, minor};

use super::broker::SessionCore;
use crate::signal::Signal;

/// Change notification on a tracked device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceChangeEvent {
    /// Connector hotplug; ids are unset when udev did not report them
    Hotplug {
        connector_id: Option<u32>,
        prop_id: Option<u32>,
    },
    /// DRM lease change
    Lease,
}

/// Per-device signals
#[derive(Debug, Default)]
pub struct DeviceEvents {
    pub change: Signal<DeviceChangeEvent>,
    /// Emitted once, before the device is released
    pub remove: Signal<()>,
}

/// Device node opened via the seat
pub struct SessionDevice {
    /// File descriptor (owned); `None` once released or if open failed
    fd: RefCell<Option<OwnedFd>>,
    /// Seat-side device ID, -1 for a device that failed to open
    device_id: i32,
    /// st_rdev of the node
    devnum: libc::dev_t,
    path: PathBuf,
    /// Duplicate handed to the input engine, matched on close
    lent_fd: Cell<Option<RawFd>>,
    /// Owning session, never upgraded to ownership
    core: Weak<SessionCore>,
    pub events: DeviceEvents,
}

impl SessionDevice {
    /// Open `path` through the seat
    ///
    /// On failure this returns a sentinel whose `is_open()` and
    /// `supports_kms()` are false.
    pub(crate) fn open(core: &Rc<SessionCore>, path: &Path) -> Self {
        let mut device = Self::sentinel(core, path);

        let opened = match core.seat.borrow_mut().open_device(path) {
            Ok(opened) => opened,
            Err(e) => {
                error!("libseat: Couldn't open device at {}: {}", path.display(), e);
                return device;
            }
        };

        match fstat(opened.fd.as_raw_fd()) {
            Ok(stat) => {
                device.devnum = stat.st_rdev;
                device.device_id = opened.device_id;
                *device.fd.get_mut() = Some(opened.fd);
                debug!(
                    "libseat: device {} is {}:{}",
                    path.display(),
                    major(device.devnum),
                    minor(device.devnum)
                );
            }
            Err(e) => {
                error!("libseat: Couldn't stat device at {}: {}", path.display(), e);
                drop(opened.fd);
                if let Err(e) = core.seat.borrow_mut().close_device(opened.device_id) {
                    warn!("libseat: {}", e);
                }
            }
        }

        device
    }

    fn sentinel(core: &Rc<SessionCore>, path: &Path) -> Self {
        Self {
            fd: RefCell::new(None),
            device_id: -1,
            devnum: 0,
            path: path.to_path_buf(),
            lent_fd: Cell::new(None),
            core: Rc::downgrade(core),
            events: DeviceEvents::default(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.device_id >= 0 && self.fd.borrow().is_some()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn device_id(&self) -> i32 {
        self.device_id
    }

    pub fn devnum(&self) -> libc::dev_t {
        self.devnum
    }

    pub fn raw_fd(&self) -> Option<RawFd> {
        self.fd.borrow().as_ref().map(|fd| fd.as_raw_fd())
    }

    /// Duplicate the descriptor, e.g. for the input engine which closes
    /// its copy on its own
    pub fn try_clone_fd(&self) -> std::io::Result<OwnedFd> {
        match self.fd.borrow().as_ref() {
            Some(fd) => fd.try_clone(),
            None => Err(std::io::Error::from_raw_os_error(libc::EBADF)),
        }
    }

    pub(crate) fn lend_fd(&self) -> std::io::Result<OwnedFd> {
        let fd = self.try_clone_fd()?;
        self.lent_fd.set(Some(fd.as_raw_fd()));
        Ok(fd)
    }

    /// True if `fd` is this device's descriptor or the copy lent out
    pub fn matches_fd(&self, fd: RawFd) -> bool {
        self.raw_fd() == Some(fd) || self.lent_fd.get() == Some(fd)
    }

    /// Ask the KMS probe whether this node can do mode-setting
    pub fn supports_kms(&self) -> bool {
        if !self.is_open() {
            return false;
        }
        let Some(core) = self.core.upgrade() else {
            return false;
        };

        let kms = match self.fd.borrow().as_ref() {
            Some(fd) => core.kms.is_kms(fd.as_fd()),
            None => false,
        };

        if kms {
            debug!("libseat: Device {} supports kms", self.path.display());
        } else {
            debug!("libseat: Device {} does not support kms", self.path.display());
        }
        kms
    }

    /// Close the descriptor and hand the device back to the seat. Idempotent.
    pub(crate) fn release(&self) {
        let Some(fd) = self.fd.borrow_mut().take() else {
            return;
        };
        drop(fd);
        self.lent_fd.set(None);

        let Some(core) = self.core.upgrade() else {
            trace!("libseat: seat gone before {}", self.path.display());
            return;
        };
        let Ok(mut seat) = core.seat.try_borrow_mut() else {
            warn!("libseat: seat busy, leaking device id={}", self.device_id);
            return;
        };
        if let Err(e) = seat.close_device(self.device_id) {
            warn!("libseat: {}", e);
        }
    }
}

impl Drop for SessionDevice {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for SessionDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionDevice")
            .field("path", &self.path)
            .field("device_id", &self.device_id)
            .field("devnum", &self.devnum)
            .field("fd", &self.raw_fd())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::mock::MockWorld;

    #[test]
    fn test_open_records_devnum() {
        let world = MockWorld::new();
        let core = world.core();
        let device = SessionDevice::open(&core, Path::new("/dev/null"));

        assert!(device.is_open());
        assert_eq!(device.devnum(), MockWorld::devnum_of("/dev/null"));
        assert!(device.raw_fd().is_some());
    }

    #[test]
    fn test_failed_open_is_sentinel() {
        let world = MockWorld::new();
        let core = world.core();
        let device = SessionDevice::open(&core, Path::new("/nonexistent/card7"));

        assert!(!device.is_open());
        assert_eq!(device.device_id(), -1);
        assert!(!device.supports_kms());
        assert!(device.raw_fd().is_none());
    }

    #[test]
    fn test_supports_kms_follows_probe() {
        let world = MockWorld::new();
        world.mark_kms("/dev/zero");
        let core = world.core();

        let kms = SessionDevice::open(&core, Path::new("/dev/zero"));
        let plain = SessionDevice::open(&core, Path::new("/dev/null"));
        assert!(kms.supports_kms());
        assert!(!plain.supports_kms());
    }

    #[test]
    fn test_release_closes_through_seat_once() {
        let world = MockWorld::new();
        let core = world.core();
        let device = SessionDevice::open(&core, Path::new("/dev/null"));
        let id = device.device_id();

        device.release();
        device.release();
        drop(device);

        assert_eq!(world.state().closed, vec![id]);
    }

    #[test]
    fn test_lent_fd_matches() {
        let world = MockWorld::new();
        let core = world.core();
        let device = SessionDevice::open(&core, Path::new("/dev/null"));

        let lent = device.lend_fd().unwrap();
        assert!(device.matches_fd(lent.as_raw_fd()));
        assert!(device.matches_fd(device.raw_fd().unwrap()));
        assert!(!device.matches_fd(-1));
    }
}
