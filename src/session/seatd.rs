//! libseat session backend
//!
//! Provides rootless DRM/input access via seatd or logind.

use std::collections::HashMap;
use std::os::fd::{AsFd, AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::path::Path;
use std::sync::mpsc;

use libseat::{Seat, SeatEvent, SeatRef};
use log::{debug, info, trace, warn};

use super::seat::{OpenedDevice, SeatBackend, SeatNotification};
use crate::error::{Result, SessionError};

/// libseat session handle
///
/// libseat keeps its log handler process-wide, so a process should hold
/// one of these at a time.
pub struct LibseatBackend {
    /// libseat handle
    seat: Seat,
    /// Seat name, read once at open
    name: String,
    /// Pollable fd, stable for the seat's lifetime
    fd: RawFd,
    /// Notifications queued by the libseat callback
    event_rx: mpsc::Receiver<SeatNotification>,
    /// Opened devices (device_id -> libseat device)
    devices: HashMap<i32, libseat::Device>,
    /// Device ID counter
    next_device_id: i32,
}

impl LibseatBackend {
    /// Open a new seat session
    pub fn open() -> Result<Self> {
        let (event_tx, event_rx) = mpsc::channel();

        // The callback only queues; acknowledging Disable is left to the
        // session so input is suspended first.
        let mut seat = Seat::open(move |_seat_ref: &mut SeatRef, event: SeatEvent| {
            let notification = match event {
                SeatEvent::Enable => SeatNotification::Enable,
                SeatEvent::Disable => SeatNotification::Disable,
            };
            trace!("libseat: queued {:?}", notification);
            let _ = event_tx.send(notification);
        })
        .map_err(|e| SessionError::Seat(format!("failed to open a seat: {}", e)))?;

        let name = seat.name().to_string();
        if name.is_empty() {
            return Err(SessionError::Seat("failed to get seat name".into()));
        }

        let fd = seat
            .get_fd()
            .map_err(|e| SessionError::Seat(format!("failed to get seat fd: {}", e)))?
            .as_raw_fd();

        info!("libseat: opened seat '{}'", name);

        Ok(Self {
            seat,
            name,
            fd,
            event_rx,
            devices: HashMap::new(),
            next_device_id: 1,
        })
    }
}

impl SeatBackend for LibseatBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn fd(&self) -> RawFd {
        self.fd
    }

    fn dispatch(&mut self) -> Result<Vec<SeatNotification>> {
        self.seat
            .dispatch(0)
            .map_err(|e| SessionError::Seat(format!("failed to dispatch seat events: {}", e)))?;
        Ok(self.event_rx.try_iter().collect())
    }

    fn open_device(&mut self, path: &Path) -> Result<OpenedDevice> {
        let device = self
            .seat
            .open_device(&path)
            .map_err(|e| SessionError::device(path, e))?;

        let device_id = self.next_device_id;
        self.next_device_id += 1;
        let raw_fd = device.as_fd().as_raw_fd();

        debug!(
            "libseat: opened device {} (id={}, fd={})",
            path.display(),
            device_id,
            raw_fd
        );

        // libseat manages its own fd lifecycle, we dup it for the session
        let dup_fd = match nix::unistd::dup(raw_fd) {
            Ok(fd) => fd,
            Err(e) => {
                if let Err(close_err) = self.seat.close_device(device) {
                    warn!("libseat: failed to close device {}: {}", path.display(), close_err);
                }
                return Err(SessionError::device(path, format!("failed to dup fd: {}", e)));
            }
        };
        let owned_fd = unsafe { OwnedFd::from_raw_fd(dup_fd) };

        self.devices.insert(device_id, device);

        Ok(OpenedDevice {
            device_id,
            fd: owned_fd,
        })
    }

    fn close_device(&mut self, device_id: i32) -> Result<()> {
        let Some(device) = self.devices.remove(&device_id) else {
            trace!("libseat: close for unknown device id={}", device_id);
            return Ok(());
        };

        self.seat
            .close_device(device)
            .map_err(|e| SessionError::Seat(format!("failed to close device id={}: {}", device_id, e)))?;

        trace!("libseat: closed device id={}", device_id);
        Ok(())
    }

    fn acknowledge_disable(&mut self) -> Result<()> {
        self.seat
            .disable()
            .map_err(|e| SessionError::Seat(format!("failed to disable seat: {}", e)))
    }

    fn switch_session(&mut self, session: i32) -> Result<()> {
        self.seat
            .switch_session(session)
            .map_err(|e| SessionError::Seat(format!("failed to switch to session {}: {}", session, e)))
    }
}

impl Drop for LibseatBackend {
    fn drop(&mut self) {
        info!("libseat: closing session");
        for (id, device) in self.devices.drain() {
            if let Err(e) = self.seat.close_device(device) {
                warn!("libseat: failed to close device id={}: {}", id, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Note: These tests require seatd or logind to be running
    // and the user to have appropriate permissions.
    // Skip in CI environment.

    #[test]
    #[ignore]
    fn test_open_session() {
        let session = LibseatBackend::open();
        assert!(session.is_ok(), "Failed to open seat session");
    }

    #[test]
    #[ignore]
    fn test_seat_has_name_and_fd() {
        let session = LibseatBackend::open().unwrap();
        assert!(!session.name().is_empty());
        assert!(session.fd() >= 0);
    }
}
