//! Session lifecycle and dispatch
//!
//! The manager never waits. The host polls the descriptors from
//! `pollable_descriptors()` and calls the matching dispatch method, which
//! drains what is queued and publishes it synchronously.

use log::{debug, error, info, trace, warn};
use std::os::unix::io::RawFd;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use super::backends::Backends;
use super::broker::{DeviceBridge, SessionCore};
use super::device::SessionDevice;
use super::seat::SeatNotification;
use crate::config::SessionConfig;
use crate::drm::{classify, CardEvent, CardFilter, HotplugSource};
use crate::error::{Result, SessionError};
use crate::input::{InputBackend, InputDevice, InputRouter, Keyboard, Mouse};
use crate::signal::Signal;

/// A new card node appeared; the host opens and integrates it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddDrmCardEvent {
    pub path: PathBuf,
}

/// Session-wide signals
#[derive(Debug, Default)]
pub struct SessionEvents {
    /// New active state, once per enable/disable notification
    pub change_active: Signal<bool>,
    pub new_keyboard: Signal<Rc<Keyboard>>,
    pub new_pointer: Signal<Rc<Mouse>>,
    pub add_drm_card: Signal<AddDrmCardEvent>,
}

pub struct SessionManager {
    filter: CardFilter,
    // Dropped in declaration order: input engine, hotplug monitor, seat
    input: Option<Box<dyn InputBackend>>,
    hotplug: Option<Box<dyn HotplugSource>>,
    core: Option<Rc<SessionCore>>,
    router: InputRouter,
    seat_name: String,
    active: bool,
    ready: bool,
    pub events: SessionEvents,
}

impl SessionManager {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            filter: CardFilter {
                subsystem: config.hotplug_subsystem.clone(),
                card_prefix: config.card_prefix.clone(),
            },
            input: None,
            hotplug: None,
            core: None,
            router: InputRouter::new(),
            seat_name: String::new(),
            active: false,
            ready: false,
            events: SessionEvents::default(),
        }
    }

    /// Acquire seat, hotplug monitor and input engine, in that order
    ///
    /// Any failure is logged, everything acquired so far is released and
    /// the manager stays un-bootstrapped; the caller may retry the call.
    pub fn bootstrap<B: Backends + ?Sized>(&mut self, backends: &mut B) -> Result<()> {
        if self.is_bootstrapped() {
            warn!("Session already bootstrapped");
            return Ok(());
        }

        let result = self.acquire(backends);
        if result.is_err() {
            self.teardown();
        }
        result
    }

    fn acquire<B: Backends + ?Sized>(&mut self, backends: &mut B) -> Result<()> {
        let seat = backends.open_seat().map_err(|e| {
            error!("libseat: Unable to create seat: {}", e);
            e
        })?;
        self.seat_name = seat.name().to_string();
        self.core = Some(SessionCore::new(seat, backends.kms_probe()));

        // Anything the seat queued while opening (usually Enable)
        self.dispatch_seat();

        let hotplug = backends
            .open_hotplug(&self.filter.subsystem)
            .map_err(|e| {
                error!("udev: Unable to create hotplug monitor: {}", e);
                e
            })?;
        self.hotplug = Some(hotplug);

        let core = self.core.as_ref().ok_or(SessionError::NotBootstrapped)?;
        let input = backends
            .open_input(&self.seat_name, DeviceBridge::new(core))
            .map_err(|e| {
                error!("libinput: Unable to create input context: {}", e);
                e
            })?;
        self.input = Some(input);

        info!("Session bootstrapped on seat {}", self.seat_name);
        Ok(())
    }

    /// Release devices, then the input engine, hotplug monitor and seat
    ///
    /// Emits `change_active(false)` if the session was active. Subscribers
    /// stay attached, so a later bootstrap reports to the same listeners.
    pub fn teardown(&mut self) {
        let Some(core) = self.core.take() else {
            return;
        };
        debug!("Tearing down session on seat {}", self.seat_name);

        core.release_all();
        self.input = None;
        self.hotplug = None;
        drop(core);

        self.router.clear();
        self.ready = false;
        self.seat_name.clear();
        if std::mem::replace(&mut self.active, false) {
            self.events.change_active.emit(&false);
        }
    }

    pub fn is_bootstrapped(&self) -> bool {
        self.core.is_some() && self.hotplug.is_some() && self.input.is_some()
    }

    /// Seat, hotplug and input descriptors; empty before bootstrap
    pub fn pollable_descriptors(&self) -> Vec<RawFd> {
        match (&self.core, &self.hotplug, &self.input) {
            (Some(core), Some(hotplug), Some(input)) => {
                vec![core.seat.borrow().fd(), hotplug.fd(), input.fd()]
            }
            _ => Vec::new(),
        }
    }

    /// Drain seat, then hotplug, then input. Returns the items processed.
    pub fn dispatch_pending(&mut self) -> usize {
        self.dispatch_seat() + self.dispatch_hotplug() + self.dispatch_input()
    }

    pub fn dispatch_seat(&mut self) -> usize {
        let Some(core) = self.core.as_ref() else {
            return 0;
        };
        let notifications = match core.seat.borrow_mut().dispatch() {
            Ok(notifications) => notifications,
            Err(e) => {
                error!("libseat: Failed to dispatch: {}", e);
                return 0;
            }
        };

        let count = notifications.len();
        for notification in notifications {
            self.apply_seat_notification(notification);
        }
        count
    }

    fn apply_seat_notification(&mut self, notification: SeatNotification) {
        match notification {
            SeatNotification::Enable => {
                info!("libseat: Session enabled");
                self.active = true;
                if let Some(input) = self.input.as_mut() {
                    if let Err(e) = input.resume() {
                        error!("libinput: {}", e);
                    }
                }
                self.events.change_active.emit(&true);
            }
            SeatNotification::Disable => {
                info!("libseat: Session disabled");
                self.active = false;
                if let Some(input) = self.input.as_mut() {
                    input.suspend();
                }
                self.events.change_active.emit(&false);

                if let Some(core) = self.core.as_ref() {
                    if let Err(e) = core.seat.borrow_mut().acknowledge_disable() {
                        error!("libseat: {}", e);
                    }
                }
            }
        }
    }

    pub fn dispatch_hotplug(&mut self) -> usize {
        let (Some(hotplug), Some(core)) = (self.hotplug.as_mut(), self.core.as_ref()) else {
            return 0;
        };

        let notifications = hotplug.drain();
        for notification in &notifications {
            debug!(
                "udev: new udev {} event for {}",
                notification.action.as_deref().unwrap_or("?"),
                notification.sysname.as_deref().unwrap_or("?")
            );

            match classify(notification, &self.filter) {
                Some(CardEvent::Added { path }) => {
                    self.events.add_drm_card.emit(&AddDrmCardEvent { path });
                }
                Some(CardEvent::Changed { devnum, change }) => {
                    let Some(device) = core.find_by_devnum(devnum) else {
                        trace!("udev: change for untracked device");
                        continue;
                    };
                    match change {
                        Some(change) => device.events.change.emit(&change),
                        None => debug!("udev: change event unrecognized"),
                    }
                }
                Some(CardEvent::Removed { devnum }) => {
                    if let Some(device) = core.find_by_devnum(devnum) {
                        debug!("udev: {} removed", device.path().display());
                        device.events.remove.emit(&());
                    }
                }
                None => {}
            }
        }
        notifications.len()
    }

    pub fn dispatch_input(&mut self) -> usize {
        let Some(input) = self.input.as_mut() else {
            return 0;
        };
        if let Err(e) = input.dispatch() {
            error!("libinput: Failed to dispatch libinput: {}", e);
            return 0;
        }

        let mut count = 0;
        while let Some(event) = input.next_event() {
            self.router.handle(event, self.ready, &self.events);
            count += 1;
        }
        count
    }

    /// Request a VT switch; the result arrives as Disable/Enable
    pub fn switch_session(&mut self, target: u32) -> Result<()> {
        let core = self.core.as_ref().ok_or(SessionError::NotBootstrapped)?;
        let target = i32::try_from(target)
            .map_err(|_| SessionError::Seat(format!("invalid session {}", target)))?;
        debug!("libseat: switching to session {}", target);
        core.seat.borrow_mut().switch_session(target)
    }

    /// Publish discovery events for devices found so far
    ///
    /// Devices found afterwards are announced as they appear. Only the
    /// first call replays.
    pub fn announce_ready(&mut self) {
        if self.ready {
            return;
        }
        self.ready = true;
        self.router.announce_all(&self.events);
    }

    /// Open `path` and keep it only if it can do mode-setting
    ///
    /// A path that is already tracked returns the existing device.
    pub fn open_if_kms(&mut self, path: &Path) -> Option<Rc<SessionDevice>> {
        let core = self.core.as_ref()?;
        if let Some(device) = core.find_by_path(path) {
            debug!("{} already open", path.display());
            return Some(device);
        }
        let device = SessionDevice::open(core, path);
        if !device.supports_kms() {
            debug!("Ignoring non-KMS device {}", path.display());
            return None;
        }
        Some(core.track(device))
    }

    /// Close the tracked device owning `fd`; false if none matches
    pub fn close_device_fd(&mut self, fd: RawFd) -> bool {
        match self.core.as_ref() {
            Some(core) => core.close_by_fd(fd),
            None => false,
        }
    }

    pub fn devices(&self) -> Vec<Rc<SessionDevice>> {
        self.core
            .as_ref()
            .map(|core| core.snapshot())
            .unwrap_or_default()
    }

    pub fn input_devices(&self) -> Vec<Rc<InputDevice>> {
        self.router.registry().iter().cloned().collect()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn seat_name(&self) -> &str {
        &self.seat_name
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.teardown();
    }
}
