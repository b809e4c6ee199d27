//! Scripted collaborators for tests
//!
//! Device nodes are opened for real (`/dev/null`, `/dev/zero`) so device
//! numbers and descriptor matching behave as on a live seat. Everything
//! else is driven from `MockState`.

use std::cell::{Ref, RefCell, RefMut};
use std::collections::VecDeque;
use std::os::fd::{AsRawFd, BorrowedFd, OwnedFd, RawFd};
use std::path::Path;
use std::rc::Rc;

use super::backends::Backends;
use super::broker::{DeviceBridge, SessionCore};
use super::seat::{OpenedDevice, SeatBackend, SeatNotification};
use crate::drm::{HotplugNotification, HotplugSource, KmsProbe};
use crate::error::{Result, SessionError};
use crate::input::{InputBackend, RawInputEvent};

#[derive(Default)]
pub(crate) struct MockState {
    pub seat_queue: VecDeque<SeatNotification>,
    pub hotplug_queue: Vec<HotplugNotification>,
    pub input_queue: VecDeque<RawInputEvent>,
    /// Collaborator calls, in order
    pub calls: Vec<&'static str>,
    pub closed: Vec<i32>,
    pub switched: Vec<i32>,
    pub disable_acks: usize,
    pub suspends: usize,
    pub resumes: usize,
    pub fail_seat: bool,
    pub fail_seat_dispatch: bool,
    pub fail_hotplug: bool,
    pub fail_input: bool,
    pub fail_input_dispatch: bool,
    /// Device numbers the KMS probe accepts
    pub kms: Vec<libc::dev_t>,
    pub bridge: Option<DeviceBridge>,
    next_device_id: i32,
}

type Shared = Rc<RefCell<MockState>>;

#[derive(Clone, Default)]
pub(crate) struct MockWorld {
    state: Shared,
}

impl MockWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> Ref<'_, MockState> {
        self.state.borrow()
    }

    pub fn state_mut(&self) -> RefMut<'_, MockState> {
        self.state.borrow_mut()
    }

    /// Fresh session core over a mock seat; the world keeps no reference
    pub fn core(&self) -> Rc<SessionCore> {
        SessionCore::new(
            Box::new(MockSeat {
                state: self.state.clone(),
            }),
            Box::new(MockKms {
                state: self.state.clone(),
            }),
        )
    }

    pub fn backends(&self) -> MockBackends {
        MockBackends {
            state: self.state.clone(),
        }
    }

    pub fn devnum_of(path: &str) -> libc::dev_t {
        nix::sys::stat::stat(path).map(|s| s.st_rdev).unwrap_or(0)
    }

    pub fn mark_kms(&self, path: &str) {
        self.state_mut().kms.push(Self::devnum_of(path));
    }

    pub fn push_seat(&self, notification: SeatNotification) {
        self.state_mut().seat_queue.push_back(notification);
    }

    pub fn push_hotplug(&self, notification: HotplugNotification) {
        self.state_mut().hotplug_queue.push(notification);
    }

    pub fn push_input(&self, event: RawInputEvent) {
        self.state_mut().input_queue.push_back(event);
    }

    /// The bridge handed to the last input engine opened
    pub fn take_bridge(&self) -> DeviceBridge {
        self.state_mut()
            .bridge
            .take()
            .expect("no input engine was opened")
    }
}

pub(crate) struct MockBackends {
    state: Shared,
}

impl Backends for MockBackends {
    fn open_seat(&mut self) -> Result<Box<dyn SeatBackend>> {
        let mut state = self.state.borrow_mut();
        state.calls.push("open_seat");
        if state.fail_seat {
            return Err(SessionError::Seat("no seat daemon".into()));
        }
        Ok(Box::new(MockSeat {
            state: self.state.clone(),
        }))
    }

    fn open_hotplug(&mut self, _subsystem: &str) -> Result<Box<dyn HotplugSource>> {
        let mut state = self.state.borrow_mut();
        state.calls.push("open_hotplug");
        if state.fail_hotplug {
            return Err(SessionError::Hotplug("netlink unavailable".into()));
        }
        Ok(Box::new(MockHotplug {
            state: self.state.clone(),
        }))
    }

    fn open_input(
        &mut self,
        _seat_name: &str,
        bridge: DeviceBridge,
    ) -> Result<Box<dyn InputBackend>> {
        let mut state = self.state.borrow_mut();
        state.calls.push("open_input");
        if state.fail_input {
            return Err(SessionError::Input("failed to assign seat".into()));
        }
        state.bridge = Some(bridge);
        Ok(Box::new(MockInput {
            state: self.state.clone(),
        }))
    }

    fn kms_probe(&self) -> Box<dyn KmsProbe> {
        Box::new(MockKms {
            state: self.state.clone(),
        })
    }
}

struct MockSeat {
    state: Shared,
}

impl SeatBackend for MockSeat {
    fn name(&self) -> &str {
        "seat0"
    }

    fn fd(&self) -> RawFd {
        10
    }

    fn dispatch(&mut self) -> Result<Vec<SeatNotification>> {
        let mut state = self.state.borrow_mut();
        state.calls.push("seat:dispatch");
        if state.fail_seat_dispatch {
            return Err(SessionError::Seat("dispatch failed".into()));
        }
        Ok(state.seat_queue.drain(..).collect())
    }

    fn open_device(&mut self, path: &Path) -> Result<OpenedDevice> {
        let file = std::fs::File::open(path).map_err(|e| SessionError::device(path, e))?;
        let mut state = self.state.borrow_mut();
        state.next_device_id += 1;
        Ok(OpenedDevice {
            device_id: state.next_device_id,
            fd: OwnedFd::from(file),
        })
    }

    fn close_device(&mut self, device_id: i32) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.calls.push("seat:close_device");
        state.closed.push(device_id);
        Ok(())
    }

    fn acknowledge_disable(&mut self) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.calls.push("seat:ack");
        state.disable_acks += 1;
        Ok(())
    }

    fn switch_session(&mut self, session: i32) -> Result<()> {
        self.state.borrow_mut().switched.push(session);
        Ok(())
    }
}

impl Drop for MockSeat {
    fn drop(&mut self) {
        self.state.borrow_mut().calls.push("seat:drop");
    }
}

struct MockHotplug {
    state: Shared,
}

impl HotplugSource for MockHotplug {
    fn fd(&self) -> RawFd {
        11
    }

    fn drain(&mut self) -> Vec<HotplugNotification> {
        let mut state = self.state.borrow_mut();
        state.calls.push("hotplug:drain");
        std::mem::take(&mut state.hotplug_queue)
    }
}

impl Drop for MockHotplug {
    fn drop(&mut self) {
        self.state.borrow_mut().calls.push("hotplug:drop");
    }
}

struct MockInput {
    state: Shared,
}

impl InputBackend for MockInput {
    fn fd(&self) -> RawFd {
        12
    }

    fn dispatch(&mut self) -> std::io::Result<()> {
        let mut state = self.state.borrow_mut();
        state.calls.push("input:dispatch");
        if state.fail_input_dispatch {
            return Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                "libinput dispatch failed",
            ));
        }
        Ok(())
    }

    fn next_event(&mut self) -> Option<RawInputEvent> {
        self.state.borrow_mut().input_queue.pop_front()
    }

    fn suspend(&mut self) {
        let mut state = self.state.borrow_mut();
        state.calls.push("input:suspend");
        state.suspends += 1;
    }

    fn resume(&mut self) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.calls.push("input:resume");
        state.resumes += 1;
        Ok(())
    }
}

impl Drop for MockInput {
    fn drop(&mut self) {
        self.state.borrow_mut().calls.push("input:drop");
    }
}

struct MockKms {
    state: Shared,
}

impl KmsProbe for MockKms {
    fn is_kms(&self, fd: BorrowedFd<'_>) -> bool {
        match nix::sys::stat::fstat(fd.as_raw_fd()) {
            Ok(stat) => self.state.borrow().kms.contains(&stat.st_rdev),
            Err(_) => false,
        }
    }
}
