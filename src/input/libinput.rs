//! libinput backend
//!
//! Binds a udev-backed libinput context to the session's seat. Device
//! nodes are opened through the session's `DeviceBridge`, never directly.

use input::event::device::DeviceEvent;
use input::event::keyboard::{KeyState, KeyboardEventTrait};
use input::event::pointer::{
    Axis, ButtonState, PointerEventTrait, PointerScrollEvent,
};
use input::event::{Event, EventTrait, KeyboardEvent, PointerEvent};
use input::{AsRaw, DeviceCapability, Libinput, LibinputInterface};
use log::{info, trace};
use std::collections::HashMap;
use std::os::unix::io::{AsRawFd, OwnedFd, RawFd};
use std::path::Path;

use super::events::{
    DeviceCapabilities, DeviceInfo, DeviceKey, RawInputEvent, ScrollAxis, ScrollSource,
};
use super::InputBackend;
use crate::error::{Result, SessionError};
use crate::session::DeviceBridge;

impl LibinputInterface for DeviceBridge {
    fn open_restricted(&mut self, path: &Path, _flags: i32) -> std::result::Result<OwnedFd, i32> {
        DeviceBridge::open_restricted(self, path)
    }

    fn close_restricted(&mut self, fd: OwnedFd) {
        DeviceBridge::close_restricted(self, fd)
    }
}

/// libinput context assigned to one seat
pub struct LibinputContext {
    input: Libinput,
    /// Live devices, kept so removal events can still be keyed
    devices: HashMap<DeviceKey, input::Device>,
}

impl LibinputContext {
    /// Create the context and assign it to `seat_name`
    pub fn new(seat_name: &str, bridge: DeviceBridge) -> Result<Self> {
        let mut input = Libinput::new_with_udev(bridge);
        input
            .udev_assign_seat(seat_name)
            .map_err(|_| SessionError::Input(format!("failed to assign seat {}", seat_name)))?;

        info!("libinput: context assigned to {}", seat_name);
        Ok(Self {
            input,
            devices: HashMap::new(),
        })
    }

    fn key_of(device: &input::Device) -> DeviceKey {
        DeviceKey(device.as_raw() as usize as u64)
    }

    fn describe(device: &input::Device) -> DeviceInfo {
        let caps = [
            (DeviceCapability::Keyboard, DeviceCapabilities::KEYBOARD),
            (DeviceCapability::Pointer, DeviceCapabilities::POINTER),
            (DeviceCapability::Touch, DeviceCapabilities::TOUCH),
            (DeviceCapability::TabletTool, DeviceCapabilities::TABLET_TOOL),
            (DeviceCapability::TabletPad, DeviceCapabilities::TABLET_PAD),
            (DeviceCapability::Gesture, DeviceCapabilities::GESTURE),
            (DeviceCapability::Switch, DeviceCapabilities::SWITCH),
        ];
        let capabilities = caps
            .iter()
            .filter(|(cap, _)| device.has_capability(*cap))
            .fold(DeviceCapabilities::empty(), |acc, (_, flag)| acc | *flag);

        DeviceInfo {
            name: device.name().to_string(),
            vendor: device.id_vendor(),
            product: device.id_product(),
            capabilities,
        }
    }

    fn scroll_event<E: PointerScrollEvent + PointerEventTrait>(
        event: &E,
        device: DeviceKey,
        source: ScrollSource,
        natural_scroll: bool,
        v120: impl Fn(&E, Axis) -> f64,
    ) -> RawInputEvent {
        let axis = |a: Axis| {
            event.has_axis(a).then(|| ScrollAxis {
                value: event.scroll_value(a),
                v120: v120(event, a),
            })
        };
        RawInputEvent::PointerScroll {
            device,
            time_usec: event.time_usec(),
            source,
            vertical: axis(Axis::Vertical),
            horizontal: axis(Axis::Horizontal),
            natural_scroll,
        }
    }

    fn convert(&mut self, event: Event) -> RawInputEvent {
        let native = event.device();
        let device = Self::key_of(&native);

        match event {
            Event::Device(DeviceEvent::Added(_)) => {
                let info = Self::describe(&native);
                self.devices.insert(device, native);
                RawInputEvent::DeviceAdded { device, info }
            }
            Event::Device(DeviceEvent::Removed(_)) => {
                self.devices.remove(&device);
                RawInputEvent::DeviceRemoved { device }
            }
            Event::Keyboard(KeyboardEvent::Key(k)) => RawInputEvent::KeyboardKey {
                device,
                time_usec: k.time_usec(),
                key: k.key(),
                pressed: k.key_state() == KeyState::Pressed,
            },
            Event::Pointer(PointerEvent::Motion(m)) => RawInputEvent::PointerMotion {
                device,
                time_usec: m.time_usec(),
                dx: m.dx(),
                dy: m.dy(),
                dx_unaccel: m.dx_unaccelerated(),
                dy_unaccel: m.dy_unaccelerated(),
            },
            Event::Pointer(PointerEvent::MotionAbsolute(m)) => {
                RawInputEvent::PointerMotionAbsolute {
                    device,
                    time_usec: m.time_usec(),
                    x: m.absolute_x_transformed(1),
                    y: m.absolute_y_transformed(1),
                }
            }
            Event::Pointer(PointerEvent::Button(b)) => RawInputEvent::PointerButton {
                device,
                time_usec: b.time_usec(),
                button: b.button(),
                pressed: b.button_state() == ButtonState::Pressed,
                seat_button_count: b.seat_button_count(),
            },
            Event::Pointer(PointerEvent::ScrollWheel(s)) => Self::scroll_event(
                &s,
                device,
                ScrollSource::Wheel,
                native.config_scroll_natural_scroll_enabled(),
                |e, a| e.scroll_value_v120(a),
            ),
            Event::Pointer(PointerEvent::ScrollFinger(s)) => Self::scroll_event(
                &s,
                device,
                ScrollSource::Finger,
                native.config_scroll_natural_scroll_enabled(),
                |_, _| 0.0,
            ),
            Event::Pointer(PointerEvent::ScrollContinuous(s)) => Self::scroll_event(
                &s,
                device,
                ScrollSource::Continuous,
                native.config_scroll_natural_scroll_enabled(),
                |_, _| 0.0,
            ),
            Event::Pointer(_) => RawInputEvent::Other {
                device,
                kind: "pointer",
            },
            Event::Keyboard(_) => RawInputEvent::Other {
                device,
                kind: "keyboard",
            },
            Event::Touch(_) => RawInputEvent::Other {
                device,
                kind: "touch",
            },
            Event::Tablet(_) => RawInputEvent::Other {
                device,
                kind: "tablet",
            },
            Event::TabletPad(_) => RawInputEvent::Other {
                device,
                kind: "tablet-pad",
            },
            Event::Gesture(_) => RawInputEvent::Other {
                device,
                kind: "gesture",
            },
            Event::Switch(_) => RawInputEvent::Other {
                device,
                kind: "switch",
            },
            _ => RawInputEvent::Other {
                device,
                kind: "unknown",
            },
        }
    }
}

impl InputBackend for LibinputContext {
    fn fd(&self) -> RawFd {
        self.input.as_raw_fd()
    }

    fn dispatch(&mut self) -> std::io::Result<()> {
        self.input.dispatch()
    }

    fn next_event(&mut self) -> Option<RawInputEvent> {
        let event = self.input.next()?;
        Some(self.convert(event))
    }

    fn suspend(&mut self) {
        trace!("libinput: suspend");
        self.input.suspend();
    }

    fn resume(&mut self) -> Result<()> {
        trace!("libinput: resume");
        self.input
            .resume()
            .map_err(|_| SessionError::Input("failed to resume libinput".into()))
    }
}
