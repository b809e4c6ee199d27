//! Raw input event translation
//!
//! Reshapes drained engine events into keyboard/pointer signal emissions.
//! Pointer samples always end with a frame event.

use log::{debug, error, trace};
use std::rc::Rc;

use super::device::{DeviceRegistry, InputDevice};
use super::events::{
    usec_to_ms, AxisEvent, AxisRelativeDirection, ButtonEvent, DeviceInfo, DeviceKey, KeyEvent,
    MotionEvent, PointerAxis, RawInputEvent, ScrollAxis, ScrollSource, Vec2, WarpEvent,
};
use crate::session::SessionEvents;

/// Owns the device registry and routes events to device facets
#[derive(Debug, Default)]
pub struct InputRouter {
    registry: DeviceRegistry,
}

impl InputRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    pub fn clear(&mut self) {
        self.registry.clear();
    }

    /// Publish discovery events for every registered device
    pub fn announce_all(&self, bus: &SessionEvents) {
        for device in self.registry.iter() {
            announce(device, bus);
        }
    }

    /// Translate one drained event
    ///
    /// `ready` tells whether the host already asked for discovery events;
    /// before that, new devices are only registered.
    pub fn handle(&mut self, event: RawInputEvent, ready: bool, bus: &SessionEvents) {
        let key = event.device();

        let device = match (self.registry.get(key), &event) {
            (Some(device), _) => device,
            (None, RawInputEvent::DeviceAdded { info, .. }) => {
                self.add_device(key, info, ready, bus);
                return;
            }
            (None, _) => {
                error!("libinput: No device for event and not added");
                return;
            }
        };

        match event {
            RawInputEvent::DeviceAdded { .. } => {
                trace!("libinput: {} added twice", device.name());
            }
            RawInputEvent::DeviceRemoved { .. } => {
                debug!("libinput: Device {} removed", device.name());
                self.registry.remove(key);
            }

            // --------- keyboard
            RawInputEvent::KeyboardKey {
                time_usec,
                key,
                pressed,
                ..
            } => {
                let Some(keyboard) = device.keyboard() else {
                    trace!("libinput: key event from non-keyboard {}", device.name());
                    return;
                };
                keyboard.events.key.emit(&KeyEvent {
                    time_ms: usec_to_ms(time_usec),
                    key,
                    pressed,
                });
            }

            // --------- pointer
            RawInputEvent::PointerMotion {
                time_usec,
                dx,
                dy,
                dx_unaccel,
                dy_unaccel,
                ..
            } => {
                let Some(mouse) = pointer(&device) else {
                    return;
                };
                mouse.events.motion.emit(&MotionEvent {
                    time_ms: usec_to_ms(time_usec),
                    delta: Vec2::new(dx, dy),
                    unaccel: Vec2::new(dx_unaccel, dy_unaccel),
                });
                mouse.events.frame.emit(&());
            }
            RawInputEvent::PointerMotionAbsolute { time_usec, x, y, .. } => {
                let Some(mouse) = pointer(&device) else {
                    return;
                };
                mouse.events.warp.emit(&WarpEvent {
                    time_ms: usec_to_ms(time_usec),
                    absolute: Vec2::new(x, y),
                });
                mouse.events.frame.emit(&());
            }
            RawInputEvent::PointerButton {
                time_usec,
                button,
                pressed,
                seat_button_count,
                ..
            } => {
                let Some(mouse) = pointer(&device) else {
                    return;
                };
                // Only the first press and the last release on the seat count
                let edge = if pressed {
                    seat_button_count == 1
                } else {
                    seat_button_count == 0
                };
                if !edge {
                    trace!(
                        "libinput: button {} {} swallowed (seat count {})",
                        button,
                        if pressed { "press" } else { "release" },
                        seat_button_count
                    );
                    return;
                }
                mouse.events.button.emit(&ButtonEvent {
                    time_ms: usec_to_ms(time_usec),
                    button,
                    pressed,
                });
                mouse.events.frame.emit(&());
            }
            RawInputEvent::PointerScroll {
                time_usec,
                source,
                vertical,
                horizontal,
                natural_scroll,
                ..
            } => {
                let Some(mouse) = pointer(&device) else {
                    return;
                };
                let direction = if natural_scroll {
                    AxisRelativeDirection::Inverted
                } else {
                    AxisRelativeDirection::Identical
                };
                let axes = [
                    (PointerAxis::Vertical, vertical),
                    (PointerAxis::Horizontal, horizontal),
                ];
                for (axis, value) in axes {
                    let Some(value) = value else {
                        continue;
                    };
                    mouse.events.axis.emit(&axis_event(
                        usec_to_ms(time_usec),
                        axis,
                        source,
                        direction,
                        value,
                    ));
                }
                mouse.events.frame.emit(&());
            }

            // TODO: touch, tablet and gesture devices once facets exist for them
            RawInputEvent::Other { kind, .. } => {
                trace!("libinput: unhandled {} event", kind);
            }
        }
    }

    fn add_device(&mut self, key: DeviceKey, info: &DeviceInfo, ready: bool, bus: &SessionEvents) {
        debug!(
            "libinput: New device {}: {:04x}-{:04x}",
            info.name, info.vendor, info.product
        );
        let device = InputDevice::new(key, info);
        self.registry.insert(device.clone());
        if ready {
            announce(&device, bus);
        }
    }
}

fn pointer(device: &InputDevice) -> Option<&Rc<super::device::Mouse>> {
    let mouse = device.mouse();
    if mouse.is_none() {
        trace!("libinput: pointer event from non-pointer {}", device.name());
    }
    mouse
}

fn axis_event(
    time_ms: u32,
    axis: PointerAxis,
    source: ScrollSource,
    direction: AxisRelativeDirection,
    value: ScrollAxis,
) -> AxisEvent {
    AxisEvent {
        time_ms,
        axis,
        delta: value.value,
        source: source.into(),
        direction,
        discrete: match source {
            ScrollSource::Wheel => Some(value.v120.round() as i32),
            ScrollSource::Finger | ScrollSource::Continuous => None,
        },
    }
}

fn announce(device: &InputDevice, bus: &SessionEvents) {
    if let Some(keyboard) = device.keyboard() {
        bus.new_keyboard.emit(keyboard);
    }
    if let Some(mouse) = device.mouse() {
        bus.new_pointer.emit(mouse);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::events::{AxisSource, DeviceCapabilities};
    use std::cell::RefCell;

    const MOUSE: DeviceKey = DeviceKey(0x10);
    const KBD: DeviceKey = DeviceKey(0x20);

    #[derive(Debug, Clone, PartialEq)]
    enum Seen {
        Key(KeyEvent),
        Motion(MotionEvent),
        Warp(WarpEvent),
        Button(ButtonEvent),
        Axis(AxisEvent),
        Frame,
        NewKeyboard(String),
        NewPointer(String),
    }

    struct Harness {
        router: InputRouter,
        bus: SessionEvents,
        seen: Rc<RefCell<Vec<Seen>>>,
    }

    impl Harness {
        fn new() -> Self {
            let bus = SessionEvents::default();
            let seen = Rc::new(RefCell::new(Vec::new()));

            // Hook every facet as it is discovered
            let s = seen.clone();
            bus.new_keyboard.subscribe(move |kb| {
                s.borrow_mut().push(Seen::NewKeyboard(kb.name()));
                let s = s.clone();
                kb.events.key.subscribe(move |e| s.borrow_mut().push(Seen::Key(*e)));
            });
            let s = seen.clone();
            bus.new_pointer.subscribe(move |m| {
                s.borrow_mut().push(Seen::NewPointer(m.name()));
                let s1 = s.clone();
                m.events.motion.subscribe(move |e| s1.borrow_mut().push(Seen::Motion(*e)));
                let s2 = s.clone();
                m.events.warp.subscribe(move |e| s2.borrow_mut().push(Seen::Warp(*e)));
                let s3 = s.clone();
                m.events.button.subscribe(move |e| s3.borrow_mut().push(Seen::Button(*e)));
                let s4 = s.clone();
                m.events.axis.subscribe(move |e| s4.borrow_mut().push(Seen::Axis(*e)));
                let s5 = s.clone();
                m.events.frame.subscribe(move |_| s5.borrow_mut().push(Seen::Frame));
            });

            let mut harness = Self {
                router: InputRouter::new(),
                bus,
                seen,
            };
            harness.feed(added(MOUSE, "mouse", DeviceCapabilities::POINTER));
            harness.feed(added(KBD, "kbd", DeviceCapabilities::KEYBOARD));
            harness.seen.borrow_mut().clear();
            harness
        }

        fn feed(&mut self, event: RawInputEvent) {
            self.router.handle(event, true, &self.bus);
        }

        fn take(&self) -> Vec<Seen> {
            std::mem::take(&mut *self.seen.borrow_mut())
        }
    }

    fn added(device: DeviceKey, name: &str, capabilities: DeviceCapabilities) -> RawInputEvent {
        RawInputEvent::DeviceAdded {
            device,
            info: DeviceInfo {
                name: name.into(),
                vendor: 1,
                product: 2,
                capabilities,
            },
        }
    }

    fn button(pressed: bool, seat_button_count: u32) -> RawInputEvent {
        RawInputEvent::PointerButton {
            device: MOUSE,
            time_usec: 7_000,
            button: crate::constants::BTN_LEFT,
            pressed,
            seat_button_count,
        }
    }

    fn scroll(source: ScrollSource, natural_scroll: bool, both: bool) -> RawInputEvent {
        RawInputEvent::PointerScroll {
            device: MOUSE,
            time_usec: 9_500,
            source,
            vertical: Some(ScrollAxis {
                value: 15.0,
                v120: 120.0,
            }),
            horizontal: both.then_some(ScrollAxis {
                value: -7.5,
                v120: -60.0,
            }),
            natural_scroll,
        }
    }

    #[test]
    fn test_discovery_only_when_ready() {
        let bus = SessionEvents::default();
        let count = Rc::new(RefCell::new(0));
        let c = count.clone();
        bus.new_pointer.subscribe(move |_| *c.borrow_mut() += 1);

        let mut router = InputRouter::new();
        router.handle(added(MOUSE, "m", DeviceCapabilities::POINTER), false, &bus);
        assert_eq!(*count.borrow(), 0);
        assert_eq!(router.registry().len(), 1);

        router.handle(added(DeviceKey(99), "m2", DeviceCapabilities::POINTER), true, &bus);
        assert_eq!(*count.borrow(), 1);

        router.announce_all(&bus);
        assert_eq!(*count.borrow(), 3);
    }

    #[test]
    fn test_unknown_device_dropped() {
        let mut h = Harness::new();
        h.feed(RawInputEvent::KeyboardKey {
            device: DeviceKey(0xdead),
            time_usec: 1,
            key: 30,
            pressed: true,
        });
        assert!(h.take().is_empty());
    }

    #[test]
    fn test_removal_erases_registry_entry() {
        let mut h = Harness::new();
        h.feed(RawInputEvent::DeviceRemoved { device: KBD });
        assert!(h.router.registry().get(KBD).is_none());
        assert!(h.router.registry().get(MOUSE).is_some());

        // Later events from the removed device find nothing
        h.feed(RawInputEvent::KeyboardKey {
            device: KBD,
            time_usec: 1,
            key: 30,
            pressed: true,
        });
        assert!(h.take().is_empty());
    }

    #[test]
    fn test_key_event() {
        let mut h = Harness::new();
        h.feed(RawInputEvent::KeyboardKey {
            device: KBD,
            time_usec: 12_345_678,
            key: 30,
            pressed: true,
        });
        assert_eq!(
            h.take(),
            vec![Seen::Key(KeyEvent {
                time_ms: 12_345,
                key: 30,
                pressed: true
            })]
        );
    }

    #[test]
    fn test_motion_then_frame() {
        let mut h = Harness::new();
        h.feed(RawInputEvent::PointerMotion {
            device: MOUSE,
            time_usec: 2_000,
            dx: 3.0,
            dy: -1.5,
            dx_unaccel: 2.0,
            dy_unaccel: -1.0,
        });
        assert_eq!(
            h.take(),
            vec![
                Seen::Motion(MotionEvent {
                    time_ms: 2,
                    delta: Vec2::new(3.0, -1.5),
                    unaccel: Vec2::new(2.0, -1.0),
                }),
                Seen::Frame,
            ]
        );
    }

    #[test]
    fn test_warp_then_frame() {
        let mut h = Harness::new();
        h.feed(RawInputEvent::PointerMotionAbsolute {
            device: MOUSE,
            time_usec: 3_000,
            x: 0.25,
            y: 0.75,
        });
        assert_eq!(
            h.take(),
            vec![
                Seen::Warp(WarpEvent {
                    time_ms: 3,
                    absolute: Vec2::new(0.25, 0.75),
                }),
                Seen::Frame,
            ]
        );
    }

    #[test]
    fn test_button_seat_count_guard() {
        let mut h = Harness::new();
        let press = Seen::Button(ButtonEvent {
            time_ms: 7,
            button: crate::constants::BTN_LEFT,
            pressed: true,
        });
        let release = Seen::Button(ButtonEvent {
            time_ms: 7,
            button: crate::constants::BTN_LEFT,
            pressed: false,
        });

        // Two physical sources behind one seat button, interleaved:
        // press A (0->1), press B (1->2), release A (2->1), release B (1->0)
        h.feed(button(true, 1));
        assert_eq!(h.take(), vec![press.clone(), Seen::Frame]);
        h.feed(button(true, 2));
        assert!(h.take().is_empty());
        h.feed(button(false, 1));
        assert!(h.take().is_empty());
        h.feed(button(false, 0));
        assert_eq!(h.take(), vec![release, Seen::Frame]);

        // Second round behaves the same
        h.feed(button(true, 1));
        assert_eq!(h.take(), vec![press, Seen::Frame]);
    }

    #[test]
    fn test_wheel_scroll_has_discrete() {
        let mut h = Harness::new();
        h.feed(scroll(ScrollSource::Wheel, false, true));
        assert_eq!(
            h.take(),
            vec![
                Seen::Axis(AxisEvent {
                    time_ms: 9,
                    axis: PointerAxis::Vertical,
                    delta: 15.0,
                    source: AxisSource::Wheel,
                    direction: AxisRelativeDirection::Identical,
                    discrete: Some(120),
                }),
                Seen::Axis(AxisEvent {
                    time_ms: 9,
                    axis: PointerAxis::Horizontal,
                    delta: -7.5,
                    source: AxisSource::Wheel,
                    direction: AxisRelativeDirection::Identical,
                    discrete: Some(-60),
                }),
                Seen::Frame,
            ]
        );
    }

    #[test]
    fn test_finger_and_continuous_scroll_sources() {
        for (source, expected) in [
            (ScrollSource::Finger, AxisSource::Finger),
            (ScrollSource::Continuous, AxisSource::Continuous),
        ] {
            let mut h = Harness::new();
            h.feed(scroll(source, false, false));
            assert_eq!(
                h.take(),
                vec![
                    Seen::Axis(AxisEvent {
                        time_ms: 9,
                        axis: PointerAxis::Vertical,
                        delta: 15.0,
                        source: expected,
                        direction: AxisRelativeDirection::Identical,
                        discrete: None,
                    }),
                    Seen::Frame,
                ]
            );
        }
    }

    #[test]
    fn test_natural_scroll_inverts_direction() {
        for source in [ScrollSource::Wheel, ScrollSource::Finger, ScrollSource::Continuous] {
            let mut h = Harness::new();
            h.feed(scroll(source, true, true));
            let events = h.take();
            assert_eq!(events.len(), 3);
            for event in &events[..2] {
                match event {
                    Seen::Axis(axis) => {
                        assert_eq!(axis.direction, AxisRelativeDirection::Inverted);
                        assert_eq!(axis.source, AxisSource::from(source));
                        assert_eq!(axis.discrete.is_some(), source == ScrollSource::Wheel);
                    }
                    other => panic!("expected axis event, got {:?}", other),
                }
            }
            assert_eq!(events[2], Seen::Frame);
        }
    }

    #[test]
    fn test_pointer_event_on_keyboard_ignored() {
        let mut h = Harness::new();
        h.feed(RawInputEvent::PointerMotion {
            device: KBD,
            time_usec: 1,
            dx: 1.0,
            dy: 1.0,
            dx_unaccel: 1.0,
            dy_unaccel: 1.0,
        });
        h.feed(RawInputEvent::Other {
            device: MOUSE,
            kind: "gesture",
        });
        assert!(h.take().is_empty());
    }

    #[test]
    fn test_discovery_names() {
        let bus = SessionEvents::default();
        let names = Rc::new(RefCell::new(Vec::new()));
        let n = names.clone();
        bus.new_keyboard.subscribe(move |kb| n.borrow_mut().push(kb.name()));

        let mut router = InputRouter::new();
        router.handle(added(KBD, "AT Translated Set 2 keyboard", DeviceCapabilities::KEYBOARD), true, &bus);
        assert_eq!(*names.borrow(), vec!["AT Translated Set 2 keyboard".to_string()]);
    }
}
