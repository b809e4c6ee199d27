//! Input event shapes
//!
//! `RawInputEvent` is what the input engine backend drains; the rest are
//! the device-independent events published on keyboard/pointer signals.

use bitflags::bitflags;

/// Identity of a device inside the input engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceKey(pub u64);

bitflags! {
    /// Device capabilities, queried once when the device shows up
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct DeviceCapabilities: u32 {
        const KEYBOARD = 1 << 0;
        const POINTER = 1 << 1;
        const TOUCH = 1 << 2;
        const TABLET_TOOL = 1 << 3;
        const TABLET_PAD = 1 << 4;
        const GESTURE = 1 << 5;
        const SWITCH = 1 << 6;
    }
}

/// Static description of a newly added device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
    pub vendor: u32,
    pub product: u32,
    pub capabilities: DeviceCapabilities,
}

/// Native scroll source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollSource {
    Wheel,
    Finger,
    Continuous,
}

/// One reported scroll axis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollAxis {
    pub value: f64,
    /// High-resolution wheel steps (120 per detent); 0 for non-wheel sources
    pub v120: f64,
}

/// Event drained from the input engine
#[derive(Debug, Clone, PartialEq)]
pub enum RawInputEvent {
    DeviceAdded {
        device: DeviceKey,
        info: DeviceInfo,
    },
    DeviceRemoved {
        device: DeviceKey,
    },
    KeyboardKey {
        device: DeviceKey,
        time_usec: u64,
        key: u32,
        pressed: bool,
    },
    PointerMotion {
        device: DeviceKey,
        time_usec: u64,
        dx: f64,
        dy: f64,
        dx_unaccel: f64,
        dy_unaccel: f64,
    },
    /// Coordinates normalized to 0.0..=1.0
    PointerMotionAbsolute {
        device: DeviceKey,
        time_usec: u64,
        x: f64,
        y: f64,
    },
    PointerButton {
        device: DeviceKey,
        time_usec: u64,
        button: u32,
        pressed: bool,
        /// Seat-wide count of this button pressed, after this event
        seat_button_count: u32,
    },
    PointerScroll {
        device: DeviceKey,
        time_usec: u64,
        source: ScrollSource,
        vertical: Option<ScrollAxis>,
        horizontal: Option<ScrollAxis>,
        /// Device's natural-scroll setting at drain time
        natural_scroll: bool,
    },
    /// Anything else the engine reports (touch, tablet, gestures, ...)
    Other {
        device: DeviceKey,
        kind: &'static str,
    },
}

impl RawInputEvent {
    pub fn device(&self) -> DeviceKey {
        match self {
            Self::DeviceAdded { device, .. }
            | Self::DeviceRemoved { device }
            | Self::KeyboardKey { device, .. }
            | Self::PointerMotion { device, .. }
            | Self::PointerMotionAbsolute { device, .. }
            | Self::PointerButton { device, .. }
            | Self::PointerScroll { device, .. }
            | Self::Other { device, .. } => *device,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub time_ms: u32,
    pub key: u32,
    pub pressed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionEvent {
    pub time_ms: u32,
    pub delta: Vec2,
    pub unaccel: Vec2,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WarpEvent {
    pub time_ms: u32,
    pub absolute: Vec2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonEvent {
    pub time_ms: u32,
    pub button: u32,
    pub pressed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerAxis {
    Vertical,
    Horizontal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisSource {
    Wheel,
    Finger,
    Continuous,
}

impl From<ScrollSource> for AxisSource {
    fn from(source: ScrollSource) -> Self {
        match source {
            ScrollSource::Wheel => AxisSource::Wheel,
            ScrollSource::Finger => AxisSource::Finger,
            ScrollSource::Continuous => AxisSource::Continuous,
        }
    }
}

/// Whether the delta follows the physical motion or is inverted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisRelativeDirection {
    Identical,
    Inverted,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisEvent {
    pub time_ms: u32,
    pub axis: PointerAxis,
    pub delta: f64,
    pub source: AxisSource,
    pub direction: AxisRelativeDirection,
    /// v120 step count, wheel source only
    pub discrete: Option<i32>,
}

/// Microsecond engine timestamp to the millisecond clock used by events
pub(crate) fn usec_to_ms(usec: u64) -> u32 {
    (usec / 1000) as u32
}
