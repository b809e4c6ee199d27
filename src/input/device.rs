//! Input devices and their keyboard/pointer facets
//!
//! A facet is handed out to the host as `Rc<Keyboard>` / `Rc<Mouse>` and
//! may outlive the registry entry. Facets point back at their device with
//! a `Weak`, so a removed device only leaves an orphaned facet behind.

use std::rc::{Rc, Weak};

use super::events::{
    AxisEvent, ButtonEvent, DeviceCapabilities, DeviceInfo, DeviceKey, KeyEvent, MotionEvent,
    WarpEvent,
};
use crate::constants::UNKNOWN_DEVICE_NAME;
use crate::signal::Signal;

#[derive(Debug, Default)]
pub struct KeyboardEvents {
    pub key: Signal<KeyEvent>,
}

#[derive(Debug, Default)]
pub struct PointerEvents {
    pub motion: Signal<MotionEvent>,
    pub warp: Signal<WarpEvent>,
    pub button: Signal<ButtonEvent>,
    pub axis: Signal<AxisEvent>,
    /// End of one hardware sample
    pub frame: Signal<()>,
}

#[derive(Debug)]
pub struct Keyboard {
    device: Weak<InputDevice>,
    pub events: KeyboardEvents,
}

#[derive(Debug)]
pub struct Mouse {
    device: Weak<InputDevice>,
    pub events: PointerEvents,
}

fn device_name(device: &Weak<InputDevice>) -> String {
    device
        .upgrade()
        .map(|d| d.name.clone())
        .unwrap_or_else(|| UNKNOWN_DEVICE_NAME.to_string())
}

impl Keyboard {
    /// Device name, or "UNKNOWN" once the device is gone
    pub fn name(&self) -> String {
        device_name(&self.device)
    }

    pub fn device(&self) -> Option<Rc<InputDevice>> {
        self.device.upgrade()
    }

    pub fn native_handle(&self) -> Option<DeviceKey> {
        self.device().map(|d| d.key)
    }
}

impl Mouse {
    /// Device name, or "UNKNOWN" once the device is gone
    pub fn name(&self) -> String {
        device_name(&self.device)
    }

    pub fn device(&self) -> Option<Rc<InputDevice>> {
        self.device.upgrade()
    }

    pub fn native_handle(&self) -> Option<DeviceKey> {
        self.device().map(|d| d.key)
    }
}

/// One device reported by the input engine
#[derive(Debug)]
pub struct InputDevice {
    key: DeviceKey,
    name: String,
    vendor: u32,
    product: u32,
    capabilities: DeviceCapabilities,
    keyboard: Option<Rc<Keyboard>>,
    mouse: Option<Rc<Mouse>>,
}

impl InputDevice {
    /// Build the device and the facets its capabilities call for
    pub fn new(key: DeviceKey, info: &DeviceInfo) -> Rc<Self> {
        Rc::new_cyclic(|weak| {
            let keyboard = info
                .capabilities
                .contains(DeviceCapabilities::KEYBOARD)
                .then(|| {
                    Rc::new(Keyboard {
                        device: weak.clone(),
                        events: KeyboardEvents::default(),
                    })
                });
            let mouse = info
                .capabilities
                .contains(DeviceCapabilities::POINTER)
                .then(|| {
                    Rc::new(Mouse {
                        device: weak.clone(),
                        events: PointerEvents::default(),
                    })
                });

            Self {
                key,
                name: info.name.clone(),
                vendor: info.vendor,
                product: info.product,
                capabilities: info.capabilities,
                keyboard,
                mouse,
            }
        })
    }

    pub fn key(&self) -> DeviceKey {
        self.key
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn vendor(&self) -> u32 {
        self.vendor
    }

    pub fn product(&self) -> u32 {
        self.product
    }

    pub fn capabilities(&self) -> DeviceCapabilities {
        self.capabilities
    }

    pub fn keyboard(&self) -> Option<&Rc<Keyboard>> {
        self.keyboard.as_ref()
    }

    pub fn mouse(&self) -> Option<&Rc<Mouse>> {
        self.mouse.as_ref()
    }
}

/// Devices known to the session, in discovery order
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: Vec<Rc<InputDevice>>,
}

impl DeviceRegistry {
    pub fn get(&self, key: DeviceKey) -> Option<Rc<InputDevice>> {
        self.devices.iter().find(|d| d.key == key).cloned()
    }

    pub fn insert(&mut self, device: Rc<InputDevice>) {
        self.devices.push(device);
    }

    pub fn remove(&mut self, key: DeviceKey) -> Option<Rc<InputDevice>> {
        let index = self.devices.iter().position(|d| d.key == key)?;
        Some(self.devices.remove(index))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rc<InputDevice>> {
        self.devices.iter()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn clear(&mut self) {
        self.devices.clear();
    }
}
