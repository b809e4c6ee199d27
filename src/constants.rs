//! Global constants for bseat
//!
//! udev property names, default subsystem filters and evdev codes
//! shared by the library and the host binary.

// ============================================================================
// Hotplug
// ============================================================================

/// udev subsystem carrying DRM device notifications
pub const DRM_SUBSYSTEM: &str = "drm";

/// sysname prefix of DRM primary nodes (card0, card1, ...)
pub const DRM_CARD_PREFIX: &str = "card";

/// Set to "1" on connector hotplug uevents
pub const PROP_HOTPLUG: &str = "HOTPLUG";

/// Set to "1" on DRM lease uevents
pub const PROP_LEASE: &str = "LEASE";

/// Connector object id accompanying a hotplug uevent
pub const PROP_CONNECTOR: &str = "CONNECTOR";

/// Property object id accompanying a hotplug uevent
pub const PROP_PROPERTY: &str = "PROPERTY";

// ============================================================================
// Input
// ============================================================================

/// Name reported by facets whose device has gone away
pub const UNKNOWN_DEVICE_NAME: &str = "UNKNOWN";

/// Left mouse button in libinput numbering
pub const BTN_LEFT: u32 = 0x110;

// evdev modifier keycodes
pub const KEY_LEFTCTRL: u32 = 29;
pub const KEY_RIGHTCTRL: u32 = 97;
pub const KEY_LEFTALT: u32 = 56;
pub const KEY_RIGHTALT: u32 = 100;

// evdev keycodes for F1-F12
pub const KEY_F1: u32 = 59;
pub const KEY_F2: u32 = 60;
pub const KEY_F3: u32 = 61;
pub const KEY_F4: u32 = 62;
pub const KEY_F5: u32 = 63;
pub const KEY_F6: u32 = 64;
pub const KEY_F7: u32 = 65;
pub const KEY_F8: u32 = 66;
pub const KEY_F9: u32 = 67;
pub const KEY_F10: u32 = 68;
pub const KEY_F11: u32 = 87;
pub const KEY_F12: u32 = 88;
