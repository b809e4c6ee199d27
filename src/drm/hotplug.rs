//! DRM hotplug detection
//!
//! Monitors udev events for DRM card changes (add/remove, connector
//! hotplug, lease changes) and classifies them for the session.

use log::{debug, info};
use std::collections::HashMap;
use std::os::unix::io::RawFd;
use std::path::PathBuf;

use crate::constants::{PROP_CONNECTOR, PROP_HOTPLUG, PROP_LEASE, PROP_PROPERTY};
use crate::session::DeviceChangeEvent;

/// One device notification as delivered by the hotplug service
#[derive(Debug, Clone, Default)]
pub struct HotplugNotification {
    pub subsystem: Option<String>,
    pub sysname: Option<String>,
    pub action: Option<String>,
    pub devnode: Option<PathBuf>,
    pub devnum: Option<libc::dev_t>,
    pub properties: HashMap<String, String>,
}

impl HotplugNotification {
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }

    fn flag(&self, name: &str) -> bool {
        self.property(name) == Some("1")
    }
}

/// Source of hotplug notifications
pub trait HotplugSource {
    /// Pollable descriptor
    fn fd(&self) -> RawFd;

    /// Return everything already queued, without blocking
    fn drain(&mut self) -> Vec<HotplugNotification>;
}

/// Which notifications belong to this session
#[derive(Debug, Clone)]
pub struct CardFilter {
    pub subsystem: String,
    pub card_prefix: String,
}

impl CardFilter {
    /// `<prefix>` followed by one or more ASCII digits
    pub fn is_card(&self, sysname: &str) -> bool {
        match sysname.strip_prefix(self.card_prefix.as_str()) {
            Some(rest) => !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()),
            None => false,
        }
    }
}

/// A notification that passed the filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardEvent {
    /// New card node; the host opens and integrates it
    Added { path: PathBuf },
    /// `change` is `None` when neither HOTPLUG nor LEASE is set
    Changed {
        devnum: libc::dev_t,
        change: Option<DeviceChangeEvent>,
    },
    Removed { devnum: libc::dev_t },
}

/// Filter and classify one notification
///
/// Returns `None` for anything outside the subsystem, non-card nodes,
/// notifications without path or action, and change/remove without a
/// device number.
pub fn classify(notification: &HotplugNotification, filter: &CardFilter) -> Option<CardEvent> {
    if notification.subsystem.as_deref() != Some(filter.subsystem.as_str()) {
        return None;
    }
    if !filter.is_card(notification.sysname.as_deref()?) {
        return None;
    }
    let action = notification.action.as_deref()?;
    let path = notification.devnode.as_ref()?;

    match action {
        "add" => Some(CardEvent::Added { path: path.clone() }),
        "change" => Some(CardEvent::Changed {
            devnum: notification.devnum?,
            change: classify_change(notification),
        }),
        "remove" => Some(CardEvent::Removed {
            devnum: notification.devnum?,
        }),
        _ => None,
    }
}

fn classify_change(notification: &HotplugNotification) -> Option<DeviceChangeEvent> {
    if notification.flag(PROP_HOTPLUG) {
        Some(DeviceChangeEvent::Hotplug {
            connector_id: parse_id(notification, PROP_CONNECTOR),
            prop_id: parse_id(notification, PROP_PROPERTY),
        })
    } else if notification.flag(PROP_LEASE) {
        Some(DeviceChangeEvent::Lease)
    } else {
        None
    }
}

fn parse_id(notification: &HotplugNotification, name: &str) -> Option<u32> {
    let value = notification.property(name)?;
    match value.trim().parse() {
        Ok(id) => Some(id),
        Err(_) => {
            debug!("udev: ignoring malformed {}={:?}", name, value);
            None
        }
    }
}

/// udev-based hotplug monitor
#[cfg(target_os = "linux")]
pub struct UdevMonitor {
    socket: udev::MonitorSocket,
}

#[cfg(target_os = "linux")]
impl UdevMonitor {
    /// Create a new hotplug monitor for `subsystem`
    pub fn new(subsystem: &str) -> crate::error::Result<Self> {
        use crate::error::SessionError;

        let socket = udev::MonitorBuilder::new()
            .map_err(|e| SessionError::Hotplug(format!("failed to create udev monitor builder: {}", e)))?
            .match_subsystem(subsystem)
            .map_err(|e| SessionError::Hotplug(format!("failed to match {} subsystem: {}", subsystem, e)))?
            .listen()
            .map_err(|e| SessionError::Hotplug(format!("failed to start udev monitor: {}", e)))?;

        info!("udev: {} hotplug monitor initialized", subsystem);
        Ok(Self { socket })
    }
}

#[cfg(target_os = "linux")]
impl HotplugSource for UdevMonitor {
    fn fd(&self) -> RawFd {
        use std::os::unix::io::AsRawFd;
        self.socket.as_raw_fd()
    }

    fn drain(&mut self) -> Vec<HotplugNotification> {
        let lossy = |s: &std::ffi::OsStr| s.to_string_lossy().into_owned();

        // MonitorSocket iteration stops when nothing is queued
        self.socket
            .iter()
            .map(|event| HotplugNotification {
                subsystem: event.subsystem().map(lossy),
                sysname: Some(lossy(event.sysname())),
                action: event.action().map(lossy),
                devnode: event.devnode().map(|p| p.to_path_buf()),
                devnum: event.devnum(),
                properties: event
                    .properties()
                    .map(|p| (lossy(p.name()), lossy(p.value())))
                    .collect(),
            })
            .collect()
    }
}
