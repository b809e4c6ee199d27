//! DRM card discovery: hotplug classification and KMS probing

pub mod hotplug;
pub mod kms;

#[cfg(target_os = "linux")]
pub use hotplug::UdevMonitor;
pub use hotplug::{classify, CardEvent, CardFilter, HotplugNotification, HotplugSource};
pub use kms::{DrmKmsProbe, KmsProbe};
