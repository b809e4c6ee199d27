//! KMS capability probe
//!
//! A DRM node supports mode-setting when it exposes at least one CRTC,
//! connector and encoder. Render-only nodes share the drm subsystem but
//! fail the mode resources query.

use drm::control::Device as ControlDevice;
use log::trace;
use std::os::fd::{AsFd, BorrowedFd};

pub trait KmsProbe {
    fn is_kms(&self, fd: BorrowedFd<'_>) -> bool;
}

/// Probe backed by the DRM mode resources ioctl
#[derive(Debug, Default, Clone, Copy)]
pub struct DrmKmsProbe;

/// Borrowed DRM node, enough to issue control ioctls
struct Card<'a>(BorrowedFd<'a>);

impl AsFd for Card<'_> {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.0
    }
}

impl drm::Device for Card<'_> {}
impl ControlDevice for Card<'_> {}

impl KmsProbe for DrmKmsProbe {
    fn is_kms(&self, fd: BorrowedFd<'_>) -> bool {
        let card = Card(fd);
        match card.resource_handles() {
            Ok(resources) => {
                !resources.crtcs().is_empty()
                    && !resources.connectors().is_empty()
                    && !resources.encoders().is_empty()
            }
            Err(e) => {
                trace!("drm: mode resources query failed: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_drm_node_is_not_kms() {
        let file = std::fs::File::open("/dev/null").unwrap();
        assert!(!DrmKmsProbe.is_kms(file.as_fd()));
    }
}
