//! Audio routing seam
//!
//! The engine never touches OS audio devices; call audio is routed by an
//! [`AudioRouter`] implementation supplied by the embedding application.
//! Routing is purely advisory: the engine behaves identically whether or not
//! a routing request succeeds.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One audio device as seen by the OS
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioDeviceInfo {
    /// OS-reported device name
    pub name: String,
    /// Whether the device is a Bluetooth endpoint
    pub is_bluetooth: bool,
    /// Whether the device is the current system default
    pub is_default: bool,
}

/// OS audio default-device routing, consumed by the controller adapter
#[async_trait]
pub trait AudioRouter: Send + Sync {
    /// Make the Bluetooth endpoint the default device; `true` on success
    async fn route_to_bluetooth_device(&self) -> bool;

    /// Restore whatever routing was in place before
    async fn restore_previous_routing(&self);

    /// Enumerate Bluetooth audio endpoints
    async fn list_bluetooth_devices(&self) -> Vec<AudioDeviceInfo>;
}

/// Default router that accepts every request without touching the OS
///
/// Platform integrations replace this with a real device-routing
/// implementation.
#[derive(Debug, Default)]
pub struct SystemAudioRouter;

#[async_trait]
impl AudioRouter for SystemAudioRouter {
    async fn route_to_bluetooth_device(&self) -> bool {
        debug!("audio routing requested (no platform router attached)");
        true
    }

    async fn restore_previous_routing(&self) {
        debug!("audio routing restore requested (no platform router attached)");
    }

    async fn list_bluetooth_devices(&self) -> Vec<AudioDeviceInfo> {
        Vec::new()
    }
}
