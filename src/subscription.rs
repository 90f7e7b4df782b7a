//! Notification subscription state of the button characteristic.
//!
//! One flag, because only one central is ever connected. The transport
//! reports every CCCD write (and a disable on disconnect); nothing else
//! changes the state.

use core::sync::atomic::{AtomicBool, Ordering};

/// CCCD value enabling notifications.
pub const CCCD_NOTIFY: u16 = 0x0001;
/// CCCD value enabling indications. Not supported by the button
/// characteristic, so it counts as disabled.
pub const CCCD_INDICATE: u16 = 0x0002;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SubscriptionState {
    Disabled,
    Enabled,
}

pub struct Subscription {
    enabled: AtomicBool,
}

impl Subscription {
    pub const fn new() -> Self {
        Self {
            enabled: AtomicBool::new(false),
        }
    }

    /// Apply a descriptor write. Any value other than [`CCCD_NOTIFY`]
    /// disables.
    pub fn on_descriptor_write(&self, value: u16) -> SubscriptionState {
        let enabled = value == CCCD_NOTIFY;
        let was = self.enabled.swap(enabled, Ordering::AcqRel);
        if was != enabled {
            info!("Button notifications {}", if enabled { "enabled" } else { "disabled" });
        }
        self.state()
    }

    pub fn state(&self) -> SubscriptionState {
        if self.is_enabled() {
            SubscriptionState::Enabled
        } else {
            SubscriptionState::Disabled
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Current descriptor value as a central reads it back.
    pub fn cccd_value(&self) -> u16 {
        if self.is_enabled() {
            CCCD_NOTIFY
        } else {
            0
        }
    }
}

impl Default for Subscription {
    fn default() -> Self {
        Self::new()
    }
}
