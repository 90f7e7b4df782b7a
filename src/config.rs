//! Application-wide constants and compile-time configuration.
//!
//! Advertising parameters, attribute sizes and board wiring live here so
//! they can be tuned in one place.

// BLE

/// GAP device name, also placed in the advertising payload.
pub const DEVICE_NAME: &str = "Nordic_LBS";

/// Advertising interval (in 0.625 ms units). 160 = 100 ms.
pub const ADV_INTERVAL: u32 = 160;

/// Negotiated ATT MTU the SoftDevice is configured for.
pub const ATT_MTU: u16 = 247;

/// Largest attribute value this service ever serializes.
///
/// The longest ones are the temperature user description (24 bytes) and
/// a characteristic declaration with a 128-bit UUID (19 bytes).
pub const ATT_VALUE_MAX: usize = 32;

/// Characteristic User Description of the temperature characteristic.
pub const TEMPERATURE_DESCRIPTION: &str = "Temperature sensor value";

// GPIO pin assignments (nRF52840-DK defaults)
//
// These are logical names; actual `embassy_nrf::peripherals::*` types are
// selected in `main.rs`.  Adjust for your custom PCB.
//
//   Button 1       → P0.11  (button characteristic)
//   LED 1          → P0.13  (connection status)
//   LED 3          → P0.15  (LED characteristic)

/// Button debounce time (ms).
pub const BUTTON_DEBOUNCE_MS: u64 = 50;

/// Blink period of the status LED while advertising (ms).
pub const STATUS_BLINK_MS: u64 = 1000;
