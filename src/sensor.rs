//! Temperature sensor adapter.
//!
//! Wraps an optional device binding and turns the device's raw answers
//! into [`SensorError`]s. On the nRF52840 the device is the SoftDevice's
//! die temperature API; tests plug in a scripted device.

use crate::error::SensorError;

/// A device able to produce one temperature sample (°C) on demand.
pub trait TemperatureDevice {
    /// Whether the device finished its own initialization.
    fn is_ready(&self) -> bool {
        true
    }

    /// Fetch one sample. `None` if the fetch did not complete.
    fn fetch(&self) -> Option<f32>;
}

impl<T: TemperatureDevice + ?Sized> TemperatureDevice for &T {
    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }

    fn fetch(&self) -> Option<f32> {
        (**self).fetch()
    }
}

/// Sensor adapter with an optional device binding.
pub struct Sensor<D> {
    device: Option<D>,
}

impl<D> Sensor<D> {
    /// Adapter bound to `device`.
    pub const fn new(device: D) -> Self {
        Self {
            device: Some(device),
        }
    }

    /// Adapter with no device; every sample fails with `DeviceNotReady`.
    pub const fn unbound() -> Self {
        Self { device: None }
    }
}

impl<D: TemperatureDevice> Sensor<D> {
    pub fn is_ready(&self) -> bool {
        self.device.as_ref().is_some_and(|d| d.is_ready())
    }

    /// Fetch one sample in °C.
    pub fn sample(&self) -> Result<f32, SensorError> {
        let device = self.device.as_ref().ok_or(SensorError::DeviceNotReady)?;
        if !device.is_ready() {
            return Err(SensorError::DeviceNotReady);
        }
        device.fetch().ok_or(SensorError::FetchFailed)
    }
}

/// Convert a sample to whole degrees, truncating toward zero.
///
/// Out-of-range and NaN inputs saturate (`as` semantics).
pub fn truncate_celsius(celsius: f32) -> i32 {
    celsius as i32
}
