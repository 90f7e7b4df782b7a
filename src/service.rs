//! LED Button Service context: attribute handlers, subscription tracking
//! and the button-state notifier.
//!
//! All mutable state of the service lives in [`LedButtonService`], which
//! the transport and the application share by reference:
//!
//! - the transport calls [`on_read`](LedButtonService::on_read),
//!   [`on_write`](LedButtonService::on_write) and
//!   [`on_subscription_change`](LedButtonService::on_subscription_change)
//!   from its event context;
//! - the application calls [`register`](LedButtonService::register) once
//!   at startup and [`push_button_state`](LedButtonService::push_button_state)
//!   whenever it wants the central to learn about a button edge.
//!
//! The scalars are atomics and the callback set sits behind a blocking
//! mutex, so both paths may run concurrently.

use core::cell::Cell;
use core::sync::atomic::{AtomicBool, AtomicI32, Ordering};

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;

use crate::callbacks::Callbacks;
use crate::error::Error;
use crate::gatt::{self, read_window, Access, AttValue, Security};
use crate::sensor::{truncate_celsius, Sensor, TemperatureDevice};
use crate::subscription::{Subscription, SubscriptionState};
use crate::transport::Transport;

pub struct LedButtonService<M: RawMutex, D> {
    callbacks: Mutex<M, Cell<Callbacks>>,
    sensor: Sensor<D>,
    subscription: Subscription,
    button_state: AtomicBool,
    temperature: AtomicI32,
}

impl<M: RawMutex, D: TemperatureDevice> LedButtonService<M, D> {
    /// Service with no callbacks, button released, 0 °C, unsubscribed.
    pub const fn new(sensor: Sensor<D>) -> Self {
        Self {
            callbacks: Mutex::new(Cell::new(Callbacks::NONE)),
            sensor,
            subscription: Subscription::new(),
            button_state: AtomicBool::new(false),
            temperature: AtomicI32::new(0),
        }
    }

    /// Install the application callbacks. Calling again replaces them.
    pub fn register(&self, callbacks: Callbacks) {
        self.callbacks.lock(|c| c.set(callbacks));
        debug!(
            "Callbacks registered: led_set={} button_get={}",
            callbacks.led_set.is_some(),
            callbacks.button_get.is_some()
        );
    }

    // Copied out so callbacks never run with the lock held.
    fn callbacks(&self) -> Callbacks {
        self.callbacks.lock(|c| c.get())
    }

    /// Last button state sampled by a read.
    pub fn button_state(&self) -> bool {
        self.button_state.load(Ordering::Acquire)
    }

    /// Last temperature (°C) sampled by a read.
    pub fn temperature(&self) -> i32 {
        self.temperature.load(Ordering::Acquire)
    }

    pub fn subscription_state(&self) -> SubscriptionState {
        self.subscription.state()
    }

    // Transport entry points

    /// Handle an ATT read (or read blob) of `handle`.
    pub fn on_read(&self, handle: u16, offset: u16, max_len: usize) -> Result<AttValue, Error> {
        let attr = gatt::attribute(handle).ok_or(Error::InvalidHandle)?;
        debug!("Attribute read, handle: {}, offset: {}", handle, offset);

        if !attr.permissions.read {
            return Err(Error::ReadNotPermitted);
        }

        match attr.access {
            Access::ButtonValue => self.read_button(offset, max_len),
            Access::TemperatureValue => self.read_temperature(offset, max_len),
            Access::ButtonCccd => {
                read_window(&self.subscription.cccd_value().to_le_bytes(), offset, max_len)
            }
            Access::LedValue => Err(Error::ReadNotPermitted),
            Access::PrimaryService(_)
            | Access::CharacteristicDeclaration { .. }
            | Access::UserDescription(_) => {
                let value = attr.constant_value()?.unwrap_or_default();
                read_window(&value, offset, max_len)
            }
        }
    }

    /// Handle an ATT write of `data` to `handle` arriving on a link with
    /// the given `security`. Returns the number of bytes consumed.
    pub fn on_write(
        &self,
        handle: u16,
        data: &[u8],
        offset: u16,
        security: Security,
    ) -> Result<usize, Error> {
        let attr = gatt::attribute(handle).ok_or(Error::InvalidHandle)?;
        debug!(
            "Attribute write, handle: {}, len: {}, offset: {}",
            handle,
            data.len(),
            offset
        );

        if !attr.permissions.write {
            return Err(Error::WriteNotPermitted);
        }
        if attr.permissions.write_authenticated && security < Security::Authenticated {
            warn!("Write to handle {} rejected: link not authenticated", handle);
            return Err(Error::InsufficientAuthentication);
        }

        match attr.access {
            Access::LedValue => self.write_led(data, offset),
            Access::ButtonCccd => self.write_cccd(data, offset),
            _ => Err(Error::WriteNotPermitted),
        }
    }

    /// Subscription change reported by the stack for the descriptor at
    /// `handle`. Also called with `0` when the central disconnects.
    pub fn on_subscription_change(&self, handle: u16, value: u16) {
        if handle != gatt::BUTTON_CCCD_HANDLE {
            warn!("Subscription change for unexpected handle {}", handle);
            return;
        }
        self.subscription.on_descriptor_write(value);
    }

    // Attribute handlers

    /// LED characteristic write: exactly one byte, `0x00` or `0x01`, at
    /// offset 0.
    pub fn write_led(&self, data: &[u8], offset: u16) -> Result<usize, Error> {
        if data.len() != 1 {
            warn!("Write led: incorrect data length {}", data.len());
            return Err(Error::InvalidLength);
        }
        if offset != 0 {
            warn!("Write led: incorrect data offset {}", offset);
            return Err(Error::InvalidOffset);
        }

        let on = match data[0] {
            0x00 => false,
            0x01 => true,
            other => {
                warn!("Write led: incorrect value {}", other);
                return Err(Error::ValueNotAllowed);
            }
        };

        if !self.callbacks().set_led(on) {
            debug!("Write led: no led_set callback registered");
        }
        Ok(data.len())
    }

    /// Button characteristic read. Re-samples the button through the
    /// application callback; without one the read is empty.
    pub fn read_button(&self, offset: u16, max_len: usize) -> Result<AttValue, Error> {
        let Some(pressed) = self.callbacks().get_button() else {
            debug!("Read button: no button_get callback registered");
            return Ok(AttValue::new());
        };

        self.button_state.store(pressed, Ordering::Release);
        read_window(&[u8::from(pressed)], offset, max_len)
    }

    /// Temperature characteristic read.
    ///
    /// A sensor that is not ready yields an empty read; a failed fetch
    /// keeps serving the previous value.
    pub fn read_temperature(&self, offset: u16, max_len: usize) -> Result<AttValue, Error> {
        if !self.sensor.is_ready() {
            info!("Temperature sensor device not ready");
            return Ok(AttValue::new());
        }

        match self.sensor.sample() {
            Ok(celsius) => {
                let value = truncate_celsius(celsius);
                self.temperature.store(value, Ordering::Release);
                info!("Current die temperature: {} C", value);
            }
            Err(e) => warn!("Failed to fetch temperature sample: {:?}", e),
        }

        // Single signed byte on the air: low byte of the stored value.
        let value = self.temperature.load(Ordering::Acquire);
        read_window(&value.to_le_bytes()[..1], offset, max_len)
    }

    fn write_cccd(&self, data: &[u8], offset: u16) -> Result<usize, Error> {
        if data.len() != 2 {
            return Err(Error::InvalidLength);
        }
        if offset != 0 {
            return Err(Error::InvalidOffset);
        }
        self.subscription
            .on_descriptor_write(u16::from_le_bytes([data[0], data[1]]));
        Ok(data.len())
    }

    // Notifier

    /// Notify the central of `pressed` on the button characteristic.
    ///
    /// Fails with `AccessDenied` without touching the transport when the
    /// central has not enabled notifications. Does not update the stored
    /// button state.
    pub fn push_button_state<T: Transport>(&self, transport: &T, pressed: bool) -> Result<(), Error> {
        if !self.subscription.is_enabled() {
            return Err(Error::AccessDenied);
        }

        let handle = gatt::LBS_ATTRIBUTES[gatt::BUTTON_VALUE].handle;
        transport.notify(handle, &[u8::from(pressed)])?;
        trace!("Button state {} pushed", pressed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::gatt::{BUTTON_CCCD_HANDLE, BUTTON_VALUE_HANDLE, LED_VALUE_HANDLE, TEMPERATURE_VALUE_HANDLE};
    use crate::subscription::CCCD_NOTIFY;
    use core::cell::RefCell;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;
    use std::cell::Cell;

    // ════════════════════════════════════════════════════════════════════════
    // Test doubles
    // ════════════════════════════════════════════════════════════════════════

    thread_local! {
        static LED_CALLS: RefCell<Vec<bool>> = const { RefCell::new(Vec::new()) };
        static BUTTON: Cell<bool> = const { Cell::new(false) };
    }

    fn record_led(on: bool) {
        LED_CALLS.with(|c| c.borrow_mut().push(on));
    }

    fn led_calls() -> Vec<bool> {
        LED_CALLS.with(|c| c.borrow().clone())
    }

    fn sample_button() -> bool {
        BUTTON.with(|b| b.get())
    }

    fn press(pressed: bool) {
        BUTTON.with(|b| b.set(pressed));
    }

    struct ScriptedDevice {
        ready: Cell<bool>,
        next: Cell<Option<f32>>,
    }

    impl ScriptedDevice {
        fn new(next: Option<f32>) -> Self {
            Self {
                ready: Cell::new(true),
                next: Cell::new(next),
            }
        }
    }

    impl TemperatureDevice for ScriptedDevice {
        fn is_ready(&self) -> bool {
            self.ready.get()
        }

        fn fetch(&self) -> Option<f32> {
            self.next.get()
        }
    }

    #[derive(Default)]
    struct RecordingTransport {
        sent: RefCell<Vec<(u16, Vec<u8>)>>,
        fail_with: Cell<Option<TransportError>>,
    }

    impl Transport for RecordingTransport {
        fn notify(&self, handle: u16, data: &[u8]) -> Result<(), TransportError> {
            if let Some(e) = self.fail_with.get() {
                return Err(e);
            }
            self.sent.borrow_mut().push((handle, data.to_vec()));
            Ok(())
        }
    }

    type TestService<'a> = LedButtonService<NoopRawMutex, &'a ScriptedDevice>;

    fn service(device: &ScriptedDevice) -> TestService<'_> {
        LedButtonService::new(Sensor::new(device))
    }

    fn unbound_service() -> LedButtonService<NoopRawMutex, ScriptedDevice> {
        LedButtonService::new(Sensor::unbound())
    }

    // ════════════════════════════════════════════════════════════════════════
    // LED writes
    // ════════════════════════════════════════════════════════════════════════

    #[test]
    fn led_write_with_wrong_length_is_rejected() {
        let svc = unbound_service();
        svc.register(Callbacks::new(record_led, sample_button));

        assert_eq!(svc.write_led(&[], 0), Err(Error::InvalidLength));
        assert_eq!(svc.write_led(&[0x01, 0x00], 0), Err(Error::InvalidLength));
        assert_eq!(svc.write_led(&[0x01; 20], 0), Err(Error::InvalidLength));
        assert!(led_calls().is_empty());
    }

    #[test]
    fn led_write_with_offset_is_rejected() {
        let svc = unbound_service();
        svc.register(Callbacks::new(record_led, sample_button));

        assert_eq!(svc.write_led(&[0x01], 1), Err(Error::InvalidOffset));
        assert!(led_calls().is_empty());
    }

    #[test]
    fn led_write_with_value_outside_zero_one_is_rejected() {
        let svc = unbound_service();
        svc.register(Callbacks::new(record_led, sample_button));

        for value in [0x02, 0x10, 0x7F, 0xFF] {
            assert_eq!(svc.write_led(&[value], 0), Err(Error::ValueNotAllowed));
        }
        assert!(led_calls().is_empty());
    }

    #[test]
    fn led_write_one_turns_led_on() {
        let svc = unbound_service();
        svc.register(Callbacks::new(record_led, sample_button));

        assert_eq!(svc.write_led(&[0x01], 0), Ok(1));
        assert_eq!(led_calls(), vec![true]);
    }

    #[test]
    fn led_write_without_callback_still_validates() {
        let svc = unbound_service();

        assert_eq!(svc.write_led(&[0x00], 0), Ok(1));
        assert_eq!(svc.write_led(&[0x05], 0), Err(Error::ValueNotAllowed));
    }

    #[test]
    fn register_twice_last_write_wins() {
        let svc = unbound_service();
        svc.register(Callbacks::NONE);
        svc.register(Callbacks::new(record_led, sample_button));

        svc.write_led(&[0x00], 0).unwrap();
        assert_eq!(led_calls(), vec![false]);

        svc.register(Callbacks::NONE);
        svc.write_led(&[0x01], 0).unwrap();
        assert_eq!(led_calls(), vec![false]);
    }

    // ════════════════════════════════════════════════════════════════════════
    // Button reads
    // ════════════════════════════════════════════════════════════════════════

    #[test]
    fn button_read_without_callback_is_empty() {
        let svc = unbound_service();
        let value = svc.read_button(0, 22).unwrap();
        assert!(value.is_empty());
        assert!(!svc.button_state());
    }

    #[test]
    fn button_read_resamples_state() {
        let svc = unbound_service();
        svc.register(Callbacks::new(record_led, sample_button));

        press(true);
        assert_eq!(&svc.read_button(0, 22).unwrap()[..], &[0x01]);
        assert!(svc.button_state());

        press(false);
        assert_eq!(&svc.read_button(0, 22).unwrap()[..], &[0x00]);
        assert!(!svc.button_state());
    }

    #[test]
    fn button_read_respects_offset_window() {
        let svc = unbound_service();
        svc.register(Callbacks::new(record_led, sample_button));
        press(true);

        assert!(svc.read_button(1, 22).unwrap().is_empty());
        assert!(svc.read_button(0, 0).unwrap().is_empty());
        assert_eq!(svc.read_button(2, 22), Err(Error::InvalidOffset));
    }

    // ════════════════════════════════════════════════════════════════════════
    // Temperature reads
    // ════════════════════════════════════════════════════════════════════════

    #[test]
    fn temperature_read_truncates_sample() {
        let device = ScriptedDevice::new(Some(24.9));
        let svc = service(&device);

        assert_eq!(&svc.read_temperature(0, 22).unwrap()[..], &[24]);
        assert_eq!(svc.temperature(), 24);
    }

    #[test]
    fn negative_temperature_goes_out_as_signed_byte() {
        let device = ScriptedDevice::new(Some(-7.5));
        let svc = service(&device);

        assert_eq!(&svc.read_temperature(0, 22).unwrap()[..], &[(-7i8) as u8]);
        assert_eq!(svc.temperature(), -7);
    }

    #[test]
    fn temperature_read_with_device_not_ready_is_empty() {
        let device = ScriptedDevice::new(Some(30.0));
        device.ready.set(false);
        let svc = service(&device);

        assert!(svc.read_temperature(0, 22).unwrap().is_empty());
        assert_eq!(svc.temperature(), 0);
    }

    #[test]
    fn temperature_read_with_unbound_sensor_is_empty() {
        let svc = unbound_service();
        assert!(svc.read_temperature(0, 22).unwrap().is_empty());
        assert_eq!(svc.temperature(), 0);
    }

    #[test]
    fn failed_fetch_keeps_previous_value() {
        let device = ScriptedDevice::new(Some(21.3));
        let svc = service(&device);
        svc.read_temperature(0, 22).unwrap();

        device.next.set(None);
        assert_eq!(&svc.read_temperature(0, 22).unwrap()[..], &[21]);
        assert_eq!(svc.temperature(), 21);
    }

    #[test]
    fn not_ready_after_sample_keeps_value_but_reads_empty() {
        let device = ScriptedDevice::new(Some(19.0));
        let svc = service(&device);
        svc.read_temperature(0, 22).unwrap();

        device.ready.set(false);
        assert!(svc.read_temperature(0, 22).unwrap().is_empty());
        assert_eq!(svc.temperature(), 19);
    }

    // ════════════════════════════════════════════════════════════════════════
    // Subscription + notifier
    // ════════════════════════════════════════════════════════════════════════

    #[test]
    fn push_before_subscription_is_denied() {
        let svc = unbound_service();
        let transport = RecordingTransport::default();

        assert_eq!(svc.push_button_state(&transport, true), Err(Error::AccessDenied));
        assert!(transport.sent.borrow().is_empty());
    }

    #[test]
    fn push_after_enable_sends_exactly_once() {
        let svc = unbound_service();
        let transport = RecordingTransport::default();

        svc.on_subscription_change(BUTTON_CCCD_HANDLE, CCCD_NOTIFY);
        assert_eq!(svc.push_button_state(&transport, true), Ok(()));

        let sent = transport.sent.borrow();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0], (BUTTON_VALUE_HANDLE, vec![0x01]));
    }

    #[test]
    fn push_after_disable_is_denied_again() {
        let svc = unbound_service();
        let transport = RecordingTransport::default();

        svc.on_subscription_change(BUTTON_CCCD_HANDLE, CCCD_NOTIFY);
        svc.on_subscription_change(BUTTON_CCCD_HANDLE, 0x0002);
        assert_eq!(svc.push_button_state(&transport, false), Err(Error::AccessDenied));

        svc.on_subscription_change(BUTTON_CCCD_HANDLE, 0x0000);
        assert_eq!(svc.push_button_state(&transport, false), Err(Error::AccessDenied));
        assert!(transport.sent.borrow().is_empty());
    }

    #[test]
    fn push_does_not_touch_button_state() {
        let svc = unbound_service();
        let transport = RecordingTransport::default();
        svc.on_subscription_change(BUTTON_CCCD_HANDLE, CCCD_NOTIFY);

        svc.push_button_state(&transport, true).unwrap();
        assert!(!svc.button_state());
    }

    #[test]
    fn push_surfaces_transport_failure() {
        let svc = unbound_service();
        let transport = RecordingTransport::default();
        transport.fail_with.set(Some(TransportError::NotConnected));
        svc.on_subscription_change(BUTTON_CCCD_HANDLE, CCCD_NOTIFY);

        assert_eq!(
            svc.push_button_state(&transport, true),
            Err(Error::Transport(TransportError::NotConnected))
        );
    }

    #[test]
    fn subscription_change_on_other_handle_is_ignored() {
        let svc = unbound_service();
        svc.on_subscription_change(BUTTON_VALUE_HANDLE, CCCD_NOTIFY);
        assert_eq!(svc.subscription_state(), SubscriptionState::Disabled);
    }

    // ════════════════════════════════════════════════════════════════════════
    // Generic dispatch
    // ════════════════════════════════════════════════════════════════════════

    #[test]
    fn dispatch_rejects_unknown_handles() {
        let svc = unbound_service();
        assert_eq!(svc.on_read(0, 0, 22), Err(Error::InvalidHandle));
        assert_eq!(svc.on_write(42, &[1], 0, Security::Authenticated), Err(Error::InvalidHandle));
    }

    #[test]
    fn led_is_not_readable() {
        let svc = unbound_service();
        assert_eq!(svc.on_read(LED_VALUE_HANDLE, 0, 22), Err(Error::ReadNotPermitted));
    }

    #[test]
    fn led_write_needs_authenticated_link() {
        let svc = unbound_service();
        svc.register(Callbacks::new(record_led, sample_button));

        for security in [Security::Open, Security::Encrypted] {
            assert_eq!(
                svc.on_write(LED_VALUE_HANDLE, &[0x01], 0, security),
                Err(Error::InsufficientAuthentication)
            );
        }
        assert!(led_calls().is_empty());

        assert_eq!(svc.on_write(LED_VALUE_HANDLE, &[0x01], 0, Security::Authenticated), Ok(1));
        assert_eq!(led_calls(), vec![true]);
    }

    #[test]
    fn read_only_attributes_reject_writes() {
        let svc = unbound_service();
        for handle in [1, 2, BUTTON_VALUE_HANDLE, TEMPERATURE_VALUE_HANDLE, 7, 8] {
            assert_eq!(
                svc.on_write(handle, &[0x01], 0, Security::Authenticated),
                Err(Error::WriteNotPermitted)
            );
        }
    }

    #[test]
    fn cccd_write_drives_subscription() {
        let svc = unbound_service();

        assert_eq!(svc.on_write(BUTTON_CCCD_HANDLE, &[0x01, 0x00], 0, Security::Open), Ok(2));
        assert_eq!(svc.subscription_state(), SubscriptionState::Enabled);
        assert_eq!(&svc.on_read(BUTTON_CCCD_HANDLE, 0, 22).unwrap()[..], &[0x01, 0x00]);

        assert_eq!(svc.on_write(BUTTON_CCCD_HANDLE, &[0x02, 0x00], 0, Security::Open), Ok(2));
        assert_eq!(svc.subscription_state(), SubscriptionState::Disabled);
        assert_eq!(&svc.on_read(BUTTON_CCCD_HANDLE, 0, 22).unwrap()[..], &[0x00, 0x00]);
    }

    #[test]
    fn cccd_write_validates_shape() {
        let svc = unbound_service();
        assert_eq!(svc.on_write(BUTTON_CCCD_HANDLE, &[0x01], 0, Security::Open), Err(Error::InvalidLength));
        assert_eq!(svc.on_write(BUTTON_CCCD_HANDLE, &[0x01, 0x00], 1, Security::Open), Err(Error::InvalidOffset));
        assert_eq!(svc.subscription_state(), SubscriptionState::Disabled);
    }

    #[test]
    fn description_supports_partial_reads() {
        let svc = unbound_service();
        let first = svc.on_read(7, 0, 10).unwrap();
        let rest = svc.on_read(7, 10, 22).unwrap();
        assert_eq!(&first[..], b"Temperatur");
        assert_eq!(&rest[..], b"e sensor value");
    }

    #[test]
    fn dispatch_routes_value_reads_to_handlers() {
        let device = ScriptedDevice::new(Some(36.6));
        let svc = service(&device);
        svc.register(Callbacks::new(record_led, sample_button));
        press(true);

        assert_eq!(&svc.on_read(BUTTON_VALUE_HANDLE, 0, 22).unwrap()[..], &[0x01]);
        assert_eq!(&svc.on_read(TEMPERATURE_VALUE_HANDLE, 0, 22).unwrap()[..], &[36]);
    }

    // ════════════════════════════════════════════════════════════════════════
    // Scenario
    // ════════════════════════════════════════════════════════════════════════

    #[test]
    fn led_then_button_scenario() {
        fn always_pressed() -> bool {
            true
        }

        let svc = unbound_service();
        svc.register(Callbacks::new(record_led, always_pressed));

        assert_eq!(svc.write_led(&[0x00], 0), Ok(1));
        assert_eq!(led_calls(), vec![false]);

        assert_eq!(&svc.read_button(0, 22).unwrap()[..], &[0x01]);
        assert!(svc.button_state());
    }
}
