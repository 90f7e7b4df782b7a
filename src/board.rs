//! nRF52840-DK glue: the user LED, Button 1 and the die temperature sensor.
//!
//! The service reaches the board only through the two plain functions
//! registered as callbacks ([`led_set`], [`button_get`]) and through
//! [`DieTemperature`].

use core::cell::RefCell;
use core::sync::atomic::{AtomicBool, Ordering};

use ble_lbs::config::{BUTTON_DEBOUNCE_MS, STATUS_BLINK_MS};
use ble_lbs::{Error, TemperatureDevice};
use defmt::{debug, info, warn};
use embassy_nrf::gpio::{AnyPin, Input, Level, Output, OutputDrive, Pull};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_time::{Duration, Timer};
use nrf_softdevice::{temperature_celsius, Softdevice};

use crate::ble::server::LbsServer;

/// LEDs on the DK are active-low.
fn led_level(on: bool) -> Level {
    if on {
        Level::Low
    } else {
        Level::High
    }
}

// User LED

static USER_LED: Mutex<CriticalSectionRawMutex, RefCell<Option<Output<'static>>>> =
    Mutex::new(RefCell::new(None));

/// Take ownership of the user LED pin, initially off.
pub fn init_user_led(pin: AnyPin) {
    let led = Output::new(pin, led_level(false), OutputDrive::Standard);
    USER_LED.lock(|l| *l.borrow_mut() = Some(led));
}

/// `led_set` callback.
pub fn led_set(on: bool) {
    USER_LED.lock(|l| {
        if let Some(led) = l.borrow_mut().as_mut() {
            led.set_level(led_level(on));
        }
    });
    info!("User LED {}", if on { "on" } else { "off" });
}

// Button 1

static BUTTON_PRESSED: AtomicBool = AtomicBool::new(false);

/// `button_get` callback: the last debounced level of Button 1.
pub fn button_get() -> bool {
    BUTTON_PRESSED.load(Ordering::Relaxed)
}

/// Debounce Button 1 and push every settled edge to the central.
///
/// Waits for any edge, lets the contacts settle, then samples the pin
/// (active-low with internal pull-up). Bounces that settle back to the
/// previous level are dropped.
pub async fn button_task(pin: AnyPin, server: &'static LbsServer) -> ! {
    let mut btn = Input::new(pin, Pull::Up);
    BUTTON_PRESSED.store(btn.is_low(), Ordering::Relaxed);

    loop {
        btn.wait_for_any_edge().await;
        Timer::after(Duration::from_millis(BUTTON_DEBOUNCE_MS)).await;

        let pressed = btn.is_low();
        if BUTTON_PRESSED.swap(pressed, Ordering::Relaxed) == pressed {
            continue;
        }
        info!("Button 1 {}", if pressed { "pressed" } else { "released" });

        match server.service().push_button_state(server, pressed) {
            Ok(()) => {}
            Err(Error::AccessDenied) => debug!("Button state not pushed: notifications off"),
            Err(e) => warn!("Button state push failed: {}", e),
        }
    }
}

// Status LED

static CONNECTED: AtomicBool = AtomicBool::new(false);

pub fn set_connected(connected: bool) {
    CONNECTED.store(connected, Ordering::Relaxed);
}

/// Blink the status LED while advertising, keep it lit while connected.
pub async fn status_led_task(pin: AnyPin) -> ! {
    let mut led = Output::new(pin, led_level(false), OutputDrive::Standard);
    let mut blink = false;

    loop {
        Timer::after(Duration::from_millis(STATUS_BLINK_MS / 2)).await;
        blink = !blink;
        let on = CONNECTED.load(Ordering::Relaxed) || blink;
        led.set_level(led_level(on));
    }
}

// Die temperature

/// The SoC die temperature, read through the SoftDevice.
pub struct DieTemperature {
    sd: &'static Softdevice,
}

impl DieTemperature {
    pub fn new(sd: &'static Softdevice) -> Self {
        Self { sd }
    }
}

impl TemperatureDevice for DieTemperature {
    fn fetch(&self) -> Option<f32> {
        match temperature_celsius(self.sd) {
            Ok(t) => Some(t.to_num::<f32>()),
            Err(e) => {
                warn!("Die temperature read failed: {:?}", e);
                None
            }
        }
    }
}
