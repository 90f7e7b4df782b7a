//! LED Button Service peripheral - firmware entry point.
//!
//! Target: nRF52840-DK with SoftDevice S140.
//!
//! Tasks:
//!   - `softdevice_task`  : runs the SoftDevice event loop
//!   - `advertiser_task`  : advertises, then serves the connected central
//!   - `button_task`      : debounces Button 1 and notifies the central
//!   - `status_led_task`  : advertising / connection indication on LED 1

#![no_std]
#![no_main]

mod ble;
mod board;

use core::mem;

use ble_lbs::config::{ATT_MTU, DEVICE_NAME};
use ble_lbs::{Callbacks, LedButtonService, Sensor};
use defmt::{info, unwrap};
use embassy_executor::Spawner;
use embassy_nrf::gpio::{AnyPin, Pin};
use embassy_nrf::interrupt::Priority;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use nrf_softdevice::{raw, Softdevice};
use static_cell::StaticCell;

use ble::server::{self, LbsServer};
use board::DieTemperature;

use {defmt_rtt as _, panic_probe as _};

/// The service as wired on this board.
pub type LbsService = LedButtonService<CriticalSectionRawMutex, DieTemperature>;

// Tasks

#[embassy_executor::task]
async fn softdevice_task(sd: &'static Softdevice) {
    sd.run().await;
}

#[embassy_executor::task]
async fn advertiser_task(sd: &'static Softdevice, server: &'static LbsServer) {
    ble::advertiser_task(sd, server).await
}

#[embassy_executor::task]
async fn button_task(pin: AnyPin, server: &'static LbsServer) {
    board::button_task(pin, server).await
}

#[embassy_executor::task]
async fn status_led_task(pin: AnyPin) {
    board::status_led_task(pin).await
}

fn softdevice_config() -> nrf_softdevice::Config {
    nrf_softdevice::Config {
        clock: Some(raw::nrf_clock_lf_cfg_t {
            source: raw::NRF_CLOCK_LF_SRC_RC as u8,
            rc_ctiv: 16,
            rc_temp_ctiv: 2,
            accuracy: raw::NRF_CLOCK_LF_ACCURACY_500_PPM as u8,
        }),
        conn_gap: Some(raw::ble_gap_conn_cfg_t {
            conn_count: 1,
            event_length: 24,
        }),
        conn_gatt: Some(raw::ble_gatt_conn_cfg_t { att_mtu: ATT_MTU }),
        gatts_attr_tab_size: Some(raw::ble_gatts_cfg_attr_tab_size_t {
            attr_tab_size: raw::BLE_GATTS_ATTR_TAB_SIZE_DEFAULT,
        }),
        gap_role_count: Some(raw::ble_gap_cfg_role_count_t {
            adv_set_count: 1,
            periph_role_count: 1,
        }),
        gap_device_name: Some(raw::ble_gap_cfg_device_name_t {
            p_value: DEVICE_NAME.as_ptr() as _,
            current_len: DEVICE_NAME.len() as u16,
            max_len: DEVICE_NAME.len() as u16,
            write_perm: unsafe { mem::zeroed() },
            _bitfield_1: raw::ble_gap_cfg_device_name_t::new_bitfield_1(
                raw::BLE_GATTS_VLOC_STACK as u8,
            ),
        }),
        ..Default::default()
    }
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("LED Button Service starting");

    // The SoftDevice reserves interrupt priorities 0, 1 and 4.
    let mut config = embassy_nrf::config::Config::default();
    config.gpiote_interrupt_priority = Priority::P2;
    config.time_interrupt_priority = Priority::P2;
    let p = embassy_nrf::init(config);

    // - Board ---------------------------------------------------
    board::init_user_led(p.P0_15.degrade());

    // - SoftDevice & GATT ---------------------------------------
    let sd = Softdevice::enable(&softdevice_config());
    let handles = unwrap!(server::register(sd));
    let sd: &'static Softdevice = sd;

    static SERVICE: StaticCell<LbsService> = StaticCell::new();
    let service: &'static LbsService =
        SERVICE.init(LedButtonService::new(Sensor::new(DieTemperature::new(sd))));
    service.register(Callbacks::new(board::led_set, board::button_get));

    static SERVER: StaticCell<LbsServer> = StaticCell::new();
    let server: &'static LbsServer = SERVER.init(LbsServer::new(service, handles));

    // - Spawn tasks ---------------------------------------------
    unwrap!(spawner.spawn(softdevice_task(sd)));
    unwrap!(spawner.spawn(advertiser_task(sd, server)));
    unwrap!(spawner.spawn(button_task(p.P0_11.degrade(), server)));
    unwrap!(spawner.spawn(status_led_task(p.P0_13.degrade())));

    info!("All tasks spawned");
}
