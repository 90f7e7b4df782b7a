//! Bluetooth Low Energy subsystem.
//!
//! This module drives the Nordic SoftDevice S140 in **Peripheral** role:
//!
//! 1. **Advertiser** - advertises the LED Button Service UUID and the
//!    device name, accepting one central at a time.
//! 2. **Server** - serves the LED Button Service on the connection
//!    ([`server::LbsServer`]).
//! 3. **Bonder** - passkey pairing for the authenticated LED write.

pub mod bonder;
pub mod server;

use ble_lbs::config::{ADV_INTERVAL, DEVICE_NAME};
use ble_lbs::gatt::{Uuid, LBS_SERVICE_UUID};
use defmt::{info, warn};
use heapless::Vec;
use nrf_softdevice::ble::{gatt_server, peripheral};
use nrf_softdevice::{raw, Softdevice};

use crate::board;
use server::LbsServer;

/// Legacy advertising payload limit.
const ADV_LEN: usize = 31;

const AD_FLAGS: u8 = 0x01;
const AD_COMPLETE_UUID128: u8 = 0x07;
const AD_COMPLETE_NAME: u8 = 0x09;

/// Flags and complete local name.
fn adv_data() -> Vec<u8, ADV_LEN> {
    let mut data = Vec::new();
    let name = &DEVICE_NAME.as_bytes()[..DEVICE_NAME.len().min(ADV_LEN - 5)];
    let _ = data.extend_from_slice(&[
        0x02,
        AD_FLAGS,
        raw::BLE_GAP_ADV_FLAGS_LE_ONLY_GENERAL_DISC_MODE as u8,
        name.len() as u8 + 1,
        AD_COMPLETE_NAME,
    ]);
    let _ = data.extend_from_slice(name);
    data
}

/// The 128-bit LBS UUID, in the scan response.
fn scan_data() -> Vec<u8, ADV_LEN> {
    let mut data = Vec::new();
    if let Uuid::Uuid128(uuid) = LBS_SERVICE_UUID {
        let _ = data.extend_from_slice(&[uuid.len() as u8 + 1, AD_COMPLETE_UUID128]);
        let _ = data.extend_from_slice(&uuid);
    }
    data
}

/// Advertise, serve one central until it disconnects, repeat.
pub async fn advertiser_task(sd: &'static Softdevice, server: &'static LbsServer) -> ! {
    let adv_data = adv_data();
    let scan_data = scan_data();
    let bonder = bonder::bonder();
    let config = peripheral::Config {
        interval: ADV_INTERVAL,
        ..Default::default()
    };

    loop {
        let adv = peripheral::ConnectableAdvertisement::ScannableUndirected {
            adv_data: &adv_data,
            scan_data: &scan_data,
        };
        info!("Advertising as {}", DEVICE_NAME);
        let conn = match peripheral::advertise_pairable(sd, adv, &config, bonder).await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("Advertising failed: {:?}", e);
                continue;
            }
        };

        info!("Central connected: {}", conn.peer_address());
        server.attach(&conn);
        board::set_connected(true);

        let reason = gatt_server::run(&conn, server, |_| {}).await;
        info!("Central disconnected: {:?}", reason);

        server.detach();
        board::set_connected(false);
    }
}
