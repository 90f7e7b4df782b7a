//! LED Button Service (LBS) - the attribute service state machine.
//!
//! This crate holds the hardware-independent part of the peripheral:
//! the attribute table, the per-attribute read/write handlers, the
//! notification subscription flag and the application callback contract.
//! It is `no_std` and runs unchanged on the nRF52840 and on the host.
//!
//! Usage: `cargo test --lib`
//!
//! Note: The embedded binary uses main.rs with #![no_std] and #![no_main]
//! and plugs the SoftDevice in as the transport and the die temperature
//! as the sensor (`--features embedded`).

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod callbacks;
pub mod config;
pub mod error;
pub mod gatt;
pub mod sensor;
pub mod service;
pub mod subscription;
pub mod transport;

pub use callbacks::Callbacks;
pub use error::{Error, SensorError, TransportError};
pub use gatt::{AttValue, Security};
pub use sensor::{Sensor, TemperatureDevice};
pub use service::LedButtonService;
pub use subscription::SubscriptionState;
pub use transport::Transport;
