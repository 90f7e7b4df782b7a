//! SoftDevice GATT server for the LED Button Service.
//!
//! The SoftDevice owns the attribute database and assigns its own handles.
//! [`register`] builds the service from the shared attribute table and
//! records where each attribute landed; [`LbsServer`] translates between
//! SoftDevice handles and table handles so every value access goes through
//! the [`LbsService`] handlers.

use core::cell::RefCell;

use ble_lbs::config::{ATT_MTU, TEMPERATURE_DESCRIPTION};
use ble_lbs::gatt::{
    self, Access, Permissions, Properties as LbsProperties, Uuid as LbsUuid, BUTTON_CCCD_HANDLE, BUTTON_VALUE_HANDLE, LBS_ATTRIBUTES,
    LED_VALUE_HANDLE, TEMPERATURE_VALUE_HANDLE,
};
use ble_lbs::{Error, Security, Transport, TransportError};
use defmt::{debug, info, warn};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use nrf_softdevice::ble::gatt_server::builder::ServiceBuilder;
use nrf_softdevice::ble::gatt_server::characteristic::{Attribute, Metadata, Properties};
use nrf_softdevice::ble::gatt_server::{
    self, DeferredReadReply, DeferredWriteReply, NotifyValueError, RegisterError, WriteOp,
};
use nrf_softdevice::ble::{Connection, GattError, SecurityMode, Uuid};
use nrf_softdevice::Softdevice;

use crate::LbsService;

/// Characteristic User Description descriptor.
const CUD_UUID: u16 = 0x2901;

/// Largest read payload for the configured MTU (ATT_MTU - 1 opcode byte).
const MAX_READ_LEN: usize = ATT_MTU as usize - 1;

/// SoftDevice handles of the attributes the service handles itself.
#[derive(Clone, Copy, defmt::Format)]
pub struct Handles {
    button_value: u16,
    button_cccd: u16,
    temperature_value: u16,
    led_value: u16,
}

impl Handles {
    fn to_table(&self, sd_handle: u16) -> Option<u16> {
        match sd_handle {
            h if h == self.button_value => Some(BUTTON_VALUE_HANDLE),
            h if h == self.button_cccd => Some(BUTTON_CCCD_HANDLE),
            h if h == self.temperature_value => Some(TEMPERATURE_VALUE_HANDLE),
            h if h == self.led_value => Some(LED_VALUE_HANDLE),
            _ => None,
        }
    }

    fn to_softdevice(&self, handle: u16) -> Option<u16> {
        match handle {
            BUTTON_VALUE_HANDLE => Some(self.button_value),
            BUTTON_CCCD_HANDLE => Some(self.button_cccd),
            TEMPERATURE_VALUE_HANDLE => Some(self.temperature_value),
            LED_VALUE_HANDLE => Some(self.led_value),
            _ => None,
        }
    }
}

fn sd_uuid(uuid: LbsUuid) -> Uuid {
    match uuid {
        LbsUuid::Uuid16(short) => Uuid::new_16(short),
        LbsUuid::Uuid128(bytes) => Uuid::new_128(&bytes),
    }
}

fn read_security(permissions: Permissions) -> SecurityMode {
    if permissions.read {
        SecurityMode::Open
    } else {
        SecurityMode::NoAccess
    }
}

fn write_security(permissions: Permissions) -> SecurityMode {
    match (permissions.write, permissions.write_authenticated) {
        (false, _) => SecurityMode::NoAccess,
        (true, true) => SecurityMode::Mitm,
        (true, false) => SecurityMode::Open,
    }
}

fn characteristic_uuid(position: usize) -> Uuid {
    sd_uuid(LBS_ATTRIBUTES[position].uuid)
}

fn value_permissions(position: usize) -> Permissions {
    LBS_ATTRIBUTES[position].permissions
}

/// Characteristic properties as declared at `declaration` in the table.
fn declared_properties(declaration: usize) -> Properties {
    let mut sd = Properties::new();
    if let Access::CharacteristicDeclaration { properties, .. } = LBS_ATTRIBUTES[declaration].access {
        if properties.contains(LbsProperties::READ) {
            sd = sd.read();
        }
        if properties.contains(LbsProperties::WRITE) {
            sd = sd.write();
        }
        if properties.contains(LbsProperties::NOTIFY) {
            sd = sd.notify();
        }
    }
    sd
}

/// Register the service with the SoftDevice.
///
/// Value attributes are deferred so the SoftDevice hands every read and
/// write of them to [`LbsServer`]. Readable values are variable length
/// since a read without a source comes back empty. The user description
/// is constant and stays in SoftDevice memory.
pub fn register(sd: &mut Softdevice) -> Result<Handles, RegisterError> {
    let mut sb = ServiceBuilder::new(sd, sd_uuid(gatt::LBS_SERVICE_UUID))?;

    let button = sb
        .add_characteristic(
            characteristic_uuid(gatt::BUTTON_VALUE),
            Attribute::new([0u8])
                .read_security(read_security(value_permissions(gatt::BUTTON_VALUE)))
                .variable_len(1)
                .deferred_read(),
            Metadata::new(declared_properties(gatt::BUTTON_DECLARATION)),
        )?
        .build();

    let mut temperature = sb.add_characteristic(
        characteristic_uuid(gatt::TEMPERATURE_VALUE),
        Attribute::new([0u8])
            .read_security(read_security(value_permissions(gatt::TEMPERATURE_VALUE)))
            .variable_len(1)
            .deferred_read(),
        Metadata::new(declared_properties(gatt::TEMPERATURE_DECLARATION)),
    )?;
    temperature.add_descriptor(
        Uuid::new_16(CUD_UUID),
        Attribute::new(TEMPERATURE_DESCRIPTION.as_bytes()),
    )?;
    let temperature = temperature.build();

    let led = sb
        .add_characteristic(
            characteristic_uuid(gatt::LED_VALUE),
            Attribute::new([0u8])
                .read_security(read_security(value_permissions(gatt::LED_VALUE)))
                .write_security(write_security(value_permissions(gatt::LED_VALUE)))
                .deferred_write(),
            Metadata::new(declared_properties(gatt::LED_DECLARATION)),
        )?
        .build();

    let _service = sb.build();

    let handles = Handles {
        button_value: button.value_handle,
        button_cccd: button.cccd_handle,
        temperature_value: temperature.value_handle,
        led_value: led.value_handle,
    };
    info!("LBS registered: {}", handles);
    Ok(handles)
}

/// Link security the core checks the LED write against.
fn security_of(mode: SecurityMode) -> Security {
    match mode {
        SecurityMode::Mitm | SecurityMode::LescMitm | SecurityMode::SignedMitm => {
            Security::Authenticated
        }
        SecurityMode::JustWorks | SecurityMode::Signed => Security::Encrypted,
        _ => Security::Open,
    }
}

/// Report a core error to the peer as its ATT code.
fn gatt_error(e: Error) -> GattError {
    e.att_code()
        .and_then(|code| GattError::new(0x0100 | u16::from(code)))
        .unwrap_or(GattError::ATTERR_UNLIKELY_ERROR)
}

pub struct LbsServer {
    service: &'static LbsService,
    handles: Handles,
    conn: Mutex<CriticalSectionRawMutex, RefCell<Option<Connection>>>,
}

impl LbsServer {
    pub fn new(service: &'static LbsService, handles: Handles) -> Self {
        Self {
            service,
            handles,
            conn: Mutex::new(RefCell::new(None)),
        }
    }

    pub fn service(&self) -> &'static LbsService {
        self.service
    }

    pub fn attach(&self, conn: &Connection) {
        self.conn.lock(|c| *c.borrow_mut() = Some(conn.clone()));
    }

    /// Forget the link. The SoftDevice drops CCCD state on disconnect,
    /// so the subscription is cleared with it.
    pub fn detach(&self) {
        self.conn.lock(|c| *c.borrow_mut() = None);
        self.service.on_subscription_change(BUTTON_CCCD_HANDLE, 0);
    }

    fn security(&self) -> Security {
        self.conn.lock(|c| {
            c.borrow()
                .as_ref()
                .map(|conn| security_of(conn.security_mode()))
                .unwrap_or(Security::Open)
        })
    }
}

impl gatt_server::Server for LbsServer {
    type Event = ();

    fn on_write(
        &self,
        _conn: &Connection,
        handle: u16,
        _op: WriteOp,
        _offset: usize,
        data: &[u8],
    ) -> Option<Self::Event> {
        // The SoftDevice stores the CCCD itself and only reports the write.
        if handle == self.handles.button_cccd {
            if let &[lo, hi] = data {
                self.service
                    .on_subscription_change(BUTTON_CCCD_HANDLE, u16::from_le_bytes([lo, hi]));
            }
        } else {
            debug!("Unhandled write to handle {}", handle);
        }
        None
    }

    fn on_deferred_read(
        &self,
        handle: u16,
        offset: usize,
        reply: DeferredReadReply,
    ) -> Option<Self::Event> {
        let offset = u16::try_from(offset).unwrap_or(u16::MAX);
        let result = match self.handles.to_table(handle) {
            Some(handle) => self.service.on_read(handle, offset, MAX_READ_LEN),
            None => Err(Error::InvalidHandle),
        };

        let sent = match result {
            Ok(value) => reply.reply(Ok(Some(&value[..]))),
            Err(e) => reply.reply(Err(gatt_error(e))),
        };
        if let Err(e) = sent {
            warn!("Deferred read reply failed: {:?}", e);
        }
        None
    }

    fn on_deferred_write(
        &self,
        handle: u16,
        _op: WriteOp,
        offset: usize,
        data: &[u8],
        reply: DeferredWriteReply,
    ) -> Option<Self::Event> {
        let offset = u16::try_from(offset).unwrap_or(u16::MAX);
        let result = match self.handles.to_table(handle) {
            Some(handle) => self.service.on_write(handle, data, offset, self.security()),
            None => Err(Error::InvalidHandle),
        };

        let sent = match result {
            Ok(_) => reply.reply(Ok(None)),
            Err(e) => reply.reply(Err(gatt_error(e))),
        };
        if let Err(e) = sent {
            warn!("Deferred write reply failed: {:?}", e);
        }
        None
    }
}

impl Transport for LbsServer {
    fn notify(&self, handle: u16, data: &[u8]) -> Result<(), TransportError> {
        let sd_handle = self
            .handles
            .to_softdevice(handle)
            .ok_or(TransportError::UnknownHandle(handle))?;

        self.conn.lock(|c| {
            let c = c.borrow();
            let conn = c.as_ref().ok_or(TransportError::NotConnected)?;
            gatt_server::notify_value(conn, sd_handle, data).map_err(|e| match e {
                NotifyValueError::Disconnected => TransportError::NotConnected,
                NotifyValueError::Raw(raw) => TransportError::Raw(raw as u32),
            })
        })
    }
}
