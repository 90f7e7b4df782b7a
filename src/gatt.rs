//! Attribute table of the LED Button Service.
//!
//! The service is declared once, in a fixed order, the way a GATT server
//! lays it out in its attribute database:
//!
//! ```text
//! Pos  Handle  Attribute                               Permissions
//!  0    0x01   Primary service (LBS)                   read
//!  1    0x02   Button characteristic declaration       read
//!  2    0x03   Button value                            read (+notify)
//!  3    0x04   Button CCCD (0x2902)                    read, write
//!  4    0x05   Temperature characteristic declaration  read
//!  5    0x06   Temperature value                       read (+notify)
//!  6    0x07   Temperature user description (0x2901)   read
//!  7    0x08   LED characteristic declaration          read
//!  8    0x09   LED value                               write (authenticated)
//! ```
//!
//! Positions never change; the notifier targets position 2.

use crate::config::{ATT_VALUE_MAX, TEMPERATURE_DESCRIPTION};
use crate::error::Error;

/// Buffer holding one serialized attribute value (or a window of it).
pub type AttValue = heapless::Vec<u8, ATT_VALUE_MAX>;

/// Attribute type UUID.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Uuid {
    /// Bluetooth SIG assigned 16-bit UUID.
    Uuid16(u16),
    /// Vendor UUID, stored little-endian as it goes on the air.
    Uuid128([u8; 16]),
}

impl Uuid {
    pub const fn from_u128(uuid: u128) -> Self {
        Uuid::Uuid128(uuid.to_le_bytes())
    }

    /// Append the on-air (little-endian) encoding to `out`.
    fn encode(&self, out: &mut AttValue) -> Result<(), Error> {
        let written = match self {
            Uuid::Uuid16(u) => out.extend_from_slice(&u.to_le_bytes()),
            Uuid::Uuid128(bytes) => out.extend_from_slice(bytes),
        };
        written.map_err(|_| Error::InvalidLength)
    }
}

// UUIDs

/// Nordic LED Button Service.
pub const LBS_SERVICE_UUID: Uuid = Uuid::from_u128(0x00001523_1212_efde_1523_785feabcd123);
/// Button state characteristic.
pub const LBS_BUTTON_UUID: Uuid = Uuid::from_u128(0x00001524_1212_efde_1523_785feabcd123);
/// LED characteristic.
pub const LBS_LED_UUID: Uuid = Uuid::from_u128(0x00001525_1212_efde_1523_785feabcd123);
/// Die temperature characteristic.
pub const LBS_TEMPERATURE_UUID: Uuid = Uuid::from_u128(0x00001526_1212_efde_1523_785feabcd123);

const PRIMARY_SERVICE_UUID: Uuid = Uuid::Uuid16(0x2800);
const CHARACTERISTIC_UUID: Uuid = Uuid::Uuid16(0x2803);
const USER_DESCRIPTION_UUID: Uuid = Uuid::Uuid16(0x2901);
const CCCD_UUID: Uuid = Uuid::Uuid16(0x2902);

/// Characteristic properties bitfield, as carried in a declaration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Properties(u8);

impl Properties {
    pub const READ: Properties = Properties(0x02);
    pub const WRITE: Properties = Properties(0x08);
    pub const NOTIFY: Properties = Properties(0x10);

    pub const fn union(self, other: Properties) -> Properties {
        Properties(self.0 | other.0)
    }

    pub const fn contains(self, other: Properties) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn bits(self) -> u8 {
        self.0
    }
}

/// Access permissions of one attribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Permissions {
    pub read: bool,
    pub write: bool,
    /// Writes need an authenticated (MITM-protected) link.
    pub write_authenticated: bool,
}

impl Permissions {
    pub const READ: Permissions = Permissions {
        read: true,
        write: false,
        write_authenticated: false,
    };
    pub const READ_WRITE: Permissions = Permissions {
        read: true,
        write: true,
        write_authenticated: false,
    };
    pub const WRITE_AUTHEN: Permissions = Permissions {
        read: false,
        write: true,
        write_authenticated: true,
    };
}

/// Security level of the link an access arrives on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Security {
    /// No encryption.
    Open,
    /// Encrypted with unauthenticated (Just Works) keys.
    Encrypted,
    /// Encrypted with MITM-protected keys.
    Authenticated,
}

/// Which handler backs an attribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    PrimaryService(Uuid),
    CharacteristicDeclaration {
        properties: Properties,
        value_handle: u16,
        uuid: Uuid,
    },
    ButtonValue,
    ButtonCccd,
    TemperatureValue,
    UserDescription(&'static str),
    LedValue,
}

/// One entry of the attribute table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Attribute {
    pub handle: u16,
    pub uuid: Uuid,
    pub permissions: Permissions,
    pub access: Access,
}

impl Attribute {
    /// Serialized value of constant (metadata) attributes, `None` for
    /// attributes backed by live state.
    pub fn constant_value(&self) -> Result<Option<AttValue>, Error> {
        let mut value = AttValue::new();
        match self.access {
            Access::PrimaryService(uuid) => uuid.encode(&mut value)?,
            Access::CharacteristicDeclaration {
                properties,
                value_handle,
                uuid,
            } => {
                value
                    .push(properties.bits())
                    .map_err(|_| Error::InvalidLength)?;
                value
                    .extend_from_slice(&value_handle.to_le_bytes())
                    .map_err(|_| Error::InvalidLength)?;
                uuid.encode(&mut value)?;
            }
            Access::UserDescription(text) => value
                .extend_from_slice(text.as_bytes())
                .map_err(|_| Error::InvalidLength)?,
            Access::ButtonValue
            | Access::ButtonCccd
            | Access::TemperatureValue
            | Access::LedValue => return Ok(None),
        }
        Ok(Some(value))
    }
}

// Positions

pub const SERVICE: usize = 0;
pub const BUTTON_DECLARATION: usize = 1;
pub const BUTTON_VALUE: usize = 2;
pub const BUTTON_CCCD: usize = 3;
pub const TEMPERATURE_DECLARATION: usize = 4;
pub const TEMPERATURE_VALUE: usize = 5;
pub const TEMPERATURE_DESCRIPTION_POS: usize = 6;
pub const LED_DECLARATION: usize = 7;
pub const LED_VALUE: usize = 8;

/// Handle of the attribute at `position`. Handles are 1-based.
pub const fn handle_of(position: usize) -> u16 {
    position as u16 + 1
}

pub const BUTTON_VALUE_HANDLE: u16 = handle_of(BUTTON_VALUE);
pub const BUTTON_CCCD_HANDLE: u16 = handle_of(BUTTON_CCCD);
pub const TEMPERATURE_VALUE_HANDLE: u16 = handle_of(TEMPERATURE_VALUE);
pub const LED_VALUE_HANDLE: u16 = handle_of(LED_VALUE);

/// The LED Button Service.
pub static LBS_ATTRIBUTES: [Attribute; 9] = [
    Attribute {
        handle: handle_of(SERVICE),
        uuid: PRIMARY_SERVICE_UUID,
        permissions: Permissions::READ,
        access: Access::PrimaryService(LBS_SERVICE_UUID),
    },
    Attribute {
        handle: handle_of(BUTTON_DECLARATION),
        uuid: CHARACTERISTIC_UUID,
        permissions: Permissions::READ,
        access: Access::CharacteristicDeclaration {
            properties: Properties::READ.union(Properties::NOTIFY),
            value_handle: BUTTON_VALUE_HANDLE,
            uuid: LBS_BUTTON_UUID,
        },
    },
    Attribute {
        handle: BUTTON_VALUE_HANDLE,
        uuid: LBS_BUTTON_UUID,
        permissions: Permissions::READ,
        access: Access::ButtonValue,
    },
    Attribute {
        handle: BUTTON_CCCD_HANDLE,
        uuid: CCCD_UUID,
        permissions: Permissions::READ_WRITE,
        access: Access::ButtonCccd,
    },
    Attribute {
        handle: handle_of(TEMPERATURE_DECLARATION),
        uuid: CHARACTERISTIC_UUID,
        permissions: Permissions::READ,
        access: Access::CharacteristicDeclaration {
            properties: Properties::READ.union(Properties::NOTIFY),
            value_handle: TEMPERATURE_VALUE_HANDLE,
            uuid: LBS_TEMPERATURE_UUID,
        },
    },
    Attribute {
        handle: TEMPERATURE_VALUE_HANDLE,
        uuid: LBS_TEMPERATURE_UUID,
        permissions: Permissions::READ,
        access: Access::TemperatureValue,
    },
    Attribute {
        handle: handle_of(TEMPERATURE_DESCRIPTION_POS),
        uuid: USER_DESCRIPTION_UUID,
        permissions: Permissions::READ,
        access: Access::UserDescription(TEMPERATURE_DESCRIPTION),
    },
    Attribute {
        handle: handle_of(LED_DECLARATION),
        uuid: CHARACTERISTIC_UUID,
        permissions: Permissions::READ,
        access: Access::CharacteristicDeclaration {
            properties: Properties::WRITE,
            value_handle: LED_VALUE_HANDLE,
            uuid: LBS_LED_UUID,
        },
    },
    Attribute {
        handle: LED_VALUE_HANDLE,
        uuid: LBS_LED_UUID,
        permissions: Permissions::WRITE_AUTHEN,
        access: Access::LedValue,
    },
];

/// Look up an attribute by handle.
pub fn attribute(handle: u16) -> Option<&'static Attribute> {
    let position = usize::from(handle).checked_sub(1)?;
    LBS_ATTRIBUTES.get(position)
}

/// Copy the part of `value` a (possibly partial) read asked for.
///
/// Mirrors ATT Read Blob: an offset equal to the length yields an empty
/// response, past the end is `InvalidOffset`.
pub fn read_window(value: &[u8], offset: u16, max_len: usize) -> Result<AttValue, Error> {
    let offset = usize::from(offset);
    if offset > value.len() {
        return Err(Error::InvalidOffset);
    }
    let end = value.len().min(offset.saturating_add(max_len));
    AttValue::from_slice(&value[offset..end]).map_err(|_| Error::InvalidLength)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_follow_positions() {
        for (position, attr) in LBS_ATTRIBUTES.iter().enumerate() {
            assert_eq!(attr.handle, handle_of(position));
            assert_eq!(attribute(attr.handle), Some(attr));
        }
    }

    #[test]
    fn notifier_target_is_button_value() {
        assert_eq!(BUTTON_VALUE, 2);
        assert_eq!(LBS_ATTRIBUTES[BUTTON_VALUE].access, Access::ButtonValue);
    }

    #[test]
    fn unknown_handles_are_rejected() {
        assert!(attribute(0).is_none());
        assert!(attribute(10).is_none());
        assert!(attribute(0xFFFF).is_none());
    }

    #[test]
    fn service_declaration_carries_lbs_uuid() {
        let value = LBS_ATTRIBUTES[SERVICE].constant_value().unwrap().unwrap();
        assert_eq!(value.len(), 16);
        // Little-endian: the last UUID byte goes first.
        assert_eq!(value[0], 0x23);
        assert_eq!(&value[12..], &[0x23, 0x15, 0x00, 0x00]);
    }

    #[test]
    fn button_declaration_encodes_properties_and_handle() {
        let value = LBS_ATTRIBUTES[BUTTON_DECLARATION]
            .constant_value()
            .unwrap()
            .unwrap();
        assert_eq!(value.len(), 19);
        assert_eq!(value[0], 0x12); // read | notify
        assert_eq!(&value[1..3], &BUTTON_VALUE_HANDLE.to_le_bytes());
        assert_eq!(&value[15..], &[0x24, 0x15, 0x00, 0x00]);
    }

    #[test]
    fn led_declaration_is_write_only() {
        match LBS_ATTRIBUTES[LED_DECLARATION].access {
            Access::CharacteristicDeclaration { properties, .. } => {
                assert!(properties.contains(Properties::WRITE));
                assert!(!properties.contains(Properties::READ));
            }
            other => panic!("unexpected access {:?}", other),
        }
        let led = &LBS_ATTRIBUTES[LED_VALUE];
        assert!(!led.permissions.read);
        assert!(led.permissions.write_authenticated);
    }

    #[test]
    fn user_description_is_constant_text() {
        let value = LBS_ATTRIBUTES[TEMPERATURE_DESCRIPTION_POS]
            .constant_value()
            .unwrap()
            .unwrap();
        assert_eq!(&value[..], b"Temperature sensor value");
    }

    #[test]
    fn live_attributes_have_no_constant_value() {
        for position in [BUTTON_VALUE, BUTTON_CCCD, TEMPERATURE_VALUE, LED_VALUE] {
            assert_eq!(LBS_ATTRIBUTES[position].constant_value(), Ok(None));
        }
    }

    #[test]
    fn read_window_partial_reads() {
        let value = [1, 2, 3, 4];
        assert_eq!(&read_window(&value, 0, 22).unwrap()[..], &[1, 2, 3, 4]);
        assert_eq!(&read_window(&value, 1, 2).unwrap()[..], &[2, 3]);
        assert!(read_window(&value, 4, 22).unwrap().is_empty());
        assert_eq!(read_window(&value, 5, 22), Err(Error::InvalidOffset));
        assert!(read_window(&value, 0, 0).unwrap().is_empty());
    }
}
