//! Error types for the LED Button Service.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data.
//! Implements `defmt::Format` (behind the `defmt` feature) for efficient
//! on-target logging.

use core::fmt;

/// Error returned by the attribute handlers and the notifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    // Attribute dispatch
    /// No attribute with the requested handle.
    InvalidHandle,

    /// The attribute is not readable.
    ReadNotPermitted,

    /// The attribute is not writable.
    WriteNotPermitted,

    /// The attribute requires an authenticated (MITM-protected) link.
    InsufficientAuthentication,

    // Write validation
    /// The value length is not the one the attribute expects.
    InvalidLength,

    /// Offset is non-zero on a write, or past the end of the value on a read.
    InvalidOffset,

    /// The value is outside the accepted set.
    ValueNotAllowed,

    // Notifier
    /// A push was attempted while the central has notifications disabled.
    AccessDenied,

    /// The transport refused to send the notification.
    Transport(TransportError),
}

impl Error {
    /// ATT error code reported to the peer, or `None` for errors that
    /// stay local to the calling application.
    pub const fn att_code(&self) -> Option<u8> {
        match self {
            Error::InvalidHandle => Some(0x01),
            Error::ReadNotPermitted => Some(0x02),
            Error::WriteNotPermitted => Some(0x03),
            Error::InsufficientAuthentication => Some(0x05),
            Error::InvalidOffset => Some(0x07),
            Error::InvalidLength => Some(0x0D),
            Error::ValueNotAllowed => Some(0x13),
            Error::AccessDenied | Error::Transport(_) => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidHandle => f.write_str("invalid attribute handle"),
            Error::ReadNotPermitted => f.write_str("read not permitted"),
            Error::WriteNotPermitted => f.write_str("write not permitted"),
            Error::InsufficientAuthentication => f.write_str("insufficient authentication"),
            Error::InvalidLength => f.write_str("invalid attribute value length"),
            Error::InvalidOffset => f.write_str("invalid offset"),
            Error::ValueNotAllowed => f.write_str("value not allowed"),
            Error::AccessDenied => f.write_str("notifications not enabled by the central"),
            Error::Transport(e) => write!(f, "transport: {}", e),
        }
    }
}

/// Failure reported by the outbound notify primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportError {
    /// No central is connected.
    NotConnected,
    /// The stack itself considers the central unsubscribed.
    NotSubscribed,
    /// The stack has no attribute registered for this table handle.
    UnknownHandle(u16),
    /// Raw error code from the BLE stack.
    Raw(u32),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::NotConnected => f.write_str("no active connection"),
            TransportError::NotSubscribed => f.write_str("central not subscribed"),
            TransportError::UnknownHandle(h) => write!(f, "no stack attribute for handle {}", h),
            TransportError::Raw(code) => write!(f, "stack error {:#x}", code),
        }
    }
}

/// Sensor path failures. Never surfaced to the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SensorError {
    /// No device was bound, or the device reports it is not ready.
    DeviceNotReady,
    /// A fetch was attempted but did not complete.
    FetchFailed,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorError::DeviceNotReady => f.write_str("sensor device not ready"),
            SensorError::FetchFailed => f.write_str("sensor fetch failed"),
        }
    }
}

// Convenience conversions

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Error::Transport(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_validation_errors_map_to_att_codes() {
        assert_eq!(Error::InvalidLength.att_code(), Some(0x0D));
        assert_eq!(Error::InvalidOffset.att_code(), Some(0x07));
        assert_eq!(Error::ValueNotAllowed.att_code(), Some(0x13));
    }

    #[test]
    fn local_errors_have_no_att_code() {
        assert_eq!(Error::AccessDenied.att_code(), None);
        assert_eq!(Error::from(TransportError::NotConnected).att_code(), None);
    }

    #[test]
    fn display_includes_transport_cause() {
        let e = Error::from(TransportError::Raw(0x3002));
        assert_eq!(e.to_string(), "transport: stack error 0x3002");
    }
}
