//! Outbound side of the attribute transport.

use crate::error::TransportError;

/// Notify primitive provided by the BLE stack.
///
/// Sends `data` as a Handle Value Notification for the attribute at
/// `handle` to the connected central.
pub trait Transport {
    fn notify(&self, handle: u16, data: &[u8]) -> Result<(), TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn notify(&self, handle: u16, data: &[u8]) -> Result<(), TransportError> {
        (**self).notify(handle, data)
    }
}
