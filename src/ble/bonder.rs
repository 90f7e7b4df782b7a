//! Pairing and bonding for the peripheral link.
//!
//! The LED characteristic needs an authenticated link. With no keypad on
//! the board the peripheral displays the passkey (over RTT) and the
//! central types it in, which gives MITM protection.
//! Bonds live in RAM only and are lost on reset.

use core::cell::RefCell;

use defmt::info;
use heapless::Vec;
use nrf_softdevice::ble::security::{IoCapabilities, SecurityHandler};
use nrf_softdevice::ble::{Connection, EncryptionInfo, IdentityKey, MasterId, SecurityMode};
use static_cell::StaticCell;

/// Bonds kept before the oldest is dropped.
const MAX_BONDS: usize = 4;

struct PeerBond {
    master_id: MasterId,
    key: EncryptionInfo,
    peer_id: IdentityKey,
}

pub struct Bonder {
    peers: RefCell<Vec<PeerBond, MAX_BONDS>>,
}

impl Bonder {
    fn new() -> Self {
        Self {
            peers: RefCell::new(Vec::new()),
        }
    }
}

impl SecurityHandler for Bonder {
    fn io_capabilities(&self) -> IoCapabilities {
        IoCapabilities::DisplayOnly
    }

    fn can_bond(&self, _conn: &Connection) -> bool {
        true
    }

    fn display_passkey(&self, passkey: &[u8; 6]) {
        info!("Passkey for pairing: {=[u8]:a}", &passkey[..]);
    }

    fn on_bonded(
        &self,
        _conn: &Connection,
        master_id: MasterId,
        key: EncryptionInfo,
        peer_id: IdentityKey,
    ) {
        info!("Bonded with central");
        let mut peers = self.peers.borrow_mut();
        if let Some(existing) = peers.iter_mut().find(|p| p.master_id == master_id) {
            existing.key = key;
            existing.peer_id = peer_id;
            return;
        }

        if peers.is_full() {
            peers.remove(0);
        }

        let _ = peers.push(PeerBond {
            master_id,
            key,
            peer_id,
        });
    }

    fn get_key(&self, conn: &Connection, master_id: MasterId) -> Option<EncryptionInfo> {
        self.peers.borrow().iter().find_map(|p| {
            (p.master_id == master_id && p.peer_id.is_match(conn.peer_address())).then_some(p.key)
        })
    }

    fn on_security_update(&self, _conn: &Connection, mode: SecurityMode) {
        info!("Link security mode updated: {}", mode);
    }
}

pub fn bonder() -> &'static Bonder {
    static BONDER: StaticCell<Bonder> = StaticCell::new();
    BONDER.init(Bonder::new())
}
