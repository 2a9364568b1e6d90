//! Bluetooth Low Energy central engine.
//!
//! This module drives an event-delivering radio stack in **Central** role:
//!
//! 1. **Scanner** - starts/stops scanning and hands advertising reports
//!    to the application; [`adv_parser`] filters them by service UUID.
//! 2. **Link** - owns the single connection, its transmit credits and the
//!    connect/disconnect callbacks.
//! 3. **Discovery** - walks the peer's GATT handle space one request at a
//!    time (services, characteristics, descriptors).
//! 4. **GATT client** - registered services and characteristics; value
//!    events are routed to the characteristic owning the handle.
//!
//! Every stack event enters through [`Central::handle_event`], the only
//! mutator of engine state.

pub mod adv_parser;
pub mod central;
pub mod discovery;
pub mod events;
pub mod gatt_client;
pub mod link;
pub mod scanner;
pub mod transport;
pub mod uuid;

use heapless::{String, Vec};

use crate::config::ADV_DATA_MAX;

pub use central::Central;
pub use uuid::Uuid;

/// Opaque connection handle assigned by the radio stack.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnHandle(pub u16);

impl ConnHandle {
    /// Sentinel used while no link is up.
    pub const INVALID: ConnHandle = ConnHandle(0xFFFF);

    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }
}

/// Local role of a new link.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Central,
    Peripheral,
}

/// BLE address type.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressKind {
    Public,
    RandomStatic,
    RandomPrivateResolvable,
    RandomPrivateNonResolvable,
}

/// A peer device address.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerAddress {
    pub kind: AddressKind,
    pub bytes: [u8; 6],
}

impl PeerAddress {
    pub const fn new(kind: AddressKind, bytes: [u8; 6]) -> Self {
        Self { kind, bytes }
    }
}

/// Inclusive range of attribute handles.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandleRange {
    pub start: u16,
    pub end: u16,
}

impl HandleRange {
    /// The whole attribute space, `[0x0001, 0xFFFF]`.
    pub const FULL: HandleRange = HandleRange { start: 0x0001, end: 0xFFFF };

    pub const fn new(start: u16, end: u16) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, handle: u16) -> bool {
        self.start <= handle && handle <= self.end
    }
}

/// One advertising (or scan response) report.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvReport {
    /// Advertiser address.
    pub peer: PeerAddress,
    /// Received Signal Strength Indicator (dBm).
    pub rssi: i8,
    /// True when this is a scan response rather than an advertisement.
    pub scan_response: bool,
    /// Raw AD structures.
    pub data: Vec<u8, ADV_DATA_MAX>,
}

impl AdvReport {
    /// Build a report, truncating `data` to the legacy payload size.
    pub fn new(peer: PeerAddress, rssi: i8, data: &[u8]) -> Self {
        let n = data.len().min(ADV_DATA_MAX);
        let mut payload = Vec::new();
        let _ = payload.extend_from_slice(&data[..n]);
        Self {
            peer,
            rssi,
            scan_response: false,
            data: payload,
        }
    }

    /// Data of the first AD structure tagged `ad_type`.
    pub fn field(&self, ad_type: u8) -> Option<&[u8]> {
        adv_parser::extract_field(&self.data, ad_type)
    }

    /// Whether the report advertises `uuid` in one of its service lists.
    pub fn contains_service_uuid(&self, uuid: &Uuid) -> bool {
        adv_parser::contains_service_uuid(&self.data, uuid)
    }

    /// Advertised local name, or "Unknown".
    pub fn device_name(&self) -> String<32> {
        adv_parser::extract_device_name(&self.data)
    }
}
