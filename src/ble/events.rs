//! Events delivered by the radio stack.
//!
//! The transport converts whatever its native event format is into a
//! [`BleEvent`] and feeds it to [`Central::handle_event`] in arrival order.
//! Discovery responses echo the [`RequestId`] the engine attached to the
//! request so late answers can be told apart from current ones.
//!
//! [`Central::handle_event`]: crate::ble::central::Central::handle_event

use heapless::Vec;

use crate::ble::{AdvReport, ConnHandle, HandleRange, PeerAddress, Role, Uuid};
use crate::config::{MAX_DISCOVERY_RESULTS, VALUE_DATA_MAX};

/// Generation tag of a discovery request.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestId(pub u32);

/// GATT status reported with a discovery response.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GattStatus {
    Success,
    /// Any ATT error, e.g. "attribute not found" at the end of the range.
    Error(u16),
}

/// A discovered primary service.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceRecord {
    pub uuid: Uuid,
    pub range: HandleRange,
}

/// A discovered characteristic declaration.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharacteristicRecord {
    pub uuid: Uuid,
    /// Handle of the declaration attribute.
    pub decl_handle: u16,
    /// Handle of the value attribute.
    pub value_handle: u16,
    /// Characteristic property bits (read, write, notify, ...).
    pub properties: u8,
}

/// A discovered descriptor (or any attribute in the searched range).
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorRecord {
    pub uuid: Uuid,
    pub handle: u16,
}

impl Default for DescriptorRecord {
    fn default() -> Self {
        Self {
            uuid: Uuid::new_short(0),
            handle: 0,
        }
    }
}

/// What kind of value traffic a [`ValueEvent`] carries.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Notification,
    Indication,
    ReadResponse,
    WriteResponse,
}

/// A value event scoped to one attribute handle.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueEvent {
    pub conn: ConnHandle,
    pub handle: u16,
    pub kind: ValueKind,
    pub data: Vec<u8, VALUE_DATA_MAX>,
}

impl ValueEvent {
    /// Build an event, truncating `data` to [`VALUE_DATA_MAX`].
    pub fn new(conn: ConnHandle, handle: u16, kind: ValueKind, data: &[u8]) -> Self {
        if data.len() > VALUE_DATA_MAX {
            warn!(
                "[gatt] value for handle 0x{:04x} truncated from {} to {} bytes",
                handle,
                data.len(),
                VALUE_DATA_MAX
            );
        }
        let n = data.len().min(VALUE_DATA_MAX);
        let mut payload = Vec::new();
        let _ = payload.extend_from_slice(&data[..n]);
        Self {
            conn,
            handle,
            kind,
            data: payload,
        }
    }
}

/// Every event the engine reacts to.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BleEvent {
    AdvertisingReport(AdvReport),
    Connected {
        role: Role,
        conn: ConnHandle,
        peer: PeerAddress,
        /// Negotiated connection interval bounds (1.25 ms units).
        min_interval: u16,
        max_interval: u16,
    },
    Disconnected {
        conn: ConnHandle,
        reason: u8,
    },
    ScanTimeout,
    ConnectTimeout,
    TransmitComplete {
        conn: ConnHandle,
        count: u8,
    },
    PrimaryServiceDiscoveryResponse {
        conn: ConnHandle,
        request: RequestId,
        status: GattStatus,
        services: Vec<ServiceRecord, MAX_DISCOVERY_RESULTS>,
    },
    CharacteristicDiscoveryResponse {
        conn: ConnHandle,
        request: RequestId,
        status: GattStatus,
        characteristics: Vec<CharacteristicRecord, MAX_DISCOVERY_RESULTS>,
    },
    DescriptorDiscoveryResponse {
        conn: ConnHandle,
        request: RequestId,
        status: GattStatus,
        descriptors: Vec<DescriptorRecord, MAX_DISCOVERY_RESULTS>,
    },
    Value(ValueEvent),
}

impl BleEvent {
    /// Connection this event is scoped to, if any.
    pub fn conn(&self) -> Option<ConnHandle> {
        match self {
            BleEvent::AdvertisingReport(_) | BleEvent::ScanTimeout | BleEvent::ConnectTimeout => None,
            BleEvent::Connected { conn, .. }
            | BleEvent::Disconnected { conn, .. }
            | BleEvent::TransmitComplete { conn, .. }
            | BleEvent::PrimaryServiceDiscoveryResponse { conn, .. }
            | BleEvent::CharacteristicDiscoveryResponse { conn, .. }
            | BleEvent::DescriptorDiscoveryResponse { conn, .. } => Some(*conn),
            BleEvent::Value(v) => Some(v.conn),
        }
    }

    /// Whether the event is accepted without matching the active link.
    pub fn is_connection_independent(&self) -> bool {
        matches!(
            self,
            BleEvent::AdvertisingReport(_)
                | BleEvent::Connected { .. }
                | BleEvent::ScanTimeout
                | BleEvent::ConnectTimeout
        )
    }
}
