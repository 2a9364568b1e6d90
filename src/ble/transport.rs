//! Boundary to the radio stack.
//!
//! Requests are fire-and-forget: each call returns as soon as the stack has
//! accepted (or refused) the request, and the outcome arrives later as a
//! [`BleEvent`](crate::ble::events::BleEvent). Implementations wrap the
//! vendor stack (e.g. a SoftDevice `sd_ble_gap_*` / `sd_ble_gattc_*` shim).

use crate::ble::events::RequestId;
use crate::ble::scanner::ScanParams;
use crate::ble::{ConnHandle, HandleRange, PeerAddress, Uuid};

/// Raw status code of a refused request.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportError(pub u32);

/// Link parameters requested on connect.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnParams {
    /// Minimum connection interval (units of 1.25ms)
    pub min_conn_interval: u16,
    /// Maximum connection interval (units of 1.25ms)
    pub max_conn_interval: u16,
    /// Slave latency
    pub slave_latency: u16,
    /// Supervision timeout (units of 10ms)
    pub supervision_timeout: u16,
}

/// Request side of the radio stack.
pub trait Transport {
    /// Start scanning with `params`; reports arrive as advertising events.
    fn start_scan(&self, params: &ScanParams) -> Result<(), TransportError>;

    fn stop_scan(&self) -> Result<(), TransportError>;

    /// Initiate a connection. `scan` doubles as the initiator's link parameters.
    fn connect(&self, peer: &PeerAddress, scan: &ScanParams, conn: &ConnParams) -> Result<(), TransportError>;

    fn disconnect(&self, conn: ConnHandle, reason: u8) -> Result<(), TransportError>;

    /// Number of packets the stack can queue for `conn` before a
    /// transmit-complete event frees a slot.
    fn tx_credit_limit(&self, conn: ConnHandle) -> u8;

    /// Look for the primary service `uuid` starting at `start`.
    fn discover_primary_services(
        &self,
        conn: ConnHandle,
        request: RequestId,
        start: u16,
        uuid: &Uuid,
    ) -> Result<(), TransportError>;

    fn discover_characteristics(
        &self,
        conn: ConnHandle,
        request: RequestId,
        range: HandleRange,
    ) -> Result<(), TransportError>;

    /// Look for descriptors in `range`; the response needs at most `max` records.
    fn discover_descriptors(
        &self,
        conn: ConnHandle,
        request: RequestId,
        range: HandleRange,
        max: usize,
    ) -> Result<(), TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn start_scan(&self, params: &ScanParams) -> Result<(), TransportError> {
        T::start_scan(self, params)
    }

    fn stop_scan(&self) -> Result<(), TransportError> {
        T::stop_scan(self)
    }

    fn connect(&self, peer: &PeerAddress, scan: &ScanParams, conn: &ConnParams) -> Result<(), TransportError> {
        T::connect(self, peer, scan, conn)
    }

    fn disconnect(&self, conn: ConnHandle, reason: u8) -> Result<(), TransportError> {
        T::disconnect(self, conn, reason)
    }

    fn tx_credit_limit(&self, conn: ConnHandle) -> u8 {
        T::tx_credit_limit(self, conn)
    }

    fn discover_primary_services(
        &self,
        conn: ConnHandle,
        request: RequestId,
        start: u16,
        uuid: &Uuid,
    ) -> Result<(), TransportError> {
        T::discover_primary_services(self, conn, request, start, uuid)
    }

    fn discover_characteristics(
        &self,
        conn: ConnHandle,
        request: RequestId,
        range: HandleRange,
    ) -> Result<(), TransportError> {
        T::discover_characteristics(self, conn, request, range)
    }

    fn discover_descriptors(
        &self,
        conn: ConnHandle,
        request: RequestId,
        range: HandleRange,
        max: usize,
    ) -> Result<(), TransportError> {
        T::discover_descriptors(self, conn, request, range, max)
    }
}

/// Status indicator (typically an LED) driven by the link lifecycle.
pub trait Indicator {
    /// Scanning started: begin the "searching" signal.
    fn start_searching(&self);
    /// Scanning stopped or a link came up.
    fn stop_searching(&self);
    /// Link up/down.
    fn set_connected(&self, _connected: bool) {}
}
