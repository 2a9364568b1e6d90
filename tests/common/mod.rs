//! Shared test fixtures: a recording transport and event builders.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};

use ble_central::ble::events::{
    CharacteristicRecord, DescriptorRecord, GattStatus, RequestId, ServiceRecord,
};
use ble_central::ble::scanner::ScanParams;
use ble_central::ble::transport::ConnParams;
use ble_central::ble::{AddressKind, ConnHandle, HandleRange, PeerAddress, Role};
use ble_central::{BleEvent, Transport, TransportError, Uuid};
use embassy_time::Timer;

pub const CONN: ConnHandle = ConnHandle(0x0010);
pub const PEER: PeerAddress = PeerAddress::new(AddressKind::RandomStatic, [0x11, 0x22, 0x33, 0x44, 0x55, 0xC6]);

/// A request as seen by the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    StartScan { timeout: u16 },
    StopScan,
    Connect { peer: PeerAddress, conn: ConnParams },
    Disconnect { conn: ConnHandle, reason: u8 },
    Services { request: RequestId, start: u16, uuid: Uuid },
    Characteristics { request: RequestId, range: HandleRange },
    Descriptors { request: RequestId, range: HandleRange, max: usize },
}

impl Request {
    pub fn id(&self) -> Option<RequestId> {
        match self {
            Request::Services { request, .. }
            | Request::Characteristics { request, .. }
            | Request::Descriptors { request, .. } => Some(*request),
            _ => None,
        }
    }
}

/// Records every request; refuses them all while `reject` is set.
pub struct MockTransport {
    log: RefCell<Vec<Request>>,
    pub credit_limit: Cell<u8>,
    pub reject: Cell<Option<u32>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            log: RefCell::new(Vec::new()),
            credit_limit: Cell::new(4),
            reject: Cell::new(None),
        }
    }

    pub fn requests(&self) -> Vec<Request> {
        self.log.borrow().clone()
    }

    pub fn clear(&self) {
        self.log.borrow_mut().clear();
    }

    pub fn scan_starts(&self) -> usize {
        self.log
            .borrow()
            .iter()
            .filter(|r| matches!(r, Request::StartScan { .. }))
            .count()
    }

    pub fn discovery_requests(&self) -> Vec<Request> {
        self.log.borrow().iter().filter(|r| r.id().is_some()).cloned().collect()
    }

    /// Wait until the `n`th discovery request (0-based) has been issued.
    pub async fn nth_discovery(&self, n: usize) -> Request {
        loop {
            if let Some(req) = self.discovery_requests().get(n) {
                return req.clone();
            }
            Timer::after_millis(1).await;
        }
    }

    fn record(&self, request: Request) -> Result<(), TransportError> {
        if let Some(code) = self.reject.get() {
            return Err(TransportError(code));
        }
        self.log.borrow_mut().push(request);
        Ok(())
    }
}

impl Transport for MockTransport {
    fn start_scan(&self, params: &ScanParams) -> Result<(), TransportError> {
        self.record(Request::StartScan {
            timeout: params.timeout,
        })
    }

    fn stop_scan(&self) -> Result<(), TransportError> {
        self.record(Request::StopScan)
    }

    fn connect(&self, peer: &PeerAddress, _scan: &ScanParams, conn: &ConnParams) -> Result<(), TransportError> {
        self.record(Request::Connect { peer: *peer, conn: *conn })
    }

    fn disconnect(&self, conn: ConnHandle, reason: u8) -> Result<(), TransportError> {
        self.record(Request::Disconnect { conn, reason })
    }

    fn tx_credit_limit(&self, _conn: ConnHandle) -> u8 {
        self.credit_limit.get()
    }

    fn discover_primary_services(
        &self,
        _conn: ConnHandle,
        request: RequestId,
        start: u16,
        uuid: &Uuid,
    ) -> Result<(), TransportError> {
        self.record(Request::Services {
            request,
            start,
            uuid: *uuid,
        })
    }

    fn discover_characteristics(
        &self,
        _conn: ConnHandle,
        request: RequestId,
        range: HandleRange,
    ) -> Result<(), TransportError> {
        self.record(Request::Characteristics { request, range })
    }

    fn discover_descriptors(
        &self,
        _conn: ConnHandle,
        request: RequestId,
        range: HandleRange,
        max: usize,
    ) -> Result<(), TransportError> {
        self.record(Request::Descriptors { request, range, max })
    }
}

pub fn connected(conn: ConnHandle) -> BleEvent {
    BleEvent::Connected {
        role: Role::Central,
        conn,
        peer: PEER,
        min_interval: 6,
        max_interval: 12,
    }
}

pub fn disconnected(conn: ConnHandle, reason: u8) -> BleEvent {
    BleEvent::Disconnected { conn, reason }
}

pub fn services(request: RequestId, records: &[ServiceRecord]) -> BleEvent {
    BleEvent::PrimaryServiceDiscoveryResponse {
        conn: CONN,
        request,
        status: GattStatus::Success,
        services: records.iter().copied().collect(),
    }
}

pub fn characteristic(request: RequestId, uuid: Uuid, value_handle: u16) -> BleEvent {
    let record = CharacteristicRecord {
        uuid,
        decl_handle: value_handle - 1,
        value_handle,
        properties: 0x10,
    };
    BleEvent::CharacteristicDiscoveryResponse {
        conn: CONN,
        request,
        status: GattStatus::Success,
        characteristics: [record].into_iter().collect(),
    }
}

pub fn descriptors(request: RequestId, records: &[DescriptorRecord]) -> BleEvent {
    BleEvent::DescriptorDiscoveryResponse {
        conn: CONN,
        request,
        status: GattStatus::Success,
        descriptors: records.iter().copied().collect(),
    }
}

/// ATT "attribute not found", the usual end-of-range answer.
pub fn not_found(kind: &Request) -> BleEvent {
    let request = kind.id().unwrap_or(RequestId(0));
    let status = GattStatus::Error(0x010A);
    match kind {
        Request::Services { .. } => BleEvent::PrimaryServiceDiscoveryResponse {
            conn: CONN,
            request,
            status,
            services: heapless::Vec::new(),
        },
        Request::Characteristics { .. } => BleEvent::CharacteristicDiscoveryResponse {
            conn: CONN,
            request,
            status,
            characteristics: heapless::Vec::new(),
        },
        _ => BleEvent::DescriptorDiscoveryResponse {
            conn: CONN,
            request,
            status,
            descriptors: heapless::Vec::new(),
        },
    }
}
