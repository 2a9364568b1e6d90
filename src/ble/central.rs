//! The central engine and its event gate.
//!
//! [`Central`] owns all engine state behind a critical-section mutex. The
//! radio stack's event pump calls [`Central::handle_event`]; application
//! tasks call the scanning, link, discovery and registry methods defined
//! in the sibling modules. Discovery requests additionally serialize on an
//! async mutex, so only one can be in flight per link.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::mutex::Mutex;
use embassy_sync::signal::Signal;
use embassy_time::Duration;

use crate::ble::discovery::{DiscoveryKind, DiscoveryOutcome, PendingRequest, Sequencer};
use crate::ble::events::BleEvent;
use crate::ble::gatt_client::Registry;
use crate::ble::link::Link;
use crate::ble::scanner::ScanParams;
use crate::ble::transport::{Indicator, Transport};
use crate::ble::AdvReport;
use crate::config::{CentralConfig, MAX_CHARACTERISTICS, MAX_SERVICES};

/// State mutated by the event gate.
pub(crate) struct State<'d, const SERVICES: usize, const CHARS: usize> {
    pub(crate) link: Link,
    pub(crate) scan: ScanParams,
    pub(crate) scanning: bool,
    pub(crate) scan_cb: Option<fn(&AdvReport)>,
    pub(crate) pending: PendingRequest,
    pub(crate) registry: Registry<'d, SERVICES, CHARS>,
}

/// BLE central engine for a single peripheral link.
///
/// `SERVICES` and `CHARS` bound the registered-service and
/// registered-characteristic lists.
pub struct Central<
    'd,
    T: Transport,
    const SERVICES: usize = MAX_SERVICES,
    const CHARS: usize = MAX_CHARACTERISTICS,
> {
    pub(crate) transport: T,
    pub(crate) indicator: Option<&'d dyn Indicator>,
    pub(crate) discovery_timeout: Duration,
    pub(crate) slave_latency: u16,
    pub(crate) supervision_timeout: u16,
    pub(crate) state: BlockingMutex<CriticalSectionRawMutex, RefCell<State<'d, SERVICES, CHARS>>>,
    pub(crate) response: Signal<CriticalSectionRawMutex, DiscoveryOutcome>,
    pub(crate) sequencer: Mutex<CriticalSectionRawMutex, Sequencer>,
}

impl<'d, T: Transport, const SERVICES: usize, const CHARS: usize> Central<'d, T, SERVICES, CHARS> {
    pub fn new(transport: T, config: CentralConfig) -> Self {
        Self {
            transport,
            indicator: None,
            discovery_timeout: config.discovery_timeout,
            slave_latency: config.slave_latency,
            supervision_timeout: config.supervision_timeout,
            state: BlockingMutex::new(RefCell::new(State {
                link: Link::new(),
                scan: config.scan,
                scanning: false,
                scan_cb: None,
                pending: PendingRequest::new(),
                registry: Registry::new(),
            })),
            response: Signal::new(),
            sequencer: Mutex::new(Sequencer::new()),
        }
    }

    /// Drive `indicator` from scan and link transitions.
    pub fn with_indicator(mut self, indicator: &'d dyn Indicator) -> Self {
        self.indicator = Some(indicator);
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&mut State<'d, SERVICES, CHARS>) -> R) -> R {
        self.state.lock(|state| f(&mut state.borrow_mut()))
    }

    /// Feed one stack event into the engine.
    ///
    /// Connection-scoped events are dropped unless they target the active
    /// link; advertising reports, connect events and timeouts always pass.
    pub fn handle_event(&self, event: BleEvent) {
        if !event.is_connection_independent() {
            let active = self.with_state(|s| s.link.handle());
            if !active.is_valid() || event.conn() != Some(active) {
                trace!("[gate] dropping event for inactive link {:?}", event.conn());
                return;
            }
        }

        match event {
            BleEvent::AdvertisingReport(report) => self.on_adv_report(&report),
            BleEvent::Connected {
                role,
                conn,
                peer,
                min_interval,
                max_interval,
            } => self.on_connected(role, conn, peer, min_interval, max_interval),
            BleEvent::Disconnected { reason, .. } => self.on_disconnected(reason),
            BleEvent::ScanTimeout => self.on_scan_timeout(),
            BleEvent::ConnectTimeout => self.on_connect_timeout(),
            BleEvent::TransmitComplete { count, .. } => self.with_state(|s| s.link.confirm_sent(count)),
            BleEvent::PrimaryServiceDiscoveryResponse {
                request,
                status,
                services,
                ..
            } => {
                debug!("[svc] response {}: {} services", request.0, services.len());
                self.on_discovery_response(request, DiscoveryKind::PrimaryService, status, || {
                    (!services.is_empty()).then(|| DiscoveryOutcome::Services(services))
                })
            }
            BleEvent::CharacteristicDiscoveryResponse {
                request,
                status,
                characteristics,
                ..
            } => {
                debug!("[chr] response {}: {} characteristics", request.0, characteristics.len());
                self.on_discovery_response(request, DiscoveryKind::Characteristic, status, || {
                    (!characteristics.is_empty()).then(|| DiscoveryOutcome::Characteristics(characteristics))
                })
            }
            BleEvent::DescriptorDiscoveryResponse {
                request,
                status,
                descriptors,
                ..
            } => {
                debug!("[desc] response {}: {} descriptors", request.0, descriptors.len());
                self.on_discovery_response(request, DiscoveryKind::Descriptor, status, || {
                    (!descriptors.is_empty()).then(|| DiscoveryOutcome::Descriptors(descriptors))
                })
            }
            BleEvent::Value(value) => self.route_value(&value),
        }
    }
}

#[cfg(test)]
mod tests {
    use core::cell::Cell;

    use heapless::Vec;

    use super::*;
    use crate::ble::events::{GattStatus, RequestId, ServiceRecord, ValueEvent, ValueKind};
    use crate::ble::gatt_client::{RemoteCharacteristic, ValueListener};
    use crate::ble::link::LinkState;
    use crate::ble::transport::{ConnParams, TransportError};
    use crate::ble::{AddressKind, ConnHandle, HandleRange, PeerAddress, Role, Uuid};

    #[derive(Default)]
    struct NullTransport {
        scans: Cell<usize>,
    }

    impl Transport for NullTransport {
        fn start_scan(&self, _params: &ScanParams) -> Result<(), TransportError> {
            self.scans.set(self.scans.get() + 1);
            Ok(())
        }
        fn stop_scan(&self) -> Result<(), TransportError> {
            Ok(())
        }
        fn connect(&self, _: &PeerAddress, _: &ScanParams, _: &ConnParams) -> Result<(), TransportError> {
            Ok(())
        }
        fn disconnect(&self, _: ConnHandle, _: u8) -> Result<(), TransportError> {
            Ok(())
        }
        fn tx_credit_limit(&self, _: ConnHandle) -> u8 {
            4
        }
        fn discover_primary_services(&self, _: ConnHandle, _: RequestId, _: u16, _: &Uuid) -> Result<(), TransportError> {
            Ok(())
        }
        fn discover_characteristics(&self, _: ConnHandle, _: RequestId, _: HandleRange) -> Result<(), TransportError> {
            Ok(())
        }
        fn discover_descriptors(&self, _: ConnHandle, _: RequestId, _: HandleRange, _: usize) -> Result<(), TransportError> {
            Ok(())
        }
    }

    struct Counter(Cell<usize>);

    impl ValueListener for Counter {
        fn on_value(&self, _characteristic: &RemoteCharacteristic<'_>, _event: &ValueEvent) {
            self.0.set(self.0.get() + 1);
        }
    }

    fn connected_event(conn: u16) -> BleEvent {
        BleEvent::Connected {
            role: Role::Central,
            conn: ConnHandle(conn),
            peer: PeerAddress::new(AddressKind::Public, [1, 2, 3, 4, 5, 6]),
            min_interval: 6,
            max_interval: 12,
        }
    }

    #[test]
    fn peripheral_role_connect_is_ignored() {
        let central: Central<'_, NullTransport> = Central::new(NullTransport::default(), CentralConfig::default());
        central.handle_event(BleEvent::Connected {
            role: Role::Peripheral,
            conn: ConnHandle(1),
            peer: PeerAddress::new(AddressKind::Public, [0; 6]),
            min_interval: 6,
            max_interval: 6,
        });
        assert!(!central.connected());
        assert_eq!(central.link_state(), LinkState::Unconnected);
    }

    #[test]
    fn events_for_other_links_are_dropped() {
        let central: Central<'_, NullTransport> = Central::new(NullTransport::default(), CentralConfig::default());
        central.handle_event(connected_event(3));
        assert_eq!(central.tx_credits(), Some(4));

        central.handle_event(BleEvent::Disconnected {
            conn: ConnHandle(9),
            reason: 0x13,
        });
        assert!(central.connected());
        assert_eq!(central.conn_handle(), ConnHandle(3));
    }

    #[test]
    fn value_events_route_only_for_active_link() {
        let counter = Counter(Cell::new(0));
        let chr = RemoteCharacteristic::with_listener(Uuid::new_short(0x2A37), &counter);
        let central: Central<'_, NullTransport> = Central::new(NullTransport::default(), CentralConfig::default());
        central.register_characteristic(&chr).unwrap();
        central.handle_event(connected_event(3));
        chr.assign(&crate::ble::events::CharacteristicRecord {
            uuid: Uuid::new_short(0x2A37),
            decl_handle: 11,
            value_handle: 12,
            properties: 0x10,
        })
        .unwrap();

        central.handle_event(BleEvent::Value(ValueEvent::new(ConnHandle(3), 12, ValueKind::Notification, &[0x06, 72])));
        central.handle_event(BleEvent::Value(ValueEvent::new(ConnHandle(4), 12, ValueKind::Notification, &[0x06, 72])));
        central.handle_event(BleEvent::Value(ValueEvent::new(ConnHandle(3), 13, ValueKind::Notification, &[])));
        assert_eq!(counter.0.get(), 1);
    }

    #[test]
    fn response_without_armed_request_is_dropped() {
        let central: Central<'_, NullTransport> = Central::new(NullTransport::default(), CentralConfig::default());
        central.handle_event(connected_event(1));
        let mut services = Vec::new();
        services
            .push(ServiceRecord {
                uuid: Uuid::new_short(0x180D),
                range: HandleRange::new(10, 20),
            })
            .unwrap();
        central.handle_event(BleEvent::PrimaryServiceDiscoveryResponse {
            conn: ConnHandle(1),
            request: RequestId(0),
            status: GattStatus::Success,
            services,
        });
        assert!(!central.response.signaled());
    }
}
