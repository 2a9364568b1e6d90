//! GATT client objects: remote services and characteristics.
//!
//! The application owns [`RemoteService`] and [`RemoteCharacteristic`]
//! values and registers them with the [`Central`]. Discovery fills in their
//! handles; the engine clears them again when the link drops. Value events
//! (notifications, indications, read/write responses) are routed to the
//! registered characteristic whose value handle matches.

use core::cell::Cell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use heapless::Vec;

use crate::ble::central::Central;
use crate::ble::events::{CharacteristicRecord, DescriptorRecord, ValueEvent};
use crate::ble::transport::Transport;
use crate::ble::uuid::{CHARACTERISTIC_DECLARATION, CLIENT_CHARACTERISTIC_CONFIGURATION};
use crate::ble::{HandleRange, Uuid};
use crate::error::Error;

/// Told when the link a service was discovered on goes away.
pub trait ServiceListener {
    fn on_disconnect(&self, service: &RemoteService<'_>);
}

/// Receives value events for one characteristic.
pub trait ValueListener {
    fn on_value(&self, characteristic: &RemoteCharacteristic<'_>, event: &ValueEvent);
}

/// A primary service on the peer.
pub struct RemoteService<'d> {
    uuid: Uuid,
    range: BlockingMutex<CriticalSectionRawMutex, Cell<Option<HandleRange>>>,
    listener: Option<&'d dyn ServiceListener>,
}

impl<'d> RemoteService<'d> {
    pub const fn new(uuid: Uuid) -> Self {
        Self {
            uuid,
            range: BlockingMutex::new(Cell::new(None)),
            listener: None,
        }
    }

    pub const fn with_listener(uuid: Uuid, listener: &'d dyn ServiceListener) -> Self {
        Self {
            uuid,
            range: BlockingMutex::new(Cell::new(None)),
            listener: Some(listener),
        }
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Handle range found by the last successful discovery.
    pub fn handle_range(&self) -> Option<HandleRange> {
        self.range.lock(Cell::get)
    }

    pub fn is_discovered(&self) -> bool {
        self.handle_range().is_some()
    }

    pub(crate) fn set_range(&self, range: HandleRange) {
        self.range.lock(|r| r.set(Some(range)));
    }

    /// Forget the range and notify the listener.
    pub(crate) fn disconnect(&self) {
        self.range.lock(|r| r.set(None));
        if let Some(listener) = self.listener {
            listener.on_disconnect(self);
        }
    }
}

#[derive(Clone, Copy, Default)]
struct Discovered {
    record: Option<CharacteristicRecord>,
    cccd_handle: Option<u16>,
}

/// A characteristic on the peer.
pub struct RemoteCharacteristic<'d> {
    uuid: Uuid,
    state: BlockingMutex<CriticalSectionRawMutex, Cell<Discovered>>,
    listener: Option<&'d dyn ValueListener>,
}

impl<'d> RemoteCharacteristic<'d> {
    pub const fn new(uuid: Uuid) -> Self {
        Self {
            uuid,
            state: BlockingMutex::new(Cell::new(Discovered {
                record: None,
                cccd_handle: None,
            })),
            listener: None,
        }
    }

    pub const fn with_listener(uuid: Uuid, listener: &'d dyn ValueListener) -> Self {
        Self {
            uuid,
            state: BlockingMutex::new(Cell::new(Discovered {
                record: None,
                cccd_handle: None,
            })),
            listener: Some(listener),
        }
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn value_handle(&self) -> Option<u16> {
        self.record().map(|r| r.value_handle)
    }

    /// Property bits from the declaration.
    pub fn properties(&self) -> Option<u8> {
        self.record().map(|r| r.properties)
    }

    /// Handle of the Client Characteristic Configuration descriptor.
    pub fn cccd_handle(&self) -> Option<u16> {
        self.state.lock(|s| s.get().cccd_handle)
    }

    pub fn is_discovered(&self) -> bool {
        self.record().is_some()
    }

    /// Forget the discovered handles.
    ///
    /// The engine does this for registered characteristics when the link
    /// drops; unregistered ones must be reset by their owner.
    pub fn reset(&self) {
        self.state.lock(|s| s.set(Discovered::default()));
    }

    fn record(&self) -> Option<CharacteristicRecord> {
        self.state.lock(|s| s.get().record)
    }

    pub(crate) fn assign(&self, record: &CharacteristicRecord) -> Result<(), Error> {
        self.state.lock(|s| {
            let mut state = s.get();
            if state.record.is_some() {
                return Err(Error::AlreadyAssigned);
            }
            state.record = Some(*record);
            s.set(state);
            Ok(())
        })
    }

    /// Pick the CCCD out of the attributes following the value handle.
    ///
    /// The scan stops at the next characteristic declaration.
    pub(crate) fn set_descriptors(&self, descriptors: &[DescriptorRecord]) {
        let cccd = descriptors
            .iter()
            .take_while(|d| d.uuid != CHARACTERISTIC_DECLARATION)
            .find(|d| d.uuid == CLIENT_CHARACTERISTIC_CONFIGURATION)
            .map(|d| d.handle);
        self.state.lock(|s| {
            let mut state = s.get();
            state.cccd_handle = cccd;
            s.set(state);
        });
    }

    fn deliver(&self, event: &ValueEvent) {
        if let Some(listener) = self.listener {
            listener.on_value(self, event);
        }
    }
}

/// Bounded lists of registered services and characteristics.
pub(crate) struct Registry<'d, const SERVICES: usize, const CHARS: usize> {
    pub(crate) services: Vec<&'d RemoteService<'d>, SERVICES>,
    pub(crate) characteristics: Vec<&'d RemoteCharacteristic<'d>, CHARS>,
}

impl<'d, const SERVICES: usize, const CHARS: usize> Registry<'d, SERVICES, CHARS> {
    pub(crate) const fn new() -> Self {
        Self {
            services: Vec::new(),
            characteristics: Vec::new(),
        }
    }

    /// First registered characteristic owning `handle`.
    fn find(&self, handle: u16) -> Option<&'d RemoteCharacteristic<'d>> {
        self.characteristics
            .iter()
            .copied()
            .find(|c| c.value_handle() == Some(handle))
    }
}

impl<'d, T: Transport, const SERVICES: usize, const CHARS: usize> Central<'d, T, SERVICES, CHARS> {
    pub fn register_service(&self, service: &'d RemoteService<'d>) -> Result<(), Error> {
        self.with_state(|s| s.registry.services.push(service))
            .map_err(|_| Error::CapacityExceeded)
    }

    /// Make `characteristic` eligible for value routing.
    pub fn register_characteristic(&self, characteristic: &'d RemoteCharacteristic<'d>) -> Result<(), Error> {
        self.with_state(|s| s.registry.characteristics.push(characteristic))
            .map_err(|_| Error::CapacityExceeded)
    }

    pub(crate) fn route_value(&self, event: &ValueEvent) {
        match self.with_state(|s| s.registry.find(event.handle)) {
            Some(chr) => chr.deliver(event),
            None => trace!("[gatt] no characteristic for handle 0x{:04x}", event.handle),
        }
    }
}
