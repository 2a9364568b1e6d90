//! GATT discovery over the peer's attribute handle space.
//!
//! Discovery is strictly request/response: the engine issues one request,
//! waits for the matching response event (or a timeout, or the link going
//! down) and only then issues the next. Two cursors track progress:
//!
//! - the **service cursor** walks primary services across the whole
//!   handle space and moves past each service found;
//! - the **attribute cursor** walks characteristics and descriptors inside
//!   the most recently found service.
//!
//! Both are reset lazily on the first discovery call after a new link.

use embassy_time::with_timeout;
use heapless::Vec;

use crate::ble::central::Central;
use crate::ble::events::{
    CharacteristicRecord, DescriptorRecord, GattStatus, RequestId, ServiceRecord,
};
use crate::ble::gatt_client::{RemoteCharacteristic, RemoteService};
use crate::ble::transport::{Transport, TransportError};
use crate::ble::uuid::CHARACTERISTIC_DECLARATION;
use crate::ble::{ConnHandle, HandleRange};
use crate::config::{MAX_DESCRIPTORS, MAX_DISCOVERY_RESULTS};
use crate::error::Error;

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DiscoveryKind {
    PrimaryService,
    Characteristic,
    Descriptor,
}

/// What the waiting discovery call is woken with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DiscoveryOutcome {
    Services(Vec<ServiceRecord, MAX_DISCOVERY_RESULTS>),
    Characteristics(Vec<CharacteristicRecord, MAX_DISCOVERY_RESULTS>),
    Descriptors(Vec<DescriptorRecord, MAX_DISCOVERY_RESULTS>),
    /// Error status or zero records.
    Empty,
    ConnectionLost,
}

/// The one request the engine is waiting on, if any.
pub(crate) struct PendingRequest {
    armed: Option<(RequestId, DiscoveryKind)>,
    next: u32,
}

impl PendingRequest {
    pub(crate) const fn new() -> Self {
        Self { armed: None, next: 0 }
    }

    /// Allocate a fresh id and wait for it.
    pub(crate) fn arm(&mut self, kind: DiscoveryKind) -> RequestId {
        self.next = self.next.wrapping_add(1);
        let id = RequestId(self.next);
        self.armed = Some((id, kind));
        id
    }

    pub(crate) fn disarm(&mut self) {
        self.armed = None;
    }

    /// Consume the armed request if `request`/`kind` match it.
    pub(crate) fn accept(&mut self, request: RequestId, kind: DiscoveryKind) -> bool {
        if self.armed == Some((request, kind)) {
            self.armed = None;
            true
        } else {
            false
        }
    }

    /// Drop the armed request; returns whether one was outstanding.
    pub(crate) fn abort(&mut self) -> bool {
        self.armed.take().is_some()
    }
}

/// Monotonic position inside a handle range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Cursor {
    range: HandleRange,
    exhausted: bool,
}

impl Cursor {
    pub(crate) const fn new(range: HandleRange) -> Self {
        Self {
            exhausted: range.start > range.end,
            range,
        }
    }

    /// Handles still to search, `None` once the range is used up.
    pub(crate) fn remaining(&self) -> Option<HandleRange> {
        (!self.exhausted).then_some(self.range)
    }

    /// Move the start to `start`. Never moves backwards.
    fn advance_to(&mut self, start: u32) {
        if start > self.range.end as u32 {
            self.exhausted = true;
        } else if start > self.range.start as u32 {
            self.range.start = start as u16;
        }
    }
}

pub(crate) struct Sequencer {
    epoch: u32,
    services: Cursor,
    attributes: Option<Cursor>,
}

impl Sequencer {
    pub(crate) const fn new() -> Self {
        Self {
            epoch: 0,
            services: Cursor::new(HandleRange::FULL),
            attributes: None,
        }
    }

    /// Start over when the link generation changed.
    fn sync(&mut self, epoch: u32) {
        if self.epoch != epoch {
            trace!("[disc] new link, cursor reset");
            *self = Self::new();
            self.epoch = epoch;
        }
    }

    /// Cursor used for characteristic and descriptor requests.
    fn attribute_cursor(&mut self) -> &mut Cursor {
        match &mut self.attributes {
            Some(cursor) => cursor,
            None => &mut self.services,
        }
    }
}

impl<'d, T: Transport, const SERVICES: usize, const CHARS: usize> Central<'d, T, SERVICES, CHARS> {
    /// Find `service` at or after the service cursor.
    ///
    /// Succeeds only when the peer answers with exactly one service of the
    /// requested UUID. The service cursor then moves past the service's end
    /// and characteristic discovery is confined to its range. On any failure
    /// the cursors are left unchanged.
    pub async fn discover_primary_service(&self, service: &RemoteService<'_>) -> Result<(), Error> {
        let mut seq = self.sequencer.lock().await;
        seq.sync(self.link_epoch());

        let Some(range) = seq.services.remaining() else {
            return Err(Error::NotFound);
        };
        let uuid = service.uuid();
        debug!("[svc] discovering {:?} from 0x{:04x}", uuid, range.start);

        let outcome = self
            .request(DiscoveryKind::PrimaryService, |conn, id| {
                self.transport.discover_primary_services(conn, id, range.start, &uuid)
            })
            .await?;

        let record = match outcome {
            DiscoveryOutcome::Services(found) => match found.as_slice() {
                [record] if record.uuid == uuid => *record,
                _ => {
                    debug!("[svc] unexpected answer ({} records)", found.len());
                    return Err(Error::NotFound);
                }
            },
            _ => return Err(Error::NotFound),
        };

        info!(
            "[svc] found {:?} at [0x{:04x}, 0x{:04x}]",
            uuid, record.range.start, record.range.end
        );
        seq.services.advance_to(record.range.end as u32 + 1);
        seq.attributes = Some(Cursor::new(HandleRange::new(
            record.range.start.saturating_add(1),
            record.range.end,
        )));
        service.set_range(record.range);
        Ok(())
    }

    /// Match characteristics against `targets` until every still-unmatched
    /// target is found or the range is used up.
    ///
    /// Each response is taken to carry one characteristic; the cursor moves
    /// past its value handle. A matching target is assigned the record and
    /// its descriptors are discovered immediately. Returns how many targets
    /// were matched by this call.
    pub async fn discover_characteristics(&self, targets: &[&RemoteCharacteristic<'_>]) -> usize {
        let mut seq = self.sequencer.lock().await;
        seq.sync(self.link_epoch());

        let wanted = targets.iter().filter(|t| !t.is_discovered()).count();
        let mut found = 0;

        while found < wanted {
            let Some(range) = seq.attribute_cursor().remaining() else {
                break;
            };
            debug!("[chr] discovering in [0x{:04x}, 0x{:04x}]", range.start, range.end);

            let outcome = self
                .request(DiscoveryKind::Characteristic, |conn, id| {
                    self.transport.discover_characteristics(conn, id, range)
                })
                .await;
            let record = match outcome {
                Ok(DiscoveryOutcome::Characteristics(chars)) => match chars.first() {
                    Some(record) => *record,
                    None => break,
                },
                Ok(_) => break,
                Err(e) => {
                    debug!("[chr] stopped: {:?}", e);
                    break;
                }
            };

            if !range.contains(record.value_handle) {
                warn!("[chr] value handle 0x{:04x} outside search range", record.value_handle);
                break;
            }
            seq.attribute_cursor().advance_to(record.value_handle as u32 + 1);

            let target = targets
                .iter()
                .find(|t| !t.is_discovered() && t.uuid() == record.uuid);
            let Some(target) = target else {
                trace!("[chr] skipping {:?}", record.uuid);
                continue;
            };
            if target.assign(&record).is_err() {
                continue;
            }
            debug!("[chr] {:?} value handle 0x{:04x}", record.uuid, record.value_handle);

            let mut descriptors = [DescriptorRecord::default(); MAX_DESCRIPTORS];
            let n = self.descriptors_in(&mut seq, &mut descriptors, true).await;
            target.set_descriptors(&descriptors[..n]);
            found += 1;
        }

        found
    }

    /// Discover up to `out.len()` descriptors at the attribute cursor.
    ///
    /// At most [`MAX_DISCOVERY_RESULTS`] records come back from one request,
    /// whatever the size of `out`. The cursor moves to the last accepted
    /// descriptor's handle, not past it, so the next characteristic search
    /// starts there.
    pub async fn discover_descriptors(&self, out: &mut [DescriptorRecord]) -> usize {
        let mut seq = self.sequencer.lock().await;
        seq.sync(self.link_epoch());
        self.descriptors_in(&mut seq, out, false).await
    }

    /// Remaining service search range, `None` once exhausted.
    pub async fn discovery_cursor(&self) -> Option<HandleRange> {
        let mut seq = self.sequencer.lock().await;
        seq.sync(self.link_epoch());
        seq.services.remaining()
    }

    /// With `stop_at_declaration`, records after the first characteristic
    /// declaration are ignored so the cursor lands on that declaration.
    async fn descriptors_in(
        &self,
        seq: &mut Sequencer,
        out: &mut [DescriptorRecord],
        stop_at_declaration: bool,
    ) -> usize {
        if out.is_empty() {
            return 0;
        }
        let Some(range) = seq.attribute_cursor().remaining() else {
            return 0;
        };
        let max = out.len().min(MAX_DISCOVERY_RESULTS);
        debug!("[desc] discovering up to {} in [0x{:04x}, 0x{:04x}]", max, range.start, range.end);

        let outcome = self
            .request(DiscoveryKind::Descriptor, |conn, id| {
                self.transport.discover_descriptors(conn, id, range, max)
            })
            .await;
        let found = match outcome {
            Ok(DiscoveryOutcome::Descriptors(found)) => found,
            Ok(_) => return 0,
            Err(e) => {
                debug!("[desc] stopped: {:?}", e);
                return 0;
            }
        };

        let mut n = found.len().min(out.len());
        if stop_at_declaration {
            if let Some(pos) = found[..n].iter().position(|d| d.uuid == CHARACTERISTIC_DECLARATION) {
                n = pos + 1;
            }
        }
        out[..n].copy_from_slice(&found[..n]);
        if let Some(last) = out[..n].last() {
            seq.attribute_cursor().advance_to(last.handle as u32);
        }
        n
    }

    /// Issue one request and wait for its response.
    async fn request(
        &self,
        kind: DiscoveryKind,
        issue: impl FnOnce(ConnHandle, RequestId) -> Result<(), TransportError>,
    ) -> Result<DiscoveryOutcome, Error> {
        self.response.reset();
        let (conn, id) = self.with_state(|s| {
            if !s.link.is_up() {
                return Err(Error::NotConnected);
            }
            Ok((s.link.handle(), s.pending.arm(kind)))
        })?;

        if let Err(e) = issue(conn, id) {
            warn!("[disc] {:?} request refused: {}", kind, e.0);
            self.with_state(|s| s.pending.disarm());
            return Err(e.into());
        }

        match with_timeout(self.discovery_timeout, self.response.wait()).await {
            Ok(DiscoveryOutcome::ConnectionLost) => Err(Error::ConnectionLost),
            Ok(outcome) => Ok(outcome),
            Err(_) => {
                debug!("[disc] {:?} request {} timed out", kind, id.0);
                self.with_state(|s| s.pending.disarm());
                Err(Error::Timeout)
            }
        }
    }

    /// Hand a discovery response to the waiting request, if it is the one
    /// currently armed.
    pub(crate) fn on_discovery_response(
        &self,
        request: RequestId,
        kind: DiscoveryKind,
        status: GattStatus,
        records: impl FnOnce() -> Option<DiscoveryOutcome>,
    ) {
        if !self.with_state(|s| s.pending.accept(request, kind)) {
            debug!("[disc] dropping stale {:?} response {}", kind, request.0);
            return;
        }
        let outcome = match status {
            GattStatus::Success => records().unwrap_or(DiscoveryOutcome::Empty),
            GattStatus::Error(code) => {
                trace!("[disc] {:?} status 0x{:04x}", kind, code);
                DiscoveryOutcome::Empty
            }
        };
        self.response.signal(outcome);
    }

    /// Wake a pending request with `ConnectionLost`.
    pub(crate) fn abort_discovery(&self) {
        if self.with_state(|s| s.pending.abort()) {
            debug!("[disc] link lost, failing pending request");
            self.response.signal(DiscoveryOutcome::ConnectionLost);
        }
    }
}
