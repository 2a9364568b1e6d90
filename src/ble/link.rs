//! Connection lifecycle for the single peripheral link.
//!
//! The link moves `Unconnected -> Connecting -> Connected -> Disconnecting
//! -> Unconnected`. While it is up, outgoing packets are paced by transmit
//! credits: the pool starts at the stack's queue depth, each send takes one
//! and every transmit-complete event returns `count` of them.

use core::future::poll_fn;
use core::task::{Context, Poll};

use embassy_sync::waitqueue::WakerRegistration;
use embassy_time::{with_timeout, Duration};

use crate::ble::central::Central;
use crate::ble::transport::{ConnParams, Transport};
use crate::ble::{AdvReport, ConnHandle, PeerAddress, Role};
use crate::error::Error;

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Unconnected,
    Connecting,
    Connected,
    Disconnecting,
}

/// Snapshot of the active link.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub handle: ConnHandle,
    pub peer: PeerAddress,
    /// Negotiated connection interval bounds (1.25 ms units).
    pub min_interval: u16,
    pub max_interval: u16,
}

pub(crate) struct Link {
    state: LinkState,
    info: Option<ConnectionInfo>,
    /// `None` while no link is up; waiters fail instead of blocking.
    tx_credits: Option<u8>,
    tx_credit_limit: u8,
    credit_waker: WakerRegistration,
    /// Bumped on every new link.
    epoch: u32,
    pub(crate) connect_cb: Option<fn()>,
    pub(crate) disconnect_cb: Option<fn(u8)>,
}

impl Link {
    pub(crate) const fn new() -> Self {
        Self {
            state: LinkState::Unconnected,
            info: None,
            tx_credits: None,
            tx_credit_limit: 0,
            credit_waker: WakerRegistration::new(),
            epoch: 0,
            connect_cb: None,
            disconnect_cb: None,
        }
    }

    /// Active handle, or [`ConnHandle::INVALID`].
    pub(crate) fn handle(&self) -> ConnHandle {
        self.info.map(|i| i.handle).unwrap_or(ConnHandle::INVALID)
    }

    pub(crate) fn is_up(&self) -> bool {
        self.state == LinkState::Connected && self.info.is_some()
    }

    pub(crate) fn established(&mut self, info: ConnectionInfo, credits: u8) {
        self.state = LinkState::Connected;
        self.info = Some(info);
        self.tx_credit_limit = credits;
        self.tx_credits = Some(credits);
        self.epoch = self.epoch.wrapping_add(1);
    }

    /// First half of teardown: forget the handle and release waiters.
    pub(crate) fn teardown(&mut self) {
        self.state = LinkState::Disconnecting;
        self.info = None;
        self.tx_credits = None;
        self.credit_waker.wake();
    }

    pub(crate) fn confirm_sent(&mut self, count: u8) {
        if let Some(credits) = self.tx_credits.as_mut() {
            *credits = credits.saturating_add(count).min(self.tx_credit_limit);
            trace!("[link] {} tx credits", *credits);
            self.credit_waker.wake();
        }
    }

    fn poll_credit(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Error>> {
        match self.tx_credits.as_mut() {
            None => Poll::Ready(Err(Error::NotConnected)),
            Some(0) => {
                trace!("[link] out of tx credits");
                self.credit_waker.register(cx.waker());
                Poll::Pending
            }
            Some(credits) => {
                *credits -= 1;
                Poll::Ready(Ok(()))
            }
        }
    }
}

impl<'d, T: Transport, const SERVICES: usize, const CHARS: usize> Central<'d, T, SERVICES, CHARS> {
    /// Start connecting to `peer`.
    ///
    /// The current scan parameters double as the initiator parameters.
    /// Completion is reported through the connect callback.
    pub fn connect(&self, peer: &PeerAddress, min_interval: u16, max_interval: u16) -> Result<(), Error> {
        let (state, scan) = self.with_state(|s| (s.link.state, s.scan.clone()));
        if state != LinkState::Unconnected {
            return Err(Error::AlreadyConnected);
        }

        let params = ConnParams {
            min_conn_interval: min_interval,
            max_conn_interval: max_interval,
            slave_latency: self.slave_latency,
            supervision_timeout: self.supervision_timeout,
        };
        info!("[link] connecting to {:?}", peer.bytes);
        self.transport.connect(peer, &scan, &params)?;
        self.with_state(|s| s.link.state = LinkState::Connecting);
        Ok(())
    }

    /// Connect to the advertiser of `report`.
    pub fn connect_report(&self, report: &AdvReport, min_interval: u16, max_interval: u16) -> Result<(), Error> {
        self.connect(&report.peer, min_interval, max_interval)
    }

    /// Ask the stack to drop the link. Teardown runs when the disconnect
    /// event arrives.
    pub fn disconnect(&self, reason: u8) -> Result<(), Error> {
        let conn = self.with_state(|s| s.link.is_up().then(|| s.link.handle()));
        let Some(conn) = conn else {
            return Err(Error::NotConnected);
        };
        self.transport.disconnect(conn, reason)?;
        self.with_state(|s| s.link.state = LinkState::Disconnecting);
        Ok(())
    }

    pub fn connected(&self) -> bool {
        self.with_state(|s| s.link.is_up())
    }

    pub fn conn_handle(&self) -> ConnHandle {
        self.with_state(|s| s.link.handle())
    }

    pub fn link_state(&self) -> LinkState {
        self.with_state(|s| s.link.state)
    }

    pub fn connection(&self) -> Option<ConnectionInfo> {
        self.with_state(|s| s.link.info)
    }

    /// Credits currently available, `None` while no link is up.
    pub fn tx_credits(&self) -> Option<u8> {
        self.with_state(|s| s.link.tx_credits)
    }

    pub fn set_connect_callback(&self, cb: fn()) {
        self.with_state(|s| s.link.connect_cb = Some(cb));
    }

    /// `cb` receives the HCI disconnect reason.
    pub fn set_disconnect_callback(&self, cb: fn(u8)) {
        self.with_state(|s| s.link.disconnect_cb = Some(cb));
    }

    /// Take one transmit credit, waiting up to `timeout` for one to free up.
    pub async fn acquire_tx_credit(&self, timeout: Duration) -> Result<(), Error> {
        let credit = poll_fn(|cx| self.with_state(|s| s.link.poll_credit(cx)));
        match with_timeout(timeout, credit).await {
            Ok(res) => res,
            Err(_) => Err(Error::Timeout),
        }
    }

    pub(crate) fn link_epoch(&self) -> u32 {
        self.with_state(|s| s.link.epoch)
    }

    pub(crate) fn on_connected(
        &self,
        role: Role,
        conn: ConnHandle,
        peer: PeerAddress,
        min_interval: u16,
        max_interval: u16,
    ) {
        if role != Role::Central {
            trace!("[link] ignoring peripheral-role link {:?}", conn);
            return;
        }
        if self.with_state(|s| s.link.info.is_some()) {
            warn!("[link] already connected, ignoring {:?}", conn);
            return;
        }

        let credits = self.transport.tx_credit_limit(conn);
        let cb = self.with_state(|s| {
            s.link.established(
                ConnectionInfo {
                    handle: conn,
                    peer,
                    min_interval,
                    max_interval,
                },
                credits,
            );
            s.pending.disarm();
            s.scanning = false;
            s.link.connect_cb
        });
        info!(
            "[link] connected {:?}, interval [{}, {}], {} tx credits",
            conn, min_interval, max_interval, credits
        );

        if let Some(indicator) = self.indicator {
            indicator.stop_searching();
            indicator.set_connected(true);
        }
        if let Some(cb) = cb {
            cb();
        }
    }

    pub(crate) fn on_disconnected(&self, reason: u8) {
        info!("[link] disconnected, reason 0x{:02x}", reason);
        let (services, characteristics, cb) = self.with_state(|s| {
            s.link.teardown();
            (
                s.registry.services.clone(),
                s.registry.characteristics.clone(),
                s.link.disconnect_cb,
            )
        });
        self.abort_discovery();

        for chr in characteristics.iter() {
            chr.reset();
        }
        for service in services.iter() {
            service.disconnect();
        }
        if let Some(indicator) = self.indicator {
            indicator.set_connected(false);
        }
        if let Some(cb) = cb {
            cb(reason);
        }

        self.with_state(|s| s.link.state = LinkState::Unconnected);
        if let Err(e) = self.start_scanning(0) {
            warn!("[link] could not resume scanning: {:?}", e);
        }
    }

    pub(crate) fn on_connect_timeout(&self) {
        let was_connecting = self.with_state(|s| {
            let connecting = s.link.state == LinkState::Connecting;
            if connecting {
                s.link.state = LinkState::Unconnected;
            }
            connecting
        });
        if !was_connecting {
            return;
        }
        warn!("[link] connect attempt timed out");
        if let Err(e) = self.start_scanning(0) {
            warn!("[link] could not resume scanning: {:?}", e);
        }
    }
}
