//! BLE GAP scanner - discovers nearby peripherals.
//!
//! Scanning runs until stopped, until its timeout expires, or until a link
//! comes up. Each advertising report is handed to the application's scan
//! callback, which typically filters on a service UUID and calls
//! [`Central::connect_report`] for the device it wants. Scanning resumes on
//! its own after a scan timeout, a connect timeout or a disconnect.

use heapless::Vec;

use crate::ble::central::Central;
use crate::ble::transport::Transport;
use crate::ble::{AdvReport, PeerAddress};
use crate::config::{MAX_ALLOWLIST, SCAN_INTERVAL, SCAN_TIMEOUT_SECS, SCAN_WINDOW};
use crate::error::Error;

/// Scan parameters, also used by the initiator when connecting.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanParams {
    /// Active scan to retrieve scan-response data (device names).
    pub active: bool,
    /// Scan interval (0.625 ms units).
    pub interval: u16,
    /// Scan window (0.625 ms units).
    pub window: u16,
    /// Seconds until the stack reports a scan timeout. 0 = never.
    pub timeout: u16,
    /// Only report these peers. Empty = report everyone.
    pub allowlist: Vec<PeerAddress, MAX_ALLOWLIST>,
}

impl Default for ScanParams {
    fn default() -> Self {
        Self {
            active: true,
            interval: SCAN_INTERVAL,
            window: SCAN_WINDOW,
            timeout: SCAN_TIMEOUT_SECS,
            allowlist: Vec::new(),
        }
    }
}

impl<'d, T: Transport, const SERVICES: usize, const CHARS: usize> Central<'d, T, SERVICES, CHARS> {
    /// Start scanning for `timeout` seconds (0 = until stopped).
    pub fn start_scanning(&self, timeout: u16) -> Result<(), Error> {
        let params = self.with_state(|s| {
            s.scan.timeout = timeout;
            s.scan.clone()
        });
        info!("[scan] starting ({} s)", timeout);
        self.transport.start_scan(&params)?;
        self.with_state(|s| s.scanning = true);

        if let Some(indicator) = self.indicator {
            indicator.start_searching();
        }
        Ok(())
    }

    pub fn stop_scanning(&self) -> Result<(), Error> {
        if let Some(indicator) = self.indicator {
            indicator.stop_searching();
        }
        self.transport.stop_scan()?;
        self.with_state(|s| s.scanning = false);
        info!("[scan] stopped");
        Ok(())
    }

    pub fn is_scanning(&self) -> bool {
        self.with_state(|s| s.scanning)
    }

    /// Called for every advertising report while scanning.
    pub fn set_scan_callback(&self, cb: fn(&AdvReport)) {
        self.with_state(|s| s.scan_cb = Some(cb));
    }

    /// Replace the scan parameters. Takes effect on the next start.
    pub fn set_scan_params(&self, params: ScanParams) {
        self.with_state(|s| s.scan = params);
    }

    pub fn scan_params(&self) -> ScanParams {
        self.with_state(|s| s.scan.clone())
    }

    pub(crate) fn on_adv_report(&self, report: &AdvReport) {
        trace!("[scan] report from {:?}, rssi {}", report.peer.bytes, report.rssi);
        if let Some(cb) = self.with_state(|s| s.scan_cb) {
            cb(report);
        }
    }

    pub(crate) fn on_scan_timeout(&self) {
        debug!("[scan] timed out, restarting");
        self.with_state(|s| s.scanning = false);
        if let Err(e) = self.start_scanning(0) {
            warn!("[scan] restart failed: {:?}", e);
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests (run on host, not embedded)
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_params_come_from_config() {
        let params = ScanParams::default();
        assert!(params.active);
        assert_eq!(params.interval, 0x00A0);
        assert_eq!(params.window, 0x0050);
        assert_eq!(params.timeout, 0);
        assert!(params.allowlist.is_empty());
    }

    #[test]
    fn window_fits_inside_interval() {
        let params = ScanParams::default();
        assert!(params.window <= params.interval);
    }
}
