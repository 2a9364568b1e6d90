//! Engine-wide constants and compile-time configuration.
//!
//! All timing parameters, link parameters and registry capacities live
//! here so they can be tuned in one place. Runtime overrides go through
//! [`CentralConfig`].

use embassy_time::Duration;

use crate::ble::scanner::ScanParams;

// Discovery

/// How long a single discovery request may stay unanswered (ms).
pub const DISCOVERY_TIMEOUT_MS: u64 = 3000;

/// Maximum records kept from one service/characteristic discovery response.
pub const MAX_DISCOVERY_RESULTS: usize = 4;

/// Maximum descriptors accepted from one descriptor discovery response.
pub const MAX_DESCRIPTORS: usize = 4;

// Scanning

/// Scan interval (in 0.625 ms units). 0x00A0 = 100 ms.
pub const SCAN_INTERVAL: u16 = 0x00A0;

/// Scan window (in 0.625 ms units). 0x0050 = 50 ms.
pub const SCAN_WINDOW: u16 = 0x0050;

/// Scan timeout (seconds). 0 = scan until stopped.
pub const SCAN_TIMEOUT_SECS: u16 = 0;

/// Maximum peers in the scan/connect allowlist.
pub const MAX_ALLOWLIST: usize = 4;

/// Legacy advertising payload size.
pub const ADV_DATA_MAX: usize = 31;

// Connection

/// BLE connection interval range (in 1.25 ms units).
/// 6 = 7.5 ms, 12 = 15 ms.
pub const CONN_INTERVAL_MIN: u16 = 6;
pub const CONN_INTERVAL_MAX: u16 = 12;

/// BLE slave latency (number of connection events the peripheral can skip).
pub const SLAVE_LATENCY: u16 = 0;

/// BLE supervision timeout (in 10 ms units). 400 = 4 s.
pub const SUPERVISION_TIMEOUT: u16 = 400;

/// Largest value payload carried by a notification/read/write event.
///
/// An ATT_MTU of 247 leaves 244 bytes after the opcode and handle.
pub const VALUE_DATA_MAX: usize = 244;

// Registries

/// Default capacity of the registered-service list.
pub const MAX_SERVICES: usize = 4;

/// Default capacity of the registered-characteristic list.
pub const MAX_CHARACTERISTICS: usize = 8;

/// Runtime configuration of a [`Central`](crate::ble::central::Central).
#[derive(Clone, Debug)]
pub struct CentralConfig {
    /// Scan parameters, also used as the initial link parameters on connect.
    pub scan: ScanParams,
    /// Deadline for every discovery request.
    pub discovery_timeout: Duration,
    /// Slave latency requested on connect.
    pub slave_latency: u16,
    /// Supervision timeout requested on connect (10 ms units).
    pub supervision_timeout: u16,
}

impl Default for CentralConfig {
    fn default() -> Self {
        Self {
            scan: ScanParams::default(),
            discovery_timeout: Duration::from_millis(DISCOVERY_TIMEOUT_MS),
            slave_latency: SLAVE_LATENCY,
            supervision_timeout: SUPERVISION_TIMEOUT,
        }
    }
}
