//! Unified error type for the central engine.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data.
//! Implements `defmt::Format` (behind the `defmt` feature) for efficient
//! on-target logging.

use crate::ble::transport::TransportError;

/// Top-level error type returned by every fallible engine operation.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The radio stack refused the request (raw status code).
    TransportRejected(u32),

    /// No response arrived before the deadline.
    Timeout,

    /// A bounded registry is full.
    CapacityExceeded,

    /// The link dropped while the operation was pending.
    ConnectionLost,

    /// The operation needs an active connection and there is none.
    NotConnected,

    /// A connection is already established or being established.
    AlreadyConnected,

    /// The peer answered but nothing matched the request.
    NotFound,

    /// The characteristic already carries a value handle for this link.
    AlreadyAssigned,
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Error::TransportRejected(e.0)
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::TransportRejected(code) => write!(f, "transport rejected request (status {})", code),
            Error::Timeout => f.write_str("timed out"),
            Error::CapacityExceeded => f.write_str("registry full"),
            Error::ConnectionLost => f.write_str("connection lost"),
            Error::NotConnected => f.write_str("not connected"),
            Error::AlreadyConnected => f.write_str("already connected"),
            Error::NotFound => f.write_str("not found"),
            Error::AlreadyAssigned => f.write_str("handle already assigned"),
        }
    }
}
