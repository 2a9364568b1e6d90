//! BLE central-role connection and GATT discovery engine.
//!
//! The engine sits between an application and an event-delivering radio
//! stack (e.g. a SoftDevice wrapper implementing [`ble::transport::Transport`]).
//! It scans, connects to a single peripheral, discovers services,
//! characteristics and descriptors one request at a time, paces outgoing
//! packets with transmit credits and routes value events to the owning
//! characteristic.
//!
//! ```text
//!  radio stack ──BleEvent──▶ Central::handle_event ──▶ scan callback
//!       ▲                          │                   connect/disconnect callbacks
//!       │                          ▼                   RemoteService / RemoteCharacteristic
//!       └──── Transport ◀── scanning, connect, discovery requests
//! ```
//!
//! Runs on `no_std`; logging goes through `defmt` (feature `defmt`) or
//! `log` (feature `log`).

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod ble;
pub mod config;
pub mod error;

pub use ble::central::Central;
pub use ble::events::{BleEvent, ValueEvent};
pub use ble::gatt_client::{RemoteCharacteristic, RemoteService, ServiceListener, ValueListener};
pub use ble::transport::{Indicator, Transport, TransportError};
pub use ble::Uuid;
pub use config::CentralConfig;
pub use error::Error;
