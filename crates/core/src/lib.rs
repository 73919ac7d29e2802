//! link-telemetry-core: iCUE LINK hub protocol, endpoint sessions, and telemetry polling.
//!
//! This crate provides the cross-platform core logic for reading pump speed,
//! fan speeds and liquid temperature from a Corsair iCUE LINK System Hub over
//! USB HID.

pub mod comm;
pub mod config;
pub mod device;
pub mod endpoint;
pub mod error;
pub mod frame;
pub mod parse;
pub mod poller;
pub mod session;
pub mod sink;
pub mod transport;

/// Corsair USB Vendor ID.
pub const LINK_HUB_VID: u16 = 0x1B1C;

/// iCUE LINK System Hub product ID.
pub const LINK_HUB_PID: u16 = 0x0C3F;
