//! Error types for link-telemetry-core.

use thiserror::Error;

/// Core library error type.
#[derive(Debug, Error)]
pub enum Error {
    /// HID device communication failure.
    #[error("HID error: {0}")]
    Hid(String),

    /// Device not found during enumeration.
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    /// Command opcode and data do not fit in an output report.
    #[error("command too large: {len} bytes (maximum {max})")]
    FrameTooLarge { len: usize, max: usize },

    /// Input report too short to carry a response header.
    #[error("response too short: {len} bytes (minimum {min})")]
    FrameTooShort { len: usize, min: usize },

    /// No matching response arrived within the polling window.
    #[error("timeout: {0}")]
    Timeout(String),

    /// Device answered with a non-success status.
    #[error("device returned error status 0x{status:02X}")]
    DeviceError { status: u8 },

    /// Device refused the request because it is not in software mode.
    #[error("device is in the wrong mode (status 0x{status:02X})")]
    ModeError { status: u8 },

    /// Payload shorter than its format requires.
    #[error("malformed payload: {reason} ({len} bytes)")]
    MalformedPayload { reason: &'static str, len: usize },

    /// Invalid poller configuration.
    #[error("config error: {0}")]
    Config(String),

    /// Writing telemetry to a sink failed.
    #[error("output error: {0}")]
    Output(#[from] std::io::Error),
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, Error>;
