//! Error classification for per-endpoint failures.
//!
//! The poller never aborts a sweep on an endpoint failure; the class only
//! decides whether a mode switch and single retry is worth attempting and
//! how loudly to log.

use crate::error::Error;

/// Classification of communication errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Hub is in hardware mode — switch to software mode and retry once.
    WrongMode,
    /// No matching response in time; may succeed next sweep.
    Transient,
    /// Transport failed or the device is gone.
    Disconnected,
    /// Device returned an error status.
    Protocol,
    /// Response arrived but its payload is unusable.
    InvalidResponse,
    /// Codec or configuration bug; cannot happen with the static tables.
    Internal,
}

impl ErrorClass {
    /// Classify an error for recovery decisions.
    pub fn classify(err: &Error) -> Self {
        match err {
            Error::ModeError { .. } => Self::WrongMode,
            Error::Timeout(_) => Self::Transient,
            Error::Hid(_) | Error::DeviceNotFound(_) => Self::Disconnected,
            Error::DeviceError { .. } => Self::Protocol,
            Error::MalformedPayload { .. } => Self::InvalidResponse,
            Error::FrameTooLarge { .. }
            | Error::FrameTooShort { .. }
            | Error::Config(_)
            | Error::Output(_) => Self::Internal,
        }
    }

    /// Whether a mode switch followed by one retry may recover.
    pub fn needs_mode_switch(&self) -> bool {
        matches!(self, Self::WrongMode)
    }
}

/// Connection status derived from the last sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceStatus {
    /// Every endpoint answered.
    Connected,
    /// Some endpoints failed.
    Degraded,
    /// Every endpoint failed at the transport level.
    Disconnected,
    /// Every endpoint failed, not all at the transport level.
    Error,
}

impl DeviceStatus {
    /// Summarize the failures of one sweep over `endpoint_count` endpoints.
    pub fn from_failures(endpoint_count: usize, failures: &[ErrorClass]) -> Self {
        if failures.is_empty() {
            Self::Connected
        } else if failures.len() < endpoint_count {
            Self::Degraded
        } else if failures.iter().all(|c| *c == ErrorClass::Disconnected) {
            Self::Disconnected
        } else {
            Self::Error
        }
    }

    /// Whether the transport is dead and must be reopened.
    pub fn needs_reconnect(&self) -> bool {
        matches!(self, Self::Disconnected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_mode_error() {
        let err = Error::ModeError { status: 0x03 };
        assert_eq!(ErrorClass::classify(&err), ErrorClass::WrongMode);
        assert!(ErrorClass::classify(&err).needs_mode_switch());
    }

    #[test]
    fn classify_timeout_as_transient() {
        let err = Error::Timeout("1s elapsed".into());
        assert_eq!(ErrorClass::classify(&err), ErrorClass::Transient);
        assert!(!ErrorClass::classify(&err).needs_mode_switch());
    }

    #[test]
    fn classify_hid_as_disconnected() {
        let err = Error::Hid("write: No such device".into());
        assert_eq!(ErrorClass::classify(&err), ErrorClass::Disconnected);
    }

    #[test]
    fn classify_device_error() {
        let err = Error::DeviceError { status: 0x05 };
        assert_eq!(ErrorClass::classify(&err), ErrorClass::Protocol);
    }

    #[test]
    fn classify_malformed_payload() {
        let err = Error::MalformedPayload {
            reason: "sensor count exceeds payload",
            len: 4,
        };
        assert_eq!(ErrorClass::classify(&err), ErrorClass::InvalidResponse);
    }

    #[test]
    fn classify_codec_errors_as_internal() {
        let err = Error::FrameTooLarge { len: 600, max: 509 };
        assert_eq!(ErrorClass::classify(&err), ErrorClass::Internal);
    }

    #[test]
    fn status_from_failures() {
        use ErrorClass::*;
        assert_eq!(DeviceStatus::from_failures(2, &[]), DeviceStatus::Connected);
        assert_eq!(
            DeviceStatus::from_failures(2, &[Transient]),
            DeviceStatus::Degraded
        );
        assert_eq!(
            DeviceStatus::from_failures(2, &[Disconnected, Disconnected]),
            DeviceStatus::Disconnected
        );
        assert_eq!(
            DeviceStatus::from_failures(2, &[Disconnected, Transient]),
            DeviceStatus::Error
        );
    }

    #[test]
    fn only_disconnected_needs_reconnect() {
        assert!(DeviceStatus::Disconnected.needs_reconnect());
        assert!(!DeviceStatus::Degraded.needs_reconnect());
        assert!(!DeviceStatus::Error.needs_reconnect());
    }
}
