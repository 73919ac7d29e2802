//! HID transport abstraction for device communication.
//!
//! Provides a trait-based transport layer so that real HID devices and
//! mock devices share the same interface, plus an injectable clock so
//! response deadlines and inter-command delays can be simulated.

use crate::error::{Error, Result};
use crate::frame::{self, Command};
use std::time::{Duration, Instant};
use tracing::trace;

/// Abstraction over raw HID read/write.
///
/// Outbound reports are `OUTPUT_REPORT_LEN` bytes; inbound reports are up to
/// `INPUT_REPORT_LEN` bytes.
pub trait HidTransport: Send {
    /// Write one raw output report.
    fn send(&self, data: &[u8]) -> Result<()>;

    /// Wait up to `timeout` for one input report.
    ///
    /// Returns `Error::Timeout` if nothing arrived.
    fn receive(&self, timeout: Duration) -> Result<Vec<u8>>;
}

/// Time source used for deadlines and pacing.
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

/// Wall clock backed by `std::thread::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Encode and write a command.
pub fn send_command(transport: &dyn HidTransport, command: Command) -> Result<()> {
    let encoded = command.encode()?;
    let len = command.opcode().len() + command.data().len();
    trace!(
        command = %command,
        command_hex = format_args!("{:02X?}", encoded.command_bytes(len)),
        "LINK TX"
    );
    transport.send(encoded.as_bytes())
}

/// Receive one report, returning `None` on a timeout.
pub fn receive_report(transport: &dyn HidTransport, timeout: Duration) -> Result<Option<Vec<u8>>> {
    match transport.receive(timeout) {
        Ok(raw) => {
            trace!(
                len = raw.len(),
                head_hex = format_args!("{:02X?}", &raw[..raw.len().min(frame::PAYLOAD_START + 16)]),
                "LINK RX"
            );
            Ok(Some(raw))
        }
        Err(Error::Timeout(_)) => Ok(None),
        Err(e) => Err(e),
    }
}


#[cfg(test)]
mod tests {
    use super::mock::*;
    use super::*;
    use crate::frame::opcodes;

    #[test]
    fn send_command_writes_padded_report() {
        let hub = MockHub::new(ManualClock::new());
        send_command(&hub, Command::OpenEndpoint(0x17)).unwrap();
        let sent = hub.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].len(), frame::OUTPUT_REPORT_LEN);
        assert_eq!(hub.sent_commands(), vec![vec![0x0D, 0x01, 0x17]]);
        assert_eq!(hub.open_endpoint(), Some(0x17));
    }

    #[test]
    fn receive_report_maps_timeout_to_none() {
        let clock = ManualClock::new();
        let hub = MockHub::new(clock.clone());
        let got = receive_report(&hub, Duration::from_millis(100)).unwrap();
        assert!(got.is_none());
        assert_eq!(clock.elapsed(), Duration::from_millis(100));
    }

    #[test]
    fn receive_report_propagates_other_errors() {
        struct Broken;
        impl HidTransport for Broken {
            fn send(&self, _data: &[u8]) -> Result<()> {
                Ok(())
            }
            fn receive(&self, _timeout: Duration) -> Result<Vec<u8>> {
                Err(Error::Hid("read: device unplugged".into()))
            }
        }
        assert!(matches!(
            receive_report(&Broken, Duration::from_millis(10)),
            Err(Error::Hid(_))
        ));
    }

    #[test]
    fn mock_hub_tracks_mode() {
        let hub = MockHub::new(ManualClock::new());
        send_command(&hub, Command::EnterSoftwareMode).unwrap();
        assert!(hub.in_software_mode());
        send_command(&hub, Command::EnterHardwareMode).unwrap();
        assert!(!hub.in_software_mode());
        assert_eq!(
            hub.sent_commands(),
            vec![
                opcodes::ENTER_SOFTWARE_MODE.to_vec(),
                opcodes::ENTER_HARDWARE_MODE.to_vec()
            ]
        );
    }
}
