//! One endpoint read transaction: close, open, read, await, close.
//!
//! The hub tags responses only with a data type, so the session writes a
//! read command and then polls input reports until one carries the type
//! expected for the endpoint. Only one transaction may be in flight per hub.

use crate::config::Timing;
use crate::endpoint::EndpointDescriptor;
use crate::error::{Error, Result};
use crate::frame::{decode, Command, DataType, STATUS_INCORRECT_MODE, STATUS_SUCCESS};
use crate::transport::{receive_report, send_command, Clock, HidTransport};
use tracing::{debug, trace, warn};

/// Borrowed transport, clock and pacing for a sequence of commands.
pub struct EndpointSession<'a> {
    transport: &'a dyn HidTransport,
    clock: &'a dyn Clock,
    timing: &'a Timing,
}

impl<'a> EndpointSession<'a> {
    pub fn new(transport: &'a dyn HidTransport, clock: &'a dyn Clock, timing: &'a Timing) -> Self {
        Self {
            transport,
            clock,
            timing,
        }
    }

    /// Send a command, then give the device time to process it.
    pub fn send(&self, command: Command) -> Result<()> {
        send_command(self.transport, command)?;
        self.clock.sleep(self.timing.command_delay());
        Ok(())
    }

    /// Run a full read transaction and return the payload (frame bytes 6..).
    ///
    /// The endpoint is closed again on every path. On failure the close is
    /// best-effort and the original error is returned.
    pub fn read(&self, endpoint: &EndpointDescriptor) -> Result<Vec<u8>> {
        debug!(
            endpoint = %endpoint.kind,
            id = format_args!("0x{:02X}", endpoint.id),
            "Reading endpoint"
        );

        let result = self.open_and_read(endpoint);
        let closed = self.send(Command::CloseEndpoint(endpoint.id));

        match (result, closed) {
            (Ok(payload), Ok(())) => Ok(payload),
            (Ok(payload), Err(e)) => {
                warn!(endpoint = %endpoint.kind, error = %e, "Endpoint close failed after read");
                Ok(payload)
            }
            (Err(e), Err(close_err)) => {
                debug!(endpoint = %endpoint.kind, error = %close_err, "Best-effort close failed");
                Err(e)
            }
            (Err(e), Ok(())) => Err(e),
        }
    }

    fn open_and_read(&self, endpoint: &EndpointDescriptor) -> Result<Vec<u8>> {
        // Closing first clears state left by an interrupted transaction.
        self.send(Command::CloseEndpoint(endpoint.id))?;
        self.send(Command::OpenEndpoint(endpoint.id))?;
        self.send(Command::Read)?;
        self.await_response(endpoint.data_type)
    }

    /// Poll input reports until one with `expected` data type and success
    /// status arrives, or the response timeout passes.
    ///
    /// Reports of other data types and reports too short to decode are
    /// skipped. Any non-success status ends the wait.
    pub fn await_response(&self, expected: DataType) -> Result<Vec<u8>> {
        let timeout = self.timing.response_timeout();
        let deadline = self.clock.now() + timeout;

        loop {
            let now = self.clock.now();
            if now >= deadline {
                return Err(Error::Timeout(format!(
                    "no response of type {expected} within {}ms",
                    timeout.as_millis()
                )));
            }

            let wait = (deadline - now).min(self.timing.receive_slice());
            let Some(raw) = receive_report(self.transport, wait)? else {
                continue;
            };

            let header = match decode(&raw) {
                Ok(header) => header,
                Err(e) => {
                    trace!(error = %e, "Skipping undecodable report");
                    continue;
                }
            };

            match header.status {
                STATUS_SUCCESS => {}
                STATUS_INCORRECT_MODE => {
                    return Err(Error::ModeError {
                        status: header.status,
                    })
                }
                status => return Err(Error::DeviceError { status }),
            }

            if header.data_type != expected {
                trace!(
                    got = %header.data_type,
                    expected = %expected,
                    "Discarding report of another data type"
                );
                continue;
            }

            return Ok(header.payload.to_vec());
        }
    }
}
