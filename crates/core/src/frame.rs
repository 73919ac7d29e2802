//! iCUE LINK command/response frame encoding and decoding.
//!
//! The hub exchanges fixed-size reports:
//! - Output reports: 513 bytes (report ID 0x00 + 512 data bytes)
//! - Input reports: 512 bytes
//!
//! Output layout: `[report_id, 0x00, 0x00, 0x01, opcode..., data..., 0...]`.
//! Input layout: `[report_id, status, reserved, reserved, type_lo, type_hi, payload...]`.
//!
//! Protocol reference: FanControl.CorsairLink research notes.

use crate::error::{Error, Result};
use std::fmt;

/// Output report length (including report ID).
pub const OUTPUT_REPORT_LEN: usize = 513;
/// Input report length.
pub const INPUT_REPORT_LEN: usize = 512;

/// Report ID used for every output report.
pub const REPORT_ID: u8 = 0x00;
/// Fixed header following the report ID in every command.
pub const COMMAND_HEADER: [u8; 3] = [0x00, 0x00, 0x01];

const COMMAND_START: usize = 1 + COMMAND_HEADER.len();

/// Room left for opcode + data in an output report.
pub const MAX_COMMAND_LEN: usize = OUTPUT_REPORT_LEN - COMMAND_START;

/// Offset of the status byte in an input report.
pub const STATUS_INDEX: usize = 1;
/// Offset of the 2-byte data-type identifier in an input report.
pub const DATA_TYPE_INDEX: usize = 4;
/// Offset of the payload in an input report.
pub const PAYLOAD_START: usize = 6;

/// Status byte of a successful response.
pub const STATUS_SUCCESS: u8 = 0x00;
/// Status byte reported when a sensor query arrives in hardware mode.
pub const STATUS_INCORRECT_MODE: u8 = 0x03;

/// Wire-exact opcode sequences.
pub mod opcodes {
    /// Hand fan/pump control to the host.
    pub const ENTER_SOFTWARE_MODE: [u8; 4] = [0x01, 0x03, 0x00, 0x02];
    /// Return control to the hub's own curves.
    pub const ENTER_HARDWARE_MODE: [u8; 4] = [0x01, 0x03, 0x00, 0x01];
    /// Followed by the endpoint id.
    pub const OPEN_ENDPOINT: [u8; 2] = [0x0D, 0x01];
    /// Followed by the endpoint id.
    pub const CLOSE_ENDPOINT: [u8; 3] = [0x05, 0x01, 0x01];
    /// Read from the currently open endpoint.
    pub const READ: [u8; 2] = [0x08, 0x01];
}

/// A command understood by the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    EnterSoftwareMode,
    EnterHardwareMode,
    OpenEndpoint(u8),
    CloseEndpoint(u8),
    Read,
}

impl Command {
    /// Opcode bytes for this command.
    pub fn opcode(&self) -> &'static [u8] {
        match self {
            Self::EnterSoftwareMode => &opcodes::ENTER_SOFTWARE_MODE,
            Self::EnterHardwareMode => &opcodes::ENTER_HARDWARE_MODE,
            Self::OpenEndpoint(_) => &opcodes::OPEN_ENDPOINT,
            Self::CloseEndpoint(_) => &opcodes::CLOSE_ENDPOINT,
            Self::Read => &opcodes::READ,
        }
    }

    /// Extra data appended after the opcode.
    pub fn data(&self) -> &[u8] {
        match self {
            Self::OpenEndpoint(id) | Self::CloseEndpoint(id) => std::slice::from_ref(id),
            _ => &[],
        }
    }

    /// Encode into a full output report.
    pub fn encode(&self) -> Result<CommandFrame> {
        encode(self.opcode(), self.data())
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EnterSoftwareMode => write!(f, "enter-software-mode"),
            Self::EnterHardwareMode => write!(f, "enter-hardware-mode"),
            Self::OpenEndpoint(id) => write!(f, "open-endpoint(0x{id:02X})"),
            Self::CloseEndpoint(id) => write!(f, "close-endpoint(0x{id:02X})"),
            Self::Read => write!(f, "read"),
        }
    }
}

/// A fully padded 513-byte output report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFrame {
    bytes: Vec<u8>,
}

impl CommandFrame {
    /// Raw report bytes, always `OUTPUT_REPORT_LEN` long.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Opcode + data portion, without the trailing padding.
    pub fn command_bytes(&self, len: usize) -> &[u8] {
        &self.bytes[COMMAND_START..COMMAND_START + len.min(MAX_COMMAND_LEN)]
    }
}

/// Build an output report from an opcode and optional extra data.
pub fn encode(opcode: &[u8], data: &[u8]) -> Result<CommandFrame> {
    let len = opcode.len() + data.len();
    if len > MAX_COMMAND_LEN {
        return Err(Error::FrameTooLarge {
            len,
            max: MAX_COMMAND_LEN,
        });
    }

    let mut bytes = vec![0u8; OUTPUT_REPORT_LEN];
    bytes[0] = REPORT_ID;
    bytes[1..COMMAND_START].copy_from_slice(&COMMAND_HEADER);
    bytes[COMMAND_START..COMMAND_START + opcode.len()].copy_from_slice(opcode);
    let data_start = COMMAND_START + opcode.len();
    bytes[data_start..data_start + data.len()].copy_from_slice(data);

    Ok(CommandFrame { bytes })
}

/// Two-byte tag identifying what a response carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DataType(pub [u8; 2]);

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X} {:02X}", self.0[0], self.0[1])
    }
}

/// Decoded header of an input report, borrowing the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHeader<'a> {
    /// Status byte (0x00 = success).
    pub status: u8,
    /// Data-type identifier at bytes 4–5.
    pub data_type: DataType,
    /// Everything from byte 6 onward.
    pub payload: &'a [u8],
}

impl ResponseHeader<'_> {
    /// Whether the device reported success.
    pub fn is_success(&self) -> bool {
        self.status == STATUS_SUCCESS
    }
}

/// Decode an input report header.
pub fn decode(raw: &[u8]) -> Result<ResponseHeader<'_>> {
    if raw.len() < PAYLOAD_START {
        return Err(Error::FrameTooShort {
            len: raw.len(),
            min: PAYLOAD_START,
        });
    }

    Ok(ResponseHeader {
        status: raw[STATUS_INDEX],
        data_type: DataType([raw[DATA_TYPE_INDEX], raw[DATA_TYPE_INDEX + 1]]),
        payload: &raw[PAYLOAD_START..],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn encode_close_endpoint_speed() {
        let frame = Command::CloseEndpoint(0x17).encode().unwrap();
        let bytes = frame.as_bytes();
        assert_eq!(bytes.len(), OUTPUT_REPORT_LEN);
        assert_eq!(
            &bytes[..8],
            &[0x00, 0x00, 0x00, 0x01, 0x05, 0x01, 0x01, 0x17]
        );
        assert!(bytes[8..].iter().all(|&b| b == 0));
    }

    #[test]
    fn encode_command_table() {
        let cases: [(Command, &[u8]); 5] = [
            (Command::EnterSoftwareMode, &[0x01, 0x03, 0x00, 0x02]),
            (Command::EnterHardwareMode, &[0x01, 0x03, 0x00, 0x01]),
            (Command::OpenEndpoint(0x21), &[0x0D, 0x01, 0x21]),
            (Command::CloseEndpoint(0x36), &[0x05, 0x01, 0x01, 0x36]),
            (Command::Read, &[0x08, 0x01]),
        ];
        for (cmd, expected) in cases {
            let frame = cmd.encode().unwrap();
            assert_eq!(frame.command_bytes(expected.len()), expected, "{cmd}");
            assert_eq!(frame.as_bytes()[4 + expected.len()], 0x00);
        }
    }

    #[test]
    fn encode_accepts_exact_capacity() {
        let data = vec![0xAB; MAX_COMMAND_LEN - 2];
        let frame = encode(&[0x01, 0x02], &data).unwrap();
        assert_eq!(frame.as_bytes().len(), OUTPUT_REPORT_LEN);
        assert_eq!(frame.as_bytes()[OUTPUT_REPORT_LEN - 1], 0xAB);
    }

    #[test]
    fn encode_rejects_oversized_command() {
        let data = vec![0u8; MAX_COMMAND_LEN];
        let err = encode(&[0x08], &data).unwrap_err();
        assert!(matches!(
            err,
            Error::FrameTooLarge {
                len: 510,
                max: 509
            }
        ));
    }

    #[test]
    fn decode_speed_response() {
        let mut raw = vec![0u8; INPUT_REPORT_LEN];
        raw[4] = 0x25;
        raw[6] = 0x02;
        let header = decode(&raw).unwrap();
        assert!(header.is_success());
        assert_eq!(header.data_type, DataType([0x25, 0x00]));
        assert_eq!(header.payload.len(), INPUT_REPORT_LEN - PAYLOAD_START);
        assert_eq!(header.payload[0], 0x02);
    }

    #[test]
    fn decode_reports_status() {
        let raw = [0x00, 0x03, 0x00, 0x00, 0x10, 0x00];
        let header = decode(&raw).unwrap();
        assert!(!header.is_success());
        assert_eq!(header.status, STATUS_INCORRECT_MODE);
        assert!(header.payload.is_empty());
    }

    #[test]
    fn decode_rejects_short_data() {
        let raw = [0x00, 0x00, 0x00, 0x00, 0x25];
        assert!(matches!(
            decode(&raw),
            Err(Error::FrameTooShort { len: 5, min: 6 })
        ));
    }

    proptest! {
        #[test]
        fn prop_encode_layout(
            opcode in prop::collection::vec(any::<u8>(), 0..16),
            data in prop::collection::vec(any::<u8>(), 0..400),
        ) {
            let frame = encode(&opcode, &data).unwrap();
            let bytes = frame.as_bytes();
            let end = COMMAND_START + opcode.len() + data.len();
            prop_assert_eq!(bytes.len(), OUTPUT_REPORT_LEN);
            prop_assert_eq!(bytes[0], REPORT_ID);
            prop_assert_eq!(&bytes[1..4], &COMMAND_HEADER[..]);
            prop_assert_eq!(&bytes[4..4 + opcode.len()], &opcode[..]);
            prop_assert_eq!(&bytes[4 + opcode.len()..end], &data[..]);
            prop_assert!(bytes[end..].iter().all(|&b| b == 0));
        }

        #[test]
        fn prop_decode_never_fails_on_header(raw in prop::collection::vec(any::<u8>(), 6..600)) {
            let header = decode(&raw).unwrap();
            prop_assert_eq!(header.data_type, DataType([raw[4], raw[5]]));
            prop_assert_eq!(header.status, raw[1]);
            prop_assert_eq!(header.payload, &raw[6..]);
        }
    }
}
