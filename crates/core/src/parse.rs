//! Sensor payload parsers.
//!
//! Speed and sub-device endpoints answer with a counted list of 3-byte
//! sensor blocks. The temperature endpoint ignores that framing and puts a
//! single value at a fixed offset. Both layouts are what the firmware sends,
//! so they are kept distinct and selected by endpoint, never by payload shape.

use crate::endpoint::PayloadFormat;
use crate::error::{Error, Result};
use crate::frame::PAYLOAD_START;
use serde::{Deserialize, Serialize};

/// Size of one `[status, value_lo, value_hi]` sensor block.
pub const SENSOR_BLOCK_LEN: usize = 3;
/// Block status marking a connected sensor.
pub const SENSOR_AVAILABLE: u8 = 0x00;

/// Absolute frame offset of the raw temperature value.
pub const TEMPERATURE_FRAME_OFFSET: usize = 11;
/// The same offset, relative to the payload.
pub const TEMPERATURE_PAYLOAD_OFFSET: usize = TEMPERATURE_FRAME_OFFSET - PAYLOAD_START;
/// Raw temperature unit: tenths of a degree.
pub const TEMPERATURE_SCALE: f64 = 10.0;

/// One parsed sensor value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum SensorReading {
    /// Rotational speed in RPM.
    Speed(i16),
    /// Degrees Celsius.
    Temperature(f64),
    /// Sensor slot empty, disconnected, or not readable this sweep.
    Unavailable,
}

impl SensorReading {
    /// RPM if this is an available speed reading.
    pub fn rpm(&self) -> Option<i16> {
        match self {
            Self::Speed(rpm) => Some(*rpm),
            _ => None,
        }
    }

    /// Celsius if this is an available temperature reading.
    pub fn celsius(&self) -> Option<f64> {
        match self {
            Self::Temperature(c) => Some(*c),
            _ => None,
        }
    }

    pub fn is_available(&self) -> bool {
        !matches!(self, Self::Unavailable)
    }
}

/// Parse a payload with the format fixed for its endpoint.
pub fn parse_payload(format: PayloadFormat, payload: &[u8]) -> Result<Vec<SensorReading>> {
    match format {
        PayloadFormat::Blocks => parse_blocks(payload),
        PayloadFormat::FixedTemperature => Ok(vec![parse_temperature(payload)?]),
    }
}

/// Parse a counted list of sensor blocks.
///
/// Fails without returning partial readings if the payload is shorter than
/// the declared count requires.
pub fn parse_blocks(payload: &[u8]) -> Result<Vec<SensorReading>> {
    let (&count, blocks) = payload.split_first().ok_or(Error::MalformedPayload {
        reason: "missing sensor count",
        len: 0,
    })?;

    let needed = count as usize * SENSOR_BLOCK_LEN;
    if blocks.len() < needed {
        return Err(Error::MalformedPayload {
            reason: "sensor count exceeds payload",
            len: payload.len(),
        });
    }

    Ok(blocks[..needed]
        .chunks_exact(SENSOR_BLOCK_LEN)
        .map(|block| match block[0] {
            SENSOR_AVAILABLE => SensorReading::Speed(i16::from_le_bytes([block[1], block[2]])),
            _ => SensorReading::Unavailable,
        })
        .collect())
}

/// Parse the liquid temperature at its fixed position.
pub fn parse_temperature(payload: &[u8]) -> Result<SensorReading> {
    let raw = payload
        .get(TEMPERATURE_PAYLOAD_OFFSET..TEMPERATURE_PAYLOAD_OFFSET + 2)
        .ok_or(Error::MalformedPayload {
            reason: "temperature value out of range",
            len: payload.len(),
        })?;

    let tenths = i16::from_le_bytes([raw[0], raw[1]]);
    Ok(SensorReading::Temperature(
        f64::from(tenths) / TEMPERATURE_SCALE,
    ))
}
