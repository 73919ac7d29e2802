//! Static endpoint table: which id to open, which data type to expect,
//! and how to parse the payload.

use crate::frame::DataType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical sensor channels exposed by the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EndpointKind {
    Speed,
    Temperature,
    SubDevice,
}

impl EndpointKind {
    /// All endpoint kinds, in table order.
    pub const ALL: &'static [EndpointKind] = &[
        EndpointKind::Speed,
        EndpointKind::Temperature,
        EndpointKind::SubDevice,
    ];

    /// Static descriptor for this kind.
    pub fn descriptor(self) -> &'static EndpointDescriptor {
        match self {
            Self::Speed => &SPEED,
            Self::Temperature => &TEMPERATURE,
            Self::SubDevice => &SUB_DEVICE,
        }
    }

    /// Parse an endpoint kind from a CLI-friendly name (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "speed" | "speeds" => Some(Self::Speed),
            "temperature" | "temp" | "temps" => Some(Self::Temperature),
            "sub-device" | "subdevice" | "sub-devices" => Some(Self::SubDevice),
            _ => None,
        }
    }

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Speed => "speed",
            Self::Temperature => "temperature",
            Self::SubDevice => "sub-device",
        }
    }
}

impl fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Payload encodings. The hub uses two incompatible layouts on the same
/// transport; which one applies is fixed per endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadFormat {
    /// `[count, (status, lo, hi) * count]`.
    Blocks,
    /// Raw tenths of a degree at frame bytes 11–12.
    FixedTemperature,
}

/// Everything needed to read one endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointDescriptor {
    pub kind: EndpointKind,
    /// Id sent with open/close commands.
    pub id: u8,
    /// Data type a matching response carries.
    pub data_type: DataType,
    pub format: PayloadFormat,
}

/// Pump and fan speeds.
pub const SPEED: EndpointDescriptor = EndpointDescriptor {
    kind: EndpointKind::Speed,
    id: 0x17,
    data_type: DataType([0x25, 0x00]),
    format: PayloadFormat::Blocks,
};

/// Liquid temperature.
pub const TEMPERATURE: EndpointDescriptor = EndpointDescriptor {
    kind: EndpointKind::Temperature,
    id: 0x21,
    data_type: DataType([0x10, 0x00]),
    format: PayloadFormat::FixedTemperature,
};

/// Devices chained behind the hub.
pub const SUB_DEVICE: EndpointDescriptor = EndpointDescriptor {
    kind: EndpointKind::SubDevice,
    id: 0x36,
    data_type: DataType([0x21, 0x00]),
    format: PayloadFormat::Blocks,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_table_matches_wire_ids() {
        assert_eq!(EndpointKind::Speed.descriptor().id, 0x17);
        assert_eq!(EndpointKind::Temperature.descriptor().id, 0x21);
        assert_eq!(EndpointKind::SubDevice.descriptor().id, 0x36);
        assert_eq!(
            EndpointKind::Speed.descriptor().data_type,
            DataType([0x25, 0x00])
        );
        assert_eq!(
            EndpointKind::Temperature.descriptor().data_type,
            DataType([0x10, 0x00])
        );
        assert_eq!(
            EndpointKind::SubDevice.descriptor().data_type,
            DataType([0x21, 0x00])
        );
    }

    #[test]
    fn descriptor_kind_is_consistent() {
        for kind in EndpointKind::ALL {
            assert_eq!(kind.descriptor().kind, *kind);
        }
    }

    #[test]
    fn only_temperature_uses_fixed_layout() {
        for kind in EndpointKind::ALL {
            let fixed = kind.descriptor().format == PayloadFormat::FixedTemperature;
            assert_eq!(fixed, *kind == EndpointKind::Temperature);
        }
    }

    #[test]
    fn from_name_accepts_variants() {
        assert_eq!(EndpointKind::from_name("Speed"), Some(EndpointKind::Speed));
        assert_eq!(
            EndpointKind::from_name("temp"),
            Some(EndpointKind::Temperature)
        );
        assert_eq!(
            EndpointKind::from_name("sub-device"),
            Some(EndpointKind::SubDevice)
        );
        assert_eq!(EndpointKind::from_name("pump"), None);
    }

    #[test]
    fn kind_serializes_kebab_case() {
        let json = serde_json::to_string(&EndpointKind::SubDevice).unwrap();
        assert_eq!(json, "\"sub-device\"");
    }
}
