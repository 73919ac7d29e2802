//! Poller configuration: cadence, endpoints, speed slot layout and pacing.
//!
//! All fields have hub-appropriate defaults, so a config file only needs to
//! name what it overrides:
//!
//! ```json
//! { "interval_ms": 5000, "endpoints": ["temperature", "speed", "sub-device"] }
//! ```

use crate::endpoint::EndpointKind;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default sweep interval.
pub const DEFAULT_INTERVAL_MS: u64 = 2000;
/// Delay after every command; shorter values cause spurious failures on real hubs.
pub const DEFAULT_COMMAND_DELAY_MS: u64 = 50;
/// How long to wait for a matching response.
pub const DEFAULT_RESPONSE_TIMEOUT_MS: u64 = 1000;
/// Longest single blocking receive inside the response window.
pub const DEFAULT_RECEIVE_SLICE_MS: u64 = 100;

/// Command pacing and response deadlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Timing {
    pub command_delay_ms: u64,
    pub response_timeout_ms: u64,
    pub receive_slice_ms: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            command_delay_ms: DEFAULT_COMMAND_DELAY_MS,
            response_timeout_ms: DEFAULT_RESPONSE_TIMEOUT_MS,
            receive_slice_ms: DEFAULT_RECEIVE_SLICE_MS,
        }
    }
}

impl Timing {
    pub fn command_delay(&self) -> Duration {
        Duration::from_millis(self.command_delay_ms)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    pub fn receive_slice(&self) -> Duration {
        Duration::from_millis(self.receive_slice_ms)
    }
}

/// Where pump and fans sit in the speed endpoint's sensor list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpeedLayout {
    pub pump_slot: usize,
    pub first_fan_slot: usize,
    pub fan_count: usize,
}

impl Default for SpeedLayout {
    fn default() -> Self {
        Self {
            pump_slot: 1,
            first_fan_slot: 13,
            fan_count: 3,
        }
    }
}

impl SpeedLayout {
    /// Sensor slots holding fan speeds, in fan order.
    pub fn fan_slots(&self) -> std::ops::Range<usize> {
        self.first_fan_slot..self.first_fan_slot + self.fan_count
    }
}

/// Everything the telemetry poller needs besides the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PollerConfig {
    /// Time between sweep starts.
    pub interval_ms: u64,
    /// Endpoints read each sweep, in order.
    pub endpoints: Vec<EndpointKind>,
    pub layout: SpeedLayout,
    pub timing: Timing,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_INTERVAL_MS,
            endpoints: vec![EndpointKind::Temperature, EndpointKind::Speed],
            layout: SpeedLayout::default(),
            timing: Timing::default(),
        }
    }
}

impl PollerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Reject configurations the poller cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.interval_ms == 0 {
            return Err(Error::Config("interval must be positive".into()));
        }
        if self.endpoints.is_empty() {
            return Err(Error::Config("at least one endpoint is required".into()));
        }
        for (i, kind) in self.endpoints.iter().enumerate() {
            if self.endpoints[..i].contains(kind) {
                return Err(Error::Config(format!("endpoint '{kind}' listed twice")));
            }
        }
        if self.timing.response_timeout_ms == 0 || self.timing.receive_slice_ms == 0 {
            return Err(Error::Config(
                "response timeout and receive slice must be positive".into(),
            ));
        }
        if self.layout.fan_slots().contains(&self.layout.pump_slot) {
            return Err(Error::Config(format!(
                "pump slot {} overlaps fan slots {:?}",
                self.layout.pump_slot,
                self.layout.fan_slots()
            )));
        }
        Ok(())
    }

    /// Parse and validate a JSON config.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| Error::Config(format!("invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("read {}: {e}", path.display())))?;
        Self::from_json(&json)
    }
}
