//! Telemetry polling: one sweep reads every configured endpoint and folds
//! the results into a single [`Telemetry`] reading.
//!
//! A failing endpoint only blanks its own values. The stop flag is checked
//! between sweeps, so an endpoint transaction always finishes (and closes
//! the endpoint) before polling stops.

use crate::comm::{DeviceStatus, ErrorClass};
use crate::config::{PollerConfig, SpeedLayout};
use crate::endpoint::EndpointKind;
use crate::error::Result;
use crate::frame::Command;
use crate::parse::{parse_payload, SensorReading};
use crate::session::EndpointSession;
use crate::sink::TelemetrySink;
use crate::transport::{Clock, HidTransport, SystemClock};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// How often the stop flag is checked while waiting for the next sweep.
const STOP_CHECK_INTERVAL: Duration = Duration::from_millis(100);

/// Who drives the fans and pump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceMode {
    /// The hub runs its stored curves; sensor endpoints are refused.
    Hardware,
    /// The host is in control; sensor endpoints are readable.
    Software,
}

/// Aggregated reading from one sweep. `None` marks an unavailable sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    /// Sweep start time.
    pub timestamp: DateTime<Utc>,
    pub liquid_temp_c: Option<f64>,
    pub pump_rpm: Option<i16>,
    /// One entry per configured fan, in order.
    pub fan_rpms: Vec<Option<i16>>,
    /// Every slot reported by the sub-device endpoint. `None` unless the
    /// endpoint was read successfully this sweep.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_device_rpms: Option<Vec<Option<i16>>>,
    /// Endpoints whose transaction failed this sweep.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_endpoints: Vec<EndpointKind>,
}

impl Telemetry {
    /// A reading with every sensor unavailable.
    pub fn unavailable(timestamp: DateTime<Utc>, layout: &SpeedLayout) -> Self {
        Self {
            timestamp,
            liquid_temp_c: None,
            pump_rpm: None,
            fan_rpms: vec![None; layout.fan_count],
            sub_device_rpms: None,
            failed_endpoints: Vec::new(),
        }
    }

    /// Whether `kind` failed this sweep.
    pub fn failed(&self, kind: EndpointKind) -> bool {
        self.failed_endpoints.contains(&kind)
    }

    /// Fold one endpoint's readings in.
    pub fn apply(&mut self, kind: EndpointKind, readings: &[SensorReading], layout: &SpeedLayout) {
        match kind {
            EndpointKind::Temperature => {
                self.liquid_temp_c = readings.first().and_then(SensorReading::celsius);
            }
            EndpointKind::Speed => {
                let rpm_at = |slot: usize| readings.get(slot).and_then(SensorReading::rpm);
                self.pump_rpm = rpm_at(layout.pump_slot);
                self.fan_rpms = layout.fan_slots().map(rpm_at).collect();
            }
            EndpointKind::SubDevice => {
                self.sub_device_rpms = Some(readings.iter().map(SensorReading::rpm).collect());
            }
        }
    }
}

/// Polls one hub over an exclusively owned transport.
pub struct Poller<T, C = SystemClock> {
    transport: T,
    clock: C,
    config: PollerConfig,
    mode: DeviceMode,
    last_status: DeviceStatus,
}

impl<T: HidTransport, C: Clock> Poller<T, C> {
    /// Create a poller. The hub is assumed to be in hardware mode until
    /// software mode has been entered.
    pub fn new(transport: T, clock: C, config: PollerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            transport,
            clock,
            config,
            mode: DeviceMode::Hardware,
            last_status: DeviceStatus::Connected,
        })
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    /// Mode the poller last put the hub in.
    pub fn mode(&self) -> DeviceMode {
        self.mode
    }

    /// Health of the most recent sweep.
    pub fn last_status(&self) -> DeviceStatus {
        self.last_status
    }

    /// Swap in a freshly opened transport, e.g. after the hub was replugged.
    ///
    /// A new connection starts in hardware mode, so the next sweep enters
    /// software mode again.
    pub fn replace_transport(&mut self, transport: T) -> T {
        self.mode = DeviceMode::Hardware;
        self.last_status = DeviceStatus::Connected;
        std::mem::replace(&mut self.transport, transport)
    }

    fn session(&self) -> EndpointSession<'_> {
        EndpointSession::new(&self.transport, &self.clock, &self.config.timing)
    }

    /// Hand fan and pump control to the host, unlocking sensor endpoints.
    pub fn enter_software_mode(&mut self) -> Result<()> {
        info!("Entering software mode");
        self.session().send(Command::EnterSoftwareMode)?;
        self.mode = DeviceMode::Software;
        Ok(())
    }

    /// Return control to the hub's stored curves.
    pub fn enter_hardware_mode(&mut self) -> Result<()> {
        info!("Returning hub to hardware mode");
        self.session().send(Command::EnterHardwareMode)?;
        self.mode = DeviceMode::Hardware;
        Ok(())
    }

    /// Read and parse one endpoint.
    ///
    /// A mode error triggers one switch to software mode and exactly one retry.
    pub fn read_endpoint(&mut self, kind: EndpointKind) -> Result<Vec<SensorReading>> {
        let descriptor = kind.descriptor();

        let first = self.session().read(descriptor);
        let payload = match first {
            Err(e) if ErrorClass::classify(&e).needs_mode_switch() => {
                warn!(endpoint = %kind, error = %e, "Hub left software mode, retrying once");
                self.mode = DeviceMode::Hardware;
                self.enter_software_mode()?;
                self.session().read(descriptor)?
            }
            other => other?,
        };

        let readings = parse_payload(descriptor.format, &payload)?;
        debug!(endpoint = %kind, readings = readings.len(), "Endpoint parsed");
        Ok(readings)
    }

    /// Read every configured endpoint once.
    ///
    /// Never fails: endpoints that could not be read are left unavailable.
    pub fn sweep(&mut self) -> Telemetry {
        let layout = self.config.layout;
        let mut telemetry = Telemetry::unavailable(Utc::now(), &layout);

        if self.mode != DeviceMode::Software {
            if let Err(e) = self.enter_software_mode() {
                warn!(error = %e, "Failed to enter software mode");
            }
        }

        let endpoints = self.config.endpoints.clone();
        let mut failures = Vec::new();
        for kind in endpoints.iter().copied() {
            match self.read_endpoint(kind) {
                Ok(readings) => telemetry.apply(kind, &readings, &layout),
                Err(e) => {
                    let class = ErrorClass::classify(&e);
                    if class == ErrorClass::Internal {
                        error!(endpoint = %kind, error = %e, "Internal error reading endpoint");
                    } else {
                        warn!(
                            endpoint = %kind,
                            class = ?class,
                            error = %e,
                            "Endpoint unavailable this sweep"
                        );
                    }
                    failures.push(class);
                    telemetry.failed_endpoints.push(kind);
                }
            }
        }

        self.last_status = DeviceStatus::from_failures(endpoints.len(), &failures);
        telemetry
    }

    /// Sweep at the configured interval, pushing each reading to `sink`,
    /// until `stop` is set. Returns the number of sweeps emitted.
    ///
    /// The hub is returned to hardware mode before returning. A sink error
    /// stops polling and is returned.
    pub fn run(&mut self, stop: &AtomicBool, sink: &mut dyn TelemetrySink) -> Result<u64> {
        self.run_loop(stop, sink, None)
    }

    /// Like [`Poller::run`], but reopens the transport with `reconnect`
    /// after a sweep in which the hub stopped answering altogether.
    ///
    /// A failed reconnect is logged and retried after the next sweep.
    pub fn run_with_reconnect<R>(
        &mut self,
        stop: &AtomicBool,
        sink: &mut dyn TelemetrySink,
        mut reconnect: R,
    ) -> Result<u64>
    where
        R: FnMut() -> Result<T>,
    {
        self.run_loop(stop, sink, Some(&mut reconnect))
    }

    fn run_loop(
        &mut self,
        stop: &AtomicBool,
        sink: &mut dyn TelemetrySink,
        mut reconnect: Option<&mut dyn FnMut() -> Result<T>>,
    ) -> Result<u64> {
        info!(
            interval_ms = self.config.interval_ms,
            endpoints = ?self.config.endpoints,
            "Starting telemetry polling"
        );

        let mut sweeps = 0u64;
        let result = loop {
            if stop.load(Ordering::SeqCst) {
                break Ok(sweeps);
            }

            let next = self.clock.now() + self.config.interval();
            let telemetry = self.sweep();
            if let Err(e) = sink.emit(&telemetry) {
                break Err(e);
            }
            sweeps += 1;

            if self.last_status.needs_reconnect() {
                if let Some(reconnect) = reconnect.as_deref_mut() {
                    match reconnect() {
                        Ok(transport) => {
                            info!("Hub reconnected");
                            self.replace_transport(transport);
                        }
                        Err(e) => warn!(error = %e, "Reconnect failed"),
                    }
                }
            }

            self.wait_until(next, stop);
        };

        if let Err(e) = self.enter_hardware_mode() {
            warn!(error = %e, "Failed to return hub to hardware mode");
        }
        info!(sweeps, "Telemetry polling stopped");
        result
    }

    fn wait_until(&self, deadline: Instant, stop: &AtomicBool) {
        loop {
            if stop.load(Ordering::SeqCst) {
                return;
            }
            let now = self.clock.now();
            if now >= deadline {
                return;
            }
            self.clock.sleep((deadline - now).min(STOP_CHECK_INTERVAL));
        }
    }
}
