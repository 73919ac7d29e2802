//! Consumers of aggregated telemetry, one reading per sweep.

use crate::endpoint::EndpointKind;
use crate::error::Result;
use crate::poller::Telemetry;
use chrono::SecondsFormat;
use std::fmt::Write as _;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Receives one reading per sweep.
pub trait TelemetrySink {
    fn emit(&mut self, telemetry: &Telemetry) -> Result<()>;
}

impl<F> TelemetrySink for F
where
    F: FnMut(&Telemetry) -> Result<()>,
{
    fn emit(&mut self, telemetry: &Telemetry) -> Result<()> {
        self(telemetry)
    }
}

fn or_na<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| v.to_string())
}

fn rpm_list(rpms: &[Option<i16>]) -> String {
    rpms.iter().map(|rpm| or_na(*rpm)).collect::<Vec<_>>().join(", ")
}

/// Format a reading as a single console line.
pub fn format_line(t: &Telemetry) -> String {
    let liquid = t
        .liquid_temp_c
        .map_or_else(|| "N/A".to_string(), |c| format!("{c:.1}°C"));

    let mut line = format!(
        "{} | Liquid: {} | Pump: {} RPM | Fans: {} RPM",
        t.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
        liquid,
        or_na(t.pump_rpm),
        rpm_list(&t.fan_rpms)
    );
    match &t.sub_device_rpms {
        Some(rpms) if rpms.is_empty() => line.push_str(" | Devices: none"),
        Some(rpms) => {
            let _ = write!(line, " | Devices: {} RPM", rpm_list(rpms));
        }
        None if t.failed(EndpointKind::SubDevice) => line.push_str(" | Devices: N/A"),
        None => {}
    }
    line
}

/// Writes one human-readable line per reading.
pub struct ConsoleSink<W: Write> {
    out: W,
}

impl<W: Write> ConsoleSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> TelemetrySink for ConsoleSink<W> {
    fn emit(&mut self, telemetry: &Telemetry) -> Result<()> {
        writeln!(self.out, "{}", format_line(telemetry))?;
        self.out.flush()?;
        Ok(())
    }
}

/// Appends CSV rows; the header is written before the first row.
///
/// Unavailable sensors are written as empty cells.
pub struct CsvSink<W: Write> {
    out: W,
    device_path: String,
    fan_count: usize,
    header_written: bool,
}

impl<W: Write> CsvSink<W> {
    pub fn new(out: W, device_path: impl Into<String>, fan_count: usize) -> Self {
        Self {
            out,
            device_path: device_path.into(),
            fan_count,
            header_written: false,
        }
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    fn header(&self) -> String {
        let mut cols = vec![
            "timestamp".to_string(),
            "device_path".to_string(),
            "liquid_temp_c".to_string(),
            "pump_rpm".to_string(),
        ];
        cols.extend((1..=self.fan_count).map(|i| format!("fan{i}_rpm")));
        cols.join(",")
    }

    fn row(&self, t: &Telemetry) -> String {
        let cell = |v: Option<String>| v.unwrap_or_default();
        let mut cols = vec![
            t.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            quote(&self.device_path),
            cell(t.liquid_temp_c.map(|c| format!("{c:.1}"))),
            cell(t.pump_rpm.map(|r| r.to_string())),
        ];
        cols.extend((0..self.fan_count).map(|i| {
            cell(t.fan_rpms.get(i).copied().flatten().map(|r| r.to_string()))
        }));
        cols.join(",")
    }
}

/// Quote a CSV field if it contains a separator, quote or newline.
fn quote(field: &str) -> String {
    if field.contains([',', '"', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

impl<W: Write> TelemetrySink for CsvSink<W> {
    fn emit(&mut self, telemetry: &Telemetry) -> Result<()> {
        if !self.header_written {
            writeln!(self.out, "{}", self.header())?;
            self.header_written = true;
        }
        writeln!(self.out, "{}", self.row(telemetry))?;
        self.out.flush()?;
        Ok(())
    }
}

/// Writes one JSON object per line.
pub struct JsonLinesSink<W: Write> {
    out: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> TelemetrySink for JsonLinesSink<W> {
    fn emit(&mut self, telemetry: &Telemetry) -> Result<()> {
        serde_json::to_writer(&mut self.out, telemetry).map_err(std::io::Error::from)?;
        writeln!(self.out)?;
        self.out.flush()?;
        Ok(())
    }
}

fn gauge_header(out: &mut String, name: &str, help: &str) {
    let _ = writeln!(out, "# HELP {name} {help}");
    let _ = writeln!(out, "# TYPE {name} gauge");
}

/// Render a reading in the Prometheus text exposition format.
///
/// Unavailable sensors have no sample, so scrapers see a gap instead of a
/// fake zero.
pub fn render_metrics(t: &Telemetry) -> String {
    let mut out = String::new();

    gauge_header(&mut out, "icue_link_pump_rpm", "Pump speed in RPM");
    if let Some(rpm) = t.pump_rpm {
        let _ = writeln!(out, "icue_link_pump_rpm {rpm}");
    }

    gauge_header(&mut out, "icue_link_water_temp", "Water temperature in Celsius");
    if let Some(celsius) = t.liquid_temp_c {
        let _ = writeln!(out, "icue_link_water_temp {celsius}");
    }

    gauge_header(&mut out, "icue_link_fan_rpm", "Fan speed in RPM");
    for (i, rpm) in t.fan_rpms.iter().enumerate() {
        if let Some(rpm) = rpm {
            let _ = writeln!(out, "icue_link_fan_rpm{{fan_id=\"{}\"}} {rpm}", i + 1);
        }
    }

    out
}

/// Writes a full metrics block per reading to a stream.
pub struct MetricsSink<W: Write> {
    out: W,
}

impl<W: Write> MetricsSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> TelemetrySink for MetricsSink<W> {
    fn emit(&mut self, telemetry: &Telemetry) -> Result<()> {
        writeln!(self.out, "{}", render_metrics(telemetry))?;
        self.out.flush()?;
        Ok(())
    }
}

/// Keeps a metrics file current for a textfile collector.
///
/// Each reading replaces the file through a rename, so readers never see a
/// half-written block.
pub struct MetricsFileSink {
    path: PathBuf,
}

impl MetricsFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TelemetrySink for MetricsFileSink {
    fn emit(&mut self, telemetry: &Telemetry) -> Result<()> {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        std::fs::write(&tmp, render_metrics(telemetry))?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
