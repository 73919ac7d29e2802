//! link-telemetry CLI: read pump, fan and liquid temperature telemetry.

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use link_telemetry_core::config::PollerConfig;
use link_telemetry_core::device::{self, DeviceInfo};
use link_telemetry_core::error::Error as CoreError;
use link_telemetry_core::frame::{INPUT_REPORT_LEN, OUTPUT_REPORT_LEN};
use link_telemetry_core::poller::Poller;
use link_telemetry_core::poller::Telemetry;
use link_telemetry_core::sink::{
    self, ConsoleSink, CsvSink, JsonLinesSink, MetricsFileSink, TelemetrySink,
};
use link_telemetry_core::transport::{HidTransport, SystemClock};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct CliHidTransport {
    device: hidapi::HidDevice,
}

impl CliHidTransport {
    fn open(info: &DeviceInfo) -> link_telemetry_core::error::Result<Self> {
        let api = hidapi::HidApi::new().map_err(|e| CoreError::Hid(format!("hidapi init: {e}")))?;
        let path = std::ffi::CString::new(info.path.clone())
            .map_err(|e| CoreError::Hid(format!("device path: {e}")))?;
        let device = api.open_path(&path).map_err(|e| {
            CoreError::Hid(format!(
                "open HID device (VID=0x{:04X} PID=0x{:04X} path={}): {e}",
                info.vid, info.pid, info.path
            ))
        })?;

        Ok(Self { device })
    }

    /// Find the hub again and open a fresh handle, e.g. after a replug.
    fn reopen(device_path: Option<&str>) -> link_telemetry_core::error::Result<Self> {
        let devices = device::discover_devices()?;
        let info = device::select_device(&devices, device_path)?;
        Self::open(&info)
    }
}

impl HidTransport for CliHidTransport {
    fn send(&self, data: &[u8]) -> link_telemetry_core::error::Result<()> {
        debug_assert_eq!(data.len(), OUTPUT_REPORT_LEN);
        self.device
            .write(data)
            .map_err(|e| CoreError::Hid(format!("write: {e}")))?;
        Ok(())
    }

    fn receive(&self, timeout: Duration) -> link_telemetry_core::error::Result<Vec<u8>> {
        let mut response = [0u8; INPUT_REPORT_LEN];
        let millis = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX);
        let n = self
            .device
            .read_timeout(&mut response, millis)
            .map_err(|e| CoreError::Hid(format!("read_timeout: {e}")))?;

        if n == 0 {
            return Err(CoreError::Timeout(format!(
                "hid_read timed out after {millis}ms"
            )));
        }

        Ok(response[..n].to_vec())
    }
}

#[derive(Parser)]
#[command(
    name = "link-telemetry",
    version,
    about = "Read live telemetry from a Corsair iCUE LINK System Hub"
)]
struct Cli {
    /// Enable debug output (overrides RUST_LOG).
    #[arg(short, long, global = true)]
    debug: bool,

    /// HID path of the hub to use (default: first found).
    #[arg(long, global = true)]
    device: Option<String>,

    /// JSON poller configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List connected iCUE LINK hubs.
    ListDevices,
    /// Take a single reading and print it.
    Read {
        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Poll continuously until Ctrl+C.
    Monitor {
        /// Polling interval in seconds.
        #[arg(short, long)]
        interval: Option<f64>,
        /// Write readings to this CSV file instead of printing.
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Print one JSON object per reading.
        #[arg(long, conflicts_with = "output")]
        json: bool,
        /// Also keep this file updated with Prometheus gauges.
        #[arg(long)]
        metrics: Option<PathBuf>,
    },
    /// Switch the hub between hardware and software control.
    SetMode {
        mode: Mode,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    Hardware,
    Software,
}

fn load_config(path: Option<&PathBuf>) -> Result<PollerConfig> {
    Ok(match path {
        Some(path) => PollerConfig::load(path)?,
        None => PollerConfig::default(),
    })
}

fn open_poller(
    device_path: Option<&str>,
    config: PollerConfig,
) -> Result<(DeviceInfo, Poller<CliHidTransport>)> {
    let devices = device::discover_devices()?;
    let info = device::select_device(&devices, device_path)?;
    let transport = CliHidTransport::open(&info)?;
    let poller = Poller::new(transport, SystemClock, config)?;
    Ok((info, poller))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::ListDevices => {
            let devices = device::discover_devices()?;
            if devices.is_empty() {
                println!("No iCUE LINK System Hub found.");
                println!("Ensure the hub is connected and you have permission to access it.");
            } else {
                for dev in &devices {
                    println!(
                        "{} (VID: 0x{:04X}, PID: 0x{:04X}, interface: {}, path: {})",
                        device::LINK_HUB_NAME,
                        dev.vid,
                        dev.pid,
                        dev.interface_number,
                        dev.path
                    );
                }
            }
        }
        Commands::Read { json } => {
            let (_, mut poller) = open_poller(cli.device.as_deref(), config)?;
            let telemetry = poller.sweep();
            if let Err(e) = poller.enter_hardware_mode() {
                tracing::warn!(error = %e, "Failed to return hub to hardware mode");
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&telemetry)?);
            } else {
                println!("{}", sink::format_line(&telemetry));
            }
        }
        Commands::Monitor {
            interval,
            output,
            json,
            metrics,
        } => {
            let mut config = config;
            if let Some(secs) = interval {
                if !(secs.is_finite() && secs > 0.0) {
                    anyhow::bail!("Interval must be positive");
                }
                config.interval_ms = (secs * 1000.0).round().max(1.0) as u64;
            }
            let fan_count = config.layout.fan_count;
            let (info, mut poller) = open_poller(cli.device.as_deref(), config)?;

            let stop = Arc::new(AtomicBool::new(false));
            let handler_stop = Arc::clone(&stop);
            ctrlc::set_handler(move || {
                eprintln!("\nStopping telemetry capture...");
                handler_stop.store(true, Ordering::SeqCst);
            })?;

            let mut sink: Box<dyn TelemetrySink> = match output {
                Some(path) => {
                    println!("Logging telemetry data to: {}", path.display());
                    let file = std::fs::File::create(&path)?;
                    Box::new(CsvSink::new(file, info.path.clone(), fan_count))
                }
                None if json => Box::new(JsonLinesSink::new(std::io::stdout())),
                None => Box::new(ConsoleSink::new(std::io::stdout())),
            };

            let mut metrics = metrics.map(|path| {
                println!("Exporting metrics to: {}", path.display());
                MetricsFileSink::new(path)
            });
            let mut emit = |t: &Telemetry| -> link_telemetry_core::error::Result<()> {
                sink.emit(t)?;
                if let Some(metrics) = metrics.as_mut() {
                    metrics.emit(t)?;
                }
                Ok(())
            };

            let device_path = cli.device.clone();
            let reconnect = || {
                tracing::info!("Hub stopped answering, reconnecting");
                CliHidTransport::reopen(device_path.as_deref())
            };

            println!("--- Starting Telemetry Capture (Press Ctrl+C to exit) ---");
            let sweeps = poller.run_with_reconnect(&stop, &mut emit, reconnect)?;
            tracing::info!(sweeps, "Capture finished");
        }
        Commands::SetMode { mode } => {
            let (_, mut poller) = open_poller(cli.device.as_deref(), config)?;
            match mode {
                Mode::Hardware => poller.enter_hardware_mode()?,
                Mode::Software => poller.enter_software_mode()?,
            }
            let label = match mode {
                Mode::Hardware => "hardware",
                Mode::Software => "software",
            };
            println!("Hub switched to {label} mode");
        }
    }

    Ok(())
}
