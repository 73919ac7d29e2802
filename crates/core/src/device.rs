//! Device model: discovery of iCUE LINK hubs.

use crate::error::{Error, Result};
use crate::{LINK_HUB_PID, LINK_HUB_VID};
use tracing::{debug, info};

/// Human-readable hub name.
pub const LINK_HUB_NAME: &str = "Corsair iCUE LINK System Hub";

/// Information about a discovered hub interface.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub vid: u16,
    pub pid: u16,
    pub path: String,
    pub serial: Option<String>,
    pub interface_number: i32,
}

/// Whether a VID/PID pair belongs to an iCUE LINK hub.
pub fn is_link_hub(vid: u16, pid: u16) -> bool {
    vid == LINK_HUB_VID && pid == LINK_HUB_PID
}

/// Discover all connected iCUE LINK hubs.
///
/// Enumerates USB HID devices and returns every interface matching the
/// hub's vendor and product ID.
pub fn discover_devices() -> Result<Vec<DeviceInfo>> {
    debug!("Starting HID device enumeration");
    let api = hidapi::HidApi::new().map_err(|e| Error::Hid(e.to_string()))?;

    let mut devices = Vec::new();
    for info in api.device_list() {
        if !is_link_hub(info.vendor_id(), info.product_id()) {
            continue;
        }

        info!(
            vid = format_args!("0x{:04X}", info.vendor_id()),
            pid = format_args!("0x{:04X}", info.product_id()),
            interface = info.interface_number(),
            path = %info.path().to_string_lossy(),
            "Found {}", LINK_HUB_NAME
        );
        devices.push(DeviceInfo {
            vid: info.vendor_id(),
            pid: info.product_id(),
            path: info.path().to_string_lossy().into_owned(),
            serial: info.serial_number().map(|s| s.to_string()),
            interface_number: info.interface_number(),
        });
    }

    debug!(count = devices.len(), "Device enumeration complete");
    Ok(devices)
}

/// Pick the hub to talk to: the one at `path` if given, else the first found.
pub fn select_device(devices: &[DeviceInfo], path: Option<&str>) -> Result<DeviceInfo> {
    let found = match path {
        Some(path) => devices.iter().find(|d| d.path == path),
        None => devices.first(),
    };
    found.cloned().ok_or_else(|| {
        Error::DeviceNotFound(match path {
            Some(path) => format!("no {LINK_HUB_NAME} at {path}"),
            None => format!(
                "{LINK_HUB_NAME} (VID=0x{LINK_HUB_VID:04X} PID=0x{LINK_HUB_PID:04X}) not connected"
            ),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(path: &str) -> DeviceInfo {
        DeviceInfo {
            vid: LINK_HUB_VID,
            pid: LINK_HUB_PID,
            path: path.to_string(),
            serial: None,
            interface_number: 0,
        }
    }

    #[test]
    fn link_hub_ids() {
        assert!(is_link_hub(0x1B1C, 0x0C3F));
        assert!(!is_link_hub(0x1B1C, 0x0C3E));
        assert!(!is_link_hub(0x046D, 0x0C3F));
    }

    #[test]
    fn select_first_by_default() {
        let devices = [info("/dev/hidraw1"), info("/dev/hidraw2")];
        assert_eq!(select_device(&devices, None).unwrap().path, "/dev/hidraw1");
    }

    #[test]
    fn select_by_path() {
        let devices = [info("/dev/hidraw1"), info("/dev/hidraw2")];
        let picked = select_device(&devices, Some("/dev/hidraw2")).unwrap();
        assert_eq!(picked.path, "/dev/hidraw2");
    }

    #[test]
    fn select_reports_missing_device() {
        assert!(matches!(
            select_device(&[], None),
            Err(Error::DeviceNotFound(_))
        ));
        assert!(matches!(
            select_device(&[info("/dev/hidraw1")], Some("/dev/hidraw9")),
            Err(Error::DeviceNotFound(_))
        ));
    }
}
