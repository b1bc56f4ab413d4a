//! Serial port enumeration.
//!
//! Ports are returned in whatever order the platform enumerates them. The
//! USB bridge classification is informational only; every port is a probe
//! candidate.

#[cfg(feature = "native")]
use log::{debug, trace};
use std::fmt::Write;

/// Known USB bridge/device kinds found on ESP development boards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    /// CH340/CH341/CH9102 USB-to-Serial converter.
    Ch340,
    /// Silicon Labs CP210x USB-to-Serial converter.
    Cp210x,
    /// FTDI FT232/FT2232/FT4232 USB-to-Serial converter.
    Ftdi,
    /// Prolific PL2303 USB-to-Serial converter.
    Prolific,
    /// Espressif native USB-Serial/JTAG.
    Espressif,
    /// Unknown device.
    Unknown,
}

/// Known USB VID/PID pairs. An empty PID list matches any product.
const KNOWN_USB_DEVICES: &[(u16, &[u16], DeviceKind)] = &[
    (
        0x1A86,
        &[0x7523, 0x7522, 0x5523, 0x55D4, 0x55D3],
        DeviceKind::Ch340,
    ),
    (0x10C4, &[0xEA60, 0xEA70, 0xEA71], DeviceKind::Cp210x),
    (
        0x0403,
        &[0x6001, 0x6010, 0x6011, 0x6014, 0x6015],
        DeviceKind::Ftdi,
    ),
    (0x067B, &[0x2303, 0x23A3, 0x23C3, 0x23D3], DeviceKind::Prolific),
    (0x303A, &[], DeviceKind::Espressif),
];

impl DeviceKind {
    /// Classify a USB VID/PID pair.
    #[must_use]
    pub fn from_vid_pid(vid: u16, pid: u16) -> Self {
        for (known_vid, pids, device) in KNOWN_USB_DEVICES {
            if vid == *known_vid && (pids.is_empty() || pids.contains(&pid)) {
                return *device;
            }
        }
        Self::Unknown
    }

    /// Get a human-readable name for the device kind.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ch340 => "CH340/CH9102",
            Self::Cp210x => "CP210x",
            Self::Ftdi => "FTDI",
            Self::Prolific => "PL2303",
            Self::Espressif => "Espressif USB",
            Self::Unknown => "Unknown",
        }
    }

    /// Check if this is a known/expected device kind.
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

/// Serial port snapshot entry.
#[derive(Debug, Clone)]
pub struct DetectedPort {
    /// Port name/path (e.g., "/dev/ttyUSB0" or "COM3").
    pub name: String,
    /// Classified device kind.
    pub device: DeviceKind,
    /// USB Vendor ID (if available).
    pub vid: Option<u16>,
    /// USB Product ID (if available).
    pub pid: Option<u16>,
    /// Device manufacturer string (if available).
    pub manufacturer: Option<String>,
    /// Device product string (if available).
    pub product: Option<String>,
    /// Serial number (if available).
    pub serial: Option<String>,
}

impl DetectedPort {
    /// A port known only by name, with no USB metadata.
    pub fn from_name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            device: DeviceKind::Unknown,
            vid: None,
            pid: None,
            manufacturer: None,
            product: None,
            serial: None,
        }
    }
}

/// Source of candidate ports for device resolution.
pub trait PortScanner {
    /// Current snapshot of candidate ports. Never cached.
    fn list_candidates(&self) -> Vec<DetectedPort>;
}

/// A fixed candidate list, e.g. a port given on the command line.
impl PortScanner for Vec<DetectedPort> {
    fn list_candidates(&self) -> Vec<DetectedPort> {
        self.clone()
    }
}

/// Scanner backed by the platform serial port enumeration.
#[cfg(feature = "native")]
#[derive(Debug, Clone, Copy, Default)]
pub struct NativePortScanner;

#[cfg(feature = "native")]
impl PortScanner for NativePortScanner {
    fn list_candidates(&self) -> Vec<DetectedPort> {
        detect_ports()
    }
}

/// Enumerate serial ports with metadata.
#[cfg(feature = "native")]
pub fn try_detect_ports() -> crate::Result<Vec<DetectedPort>> {
    let ports = serialport::available_ports()?;

    Ok(ports
        .into_iter()
        .map(|port_info| {
            let mut detected = DetectedPort::from_name(port_info.port_name.clone());

            if let serialport::SerialPortType::UsbPort(usb_info) = port_info.port_type {
                detected.device = DeviceKind::from_vid_pid(usb_info.vid, usb_info.pid);
                trace!(
                    "Found USB port: {} (VID: {:04X}, PID: {:04X}, Device: {:?})",
                    port_info.port_name, usb_info.vid, usb_info.pid, detected.device
                );
                detected.vid = Some(usb_info.vid);
                detected.pid = Some(usb_info.pid);
                detected.manufacturer = usb_info.manufacturer;
                detected.product = usb_info.product;
                detected.serial = usb_info.serial_number;
            }

            detected
        })
        .collect())
}

/// Detect all available serial ports. Enumeration errors yield an empty list.
#[cfg(feature = "native")]
pub fn detect_ports() -> Vec<DetectedPort> {
    try_detect_ports().unwrap_or_else(|e| {
        debug!("Failed to enumerate serial ports: {e}");
        Vec::new()
    })
}

/// Detect all available serial ports (no native support - always empty).
#[cfg(not(feature = "native"))]
pub fn detect_ports() -> Vec<DetectedPort> {
    Vec::new()
}

/// One line per port: name, USB id, bridge kind and product string, each
/// only when known.
pub fn format_port_list(ports: &[DetectedPort]) -> Vec<String> {
    ports
        .iter()
        .map(|port| {
            let mut line = port.name.clone();
            if let (Some(vid), Some(pid)) = (port.vid, port.pid) {
                let _ = write!(line, " {vid:04x}:{pid:04x}");
            }
            if port.device.is_known() {
                let _ = write!(line, " ({})", port.device.name());
            }
            if let Some(product) = &port.product {
                let _ = write!(line, " \"{product}\"");
            }
            line
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_kind_from_vid_pid() {
        assert_eq!(DeviceKind::from_vid_pid(0x1A86, 0x7523), DeviceKind::Ch340);
        assert_eq!(DeviceKind::from_vid_pid(0x1A86, 0x55D4), DeviceKind::Ch340);
        assert_eq!(DeviceKind::from_vid_pid(0x10C4, 0xEA60), DeviceKind::Cp210x);
        assert_eq!(DeviceKind::from_vid_pid(0x0403, 0x6001), DeviceKind::Ftdi);
        assert_eq!(DeviceKind::from_vid_pid(0x067B, 0x2303), DeviceKind::Prolific);
        assert_eq!(DeviceKind::from_vid_pid(0x303A, 0x1001), DeviceKind::Espressif);
        assert_eq!(DeviceKind::from_vid_pid(0x1A86, 0x0001), DeviceKind::Unknown);
        assert_eq!(DeviceKind::from_vid_pid(0x1234, 0x5678), DeviceKind::Unknown);
    }

    #[test]
    fn test_device_kind_is_known() {
        assert!(DeviceKind::Espressif.is_known());
        assert!(!DeviceKind::Unknown.is_known());
    }

    #[test]
    fn test_static_scanner_preserves_order() {
        let scanner = vec![
            DetectedPort::from_name("/dev/ttyUSB1"),
            DetectedPort::from_name("/dev/ttyUSB0"),
        ];
        let names: Vec<String> = scanner
            .list_candidates()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, ["/dev/ttyUSB1", "/dev/ttyUSB0"]);
    }

    #[test]
    fn test_format_port_list() {
        let ports = vec![
            DetectedPort {
                name: "/dev/ttyUSB0".to_string(),
                device: DeviceKind::Cp210x,
                vid: Some(0x10C4),
                pid: Some(0xEA60),
                manufacturer: Some("Silicon Labs".to_string()),
                product: Some("CP2102 USB to UART Bridge Controller".to_string()),
                serial: None,
            },
            DetectedPort {
                vid: Some(0x1234),
                pid: Some(0x5678),
                ..DetectedPort::from_name("/dev/ttyACM0")
            },
            DetectedPort::from_name("/dev/ttyS0"),
        ];

        let formatted = format_port_list(&ports);
        assert_eq!(formatted.len(), 3);
        assert_eq!(
            formatted[0],
            "/dev/ttyUSB0 10c4:ea60 (CP210x) \"CP2102 USB to UART Bridge Controller\""
        );
        assert_eq!(formatted[1], "/dev/ttyACM0 1234:5678");
        assert_eq!(formatted[2], "/dev/ttyS0");
    }

    #[cfg(feature = "native")]
    #[test]
    fn test_detect_ports_does_not_panic() {
        let _ = NativePortScanner.list_candidates();
    }
}
