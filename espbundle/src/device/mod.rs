//! Device model, serial port discovery and device resolution.
//!
//! A [`Device`] is nothing more than the name of a serial port that answered a
//! probe. No handle is kept open: every operation goes through the flashing
//! tool, which opens and closes the port itself.

pub mod detect;
pub mod resolver;

use std::fmt;

pub use detect::{DetectedPort, DeviceKind, PortScanner, detect_ports, format_port_list};
#[cfg(feature = "native")]
pub use detect::{NativePortScanner, try_detect_ports};
pub use resolver::resolve;

/// A reachable serial endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Device {
    port: String,
}

impl Device {
    /// Create a device for the given port name.
    pub fn new(port: impl Into<String>) -> Self {
        Self { port: port.into() }
    }

    /// Port name/path (e.g. "/dev/ttyUSB0" or "COM3").
    pub fn port(&self) -> &str {
        &self.port
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.port)
    }
}

/// Readiness of the attached device, as reported by a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DeviceStatus {
    /// Device answered and can be flashed.
    Found,
    /// Device answered but is not in download boot mode.
    BootModeError,
    /// Nothing usable answered.
    #[default]
    NotFound,
}

impl DeviceStatus {
    /// User-facing status line.
    pub fn message(&self) -> &'static str {
        match self {
            Self::Found => "ESP device found. Ready to upload.",
            Self::BootModeError => {
                "ESP device not in proper boot mode. Please put the device in download mode."
            },
            Self::NotFound => "No ESP device found. Please attach the device through a USB port.",
        }
    }

    /// Whether an upload may start.
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Found)
    }

    /// Map a non-ready status to the matching discovery error.
    pub fn into_result(self) -> crate::Result<()> {
        match self {
            Self::Found => Ok(()),
            Self::BootModeError => Err(crate::Error::BootModeError),
            Self::NotFound => Err(crate::Error::NoDeviceFound),
        }
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Found => write!(f, "found"),
            Self::BootModeError => write!(f, "boot-mode-error"),
            Self::NotFound => write!(f, "not-found"),
        }
    }
}
