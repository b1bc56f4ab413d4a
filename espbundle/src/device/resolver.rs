//! Device resolution over candidate ports.

use crate::device::{Device, DeviceStatus, PortScanner, format_port_list};
use crate::tool::FlashTool;
use log::{debug, info};

/// Find the first usable device.
///
/// Candidates are probed in scanner order. The first `Found` port wins. A
/// `BootModeError` ends the scan immediately: the port is taken to be the
/// intended board in the wrong state, so the remaining ports are not probed.
/// `NotFound` moves on to the next candidate.
pub fn resolve<S, T>(scanner: &S, tool: &T) -> (Option<Device>, DeviceStatus)
where
    S: PortScanner + ?Sized,
    T: FlashTool + ?Sized,
{
    let candidates = scanner.list_candidates();
    if candidates.is_empty() {
        debug!("No serial ports to probe");
        return (None, DeviceStatus::NotFound);
    }
    debug!("Probing {}", format_port_list(&candidates).join(", "));

    for candidate in candidates {
        let device = Device::new(candidate.name);
        match tool.probe(&device) {
            DeviceStatus::Found => {
                info!("ESP device found on {device}");
                return (Some(device), DeviceStatus::Found);
            },
            DeviceStatus::BootModeError => {
                info!("Device on {device} is not in download mode");
                return (None, DeviceStatus::BootModeError);
            },
            DeviceStatus::NotFound => {
                debug!("No ESP device on {device}");
            },
        }
    }

    (None, DeviceStatus::NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DetectedPort;
    use crate::error::Result;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::path::Path;

    /// Tool answering probes from a table and recording probed ports.
    struct TableTool {
        answers: HashMap<&'static str, DeviceStatus>,
        probed: RefCell<Vec<String>>,
    }

    impl TableTool {
        fn new(answers: &[(&'static str, DeviceStatus)]) -> Self {
            Self {
                answers: answers.iter().copied().collect(),
                probed: RefCell::new(Vec::new()),
            }
        }
    }

    impl FlashTool for TableTool {
        fn probe(&self, device: &Device) -> DeviceStatus {
            self.probed.borrow_mut().push(device.port().to_string());
            self.answers
                .get(device.port())
                .copied()
                .unwrap_or_default()
        }

        fn erase_flash(&self, _device: &Device) -> Result<()> {
            unreachable!("resolution never erases")
        }

        fn write_at(&self, _device: &Device, _address: u32, _path: &Path) -> Result<()> {
            unreachable!("resolution never writes")
        }
    }

    fn ports(names: &[&str]) -> Vec<DetectedPort> {
        names.iter().copied().map(DetectedPort::from_name).collect()
    }

    #[test]
    fn test_resolve_empty_candidates() {
        let tool = TableTool::new(&[]);
        let (device, status) = resolve(&ports(&[]), &tool);
        assert!(device.is_none());
        assert_eq!(status, DeviceStatus::NotFound);
        assert!(tool.probed.borrow().is_empty());
    }

    #[test]
    fn test_resolve_first_found_wins() {
        let tool = TableTool::new(&[
            ("A", DeviceStatus::NotFound),
            ("B", DeviceStatus::Found),
            ("C", DeviceStatus::Found),
        ]);
        let (device, status) = resolve(&ports(&["A", "B", "C"]), &tool);
        assert_eq!(device, Some(Device::new("B")));
        assert_eq!(status, DeviceStatus::Found);
        assert_eq!(*tool.probed.borrow(), ["A", "B"]);
    }

    #[test]
    fn test_resolve_boot_mode_error_short_circuits() {
        let tool = TableTool::new(&[
            ("A", DeviceStatus::NotFound),
            ("B", DeviceStatus::BootModeError),
            ("C", DeviceStatus::Found),
        ]);
        let (device, status) = resolve(&ports(&["A", "B", "C"]), &tool);
        assert!(device.is_none());
        assert_eq!(status, DeviceStatus::BootModeError);
        assert_eq!(*tool.probed.borrow(), ["A", "B"]);
    }

    #[test]
    fn test_resolve_all_not_found() {
        let tool = TableTool::new(&[]);
        let (device, status) = resolve(&ports(&["A", "B"]), &tool);
        assert!(device.is_none());
        assert_eq!(status, DeviceStatus::NotFound);
        assert_eq!(*tool.probed.borrow(), ["A", "B"]);
    }
}
