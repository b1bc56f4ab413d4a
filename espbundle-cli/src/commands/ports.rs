//! Serial port listing.

use console::style;
use espbundle::{DetectedPort, detect_ports};

/// JSON form of the port list.
fn ports_json(ports: &[DetectedPort]) -> serde_json::Value {
    ports
        .iter()
        .map(|p| {
            serde_json::json!({
                "name": p.name,
                "device": p.device.name(),
                "known": p.device.is_known(),
                "vid": p.vid,
                "pid": p.pid,
                "manufacturer": p.manufacturer,
                "product": p.product,
                "serial": p.serial,
            })
        })
        .collect()
}

/// List ports command implementation.
pub(crate) fn cmd_list_ports(json: bool) {
    let detected = detect_ports();

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&ports_json(&detected)).unwrap_or_default()
        );
        return;
    }

    eprintln!("{}", style("Available serial ports").bold().underlined());

    if detected.is_empty() {
        eprintln!("  {}", style("No serial ports found").dim());
        return;
    }

    for port in &detected {
        let device_type = if port.device.is_known() {
            format!(" [{}]", style(port.device.name()).yellow())
        } else {
            String::new()
        };
        let vid_pid = match (port.vid, port.pid) {
            (Some(vid), Some(pid)) => format!(" ({vid:04X}:{pid:04X})"),
            _ => String::new(),
        };
        let product = port
            .product
            .as_deref()
            .map(|p| format!(" - {}", style(p).dim()))
            .unwrap_or_default();

        eprintln!(
            "  {} {}{}{}{}",
            style("•").green(),
            style(&port.name).cyan(),
            device_type,
            vid_pid,
            product
        );
    }
}
