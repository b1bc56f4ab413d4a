//! Command implementations.
//!
//! Each subcommand is implemented in its own module for clean separation.

pub(crate) mod bundle;
pub(crate) mod completions;
pub(crate) mod plan;
pub(crate) mod ports;
pub(crate) mod status;
pub(crate) mod upload;
pub(crate) mod watch;

use console::style;
use espbundle::{DetectedPort, DeviceStatus, Esptool, NativePortScanner, PortScanner, Session};

use crate::Cli;
use crate::config::Config;

/// Candidate ports: every serial port, or the one given with `--port`.
pub(crate) enum Scanner {
    /// Platform enumeration.
    Native(NativePortScanner),
    /// Fixed list from the command line.
    Fixed(Vec<DetectedPort>),
}

impl PortScanner for Scanner {
    fn list_candidates(&self) -> Vec<DetectedPort> {
        match self {
            Self::Native(scanner) => scanner.list_candidates(),
            Self::Fixed(ports) => ports.list_candidates(),
        }
    }
}

impl Scanner {
    pub(crate) fn for_cli(cli: &Cli) -> Self {
        match &cli.port {
            Some(port) => Self::Fixed(vec![DetectedPort::from_name(port.clone())]),
            None => Self::Native(NativePortScanner),
        }
    }
}

pub(crate) type CliSession = Session<Scanner, Esptool>;

/// Build the upload session from the command line and configuration.
pub(crate) fn build_session(cli: &Cli, config: &Config) -> CliSession {
    Session::new(
        Scanner::for_cli(cli),
        Esptool::new(config.tool_config()),
        config.session_config(),
    )
}

/// Status line with a marker matching the status.
pub(crate) fn styled_status(status: DeviceStatus) -> String {
    match status {
        DeviceStatus::Found => format!("{} {}", style("✓").green(), status.message()),
        DeviceStatus::BootModeError => format!("{} {}", style("⚠").yellow(), status.message()),
        DeviceStatus::NotFound => format!("{} {}", style("✗").red(), status.message()),
    }
}

/// Print the configured operator instructions.
pub(crate) fn print_instructions(config: &Config) {
    if !config.instructions.trim().is_empty() {
        eprintln!(
            "{} {}",
            style("Instructions:").bold(),
            config.instructions.trim()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_scanner_uses_port_override() {
        let cli = Cli::try_parse_from(["espbundle", "--port", "COM7", "status"]).unwrap();
        let ports = Scanner::for_cli(&cli).list_candidates();
        assert_eq!(ports.len(), 1);
        assert_eq!(ports[0].name, "COM7");
    }

    #[test]
    fn test_styled_status_contains_message() {
        console::set_colors_enabled(false);
        assert!(styled_status(DeviceStatus::NotFound).contains("No ESP device found"));
        assert!(styled_status(DeviceStatus::Found).starts_with('✓'));
    }
}
