//! Flashing tool adapter.
//!
//! All flash access goes through an external `esptool` process:
//!
//! ```text
//! <tool> [tool args] --port <port> --baud <rate> flash_id
//! <tool> [tool args] --port <port> --baud <rate> erase_flash
//! <tool> [tool args] --port <port> --baud <rate> write_flash --flash_size=detect <0xADDR> <file>
//! ```
//!
//! `flash_id` is judged by its text only; the other two by exit status. The
//! probe signatures below are the only place that knows esptool's wording.

use crate::device::{Device, DeviceStatus};
use crate::error::{Error, Result};
use log::{debug, info, trace, warn};
use std::ffi::OsString;
use std::path::Path;
use std::process::{Command, Output};

/// Probe output emitted when the chip is not in its download boot mode.
pub const BOOT_MODE_ERROR_SIGNATURE: &str = "Wrong boot mode detected";

/// Probe output emitted when nothing answered on the port.
pub const NO_DEVICE_SIGNATURE: &str = "fatal error occurred: Failed to connect";

/// Default flashing tool executable.
pub const DEFAULT_TOOL: &str = "esptool";

/// Default serial baud rate.
pub const DEFAULT_BAUD: u32 = 115_200;

/// Operations the upload flow needs from a flashing tool.
pub trait FlashTool {
    /// Read-only status check. Never fails; anything unexpected is `NotFound`.
    fn probe(&self, device: &Device) -> DeviceStatus;

    /// Erase the whole flash.
    fn erase_flash(&self, device: &Device) -> Result<()>;

    /// Write a local file at an absolute flash address.
    fn write_at(&self, device: &Device, address: u32, path: &Path) -> Result<()>;
}

/// Classify `flash_id` output.
///
/// The boot-mode signature wins over the no-device signature; output carrying
/// neither means the chip answered.
pub fn classify_probe_output(text: &str) -> DeviceStatus {
    if text.contains(BOOT_MODE_ERROR_SIGNATURE) {
        DeviceStatus::BootModeError
    } else if text.contains(NO_DEVICE_SIGNATURE) {
        DeviceStatus::NotFound
    } else {
        DeviceStatus::Found
    }
}

/// Flashing tool invocation settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolConfig {
    /// Executable to run.
    pub program: String,
    /// Arguments placed before the esptool arguments (e.g. `-m esptool`).
    pub args: Vec<String>,
    /// Serial baud rate.
    pub baud_rate: u32,
    /// Echo every invocation's output to the log at `info` level.
    pub echo_output: bool,
}

impl ToolConfig {
    /// Create a configuration for the given executable and baud rate.
    pub fn new(program: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            baud_rate,
            echo_output: false,
        }
    }

    /// Set leading arguments.
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Enable or disable output echo.
    #[must_use]
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo_output = echo;
        self
    }
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self::new(DEFAULT_TOOL, DEFAULT_BAUD)
    }
}

/// [`FlashTool`] backed by an `esptool` subprocess.
#[derive(Debug, Clone, Default)]
pub struct Esptool {
    config: ToolConfig,
}

impl Esptool {
    /// Create an adapter from its configuration.
    pub fn new(config: ToolConfig) -> Self {
        Self { config }
    }

    /// Invocation settings.
    pub fn config(&self) -> &ToolConfig {
        &self.config
    }

    fn base_args(&self, device: &Device) -> Vec<OsString> {
        let mut args: Vec<OsString> = self.config.args.iter().map(OsString::from).collect();
        args.push("--port".into());
        args.push(device.port().into());
        args.push("--baud".into());
        args.push(self.config.baud_rate.to_string().into());
        args
    }

    /// Arguments for the `flash_id` probe.
    pub fn probe_args(&self, device: &Device) -> Vec<OsString> {
        let mut args = self.base_args(device);
        args.push("flash_id".into());
        args
    }

    /// Arguments for `erase_flash`.
    pub fn erase_args(&self, device: &Device) -> Vec<OsString> {
        let mut args = self.base_args(device);
        args.push("erase_flash".into());
        args
    }

    /// Arguments for `write_flash` at `address`.
    pub fn write_args(&self, device: &Device, address: u32, path: &Path) -> Vec<OsString> {
        let mut args = self.base_args(device);
        args.push("write_flash".into());
        args.push("--flash_size=detect".into());
        args.push(format!("{address:#x}").into());
        args.push(path.as_os_str().to_owned());
        args
    }

    fn run(&self, args: &[OsString]) -> Result<(Output, String)> {
        debug!("Running {} {:?}", self.config.program, args);

        let output = Command::new(&self.config.program)
            .args(args)
            .output()
            .map_err(|source| Error::ToolSpawn {
                program: self.config.program.clone(),
                source,
            })?;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));

        if self.config.echo_output {
            info!("{}", text.trim_end());
        } else {
            trace!("{}", text.trim_end());
        }

        Ok((output, text))
    }

    fn run_checked(&self, command: &str, args: &[OsString]) -> Result<()> {
        let (output, text) = self.run(args)?;
        if output.status.success() {
            Ok(())
        } else {
            Err(Error::ToolInvocationFailed {
                command: command.to_string(),
                status: output.status.to_string(),
                output: text.trim().to_string(),
            })
        }
    }
}

impl FlashTool for Esptool {
    fn probe(&self, device: &Device) -> DeviceStatus {
        match self.run(&self.probe_args(device)) {
            Ok((_, text)) => {
                let status = classify_probe_output(&text);
                debug!("Probe of {device}: {status}");
                status
            },
            Err(e) => {
                warn!("Probe of {device} failed: {e}");
                DeviceStatus::NotFound
            },
        }
    }

    fn erase_flash(&self, device: &Device) -> Result<()> {
        info!("Erasing flash on {device}");
        self.run_checked("erase_flash", &self.erase_args(device))
    }

    fn write_at(&self, device: &Device, address: u32, path: &Path) -> Result<()> {
        info!("Writing {} at {address:#x} on {device}", path.display());
        self.run_checked("write_flash", &self.write_args(device, address, path))
    }
}
