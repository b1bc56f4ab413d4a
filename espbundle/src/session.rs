//! Upload session.
//!
//! A [`Session`] owns the scanner, the flashing tool and the last known
//! device status. Polling and uploading both take `&mut self`, so a status
//! refresh can never overlap an upload against the same port.
//!
//! ```text
//! Idle -> Resolving -> DeviceReady -> Erasing -> Uploading(i) -> Done
//!   \________\______________\____________\___________\-------> Failed
//! ```

use crate::device::{Device, DeviceStatus, PortScanner, resolve};
use crate::error::{Error, Result};
use crate::image::Bundle;
use crate::plan::{DEFAULT_CHUNK_SIZE, PlannedEntry, UploadPlan, plan};
use crate::tool::FlashTool;
use log::{debug, info, warn};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Prefix of transient files written for each uploaded entry.
const TRANSIENT_PREFIX: &str = "espbundle-";

/// Session settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Flash alignment boundary between entries.
    pub chunk_size: u32,
    /// Directory for transient files (system temp dir when `None`).
    pub temp_dir: Option<PathBuf>,
}

impl SessionConfig {
    /// Set the chunk size.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: u32) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Set the transient file directory.
    #[must_use]
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            temp_dir: None,
        }
    }
}

/// Where the session currently is.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Nothing in progress, no usable device known.
    #[default]
    Idle,
    /// Probing ports.
    Resolving,
    /// A device answered and is ready.
    DeviceReady(Device),
    /// Erasing flash.
    Erasing,
    /// Writing planned entry `index` of `total`.
    Uploading {
        /// Zero-based index of the entry being written.
        index: usize,
        /// Number of planned entries.
        total: usize,
    },
    /// Last upload completed.
    Done,
    /// Last upload aborted.
    Failed(String),
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Resolving => write!(f, "resolving"),
            Self::DeviceReady(device) => write!(f, "device ready on {device}"),
            Self::Erasing => write!(f, "erasing"),
            Self::Uploading { index, total } => write!(f, "uploading {}/{total}", index + 1),
            Self::Done => write!(f, "done"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// One written entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedEntry {
    /// Entry name.
    pub name: String,
    /// Flash address it was written to.
    pub address: u32,
    /// Bytes written.
    pub len: usize,
}

/// Summary of a completed upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReport {
    /// Device that was flashed.
    pub device: Device,
    /// Written entries in upload order.
    pub entries: Vec<UploadedEntry>,
}

/// Single-device upload session.
pub struct Session<S, T> {
    scanner: S,
    tool: T,
    config: SessionConfig,
    status: DeviceStatus,
    state: SessionState,
    cancel_check: fn() -> bool,
}

impl<S: PortScanner, T: FlashTool> Session<S, T> {
    /// Create a session. The initial status is `NotFound` until the first poll.
    pub fn new(scanner: S, tool: T, config: SessionConfig) -> Self {
        Self {
            scanner,
            tool,
            config,
            status: DeviceStatus::NotFound,
            state: SessionState::Idle,
            cancel_check: crate::is_interrupted_requested,
        }
    }

    /// Replace the cancellation check consulted before an upload starts.
    #[must_use]
    pub fn with_cancel_check(mut self, check: fn() -> bool) -> Self {
        self.cancel_check = check;
        self
    }

    /// Last known device status.
    pub fn status(&self) -> DeviceStatus {
        self.status
    }

    /// Current state.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Session settings.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The flashing tool.
    pub fn tool(&self) -> &T {
        &self.tool
    }

    /// Refresh the device status.
    pub fn poll(&mut self) -> DeviceStatus {
        self.resolve_device();
        self.status
    }

    fn resolve_device(&mut self) -> Option<Device> {
        self.state = SessionState::Resolving;
        let (device, status) = resolve(&self.scanner, &self.tool);
        self.status = status;
        self.state = match &device {
            Some(device) => SessionState::DeviceReady(device.clone()),
            None => SessionState::Idle,
        };
        device
    }

    /// Upload a bundle file.
    ///
    /// Refuses to start, without touching the archive, unless the last poll
    /// found a device. The device is then re-resolved, the bundle is read and
    /// planned, the flash is erased and every planned entry is written.
    ///
    /// `progress` receives `(entry name, completed entries, total entries)`
    /// before each write and once more when all entries are written.
    pub fn run_upload(
        &mut self,
        bundle: &Path,
        progress: &mut dyn FnMut(&str, usize, usize),
    ) -> Result<UploadReport> {
        if (self.cancel_check)() {
            return Err(Error::Cancelled);
        }
        self.status.into_result()?;

        let result = self.upload(bundle, progress);
        self.finish(result)
    }

    fn upload(
        &mut self,
        bundle: &Path,
        progress: &mut dyn FnMut(&str, usize, usize),
    ) -> Result<UploadReport> {
        let Some(device) = self.resolve_device() else {
            self.status.into_result()?;
            return Err(Error::NoDeviceFound);
        };

        let bundle = Bundle::from_file(bundle)?;
        let plan = plan(bundle.entries, self.config.chunk_size)?;
        info!(
            "Planned {} entries, ending at {:#x}",
            plan.len(),
            plan.end_address
        );

        self.state = SessionState::Erasing;
        self.tool.erase_flash(&device)?;

        self.write_plan(&device, &plan, progress)
    }

    /// Write an already computed plan to `device`, without erasing first.
    pub fn run_plan(
        &mut self,
        device: &Device,
        plan: &UploadPlan,
        progress: &mut dyn FnMut(&str, usize, usize),
    ) -> Result<UploadReport> {
        let result = self.write_plan(device, plan, progress);
        self.finish(result)
    }

    fn write_plan(
        &mut self,
        device: &Device,
        plan: &UploadPlan,
        progress: &mut dyn FnMut(&str, usize, usize),
    ) -> Result<UploadReport> {
        let total = plan.len();
        let mut written = Vec::with_capacity(total);

        for (index, planned) in plan.iter().enumerate() {
            self.state = SessionState::Uploading { index, total };
            progress(planned.name(), index, total);
            info!(
                "({}/{total}) {} -> {:#x} ({} bytes)",
                index + 1,
                planned.name(),
                planned.address,
                planned.len()
            );

            let transient = self.materialize(planned)?;
            let result = self
                .tool
                .write_at(device, planned.address, transient.path());

            // Remove the transient file before anything else, including errors.
            let path = transient.path().to_path_buf();
            if let Err(e) = transient.close() {
                warn!("Failed to remove {}: {e}", path.display());
            }
            result?;

            written.push(UploadedEntry {
                name: planned.name().to_string(),
                address: planned.address,
                len: planned.len(),
            });
        }

        if let Some(last) = plan.entries.last() {
            progress(last.name(), total, total);
        }

        Ok(UploadReport {
            device: device.clone(),
            entries: written,
        })
    }

    fn materialize(&self, planned: &PlannedEntry) -> Result<NamedTempFile> {
        let suffix = planned
            .entry
            .extension()
            .map(|ext| format!(".{ext}"))
            .unwrap_or_default();

        let mut builder = tempfile::Builder::new();
        builder.prefix(TRANSIENT_PREFIX).suffix(suffix.as_str());
        let mut file = match &self.config.temp_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };

        file.write_all(&planned.entry.data)?;
        file.flush()?;
        debug!(
            "Materialized {} to {}",
            planned.name(),
            file.path().display()
        );
        Ok(file)
    }

    fn finish(&mut self, result: Result<UploadReport>) -> Result<UploadReport> {
        match &result {
            Ok(report) => {
                info!("Uploaded {} entries to {}", report.entries.len(), report.device);
                self.state = SessionState::Done;
            },
            Err(e) => {
                warn!("Upload aborted: {e}");
                self.state = SessionState::Failed(e.to_string());
            },
        }
        result
    }
}
