//! # espbundle
//!
//! A library for flashing zip bundles onto ESP devices through `esptool`.
//!
//! This crate provides:
//!
//! - Serial port discovery and device resolution
//! - An `esptool` adapter behind the [`FlashTool`] trait
//! - Zip bundle reading
//! - Upload planning (images first, chunk-aligned addresses)
//! - An upload [`Session`] driving erase and write
//!
//! ## Features
//!
//! - `native` (default): Serial port enumeration via the `serialport` crate
//! - `serde`: Serialization support for status types
//!
//! ## Example
//!
//! ```rust,no_run
//! use espbundle::{Esptool, NativePortScanner, Session, SessionConfig, ToolConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let tool = Esptool::new(ToolConfig::new("esptool", 115_200));
//!     let mut session = Session::new(NativePortScanner, tool, SessionConfig::default());
//!
//!     let status = session.poll();
//!     println!("{}", status.message());
//!
//!     if status.is_ready() {
//!         let report = session.run_upload("bundle.zip".as_ref(), &mut |name, done, total| {
//!             println!("Writing {}: {}/{}", name, done, total);
//!         })?;
//!         println!("Wrote {} entries", report.entries.len());
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

use std::sync::{Arc, OnceLock};

pub mod device;
pub mod error;
pub mod image;
pub mod plan;
pub mod session;
pub mod tool;

static INTERRUPT_CHECKER: OnceLock<Arc<dyn Fn() -> bool + Send + Sync>> = OnceLock::new();

/// Register a global interruption checker consulted before an upload starts.
///
/// The checker should return `true` when no new upload should begin
/// (for example after receiving Ctrl-C in CLI applications).
pub fn set_interrupt_checker<F>(checker: F)
where
    F: Fn() -> bool + Send + Sync + 'static,
{
    let _ = INTERRUPT_CHECKER.set(Arc::new(checker));
}

/// Returns whether interruption was requested by the embedding application.
#[must_use]
pub fn is_interrupted_requested() -> bool {
    INTERRUPT_CHECKER
        .get()
        .is_some_and(|checker| checker())
}

#[cfg(feature = "native")]
pub use device::NativePortScanner;
pub use {
    device::{
        DetectedPort, Device, DeviceKind, DeviceStatus, PortScanner, detect_ports,
        format_port_list, resolve,
    },
    error::{Error, Result},
    image::{ArchiveEntry, Bundle},
    plan::{DEFAULT_CHUNK_SIZE, PlannedEntry, UploadPlan, plan},
    session::{Session, SessionConfig, SessionState, UploadReport, UploadedEntry},
    tool::{Esptool, FlashTool, ToolConfig},
};
