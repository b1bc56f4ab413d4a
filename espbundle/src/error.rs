//! Error types for espbundle.

use std::io;
use thiserror::Error;

/// Result type for espbundle operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for espbundle operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (transient files, archive files).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serial port enumeration error.
    #[cfg(feature = "native")]
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// No responsive device on any serial port.
    #[error("No ESP device found")]
    NoDeviceFound,

    /// A device answered but is not in its download boot mode.
    #[error("ESP device is not in download boot mode")]
    BootModeError,

    /// The flashing tool could not be started at all.
    #[error("Failed to start flashing tool `{program}`: {source}")]
    ToolSpawn {
        /// Program that was invoked.
        program: String,
        /// Underlying spawn error.
        #[source]
        source: io::Error,
    },

    /// The flashing tool ran but reported failure.
    #[error("`{command}` failed ({status}): {output}")]
    ToolInvocationFailed {
        /// Tool command that failed (e.g. `erase_flash`).
        command: String,
        /// Exit status as reported by the OS.
        status: String,
        /// Captured stdout and stderr.
        output: String,
    },

    /// Bundle archive is unreadable or malformed.
    #[error("Invalid bundle archive: {0}")]
    ArchiveRead(#[from] zip::result::ZipError),

    /// A planned address does not fit the 32-bit flash address space.
    #[error("Flash address overflow while placing `{name}`")]
    AddressOverflow {
        /// Entry being placed when the overflow happened.
        name: String,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Operation cancelled before it started.
    #[error("Operation cancelled")]
    Cancelled,
}
