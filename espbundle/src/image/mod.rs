//! Bundle archives.

pub mod bundle;

pub use bundle::{ArchiveEntry, Bundle, IMAGE_EXTENSION};
