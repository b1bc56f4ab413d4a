//! Zip bundle reader.
//!
//! A bundle is a plain zip file. Every file entry is read fully into memory,
//! in central-directory order; directory entries carry no data and are
//! dropped here.

use crate::error::Result;
use log::debug;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

/// Extension marking a directly bootable firmware image.
pub const IMAGE_EXTENSION: &str = "bin";

/// One file of a bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Entry name as stored in the archive.
    pub name: String,
    /// Entry contents.
    pub data: Vec<u8>,
}

impl ArchiveEntry {
    /// Create an entry from a name and its contents.
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }

    /// Byte length of the contents.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the entry has no contents.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether the entry is a firmware image (`.bin`, any case).
    pub fn is_image(&self) -> bool {
        self.extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(IMAGE_EXTENSION))
    }

    /// Whether the name is usable for planning (not empty, not a bare separator).
    pub fn has_usable_name(&self) -> bool {
        !matches!(self.name.as_str(), "" | "/" | "\\")
    }

    /// Extension of the last path component, without the dot.
    pub fn extension(&self) -> Option<&str> {
        let file_name = self
            .name
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(&self.name);
        file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext)
            .filter(|ext| !ext.is_empty())
    }
}

/// Parsed bundle archive.
#[derive(Debug, Clone, Default)]
pub struct Bundle {
    /// File entries in archive order.
    pub entries: Vec<ArchiveEntry>,
}

impl Bundle {
    /// Load a bundle from a zip file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        debug!("Reading bundle {}", path.as_ref().display());
        Self::from_reader(BufReader::new(file))
    }

    /// Load a bundle from an in-memory zip image.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::from_reader(std::io::Cursor::new(data))
    }

    /// Load a bundle from any seekable zip stream.
    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Self> {
        let mut archive = zip::ZipArchive::new(reader)?;
        let mut entries = Vec::with_capacity(archive.len());

        for index in 0..archive.len() {
            let mut file = archive.by_index(index)?;
            if file.is_dir() {
                debug!("Skipping directory entry {}", file.name());
                continue;
            }

            let mut data = Vec::with_capacity(usize::try_from(file.size()).unwrap_or(0));
            file.read_to_end(&mut data)?;
            debug!("Bundle entry {} ({} bytes)", file.name(), data.len());

            entries.push(ArchiveEntry {
                name: file.name().to_string(),
                data,
            });
        }

        Ok(Self { entries })
    }

    /// Number of file entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the bundle has no file entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn make_zip(files: &[(&str, &[u8])], dirs: &[&str]) -> Vec<u8> {
        let mut zw = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        for dir in dirs {
            zw.add_directory(*dir, SimpleFileOptions::default()).unwrap();
        }
        for (name, data) in files {
            zw.start_file(*name, SimpleFileOptions::default()).unwrap();
            zw.write_all(data).unwrap();
        }
        zw.finish().unwrap().into_inner()
    }

    #[test]
    fn test_entry_is_image() {
        assert!(ArchiveEntry::new("firmware.bin", vec![]).is_image());
        assert!(ArchiveEntry::new("BOOT.BIN", vec![]).is_image());
        assert!(ArchiveEntry::new("fw/app.bin", vec![]).is_image());
        assert!(!ArchiveEntry::new("data.txt", vec![]).is_image());
        assert!(!ArchiveEntry::new("bin", vec![]).is_image());
        assert!(!ArchiveEntry::new("bin.d/readme", vec![]).is_image());
    }

    #[test]
    fn test_entry_extension() {
        assert_eq!(ArchiveEntry::new("a.txt", vec![]).extension(), Some("txt"));
        assert_eq!(ArchiveEntry::new("web/index.html", vec![]).extension(), Some("html"));
        assert_eq!(ArchiveEntry::new("v1.2/README", vec![]).extension(), None);
        assert_eq!(ArchiveEntry::new("trailing.", vec![]).extension(), None);
    }

    #[test]
    fn test_entry_usable_name() {
        assert!(ArchiveEntry::new("a.txt", vec![]).has_usable_name());
        assert!(!ArchiveEntry::new("", vec![]).has_usable_name());
        assert!(!ArchiveEntry::new("/", vec![]).has_usable_name());
        assert!(!ArchiveEntry::new("\\", vec![]).has_usable_name());
    }

    #[test]
    fn test_bundle_reads_entries_in_order() {
        let zip = make_zip(&[("data.txt", b"hello"), ("app.bin", &[0xE9; 300])], &[]);
        let bundle = Bundle::from_bytes(&zip).unwrap();
        assert_eq!(bundle.len(), 2);
        assert_eq!(bundle.entries[0].name, "data.txt");
        assert_eq!(bundle.entries[0].data, b"hello");
        assert_eq!(bundle.entries[1].name, "app.bin");
        assert_eq!(bundle.entries[1].len(), 300);
    }

    #[test]
    fn test_bundle_skips_directories() {
        let zip = make_zip(&[("web/index.html", b"<html/>")], &["web/"]);
        let bundle = Bundle::from_bytes(&zip).unwrap();
        assert_eq!(bundle.len(), 1);
        assert_eq!(bundle.entries[0].name, "web/index.html");
    }

    #[test]
    fn test_bundle_rejects_garbage() {
        let err = Bundle::from_bytes(b"definitely not a zip").unwrap_err();
        assert!(matches!(err, Error::ArchiveRead(_)));
    }

    #[test]
    fn test_bundle_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle.zip");
        std::fs::write(&path, make_zip(&[("a.bin", b"abc")], &[])).unwrap();

        let bundle = Bundle::from_file(&path).unwrap();
        assert_eq!(bundle.entries, vec![ArchiveEntry::new("a.bin", b"abc".to_vec())]);
    }

    #[test]
    fn test_bundle_missing_file_is_io_error() {
        let err = Bundle::from_file("/nonexistent/espbundle/bundle.zip").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
