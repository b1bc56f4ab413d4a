//! Upload planning.
//!
//! Entries are laid out back to back from the flash base. Images go first,
//! everything else after them, each group in archive order. Every entry
//! starts on a chunk boundary: the next start address is the current end
//! offset rounded up to the chunk size.
//!
//! ```text
//! 0x0000  +-----------+
//!         | app.bin   |  5000 bytes
//! 0x1388  +-----------+
//!         | (padding) |
//! 0x2000  +-----------+
//!         | data.txt  |
//!         +-----------+
//! ```

use crate::error::{Error, Result};
use crate::image::ArchiveEntry;

/// Flash base address of the first planned entry.
pub const FLASH_BASE: u32 = 0x0;

/// Default flash page size used as the alignment boundary.
pub const DEFAULT_CHUNK_SIZE: u32 = 0x1000;

/// An entry with its target flash address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedEntry {
    /// The archive entry.
    pub entry: ArchiveEntry,
    /// Absolute flash address.
    pub address: u32,
}

impl PlannedEntry {
    /// Entry name.
    pub fn name(&self) -> &str {
        &self.entry.name
    }

    /// Byte length of the entry.
    pub fn len(&self) -> usize {
        self.entry.len()
    }

    /// Whether the entry is empty.
    pub fn is_empty(&self) -> bool {
        self.entry.is_empty()
    }
}

/// Ordered upload plan.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UploadPlan {
    /// Entries in upload order.
    pub entries: Vec<PlannedEntry>,
    /// Aligned address following the last entry.
    pub end_address: u32,
    /// Alignment used to build the plan.
    pub chunk_size: u32,
}

impl UploadPlan {
    /// Number of planned entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is planned.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over planned entries.
    pub fn iter(&self) -> std::slice::Iter<'_, PlannedEntry> {
        self.entries.iter()
    }
}

impl<'a> IntoIterator for &'a UploadPlan {
    type Item = &'a PlannedEntry;
    type IntoIter = std::slice::Iter<'a, PlannedEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Round `value` up to the next multiple of `chunk_size`.
///
/// Returns `None` on overflow. `chunk_size` must not be zero.
pub fn align_up(value: u64, chunk_size: u32) -> Option<u64> {
    let chunk = u64::from(chunk_size);
    value.div_ceil(chunk).checked_mul(chunk)
}

/// Build the upload plan for `entries`.
///
/// Pure: the same entries and chunk size always give the same plan.
pub fn plan<I>(entries: I, chunk_size: u32) -> Result<UploadPlan>
where
    I: IntoIterator<Item = ArchiveEntry>,
{
    if chunk_size == 0 {
        return Err(Error::Config("chunk size must be greater than zero".into()));
    }

    let (images, others): (Vec<ArchiveEntry>, Vec<ArchiveEntry>) = entries
        .into_iter()
        .filter(ArchiveEntry::has_usable_name)
        .partition(ArchiveEntry::is_image);

    let mut address = FLASH_BASE;
    let mut planned = Vec::with_capacity(images.len() + others.len());

    for entry in images.into_iter().chain(others) {
        let end = u64::from(address) + entry.len() as u64;
        let next = align_up(end, chunk_size)
            .and_then(|next| u32::try_from(next).ok())
            .ok_or_else(|| Error::AddressOverflow {
                name: entry.name.clone(),
            })?;

        planned.push(PlannedEntry { entry, address });
        address = next;
    }

    Ok(UploadPlan {
        entries: planned,
        end_address: address,
        chunk_size,
    })
}
