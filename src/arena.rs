//! Memory-mapped, growable byte arena.
//!
//! The arena is a thin wrapper around a single memory-mapped file. It knows
//! nothing about chromosomes, genomes, or bitmaps — it only grows the
//! backing file and remaps it, handing out byte slices resolved fresh from
//! the *current* mapping every time. Callers must never hold a slice across
//! a call to [`Arena::ensure_capacity`]: growing the file unmaps and remaps
//! it, which can move the whole region in the process's address space.
//! This is why [`crate::catalog::Catalog`] addresses everything by offset
//! rather than by pointer.

use memmap2::MmapMut;
use std::fs::{File, OpenOptions};
use std::path::Path;

use crate::error::Result;

const PAGE_SIZE: u64 = 4096;
/// Extra headroom applied on top of a requested size when growing, so a
/// run of small allocations doesn't remap on every single one.
const GROWTH_FACTOR: f64 = 1.5;

/// A growable memory-mapped region backing a database file.
pub struct Arena {
    file: File,
    mmap: MmapMut,
}

impl Arena {
    /// Create a new backing file at `path`, truncating any existing
    /// contents, and map an initial page.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(PAGE_SIZE)?;
        let mmap = unsafe { MmapMut::map_mut(&file)? };
        Ok(Self { file, mmap })
    }

    /// Open an existing backing file and map it in full.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let len = file.metadata()?.len().max(PAGE_SIZE);
        file.set_len(len)?;
        let mmap = unsafe { MmapMut::map_mut(&file)? };
        Ok(Self { file, mmap })
    }

    /// Current size of the mapped region in bytes.
    pub fn capacity(&self) -> u64 {
        self.mmap.len() as u64
    }

    /// Grow the backing file and remap it if `required_len` exceeds the
    /// current capacity. Page-rounds the new size and applies
    /// [`GROWTH_FACTOR`] headroom so repeated small grows amortize.
    pub fn ensure_capacity(&mut self, required_len: u64) -> Result<()> {
        if required_len <= self.capacity() {
            return Ok(());
        }
        let grown = ((required_len as f64) * GROWTH_FACTOR) as u64;
        let rounded = (grown + PAGE_SIZE - 1) / PAGE_SIZE * PAGE_SIZE;
        log::debug!(
            "growing arena from {} to {} bytes",
            self.capacity(),
            rounded
        );
        self.file.set_len(rounded)?;
        // SAFETY: no outstanding borrows of `self.mmap` can exist across
        // this call; `&mut self` enforces that at the type level.
        self.mmap = unsafe { MmapMut::map_mut(&self.file)? };
        Ok(())
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.mmap
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.mmap
    }

    pub fn flush(&self) -> Result<()> {
        self.mmap.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn create_maps_a_full_page() {
        let tmp = NamedTempFile::new().unwrap();
        let arena = Arena::create(tmp.path()).unwrap();
        assert_eq!(arena.capacity(), PAGE_SIZE);
    }

    #[test]
    fn ensure_capacity_grows_past_requested_size() {
        let tmp = NamedTempFile::new().unwrap();
        let mut arena = Arena::create(tmp.path()).unwrap();
        arena.ensure_capacity(10_000).unwrap();
        assert!(arena.capacity() >= 10_000);
        assert_eq!(arena.capacity() % PAGE_SIZE, 0);
    }

    #[test]
    fn writes_survive_a_grow_triggered_remap() {
        let tmp = NamedTempFile::new().unwrap();
        let mut arena = Arena::create(tmp.path()).unwrap();
        arena.as_mut_slice()[0..4].copy_from_slice(&[1, 2, 3, 4]);
        arena.ensure_capacity(50_000).unwrap();
        assert_eq!(&arena.as_slice()[0..4], &[1, 2, 3, 4]);
    }

    #[test]
    fn reopen_preserves_contents() {
        let tmp = NamedTempFile::new().unwrap();
        {
            let mut arena = Arena::create(tmp.path()).unwrap();
            arena.as_mut_slice()[0..4].copy_from_slice(&[9, 9, 9, 9]);
            arena.flush().unwrap();
        }
        let arena = Arena::open(tmp.path()).unwrap();
        assert_eq!(&arena.as_slice()[0..4], &[9, 9, 9, 9]);
    }
}
