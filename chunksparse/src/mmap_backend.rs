//! Memory-mapped file backend
//!
//! An [`MmapArray`] is one flat file of native little-endian elements,
//! mapped read-only. Appends write to the end of the file and remap it, so
//! earlier positions never move and readers of an older length still see
//! the same data.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chunksparse_core::{validation::validate_typed_slice, MatrixElement};
use log::{debug, trace};
use memmap2::{Mmap, MmapOptions};

use crate::chunked_backend::{check_coordinates, check_range, ChunkedArray};
use crate::{Error, Result};

/// Mapping plus the element count it was validated for
struct Mapped {
    // an empty file cannot be mapped on every platform
    mmap: Option<Mmap>,
    len: usize,
}

impl Mapped {
    fn open<T: MatrixElement>(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        if file.metadata()?.len() == 0 {
            return Ok(Self { mmap: None, len: 0 });
        }

        // SAFETY: the file is only ever extended through `MmapArray::append`,
        // which holds the write lock while remapping. Bytes already mapped
        // are never rewritten.
        let mmap = unsafe { MmapOptions::new().map(&file)? };
        let len = validate_typed_slice::<T>(&mmap)?;
        Ok(Self { mmap: Some(mmap), len })
    }

    fn as_slice<T: MatrixElement>(&self) -> Result<&[T]> {
        match &self.mmap {
            Some(mmap) => bytemuck::try_cast_slice(&mmap[..]).map_err(|_| {
                Error::InvalidArray("mapped file is not a whole, aligned array of the element type")
            }),
            None => Ok(&[]),
        }
    }
}

/// Chunked array backed by a memory-mapped file
pub struct MmapArray<T: MatrixElement> {
    path: PathBuf,
    chunk_size: usize,
    mapped: RwLock<Mapped>,
    _marker: std::marker::PhantomData<T>,
}

impl<T: MatrixElement> MmapArray<T> {
    /// Map an existing array file
    pub fn open<P: AsRef<Path>>(path: P, chunk_size: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mapped = Mapped::open::<T>(&path)?;
        debug!("mapped {} ({} elements)", path.display(), mapped.len);

        Ok(Self {
            path,
            chunk_size: chunk_size.max(1),
            mapped: RwLock::new(mapped),
            _marker: std::marker::PhantomData,
        })
    }

    /// Write `items` to a new file at `path` and map it
    pub fn create<P: AsRef<Path>>(path: P, items: &[T], chunk_size: usize) -> Result<Self> {
        let mut file = File::create(path.as_ref())?;
        file.write_all(bytemuck::cast_slice(items))?;
        file.sync_all()?;
        Self::open(path, chunk_size)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}

fn poisoned() -> Error {
    Error::Storage("mmap lock poisoned".to_string())
}

impl<T: MatrixElement> ChunkedArray<T> for MmapArray<T> {
    fn len(&self) -> usize {
        self.mapped.read().map(|m| m.len).unwrap_or(0)
    }

    fn range_read(&self, start: usize, stop: usize) -> Result<Vec<T>> {
        let mapped = self.mapped.read().map_err(|_| poisoned())?;
        check_range(start, stop, mapped.len)?;
        trace!("mmap read [{start}, {stop}) of {}", self.path.display());
        Ok(mapped.as_slice::<T>()?[start..stop].to_vec())
    }

    fn coordinate_select(&self, indices: &[usize]) -> Result<Vec<T>> {
        let mapped = self.mapped.read().map_err(|_| poisoned())?;
        check_coordinates(indices, mapped.len)?;
        let data = mapped.as_slice::<T>()?;
        Ok(indices.iter().map(|&i| data[i]).collect())
    }

    fn append(&self, items: &[T]) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }
        let mut mapped = self.mapped.write().map_err(|_| poisoned())?;

        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        file.write_all(bytemuck::cast_slice(items))?;
        file.sync_data()?;

        *mapped = Mapped::open::<T>(&self.path)?;
        trace!(
            "appended {} elements to {}, now {}",
            items.len(),
            self.path.display(),
            mapped.len
        );
        Ok(())
    }

    fn truncate(&self, len: usize) -> Result<()> {
        let mut mapped = self.mapped.write().map_err(|_| poisoned())?;
        let file = OpenOptions::new().write(true).open(&self.path)?;

        // a failed append may have left bytes past the mapped length
        let target = (len * T::size_bytes()) as u64;
        let on_disk = file.metadata()?.len();
        if target > on_disk {
            return Err(Error::OutOfBounds {
                index: len,
                bound: on_disk as usize / T::size_bytes(),
            });
        }

        *mapped = Mapped { mmap: None, len: 0 };
        let shrunk = file.set_len(target).and_then(|_| file.sync_data());
        *mapped = Mapped::open::<T>(&self.path)?;
        shrunk?;
        debug!("truncated {} to {} elements", self.path.display(), mapped.len);
        Ok(())
    }

    fn nchunks(&self) -> usize {
        self.len().div_ceil(self.chunk_size)
    }
}
